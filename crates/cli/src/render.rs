//! Turns work-loop events into terminal output.
//!
//! Text snapshots are cumulative, so only the unseen suffix of each one
//! is printed. Tool activity gets one status line per call.

use codeclaw_agent::WorkEvent;
use codeclaw_core::message::ToolProgressStatus;
use std::collections::HashSet;
use std::io::Write;
use tokio::sync::mpsc::UnboundedReceiver;

pub async fn print_events(mut rx: UnboundedReceiver<WorkEvent>) {
    let mut shown = String::new();
    let mut announced: HashSet<u32> = HashSet::new();

    while let Some(event) = rx.recv().await {
        match event {
            WorkEvent::AiText { text } => {
                if let Some(suffix) = text.strip_prefix(shown.as_str()) {
                    if shown.is_empty() && !suffix.is_empty() {
                        println!();
                    }
                    print!("{suffix}");
                } else {
                    // A fresh snapshot that does not extend the last one.
                    if !shown.is_empty() {
                        println!();
                    }
                    print!("{text}");
                }
                let _ = std::io::stdout().flush();
                shown = text;
            }
            WorkEvent::ToolPending { index, name, .. } => {
                if let Some(name) = name {
                    if announced.insert(index) {
                        end_text_line(&mut shown);
                        println!("  [·] {name}");
                    }
                }
            }
            WorkEvent::ToolProgress {
                name,
                status,
                content,
                ..
            } => match status {
                ToolProgressStatus::Success => {
                    end_text_line(&mut shown);
                    println!("  [✓] {name}");
                    announced.clear();
                }
                ToolProgressStatus::Error => {
                    end_text_line(&mut shown);
                    let reason = content
                        .as_deref()
                        .and_then(|c| c.lines().next())
                        .unwrap_or("failed");
                    println!("  [✗] {name}: {reason}");
                    announced.clear();
                }
                // Pending duplicates the streaming placeholder and the
                // confirmation prompt renders itself.
                _ => {}
            },
            WorkEvent::ToolResult { .. } => {}
            WorkEvent::Error { content } => {
                end_text_line(&mut shown);
                eprintln!("  [Error] {content}");
            }
        }
    }

    if !shown.is_empty() {
        println!();
    }
}

fn end_text_line(shown: &mut String) {
    if !shown.is_empty() {
        println!();
        shown.clear();
    }
}
