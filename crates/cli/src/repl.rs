//! The interactive read/eval loop.
//!
//! Reads user lines from stdin, drives the work loop one turn at a time
//! and persists the session after every change. Ctrl-C during a turn
//! aborts the turn; a second Ctrl-C (or one at the prompt) exits.

use anyhow::Result;
use codeclaw_agent::{TurnOutcome, WorkLoop};
use codeclaw_core::message::Message;
use codeclaw_core::session::Session;
use codeclaw_session::SessionStore;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::render;

pub async fn run(mut session: Session, work: WorkLoop, store: SessionStore) -> Result<()> {
    banner(&session);

    let mut lines = spawn_stdin_reader();

    if session.has_unfinished_turn() {
        println!("  Resuming an unfinished turn...");
        drive_turn(&work, &mut session, &store, &mut lines).await?;
    }

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => line,
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };

        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if matches!(line.as_str(), "exit" | "quit" | "/exit" | "/quit" | ":q") {
            break;
        }

        session.push(Message::human(line));
        drive_turn(&work, &mut session, &store, &mut lines).await?;
    }

    save(&store, &session);
    println!("  Goodbye!");
    Ok(())
}

/// Run one turn to completion, answering confirmation prompts as they come up.
///
/// The work loop suspends whenever a destructive call needs approval; we
/// ask, record the answer and re-enter until the turn settles.
async fn drive_turn(
    work: &WorkLoop,
    session: &mut Session,
    store: &SessionStore,
    lines: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let mut approve_rest = false;
    loop {
        let outcome = run_guarded(work, session).await;
        save(store, session);
        match outcome {
            TurnOutcome::AwaitingConfirmation => {
                if !confirm_pending(session, lines, &mut approve_rest).await? {
                    return Ok(());
                }
                save(store, session);
            }
            TurnOutcome::Completed | TurnOutcome::Aborted | TurnOutcome::Failed => return Ok(()),
        }
    }
}

/// One pass through the work loop with rendering and Ctrl-C handling attached.
async fn run_guarded(work: &WorkLoop, session: &mut Session) -> TurnOutcome {
    let (events, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(render::print_events(rx));

    let cancel = CancellationToken::new();
    let watcher = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
                if tokio::signal::ctrl_c().await.is_ok() {
                    std::process::exit(130);
                }
            }
        })
    };

    let outcome = work.run_turn(session, &events, &cancel).await;

    drop(events);
    let _ = printer.await;
    watcher.abort();
    println!();
    outcome
}

/// Ask the user about every pending destructive call.
///
/// Returns false when the user walked away (stdin closed); the calls stay
/// pending in the session and will be asked again on resume.
async fn confirm_pending(
    session: &mut Session,
    lines: &mut mpsc::UnboundedReceiver<String>,
    approve_rest: &mut bool,
) -> Result<bool> {
    // Type-ahead meant for chat must not answer a safety prompt.
    while lines.try_recv().is_ok() {}

    let pending: Vec<(String, String, serde_json::Value)> = session
        .pending_confirmations()
        .into_iter()
        .map(|(id, call)| (id.to_string(), call.name.clone(), call.args.clone()))
        .collect();

    for (id, name, args) in pending {
        if *approve_rest {
            session.resolve_confirmation(&id, true);
            continue;
        }

        println!("  The assistant wants to run a destructive tool:");
        println!("    {name} {args}");
        print!("  Allow? [y]es / [n]o / [a]ll this turn: ");
        std::io::stdout().flush()?;

        let answer = tokio::select! {
            line = lines.recv() => match line {
                Some(line) => line.trim().to_lowercase(),
                None => return Ok(false),
            },
            _ = tokio::signal::ctrl_c() => {
                println!();
                "n".to_string()
            }
        };

        let approved = match answer.as_str() {
            "y" | "yes" => true,
            "a" | "all" => {
                *approve_rest = true;
                true
            }
            _ => false,
        };

        if !session.resolve_confirmation(&id, approved) {
            warn!(progress_id = %id, "Confirmation target vanished from the session");
        }
    }

    Ok(true)
}

fn save(store: &SessionStore, session: &Session) {
    if let Err(e) = store.save(session) {
        warn!(error = %e, "Failed to save session");
    }
}

fn banner(session: &Session) {
    println!();
    println!("╔══════════════════════════════════════════════╗");
    println!("║        CodeClaw — Interactive Session        ║");
    println!("╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", session.provider_options.provider);
    println!("  Model:      {}", session.provider_options.model);
    println!("  Directory:  {}", session.work_dir.display());
    println!("  Tool mode:  {}", session.tool_mode);
    println!();
    println!("  Type a request and press Enter. Ctrl-C aborts a running");
    println!("  turn; \"exit\" or Ctrl-C at the prompt quits.");
    println!();
}

/// Stdin arrives on its own task so turns can keep streaming while the
/// user types ahead.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut reader = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}
