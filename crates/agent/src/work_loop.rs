//! The agentic work loop.
//!
//! A turn streams one model reply over the prepared history, executes any
//! tool calls the reply carries in the order received, appends their
//! results, and streams again until a reply arrives without calls. A
//! destructive call under confirm mode suspends the turn instead; stream
//! failures and cancellation end it with an error entry in the timeline.

use crate::event::WorkEvent;
use crate::prepare::{PrepareOptions, prepare};
use crate::prompt::PromptBuilder;
use crate::stream::{PartialAiMessage, accumulate};
use codeclaw_core::message::{Message, ToolCall, ToolProgressStatus, ToolResultStatus};
use codeclaw_core::provider::{Provider, ProviderRequest};
use codeclaw_core::session::{Session, ToolMode};
use codeclaw_core::tool::{ToolContext, ToolRegistry, is_error_text, tool_failure_text};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How a turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model produced a final reply with no unresolved tool calls.
    Completed,
    /// A destructive call awaits the user's decision; resolve it on the
    /// session and re-enter the loop.
    AwaitingConfirmation,
    /// The turn was cancelled by the user.
    Aborted,
    /// The model stream failed; an error entry was appended.
    Failed,
}

enum BatchStatus {
    Resolved,
    Suspended,
}

enum StreamEnd {
    Message(Message),
    Aborted,
    Failed,
}

/// Drives turns for one session.
///
/// Every failure mode ends up in the session timeline rather than in a
/// returned error: stream failures become `Error` entries, tool failures
/// become `ERROR:`-prefixed results the model can react to.
pub struct WorkLoop {
    provider: Arc<dyn Provider>,
    tools: Arc<ToolRegistry>,
    max_iterations: u32,
    max_messages: Option<usize>,
}

impl WorkLoop {
    pub fn new(provider: Arc<dyn Provider>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            provider,
            tools,
            max_iterations: 25,
            max_messages: None,
        }
    }

    /// Set the maximum number of stream iterations per turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Cap the number of history messages sent per model call.
    pub fn with_max_messages(mut self, max: usize) -> Self {
        self.max_messages = Some(max);
        self
    }

    /// Run one turn to completion, suspension, abort or failure.
    ///
    /// Re-entering after a confirmation was resolved resumes the suspended
    /// tool batch without re-streaming; everything needed to resume lives
    /// in the session itself.
    pub async fn run_turn(
        &self,
        session: &mut Session,
        events: &UnboundedSender<WorkEvent>,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        info!(
            session_id = %session.id,
            messages = session.messages.len(),
            tool_mode = %session.tool_mode,
            "Starting turn"
        );

        let mut iterations = 0u32;
        loop {
            if let BatchStatus::Suspended = self.run_tool_batch(session, events).await {
                return TurnOutcome::AwaitingConfirmation;
            }

            iterations += 1;
            if iterations > self.max_iterations {
                warn!(
                    session_id = %session.id,
                    iterations,
                    "Max tool iterations reached, ending turn"
                );
                let content = "Reached the maximum number of tool iterations for one turn.";
                session.push(Message::error(content, None));
                let _ = events.send(WorkEvent::Error {
                    content: content.into(),
                });
                session.mark_finished();
                return TurnOutcome::Completed;
            }

            match self.stream_once(session, events, cancel).await {
                StreamEnd::Aborted => {
                    session.mark_finished();
                    return TurnOutcome::Aborted;
                }
                StreamEnd::Failed => {
                    session.mark_finished();
                    return TurnOutcome::Failed;
                }
                StreamEnd::Message(message) => {
                    let calls = message.tool_calls().to_vec();
                    session.push(message);

                    if calls.is_empty() {
                        debug!(session_id = %session.id, "Turn complete");
                        session.mark_finished();
                        return TurnOutcome::Completed;
                    }

                    for call in calls {
                        let progress = Message::tool_progress(call.clone());
                        let progress_id = progress.id().to_string();
                        session.push(progress);
                        let _ = events.send(WorkEvent::ToolProgress {
                            progress_id,
                            name: call.name,
                            status: ToolProgressStatus::Pending,
                            content: None,
                        });
                    }
                }
            }
        }
    }

    /// Resolve the tool calls of the most recent assistant message.
    ///
    /// Settled calls are skipped, so a resumed batch picks up exactly where
    /// it suspended. Calls execute strictly in the order the model emitted
    /// them; a failure settles its own call and the batch moves on.
    async fn run_tool_batch(
        &self,
        session: &mut Session,
        events: &UnboundedSender<WorkEvent>,
    ) -> BatchStatus {
        let Some(ai_index) = session
            .messages
            .iter()
            .rposition(|m| matches!(m, Message::Ai { .. }))
        else {
            return BatchStatus::Resolved;
        };
        let calls = session.messages[ai_index].tool_calls().to_vec();
        if calls.is_empty() {
            return BatchStatus::Resolved;
        }

        let mut progress_ids: HashMap<String, String> = HashMap::new();
        for msg in &session.messages[ai_index + 1..] {
            if let Message::ToolProgress { id, tool_call, .. } = msg {
                progress_ids.insert(tool_call.id.clone(), id.clone());
            }
        }

        for call in &calls {
            let progress_id = match progress_ids.get(&call.id) {
                Some(id) => id.clone(),
                None => {
                    // Sessions persisted mid-stream may lack the entry.
                    let progress = Message::tool_progress(call.clone());
                    let id = progress.id().to_string();
                    session.push(progress);
                    id
                }
            };

            let status = session
                .progress_status(&progress_id)
                .unwrap_or(ToolProgressStatus::Pending);

            match status {
                ToolProgressStatus::Success | ToolProgressStatus::Error => continue,
                ToolProgressStatus::PendingConfirmation => return BatchStatus::Suspended,
                ToolProgressStatus::Declined => {
                    self.record_failure(session, events, call, &progress_id, "declined by user");
                }
                ToolProgressStatus::Confirmed => {
                    self.execute_call(session, events, call, &progress_id).await;
                }
                ToolProgressStatus::Pending => match self.tools.is_destructive(&call.name) {
                    None => {
                        self.record_failure(session, events, call, &progress_id, "Tool not found");
                    }
                    Some(true) if session.tool_mode == ToolMode::ReadOnly => {
                        self.record_failure(
                            session,
                            events,
                            call,
                            &progress_id,
                            "denied by policy (read-only session)",
                        );
                    }
                    Some(true) if session.tool_mode == ToolMode::Confirm => {
                        info!(tool = %call.name, "Awaiting user confirmation");
                        session.advance_progress(
                            &progress_id,
                            ToolProgressStatus::PendingConfirmation,
                            None,
                        );
                        let _ = events.send(WorkEvent::ToolProgress {
                            progress_id: progress_id.clone(),
                            name: call.name.clone(),
                            status: ToolProgressStatus::PendingConfirmation,
                            content: None,
                        });
                        return BatchStatus::Suspended;
                    }
                    _ => {
                        // Safe tool, or destructive under yolo.
                        session.advance_progress(&progress_id, ToolProgressStatus::Confirmed, None);
                        self.execute_call(session, events, call, &progress_id).await;
                    }
                },
            }
        }

        BatchStatus::Resolved
    }

    /// Invoke a confirmed call and settle it from the result text.
    async fn execute_call(
        &self,
        session: &mut Session,
        events: &UnboundedSender<WorkEvent>,
        call: &ToolCall,
        progress_id: &str,
    ) {
        let ctx = ToolContext::new(&session.work_dir);
        debug!(tool = %call.name, "Invoking tool");
        let content = match self.tools.invoke(call, &ctx).await {
            Ok(text) => text,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool invocation failed");
                tool_failure_text(&call.name, e)
            }
        };

        let (progress_status, result_status) = if is_error_text(&content) {
            (ToolProgressStatus::Error, ToolResultStatus::Error)
        } else {
            (ToolProgressStatus::Success, ToolResultStatus::Success)
        };

        session.advance_progress(progress_id, progress_status, Some(content.clone()));
        let _ = events.send(WorkEvent::ToolProgress {
            progress_id: progress_id.to_string(),
            name: call.name.clone(),
            status: progress_status,
            content: Some(content.clone()),
        });

        session.push(Message::tool_result(
            &call.id,
            &call.name,
            result_status,
            &content,
        ));
        let _ = events.send(WorkEvent::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            status: result_status,
            content,
        });
    }

    /// Settle a call that never ran with an `ERROR:` failure record the
    /// model sees on the next iteration.
    fn record_failure(
        &self,
        session: &mut Session,
        events: &UnboundedSender<WorkEvent>,
        call: &ToolCall,
        progress_id: &str,
        reason: &str,
    ) {
        warn!(tool = %call.name, reason, "Tool call rejected");
        let content = tool_failure_text(&call.name, reason);

        session.advance_progress(progress_id, ToolProgressStatus::Error, Some(content.clone()));
        let _ = events.send(WorkEvent::ToolProgress {
            progress_id: progress_id.to_string(),
            name: call.name.clone(),
            status: ToolProgressStatus::Error,
            content: Some(content.clone()),
        });

        session.push(Message::tool_result(
            &call.id,
            &call.name,
            ToolResultStatus::Error,
            &content,
        ));
        let _ = events.send(WorkEvent::ToolResult {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            status: ToolResultStatus::Error,
            content,
        });
    }

    /// Stream one model reply, folding chunks into a finished message.
    ///
    /// Abort and failure append their error entry here and report the end
    /// state; the finished message is handed back unappended so the caller
    /// controls timeline order.
    async fn stream_once(
        &self,
        session: &mut Session,
        events: &UnboundedSender<WorkEvent>,
        cancel: &CancellationToken,
    ) -> StreamEnd {
        let builder = PromptBuilder::new(&session.work_dir, &session.provider_options.provider)
            .with_agent_rules(!session.provider_options.disable_agent_rules);
        let system_text = tokio::task::spawn_blocking(move || builder.build())
            .await
            .unwrap_or_default();

        let options = PrepareOptions {
            provider: session.provider_options.provider.clone(),
            max_messages: self.max_messages,
            context_size: session.provider_options.context_size,
        };
        let prepared = prepare(&session.messages, &system_text, &options);

        let request = ProviderRequest::new(session.provider_options.model.clone(), prepared)
            .with_tools(self.tools.definitions_for(session.tool_mode));

        debug!(
            provider = %self.provider.name(),
            model = %session.provider_options.model,
            messages = request.messages.len(),
            "Requesting model stream"
        );

        let mut rx = match self.provider.stream(request).await {
            Ok(rx) => rx,
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "Model stream failed to start");
                let content = format!("Model stream failed to start: {e}");
                session.push(Message::error(&content, Some(e.to_string())));
                let _ = events.send(WorkEvent::Error { content });
                return StreamEnd::Failed;
            }
        };

        let mut partial: Option<PartialAiMessage> = None;
        let mut announced: HashMap<u32, (Option<String>, Option<serde_json::Value>)> =
            HashMap::new();

        loop {
            let item = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    // Dropping the receiver tears down the provider task;
                    // partial text is discarded.
                    info!(session_id = %session.id, "Turn aborted");
                    let content = "Turn aborted.".to_string();
                    session.push(Message::error(&content, None));
                    let _ = events.send(WorkEvent::Error { content });
                    return StreamEnd::Aborted;
                }
                item = rx.recv() => item,
            };

            let chunk = match item {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    warn!(error = %e, "Model stream failed mid-flight");
                    let content = format!("Model stream failed: {e}");
                    session.push(Message::error(&content, Some(e.to_string())));
                    let _ = events.send(WorkEvent::Error { content });
                    return StreamEnd::Failed;
                }
                None => break,
            };

            let done = chunk.done;
            let had_content = chunk.content.is_some();
            let next = accumulate(partial.take(), &chunk);

            if next.has_tool_calls() {
                // Stop echoing raw text once calls appear; refresh the
                // placeholders as names and arguments become known.
                for preview in next.call_previews() {
                    let snapshot = (preview.name.clone(), preview.args.clone());
                    if announced.get(&preview.index) != Some(&snapshot) {
                        announced.insert(preview.index, snapshot);
                        let _ = events.send(WorkEvent::ToolPending {
                            index: preview.index,
                            name: preview.name,
                            args: preview.args,
                        });
                    }
                }
            } else if had_content {
                let _ = events.send(WorkEvent::AiText {
                    text: next.text.clone(),
                });
            }

            partial = Some(next);
            if done {
                break;
            }
        }

        StreamEnd::Message(partial.unwrap_or_default().into_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use codeclaw_core::error::ProviderError;
    use codeclaw_core::message::ToolCallChunk;
    use codeclaw_core::provider::StreamChunk;
    use codeclaw_core::session::ProviderOptions;
    use codeclaw_core::tool::Tool;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    type Script = Vec<Result<StreamChunk, ProviderError>>;

    /// Replays one canned chunk script per stream call.
    struct MockProvider {
        scripts: Mutex<VecDeque<Script>>,
    }

    impl MockProvider {
        fn new(scripts: Vec<Script>) -> Arc<Self> {
            Arc::new(Self {
                scripts: Mutex::new(scripts.into()),
            })
        }
    }

    #[async_trait::async_trait]
    impl Provider for MockProvider {
        fn name(&self) -> &str {
            "mock"
        }

        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
            let script = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            let (tx, rx) = mpsc::channel(16);
            tokio::spawn(async move {
                for item in script {
                    if tx.send(item).await.is_err() {
                        return;
                    }
                }
            });
            Ok(rx)
        }
    }

    /// A provider whose stream never starts.
    struct FailingProvider;

    #[async_trait::async_trait]
    impl Provider for FailingProvider {
        fn name(&self) -> &str {
            "broken"
        }

        async fn stream(
            &self,
            _request: ProviderRequest,
        ) -> Result<mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError> {
            Err(ProviderError::AuthenticationFailed("bad key".into()))
        }
    }

    struct LookupTool {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Tool for LookupTool {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "Looks things up"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        async fn invoke(&self, _args: serde_json::Value, _ctx: &ToolContext) -> String {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            "found 3 items".into()
        }
    }

    struct WipeTool {
        invocations: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Tool for WipeTool {
        fn name(&self) -> &str {
            "wipe"
        }
        fn description(&self) -> &str {
            "Destroys things"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({"type": "object", "properties": {}})
        }
        fn destructive(&self) -> bool {
            true
        }
        async fn invoke(&self, _args: serde_json::Value, _ctx: &ToolContext) -> String {
            self.invocations.fetch_add(1, Ordering::SeqCst);
            "wiped".into()
        }
    }

    fn text_script(parts: &[&str]) -> Script {
        let mut script: Script = parts
            .iter()
            .map(|part| Ok(StreamChunk::content(*part)))
            .collect();
        script.push(Ok(StreamChunk::done()));
        script
    }

    fn call_script(calls: &[(&str, &str)]) -> Script {
        let mut script: Script = calls
            .iter()
            .enumerate()
            .map(|(index, (name, id))| {
                Ok(StreamChunk {
                    tool_call_chunks: vec![ToolCallChunk {
                        index: index as u32,
                        id: Some((*id).into()),
                        name: Some((*name).into()),
                        args: "{}".into(),
                    }],
                    ..StreamChunk::default()
                })
            })
            .collect();
        script.push(Ok(StreamChunk::done()));
        script
    }

    fn test_session(mode: ToolMode) -> Session {
        let mut session = Session::new(
            "/sandbox/project",
            mode,
            ProviderOptions::new("mock", "mock-model"),
        );
        session.push(Message::human("do the thing"));
        session
    }

    fn test_registry(lookup: &Arc<AtomicUsize>, wipe: &Arc<AtomicUsize>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(LookupTool {
            invocations: lookup.clone(),
        }));
        registry.register(Box::new(WipeTool {
            invocations: wipe.clone(),
        }));
        Arc::new(registry)
    }

    fn counters() -> (Arc<AtomicUsize>, Arc<AtomicUsize>) {
        (Arc::new(AtomicUsize::new(0)), Arc::new(AtomicUsize::new(0)))
    }

    fn find_tool_result(session: &Session, tool: &str) -> Option<(ToolResultStatus, String)> {
        session.messages.iter().find_map(|m| match m {
            Message::ToolResult {
                name,
                status,
                content,
                ..
            } if name == tool => Some((*status, content.clone())),
            _ => None,
        })
    }

    #[tokio::test]
    async fn text_only_turn_completes() {
        let provider = MockProvider::new(vec![text_script(&["Hel", "lo!"])]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(session.messages.len(), 2);
        assert_eq!(session.messages[1].text(), "Hello!");
        assert_eq!(session.finished, 2);

        let mut snapshots = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let WorkEvent::AiText { text } = event {
                snapshots.push(text);
            }
        }
        assert_eq!(snapshots, vec!["Hel".to_string(), "Hello!".to_string()]);
    }

    #[tokio::test]
    async fn tool_call_turn_appends_results_and_continues() {
        let provider = MockProvider::new(vec![
            call_script(&[("lookup", "call_1")]),
            text_script(&["There are 3 items."]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(lookup.load(Ordering::SeqCst), 1);
        assert_eq!(session.finished, session.messages.len());

        // Human, assistant call, progress, result, final assistant text.
        assert_eq!(session.messages.len(), 5);
        let (status, content) = find_tool_result(&session, "lookup").unwrap();
        assert_eq!(status, ToolResultStatus::Success);
        assert_eq!(content, "found 3 items");
        assert_eq!(session.messages[4].text(), "There are 3 items.");

        // Each model call settled exactly one progress entry.
        let settled = session
            .messages
            .iter()
            .filter(|m| matches!(m, Message::ToolProgress { status, .. } if status.is_settled()))
            .count();
        assert_eq!(settled, 1);

        // The call was announced as a placeholder while streaming.
        let mut saw_placeholder = false;
        while let Ok(event) = rx.try_recv() {
            if let WorkEvent::ToolPending { name, .. } = event {
                saw_placeholder = name.as_deref() == Some("lookup") || saw_placeholder;
            }
        }
        assert!(saw_placeholder);
    }

    #[tokio::test]
    async fn unknown_tool_becomes_failure_record() {
        let provider = MockProvider::new(vec![
            call_script(&[("gitCommit", "call_1")]),
            text_script(&["I cannot do that here."]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        let (status, content) = find_tool_result(&session, "gitCommit").unwrap();
        assert_eq!(status, ToolResultStatus::Error);
        assert!(content.starts_with("ERROR: Tool `gitCommit` failed with: Tool not found"));
        // The batch continued to the final reply.
        assert_eq!(
            session.messages.last().unwrap().text(),
            "I cannot do that here."
        );
    }

    #[tokio::test]
    async fn read_only_denies_destructive_calls() {
        let provider = MockProvider::new(vec![
            call_script(&[("wipe", "call_1")]),
            text_script(&["Understood, not touching anything."]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::ReadOnly);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(wipe.load(Ordering::SeqCst), 0);
        let (status, content) = find_tool_result(&session, "wipe").unwrap();
        assert_eq!(status, ToolResultStatus::Error);
        assert!(content.contains("denied by policy"));
    }

    #[tokio::test]
    async fn yolo_runs_destructive_without_confirmation() {
        let provider = MockProvider::new(vec![
            call_script(&[("wipe", "call_1")]),
            text_script(&["Gone."]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Yolo);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(wipe.load(Ordering::SeqCst), 1);
        assert!(session.pending_confirmations().is_empty());
    }

    #[tokio::test]
    async fn confirm_mode_suspends_until_confirmed() {
        let provider = MockProvider::new(vec![
            call_script(&[("wipe", "call_1")]),
            text_script(&["All clean."]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::AwaitingConfirmation);
        assert!(session.has_unfinished_turn());
        assert_eq!(wipe.load(Ordering::SeqCst), 0);

        let pending = session.pending_confirmations();
        assert_eq!(pending.len(), 1);
        let progress_id = pending[0].0.to_string();

        assert!(session.resolve_confirmation(&progress_id, true));
        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(wipe.load(Ordering::SeqCst), 1);
        assert!(!session.has_unfinished_turn());
        assert_eq!(
            session.progress_status(&progress_id),
            Some(ToolProgressStatus::Success)
        );
    }

    #[tokio::test]
    async fn declined_call_feeds_error_back() {
        let provider = MockProvider::new(vec![
            call_script(&[("wipe", "call_1")]),
            text_script(&["Okay, leaving it alone."]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;
        assert_eq!(outcome, TurnOutcome::AwaitingConfirmation);

        let progress_id = session.pending_confirmations()[0].0.to_string();
        assert!(session.resolve_confirmation(&progress_id, false));

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(wipe.load(Ordering::SeqCst), 0);
        let (status, content) = find_tool_result(&session, "wipe").unwrap();
        assert_eq!(status, ToolResultStatus::Error);
        assert!(content.contains("declined by user"));
        assert_eq!(
            session.progress_status(&progress_id),
            Some(ToolProgressStatus::Error)
        );
    }

    #[tokio::test]
    async fn safe_call_runs_before_suspension() {
        let provider = MockProvider::new(vec![
            call_script(&[("lookup", "call_1"), ("wipe", "call_2")]),
            text_script(&["Done."]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        // The safe call already ran; only the destructive one blocks.
        assert_eq!(outcome, TurnOutcome::AwaitingConfirmation);
        assert_eq!(lookup.load(Ordering::SeqCst), 1);
        assert_eq!(wipe.load(Ordering::SeqCst), 0);
        assert_eq!(session.pending_confirmations().len(), 1);
        assert!(find_tool_result(&session, "lookup").is_some());

        let progress_id = session.pending_confirmations()[0].0.to_string();
        session.resolve_confirmation(&progress_id, true);
        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(wipe.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stream_start_failure_ends_turn() {
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(Arc::new(FailingProvider), test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Failed);
        assert_eq!(session.finished, session.messages.len());
        let last = session.messages.last().unwrap();
        assert!(matches!(last, Message::Error { .. }));
        assert!(last.text().contains("failed to start"));
    }

    #[tokio::test]
    async fn mid_stream_failure_discards_partial_text() {
        let provider = MockProvider::new(vec![vec![
            Ok(StreamChunk::content("par")),
            Err(ProviderError::StreamInterrupted("connection reset".into())),
        ]]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Failed);
        assert!(
            session
                .messages
                .iter()
                .all(|m| !matches!(m, Message::Ai { .. }))
        );
        assert!(matches!(
            session.messages.last().unwrap(),
            Message::Error { .. }
        ));
    }

    #[tokio::test]
    async fn cancelled_turn_aborts_without_output() {
        let provider = MockProvider::new(vec![text_script(&["never rendered"])]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe));

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Aborted);
        assert!(!session.has_unfinished_turn());
        assert!(
            session
                .messages
                .iter()
                .all(|m| !matches!(m, Message::Ai { .. }))
        );
        assert_eq!(session.messages.last().unwrap().text(), "Turn aborted.");
    }

    #[tokio::test]
    async fn iteration_guard_ends_runaway_turns() {
        let provider = MockProvider::new(vec![
            call_script(&[("lookup", "call_1")]),
            call_script(&[("lookup", "call_2")]),
            call_script(&[("lookup", "call_3")]),
        ]);
        let (lookup, wipe) = counters();
        let work = WorkLoop::new(provider, test_registry(&lookup, &wipe)).with_max_iterations(2);

        let mut session = test_session(ToolMode::Confirm);
        let (events, _rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let outcome = work.run_turn(&mut session, &events, &cancel).await;

        assert_eq!(outcome, TurnOutcome::Completed);
        assert_eq!(lookup.load(Ordering::SeqCst), 2);
        let last = session.messages.last().unwrap();
        assert!(last.text().contains("maximum number of tool iterations"));
        assert!(!session.has_unfinished_turn());
    }
}
