use crate::display::ExecutionDisplay;
use crate::engine::client::ByteStream;
use crate::engine::stream::StreamParser;
use crate::types::{
    AgentUpdate, Fragment, FragmentContent, InterruptEnvelope, MessagePayload, StreamEntry,
    SuspendRequest, ToolsUpdate, TurnSignal, UpdatePayload, INTERRUPT_CHANNEL_KEY,
};
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

/// What one open-to-close traversal of the engine stream produced.
#[derive(Debug, Default)]
pub struct PassOutcome {
    pub final_content: Option<String>,
    pub interrupt: Option<SuspendRequest>,
    pub aborted: bool,
}

impl PassOutcome {
    fn aborted() -> Self {
        Self {
            final_content: None,
            interrupt: None,
            aborted: true,
        }
    }
}

/// Classifies one pass of the engine's tagged event stream into semantic
/// signals and feeds them to their handlers: reasoning and tool lifecycle go
/// to the display, final content and suspend requests accumulate into the
/// pass outcome.
#[derive(Default)]
pub struct StreamEventRouter {
    outcome: PassOutcome,
}

impl StreamEventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume a stream until it ends, errors, or is cancelled. A failed or
    /// cancelled pass reports neither a final answer nor a suspend; the
    /// caller falls back to the engine's persisted state.
    pub async fn route_pass(
        mut stream: ByteStream,
        display: &mut ExecutionDisplay,
        cancel: &CancellationToken,
    ) -> PassOutcome {
        let mut router = Self::new();
        let mut parser = StreamParser::new();

        loop {
            let chunk_result = tokio::select! {
                _ = cancel.cancelled() => {
                    display.on_pass_interrupted();
                    return PassOutcome::aborted();
                }
                next = stream.next() => match next {
                    Some(chunk_result) => chunk_result,
                    None => break,
                },
            };

            match chunk_result.and_then(|chunk| parser.process(&chunk)) {
                Ok(entries) => {
                    for entry in entries {
                        router.handle_entry(entry, display);
                    }
                }
                Err(error) => {
                    display.on_stream_error(&error.to_string());
                    return PassOutcome::aborted();
                }
            }
        }

        router.outcome
    }

    fn handle_entry(&mut self, entry: StreamEntry, display: &mut ExecutionDisplay) {
        for signal in classify_entry(entry) {
            self.dispatch(signal, display);
        }
    }

    fn dispatch(&mut self, signal: TurnSignal, display: &mut ExecutionDisplay) {
        match signal {
            TurnSignal::Reasoning { text } => display.on_reasoning(&text),
            TurnSignal::ToolStarted { name, params } => display.on_tool_started(&name, &params),
            TurnSignal::ToolFinished { name, output, ok } => {
                display.on_tool_finished(&name, &output, ok)
            }
            TurnSignal::FinalAnswer { text } => self.outcome.final_content = Some(text),
            TurnSignal::Suspend(request) => self.outcome.interrupt = Some(request),
        }
    }
}

/// Classify one decoded frame into zero or more semantic signals.
pub fn classify_entry(entry: StreamEntry) -> Vec<TurnSignal> {
    match entry {
        StreamEntry::Messages(payload) => classify_messages(payload),
        StreamEntry::Updates(payload) => classify_updates(payload),
    }
}

/// Token frames surface reasoning only: answer tokens are ignored here
/// because the final answer is reassembled from structured updates.
fn classify_messages(payload: MessagePayload) -> Vec<TurnSignal> {
    let mut signals = Vec::new();
    if let FragmentContent::Fragments(fragments) = payload.chunk.content {
        for fragment in fragments {
            if let Fragment::Tagged(tagged) = fragment {
                if tagged.is_thinking() {
                    if let Some(text) = tagged.thinking.filter(|text| !text.is_empty()) {
                        signals.push(TurnSignal::Reasoning { text });
                    }
                }
            }
        }
    }
    signals
}

fn classify_updates(payload: UpdatePayload) -> Vec<TurnSignal> {
    let mut signals = Vec::new();

    for (node_name, update) in &payload.0 {
        match node_name.as_str() {
            "tools" => {
                let Ok(update) = serde_json::from_value::<ToolsUpdate>(update.clone()) else {
                    continue;
                };
                for record in update.tools_executed {
                    match record.status.as_str() {
                        "running" => signals.push(TurnSignal::ToolStarted {
                            name: record.tool_name,
                            params: record.params,
                        }),
                        "success" => signals.push(TurnSignal::ToolFinished {
                            name: record.tool_name,
                            output: record.output,
                            ok: true,
                        }),
                        "error" => signals.push(TurnSignal::ToolFinished {
                            name: record.tool_name,
                            output: record.output,
                            ok: false,
                        }),
                        _ => {}
                    }
                }
            }
            "agent" => {
                let Ok(update) = serde_json::from_value::<AgentUpdate>(update.clone()) else {
                    continue;
                };
                if let Some(text) = agent_final_content(&update) {
                    signals.push(TurnSignal::FinalAnswer { text });
                }
            }
            _ => {}
        }
    }

    if let Some(interrupts) = payload.0.get(INTERRUPT_CHANNEL_KEY) {
        if let Ok(envelopes) =
            serde_json::from_value::<Vec<InterruptEnvelope>>(interrupts.clone())
        {
            if let Some(first) = envelopes.into_iter().next() {
                signals.push(TurnSignal::Suspend(SuspendRequest::from(first.value)));
            }
        }
    }

    signals
}

/// Final content of one agent update. The explicit final-report field always
/// wins over message-derived content, so the same completion reported both
/// ways never double-emits.
fn agent_final_content(update: &AgentUpdate) -> Option<String> {
    if let Some(report) = &update.final_report {
        if !report.is_empty() {
            return Some(report.clone());
        }
    }

    let messages = update.messages.as_ref()?;
    let last = messages.last()?;
    if !last.tool_calls.is_empty() {
        return None;
    }

    let text = assemble_message_content(&last.content);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Join rule for fragment-list content: bare strings verbatim, structured
/// fragments contribute their text unless tagged as thinking (already
/// surfaced through the token stream), newline-joined in order.
pub fn assemble_message_content(content: &FragmentContent) -> String {
    match content {
        FragmentContent::Text(text) => text.clone(),
        FragmentContent::Fragments(fragments) => {
            let mut parts = Vec::new();
            for fragment in fragments {
                match fragment {
                    Fragment::Text(text) => parts.push(text.clone()),
                    Fragment::Tagged(tagged) => {
                        if !tagged.is_thinking() {
                            parts.push(tagged.display_text().to_string());
                        }
                    }
                }
            }
            parts.join("\n")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn updates_entry(payload: serde_json::Value) -> StreamEntry {
        StreamEntry::Updates(serde_json::from_value(payload).expect("updates payload"))
    }

    fn messages_entry(payload: serde_json::Value) -> StreamEntry {
        StreamEntry::Messages(serde_json::from_value(payload).expect("messages payload"))
    }

    #[test]
    fn test_final_report_takes_precedence_over_messages() {
        let entry = updates_entry(json!({
            "agent": {
                "final_report": "the report",
                "messages": [{"content": "trace text"}]
            }
        }));

        let signals = classify_entry(entry);
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            TurnSignal::FinalAnswer { text } => assert_eq!(text, "the report"),
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn test_message_content_assembly_drops_thinking_fragments() {
        let entry = updates_entry(json!({
            "agent": {
                "messages": [{
                    "content": [
                        {"type": "text", "text": "a"},
                        {"type": "thinking", "thinking": "x"},
                        "b"
                    ]
                }]
            }
        }));

        let signals = classify_entry(entry);
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            TurnSignal::FinalAnswer { text } => assert_eq!(text, "a\nb"),
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn test_last_message_with_pending_tool_calls_yields_no_final() {
        let entry = updates_entry(json!({
            "agent": {
                "messages": [{
                    "content": "about to call a tool",
                    "tool_calls": [{"name": "read_file"}]
                }]
            }
        }));

        assert!(classify_entry(entry).is_empty());
    }

    #[test]
    fn test_tool_records_map_to_lifecycle_signals() {
        let entry = updates_entry(json!({
            "tools": {
                "tools_executed": [
                    {"tool_name": "read_file", "status": "running", "params": {"path": "a"}},
                    {"tool_name": "read_file", "status": "success", "output": "contents"},
                    {"tool_name": "run_bash", "status": "error", "output": "exit 1"}
                ]
            }
        }));

        let signals = classify_entry(entry);
        assert_eq!(signals.len(), 3);
        assert!(matches!(
            &signals[0],
            TurnSignal::ToolStarted { name, .. } if name == "read_file"
        ));
        assert!(matches!(
            &signals[1],
            TurnSignal::ToolFinished { ok: true, .. }
        ));
        assert!(matches!(
            &signals[2],
            TurnSignal::ToolFinished { ok: false, output, .. } if output == "exit 1"
        ));
    }

    #[test]
    fn test_interrupt_channel_yields_suspend_request() {
        let entry = updates_entry(json!({
            "__interrupt__": [{
                "value": {
                    "tool": "write_file",
                    "params": {"path": "a.txt", "content": "hi"},
                    "diff": "+hi"
                }
            }]
        }));

        let signals = classify_entry(entry);
        assert_eq!(signals.len(), 1);
        match &signals[0] {
            TurnSignal::Suspend(request) => {
                assert_eq!(request.tool_name, "write_file");
                assert_eq!(request.preview.as_deref(), Some("+hi"));
            }
            other => panic!("unexpected signal: {other:?}"),
        }
    }

    #[test]
    fn test_empty_interrupt_channel_is_ignored() {
        let entry = updates_entry(json!({ "__interrupt__": [] }));
        assert!(classify_entry(entry).is_empty());
    }

    #[test]
    fn test_thinking_tokens_surface_as_reasoning() {
        let entry = messages_entry(json!({
            "chunk": {
                "content": [
                    {"type": "thinking", "thinking": "pondering"},
                    {"type": "text", "text": "ignored answer token"}
                ]
            },
            "metadata": {}
        }));

        let signals = classify_entry(entry);
        assert_eq!(signals.len(), 1);
        assert!(matches!(
            &signals[0],
            TurnSignal::Reasoning { text } if text == "pondering"
        ));
    }

    #[test]
    fn test_unrecognized_nodes_are_ignored() {
        let entry = updates_entry(json!({
            "memory": {"saved": true},
            "agent": {"final_report": "done"}
        }));

        let signals = classify_entry(entry);
        assert_eq!(signals.len(), 1);
    }

    #[tokio::test]
    async fn test_route_pass_collects_outcome_from_frames() {
        use futures::stream;
        let frames: Vec<anyhow::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from(
                "event: messages\ndata: {\"chunk\":{\"content\":[{\"type\":\"thinking\",\"thinking\":\"hm\"}]}}\n\n",
            )),
            Ok(bytes::Bytes::from(
                "event: updates\ndata: {\"agent\":{\"final_report\":\"done\"}}\n\n",
            )),
        ];
        let stream: ByteStream = Box::pin(stream::iter(frames));

        let mut display = ExecutionDisplay::with_reasoning_cap(256);
        let cancel = CancellationToken::new();
        let outcome = StreamEventRouter::route_pass(stream, &mut display, &cancel).await;

        assert!(!outcome.aborted);
        assert_eq!(outcome.final_content.as_deref(), Some("done"));
        assert!(outcome.interrupt.is_none());
        assert_eq!(display.reasoning_text(), "hm");
    }

    #[tokio::test]
    async fn test_route_pass_aborts_on_stream_error() {
        use futures::stream;
        let frames: Vec<anyhow::Result<bytes::Bytes>> = vec![
            Ok(bytes::Bytes::from(
                "event: updates\ndata: {\"agent\":{\"final_report\":\"partial\"}}\n\n",
            )),
            Err(anyhow::anyhow!("connection reset")),
        ];
        let stream: ByteStream = Box::pin(stream::iter(frames));

        let mut display = ExecutionDisplay::with_reasoning_cap(256);
        let cancel = CancellationToken::new();
        let outcome = StreamEventRouter::route_pass(stream, &mut display, &cancel).await;

        assert!(outcome.aborted);
        assert!(outcome.final_content.is_none());
        assert!(outcome.interrupt.is_none());
    }
}
