use serde::{Deserialize, Serialize};

/// One decoded frame from the engine stream. The frame kind comes from the
/// `event:` line, the payload from the `data:` line.
#[derive(Debug, Clone)]
pub enum StreamEntry {
    Messages(MessagePayload),
    Updates(UpdatePayload),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePayload {
    #[serde(default)]
    pub chunk: MessageChunk,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageChunk {
    #[serde(default)]
    pub content: FragmentContent,
}

/// Message content arrives either as a bare string or as a fragment list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FragmentContent {
    Text(String),
    Fragments(Vec<Fragment>),
}

impl Default for FragmentContent {
    fn default() -> Self {
        FragmentContent::Text(String::new())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Fragment {
    Text(String),
    Tagged(TaggedFragment),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaggedFragment {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

impl TaggedFragment {
    pub fn is_thinking(&self) -> bool {
        self.kind.as_deref() == Some("thinking")
    }

    /// Display text of a non-thinking fragment; `text` wins over `content`.
    pub fn display_text(&self) -> &str {
        self.text
            .as_deref()
            .filter(|value| !value.is_empty())
            .or(self.content.as_deref())
            .unwrap_or("")
    }
}

/// An `updates` frame: mapping from logical node name to its partial result.
/// The reserved `__interrupt__` key carries interrupt records when present.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct UpdatePayload(pub serde_json::Map<String, serde_json::Value>);

pub const INTERRUPT_CHANNEL_KEY: &str = "__interrupt__";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolsUpdate {
    #[serde(default)]
    pub tools_executed: Vec<ToolRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolRecord {
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub output: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentUpdate {
    #[serde(default)]
    pub final_report: Option<String>,
    #[serde(default)]
    pub messages: Option<Vec<TraceMessage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TraceMessage {
    #[serde(default)]
    pub content: FragmentContent,
    #[serde(default)]
    pub tool_calls: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterruptEnvelope {
    #[serde(default)]
    pub value: InterruptValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterruptValue {
    #[serde(default)]
    pub tool: String,
    #[serde(default)]
    pub params: serde_json::Value,
    #[serde(default)]
    pub diff: Option<String>,
}

/// The engine halted before a gated action and wants a decision.
#[derive(Debug, Clone)]
pub struct SuspendRequest {
    pub tool_name: String,
    pub params: serde_json::Value,
    pub preview: Option<String>,
}

impl From<InterruptValue> for SuspendRequest {
    fn from(value: InterruptValue) -> Self {
        Self {
            tool_name: value.tool,
            params: value.params,
            preview: value.diff.filter(|diff| !diff.trim().is_empty()),
        }
    }
}

/// Classified stream events, one semantic signal per variant.
#[derive(Debug, Clone)]
pub enum TurnSignal {
    Reasoning { text: String },
    ToolStarted { name: String, params: serde_json::Value },
    ToolFinished { name: String, output: String, ok: bool },
    FinalAnswer { text: String },
    Suspend(SuspendRequest),
}

/// Approval payload sent back into the engine, paired with a null user input
/// to signal "continue the same turn".
#[derive(Debug, Clone, Serialize)]
pub struct ResumeCommand {
    pub approved: bool,
}

/// Answer to a persisted-state query for one session.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineStateSnapshot {
    #[serde(default)]
    pub pending_interrupt: Option<InterruptValue>,
}
