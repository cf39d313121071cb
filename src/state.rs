pub const MAX_TRANSCRIPT_CHARS: usize = 24_000;

/// Accumulated conversation context for one session: prior exchanges as
/// plain text, the session id used to resume engine state, and the reasoning
/// mode currently forwarded to the engine. Owned for the session's lifetime
/// and discarded when the process exits or the session is reset.
#[derive(Debug, Clone)]
pub struct TurnContext {
    session_id: String,
    reasoning_mode: String,
    transcript: String,
}

impl TurnContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            reasoning_mode: "ask".to_string(),
            transcript: String::new(),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn reasoning_mode(&self) -> &str {
        &self.reasoning_mode
    }

    pub fn set_reasoning_mode(&mut self, mode: impl Into<String>) {
        self.reasoning_mode = mode.into();
    }

    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// Compose the engine input for a new user message, prefixing prior
    /// exchanges when any exist.
    pub fn compose_input(&self, user_msg: &str) -> String {
        if self.transcript.is_empty() {
            user_msg.to_string()
        } else {
            format!(
                "Context:\n{}\n\nCurrent task:\n{}",
                self.transcript.trim_end(),
                user_msg
            )
        }
    }

    pub fn record_exchange(&mut self, user_msg: &str, assistant_msg: &str) {
        self.transcript
            .push_str(&format!("User: {user_msg}\nAssistant: {assistant_msg}\n"));
        self.cap_transcript();
    }

    pub fn reset(&mut self) {
        self.transcript.clear();
    }

    /// Keep only the most recent transcript tail once the cap is exceeded.
    fn cap_transcript(&mut self) {
        if self.transcript.len() <= MAX_TRANSCRIPT_CHARS {
            return;
        }
        let mut cut = self.transcript.len() - MAX_TRANSCRIPT_CHARS;
        while !self.transcript.is_char_boundary(cut) {
            cut += 1;
        }
        self.transcript.drain(..cut);
    }
}
