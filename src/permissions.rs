use serde::{Deserialize, Serialize};

/// Approval policy for tool execution. Exactly one mode is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    /// Nothing executes; every call is simulated.
    Plan,
    /// Every call requires an explicit yes/no decision.
    Ask,
    /// Everything executes without prompting.
    Auto,
}

impl PermissionMode {
    pub fn name(self) -> &'static str {
        match self {
            PermissionMode::Plan => "PLAN",
            PermissionMode::Ask => "ASK",
            PermissionMode::Auto => "AUTO",
        }
    }

    pub fn engine_name(self) -> &'static str {
        match self {
            PermissionMode::Plan => "plan",
            PermissionMode::Ask => "ask",
            PermissionMode::Auto => "auto",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "plan" => Some(PermissionMode::Plan),
            "ask" => Some(PermissionMode::Ask),
            "auto" => Some(PermissionMode::Auto),
            _ => None,
        }
    }

    fn next(self) -> Self {
        match self {
            PermissionMode::Plan => PermissionMode::Ask,
            PermissionMode::Ask => PermissionMode::Auto,
            PermissionMode::Auto => PermissionMode::Plan,
        }
    }
}

/// Single source of truth for gating decisions. Pure state, every operation
/// is total.
#[derive(Debug, Clone)]
pub struct PermissionManager {
    mode: PermissionMode,
}

impl Default for PermissionManager {
    fn default() -> Self {
        Self::new(PermissionMode::Ask)
    }
}

impl PermissionManager {
    pub fn new(mode: PermissionMode) -> Self {
        Self { mode }
    }

    pub fn current_mode(&self) -> PermissionMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: PermissionMode) {
        self.mode = mode;
    }

    /// Advance to the next mode in PLAN -> ASK -> AUTO -> PLAN order.
    pub fn cycle(&mut self) -> PermissionMode {
        self.mode = self.mode.next();
        self.mode
    }

    pub fn mode_name(&self) -> &'static str {
        self.mode.name()
    }

    pub fn should_ask(&self) -> bool {
        self.mode == PermissionMode::Ask
    }

    pub fn should_execute(&self) -> bool {
        self.mode != PermissionMode::Plan
    }
}
