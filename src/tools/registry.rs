use super::fs::{ListDirTool, ReadFileTool, WriteFileTool};
use super::gate::{AskCallback, PermissionGate};
use super::http::HttpRequestTool;
use super::shell::BashTool;
use super::{Tool, ToolOutcome};
use crate::permissions::PermissionManager;
use crate::util::parse_bool_flag;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Centralized tool catalog. Dispatch by name never raises: unknown tools
/// and panicking or timed-out executions all come back as error outcomes.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Register a tool behind the permission gate.
    pub fn register_gated(
        &mut self,
        tool: Arc<dyn Tool>,
        permissions: Arc<Mutex<PermissionManager>>,
        ask: AskCallback,
    ) {
        self.register(Arc::new(PermissionGate::new(tool, permissions, ask)));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<(String, String)> {
        self.tools
            .values()
            .map(|tool| (tool.name().to_string(), tool.description().to_string()))
            .collect()
    }

    /// Execute a tool by name on a blocking thread with a timeout.
    pub async fn dispatch(&self, name: &str, params: &serde_json::Value) -> ToolOutcome {
        let Some(tool) = self.get(name) else {
            return ToolOutcome::failure(name, format!("Tool '{name}' not found in registry"));
        };

        let started = Instant::now();
        let task_params = params.clone();
        let mut task = tokio::task::spawn_blocking(move || tool.execute(&task_params));

        let timeout = resolve_tool_timeout();
        let outcome = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => ToolOutcome::failure(
                name,
                format!("tool execution task failed for {name}: {join_error}"),
            ),
            Err(_) => {
                task.abort();
                ToolOutcome::failure(
                    name,
                    format!(
                        "tool execution timed out after {}s for {name}",
                        timeout.as_secs()
                    ),
                )
            }
        };

        outcome.with_duration(started.elapsed())
    }
}

/// The default local tool set, every tool wrapped in the permission gate.
pub fn builtin_registry(
    working_dir: &Path,
    permissions: Arc<Mutex<PermissionManager>>,
    ask: AskCallback,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let working_dir = working_dir.to_path_buf();

    let tools: Vec<Arc<dyn Tool>> = vec![
        Arc::new(ReadFileTool::new(working_dir.clone())),
        Arc::new(WriteFileTool::new(working_dir.clone())),
        Arc::new(ListDirTool::new(working_dir.clone())),
        Arc::new(BashTool::new(working_dir)),
        Arc::new(HttpRequestTool::new()),
    ];
    for tool in tools {
        registry.register_gated(tool, Arc::clone(&permissions), Arc::clone(&ask));
    }

    registry
}

fn resolve_tool_timeout() -> Duration {
    let seconds = std::env::var("RUDDER_TOOL_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|v| v.clamp(1, 600))
        .unwrap_or(30);
    Duration::from_secs(seconds)
}

/// `RUDDER_TOOL_CONFIRM=0` starts the session in auto-approve mode, for
/// scripted environments with no human at the prompt.
pub fn tool_confirm_enabled() -> bool {
    std::env::var("RUDDER_TOOL_CONFIRM")
        .ok()
        .and_then(parse_bool_flag)
        .unwrap_or(true)
}
