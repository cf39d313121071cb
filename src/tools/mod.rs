pub mod fs;
pub mod gate;
pub mod http;
pub mod registry;
pub mod shell;

pub use gate::{AskCallback, PermissionGate};
pub use registry::ToolRegistry;

use anyhow::{bail, Result};
use std::time::Duration;

/// A single tool capability: a name, a parameter schema, and a synchronous
/// execute operation. Failures are encoded in the returned outcome; execute
/// never panics and never raises.
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn parameters_schema(&self) -> serde_json::Value;
    fn execute(&self, params: &serde_json::Value) -> ToolOutcome;
}

/// How a gated invocation was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Executed,
    Simulated,
    Denied,
}

/// Standardized return shape for every tool invocation.
#[derive(Debug, Clone)]
pub struct ToolOutcome {
    pub tool_name: String,
    pub ok: bool,
    pub output: String,
    pub disposition: Disposition,
    pub duration: Duration,
}

impl ToolOutcome {
    pub fn success(tool_name: &str, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            ok: true,
            output: output.into(),
            disposition: Disposition::Executed,
            duration: Duration::ZERO,
        }
    }

    pub fn failure(tool_name: &str, error: impl std::fmt::Display) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            ok: false,
            output: format!("ERROR: {error}"),
            disposition: Disposition::Executed,
            duration: Duration::ZERO,
        }
    }

    pub fn simulated(tool_name: &str, params: &serde_json::Value) -> Self {
        let rendered =
            serde_json::to_string(params).unwrap_or_else(|_| params.to_string());
        Self {
            tool_name: tool_name.to_string(),
            ok: true,
            output: format!("[plan mode] Simulated call to '{tool_name}' with params {rendered}. Nothing was executed."),
            disposition: Disposition::Simulated,
            duration: Duration::ZERO,
        }
    }

    pub fn denied(tool_name: &str) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            ok: true,
            output: format!("Tool '{tool_name}' execution denied by user."),
            disposition: Disposition::Denied,
            duration: Duration::ZERO,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Single-string rendering of the outcome, fit for feeding back as
    /// conversation context.
    pub fn describe(&self) -> String {
        let status = match self.disposition {
            Disposition::Simulated => "SIMULATED",
            Disposition::Denied => "DENIED",
            Disposition::Executed if self.ok => "SUCCESS",
            Disposition::Executed => "FAILURE",
        };
        format!(
            "[{status}] tool={} ({}ms)\n{}",
            self.tool_name,
            self.duration.as_millis(),
            self.output
        )
    }
}

pub(crate) fn first_str<'a>(input: &'a serde_json::Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| input.get(*key).and_then(|value| value.as_str()))
}

pub(crate) fn required_str<'a>(
    input: &'a serde_json::Value,
    tool: &str,
    canonical_key: &str,
    keys: &[&str],
) -> Result<&'a str> {
    let value = first_str(input, keys).map(str::trim).unwrap_or("");
    if value.is_empty() {
        bail!("{tool} requires a non-empty '{canonical_key}' string argument");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_describe_includes_status_and_output() {
        let outcome = ToolOutcome::success("read_file", "contents")
            .with_duration(Duration::from_millis(12));
        let rendered = outcome.describe();
        assert!(rendered.starts_with("[SUCCESS] tool=read_file (12ms)"));
        assert!(rendered.ends_with("contents"));

        let failed = ToolOutcome::failure("run_bash", "exit 1");
        assert!(failed.describe().starts_with("[FAILURE]"));
        assert!(failed.output.starts_with("ERROR: "));
    }

    #[test]
    fn test_denied_and_simulated_are_not_failures() {
        let denied = ToolOutcome::denied("write_file");
        assert!(denied.ok);
        assert_eq!(denied.disposition, Disposition::Denied);

        let simulated = ToolOutcome::simulated("write_file", &json!({"path": "a"}));
        assert!(simulated.ok);
        assert_eq!(simulated.disposition, Disposition::Simulated);
        assert!(simulated.output.contains("write_file"));
    }

    #[test]
    fn test_required_str_accepts_aliases() {
        let input = json!({"file_path": "src/lib.rs"});
        let value = required_str(&input, "read_file", "path", &["path", "file_path", "file"])
            .expect("aliased key");
        assert_eq!(value, "src/lib.rs");

        let missing = required_str(&input, "read_file", "path", &["other"]);
        assert!(missing.is_err());
    }
}
