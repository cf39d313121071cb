use super::{required_str, Tool, ToolOutcome};
use crate::tools::fs::resolve_workspace_path;
use serde_json::json;
use std::path::PathBuf;
use std::process::Command;

const FORBIDDEN_COMMANDS: [&str; 6] = ["rm", "sudo", "mv", "dd", "mkfs", ":(){:|:&};:"];

/// Shell execution restricted by a forbidden-command list. Output combines
/// stdout and stderr; a non-zero exit code is appended as a note rather than
/// treated as a tool failure — the reasoning engine decides how to react.
pub struct BashTool {
    working_dir: PathBuf,
}

impl BashTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

impl Tool for BashTool {
    fn name(&self) -> &str {
        "run_bash"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace. Returns stdout and stderr combined."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "command": { "type": "string", "description": "The shell command to execute" },
                "workdir": { "type": "string", "description": "Workspace-relative working directory" }
            },
            "required": ["command"]
        })
    }

    fn execute(&self, params: &serde_json::Value) -> ToolOutcome {
        let command = match required_str(params, self.name(), "command", &["command", "cmd"]) {
            Ok(command) => command,
            Err(error) => return ToolOutcome::failure(self.name(), error),
        };

        if let Some(forbidden) = forbidden_part(command) {
            return ToolOutcome::failure(
                self.name(),
                format!("command contains forbidden operation '{forbidden}'"),
            );
        }

        let cwd = match params.get("workdir").and_then(|value| value.as_str()) {
            None | Some("") => self.working_dir.clone(),
            Some(workdir) => match resolve_workspace_path(&self.working_dir, workdir) {
                Ok(resolved) => resolved,
                Err(error) => return ToolOutcome::failure(self.name(), error),
            },
        };

        let output = match Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&cwd)
            .output()
        {
            Ok(output) => output,
            Err(error) => {
                return ToolOutcome::failure(
                    self.name(),
                    format!("failed to execute command: {error}"),
                )
            }
        };

        let mut combined = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            combined.push_str("\nSTDERR:\n");
            combined.push_str(stderr.trim_end());
        }
        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            combined.push_str(&format!("\n[Process exited with code {code}]"));
        }

        ToolOutcome::success(self.name(), combined.trim().to_string())
    }
}

fn forbidden_part(command: &str) -> Option<&str> {
    command
        .split_whitespace()
        .find(|part| FORBIDDEN_COMMANDS.contains(part))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_forbidden_command_is_blocked() {
        let temp = TempDir::new().expect("temp dir");
        let bash = BashTool::new(temp.path().to_path_buf());

        let outcome = bash.execute(&json!({"command": "sudo ls /"}));
        assert!(!outcome.ok);
        assert!(outcome.output.contains("forbidden"));

        let removal = bash.execute(&json!({"command": "rm -rf ."}));
        assert!(!removal.ok);
    }

    #[test]
    fn test_echo_combines_output() {
        let temp = TempDir::new().expect("temp dir");
        let bash = BashTool::new(temp.path().to_path_buf());

        let outcome = bash.execute(&json!({"command": "echo hola"}));
        assert!(outcome.ok);
        assert_eq!(outcome.output, "hola");
    }

    #[test]
    fn test_nonzero_exit_is_noted_not_failed() {
        let temp = TempDir::new().expect("temp dir");
        let bash = BashTool::new(temp.path().to_path_buf());

        let outcome = bash.execute(&json!({"command": "exit 3"}));
        assert!(outcome.ok);
        assert!(outcome.output.contains("[Process exited with code 3]"));
    }

    #[test]
    fn test_missing_command_is_error_outcome() {
        let temp = TempDir::new().expect("temp dir");
        let bash = BashTool::new(temp.path().to_path_buf());

        let outcome = bash.execute(&json!({}));
        assert!(!outcome.ok);
        assert!(outcome.output.contains("'command'"));
    }

    #[test]
    fn test_workdir_must_stay_in_workspace() {
        let temp = TempDir::new().expect("temp dir");
        let bash = BashTool::new(temp.path().to_path_buf());

        let outcome = bash.execute(&json!({"command": "pwd", "workdir": "../"}));
        assert!(!outcome.ok);
    }
}
