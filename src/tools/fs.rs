use super::{first_str, required_str, Tool, ToolOutcome};
use anyhow::{bail, Context, Result};
use serde_json::json;
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Resolve a workspace-relative path, rejecting absolute paths, traversal,
/// and symlink escapes out of the working directory.
pub(crate) fn resolve_workspace_path(working_dir: &Path, path: &str) -> Result<PathBuf> {
    if path.starts_with('/') || path.contains('\\') {
        bail!("Security error: absolute or platform-specific path not allowed: {path}");
    }

    let relative_path = Path::new(path);
    for component in relative_path.components() {
        if matches!(component, Component::ParentDir) {
            bail!("Security error: path traversal detected: {path}");
        }
    }

    let mut resolved = working_dir.to_path_buf();
    for component in relative_path.components() {
        if let Component::Normal(segment) = component {
            resolved.push(segment);
        }
    }

    ensure_path_is_within_workspace(working_dir, &resolved)?;
    Ok(resolved)
}

fn ensure_path_is_within_workspace(working_dir: &Path, path: &Path) -> Result<()> {
    let canonical_working_dir =
        fs::canonicalize(working_dir).unwrap_or_else(|_| working_dir.to_path_buf());

    let guard_path = nearest_existing_ancestor(path)
        .context("Security error: could not find an existing parent path")?;
    let canonical_guard = fs::canonicalize(guard_path)
        .with_context(|| format!("Failed to canonicalize {}", guard_path.display()))?;

    if !canonical_guard.starts_with(&canonical_working_dir) {
        bail!(
            "Security error: path escapes working directory via symlink or traversal: {}",
            path.display()
        );
    }
    Ok(())
}

fn nearest_existing_ancestor(path: &Path) -> Option<&Path> {
    let mut current = path;
    while !current.exists() {
        current = current.parent()?;
    }
    Some(current)
}

fn text_stats(text: &str) -> (usize, usize) {
    (
        text.chars().count(),
        text.lines().count().max(usize::from(!text.is_empty())),
    )
}

pub struct ReadFileTool {
    working_dir: PathBuf,
}

impl ReadFileTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a file inside the workspace and return its contents."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Workspace-relative path to read" }
            },
            "required": ["path"]
        })
    }

    fn execute(&self, params: &serde_json::Value) -> ToolOutcome {
        let path = match required_str(params, self.name(), "path", &["path", "file_path", "file"])
        {
            Ok(path) => path,
            Err(error) => return ToolOutcome::failure(self.name(), error),
        };

        let result = resolve_workspace_path(&self.working_dir, path)
            .and_then(|resolved| fs::read_to_string(resolved).context("Failed to read file"));
        match result {
            Ok(content) => ToolOutcome::success(self.name(), content),
            Err(error) => ToolOutcome::failure(self.name(), error),
        }
    }
}

pub struct WriteFileTool {
    working_dir: PathBuf,
}

impl WriteFileTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a workspace file, overwriting it and creating parent directories as needed."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Workspace-relative path to write" },
                "content": { "type": "string", "description": "Full file content" }
            },
            "required": ["path", "content"]
        })
    }

    fn execute(&self, params: &serde_json::Value) -> ToolOutcome {
        let path = match required_str(params, self.name(), "path", &["path", "file_path", "file"])
        {
            Ok(path) => path,
            Err(error) => return ToolOutcome::failure(self.name(), error),
        };
        let content = first_str(params, &["content", "text"]).unwrap_or("");

        let result = resolve_workspace_path(&self.working_dir, path).and_then(|resolved| {
            if let Some(parent) = resolved.parent() {
                fs::create_dir_all(parent).context("Failed to create parent directory")?;
            }
            fs::write(resolved, content).context("Failed to write file")
        });
        match result {
            Ok(()) => {
                let (chars, lines) = text_stats(content);
                ToolOutcome::success(
                    self.name(),
                    format!("Wrote {path} ({chars} chars, {lines} lines)."),
                )
            }
            Err(error) => ToolOutcome::failure(self.name(), error),
        }
    }
}

pub struct ListDirTool {
    working_dir: PathBuf,
}

impl ListDirTool {
    pub fn new(working_dir: PathBuf) -> Self {
        Self { working_dir }
    }
}

impl Tool for ListDirTool {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List files and directories at a workspace path."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Workspace-relative directory, defaults to the workspace root" },
                "max_entries": { "type": "integer", "description": "Cap on returned entries" }
            }
        })
    }

    fn execute(&self, params: &serde_json::Value) -> ToolOutcome {
        let root = match first_str(params, &["path", "dir"]).map(str::trim) {
            None | Some("") | Some(".") => Ok(self.working_dir.clone()),
            Some(path) => resolve_workspace_path(&self.working_dir, path),
        };
        let root = match root {
            Ok(root) => root,
            Err(error) => return ToolOutcome::failure(self.name(), error),
        };
        let limit = params
            .get("max_entries")
            .and_then(|value| value.as_u64())
            .map(|value| value as usize)
            .unwrap_or(100)
            .clamp(1, 2000);

        match list_entries(&self.working_dir, &root, limit) {
            Ok(entries) if entries.is_empty() => {
                ToolOutcome::success(self.name(), "(no files found)")
            }
            Ok(entries) => ToolOutcome::success(self.name(), entries.join("\n")),
            Err(error) => ToolOutcome::failure(self.name(), error),
        }
    }
}

fn list_entries(working_dir: &Path, root: &Path, limit: usize) -> Result<Vec<String>> {
    let mut entries = Vec::new();

    if root.is_file() {
        entries.push(workspace_relative_display(working_dir, root));
        return Ok(entries);
    }

    let mut children: Vec<_> = fs::read_dir(root)
        .with_context(|| format!("Failed to read directory {}", root.display()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to list entries in {}", root.display()))?;
    children.sort_by_key(|entry| entry.path());

    for child in children {
        let name = child.file_name();
        let name = name.to_string_lossy();
        if should_skip_list_entry(root, working_dir, &name) {
            continue;
        }

        let path = child.path();
        let is_dir = child
            .file_type()
            .with_context(|| format!("Failed to inspect {}", path.display()))?
            .is_dir();
        let mut display = workspace_relative_display(working_dir, &path);
        if is_dir {
            display.push('/');
        }
        entries.push(display);
        if entries.len() >= limit {
            break;
        }
    }

    Ok(entries)
}

fn workspace_relative_display(working_dir: &Path, path: &Path) -> String {
    path.strip_prefix(working_dir)
        .map(|relative| relative.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

fn should_skip_list_entry(root: &Path, working_dir: &Path, name: &str) -> bool {
    if name.starts_with('.') {
        return true;
    }

    if root != working_dir {
        return false;
    }

    matches!(
        name,
        "target" | "node_modules" | "__pycache__" | ".venv" | "venv" | "build" | "dist"
    )
}
