use serde_json::Value;
use std::path::Path;

pub const DEFAULT_PREVIEW_CONTEXT_LINES: usize = 2;
const NEW_FILE_PREVIEW_LINES: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Context,
    Removed,
    Added,
}

#[derive(Debug, Clone)]
struct DiffLine {
    kind: LineKind,
    text: String,
    old_no: Option<usize>,
    new_no: Option<usize>,
}

/// Render a unified-diff-style preview of a text change. Returns an empty
/// string when the texts are identical.
pub fn unified_diff(old_text: &str, new_text: &str, context_lines: usize) -> String {
    let old_lines = collect_lines(old_text);
    let new_lines = collect_lines(new_text);
    let diff_lines = build_diff_lines(&old_lines, &new_lines);
    let hunks = build_hunk_ranges(&diff_lines, context_lines);

    let mut out = String::new();
    for (index, (start, end)) in hunks.iter().copied().enumerate() {
        if index > 0 {
            out.push_str("...\n");
        }

        let hunk = &diff_lines[start..end];
        let old_start = hunk
            .iter()
            .find_map(|line| line.old_no)
            .or_else(|| hunk.iter().find_map(|line| line.new_no))
            .unwrap_or(1);
        let new_start = hunk
            .iter()
            .find_map(|line| line.new_no)
            .or_else(|| hunk.iter().find_map(|line| line.old_no))
            .unwrap_or(1);
        let old_count = hunk.iter().filter(|line| line.old_no.is_some()).count();
        let new_count = hunk.iter().filter(|line| line.new_no.is_some()).count();
        out.push_str(&format!("@@ -{old_start},{old_count} +{new_start},{new_count} @@\n"));

        for line in hunk {
            let marker = match line.kind {
                LineKind::Context => ' ',
                LineKind::Removed => '-',
                LineKind::Added => '+',
            };
            out.push(marker);
            out.push_str(&line.text);
            out.push('\n');
        }
    }

    out
}

/// Preview of a pending `write_file` call: a unified diff against the file's
/// current content, or the new content itself when the file does not exist
/// yet. Returns None when the params do not describe a file write.
pub fn pending_write_preview(working_dir: &Path, params: &Value) -> Option<String> {
    let path = first_string_param(params, &["path", "file_path", "file"])?;
    let content = first_string_param(params, &["content", "text"])?;

    let resolved = crate::tools::fs::resolve_workspace_path(working_dir, path).ok()?;
    let old_content = match std::fs::read_to_string(&resolved) {
        Ok(existing) => existing,
        Err(_) => {
            let mut preview = format!("+++ {path}\n");
            for line in content.lines().take(NEW_FILE_PREVIEW_LINES) {
                preview.push('+');
                preview.push_str(line);
                preview.push('\n');
            }
            if content.lines().count() > NEW_FILE_PREVIEW_LINES {
                preview.push_str("...\n");
            }
            return Some(preview);
        }
    };

    let rendered = unified_diff(&old_content, content, DEFAULT_PREVIEW_CONTEXT_LINES);
    if rendered.is_empty() {
        Some(format!("{path}: no changes\n"))
    } else {
        Some(format!("--- {path}\n+++ {path}\n{rendered}"))
    }
}

fn first_string_param<'a>(params: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .find_map(|key| params.get(*key).and_then(|value| value.as_str()))
}

fn collect_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        Vec::new()
    } else {
        text.lines().collect()
    }
}

fn build_diff_lines(old_lines: &[&str], new_lines: &[&str]) -> Vec<DiffLine> {
    let lcs = build_lcs_matrix(old_lines, new_lines);
    let mut out = Vec::with_capacity(old_lines.len() + new_lines.len());

    let mut old_index = 0usize;
    let mut new_index = 0usize;
    let mut old_no = 1usize;
    let mut new_no = 1usize;

    while old_index < old_lines.len() && new_index < new_lines.len() {
        if old_lines[old_index] == new_lines[new_index] {
            out.push(DiffLine {
                kind: LineKind::Context,
                text: old_lines[old_index].to_string(),
                old_no: Some(old_no),
                new_no: Some(new_no),
            });
            old_index += 1;
            new_index += 1;
            old_no += 1;
            new_no += 1;
        } else if lcs[old_index + 1][new_index] >= lcs[old_index][new_index + 1] {
            out.push(DiffLine {
                kind: LineKind::Removed,
                text: old_lines[old_index].to_string(),
                old_no: Some(old_no),
                new_no: None,
            });
            old_index += 1;
            old_no += 1;
        } else {
            out.push(DiffLine {
                kind: LineKind::Added,
                text: new_lines[new_index].to_string(),
                old_no: None,
                new_no: Some(new_no),
            });
            new_index += 1;
            new_no += 1;
        }
    }

    while old_index < old_lines.len() {
        out.push(DiffLine {
            kind: LineKind::Removed,
            text: old_lines[old_index].to_string(),
            old_no: Some(old_no),
            new_no: None,
        });
        old_index += 1;
        old_no += 1;
    }

    while new_index < new_lines.len() {
        out.push(DiffLine {
            kind: LineKind::Added,
            text: new_lines[new_index].to_string(),
            old_no: None,
            new_no: Some(new_no),
        });
        new_index += 1;
        new_no += 1;
    }

    out
}

fn build_lcs_matrix(old_lines: &[&str], new_lines: &[&str]) -> Vec<Vec<usize>> {
    let mut lcs = vec![vec![0usize; new_lines.len() + 1]; old_lines.len() + 1];

    for old_index in (0..old_lines.len()).rev() {
        for new_index in (0..new_lines.len()).rev() {
            lcs[old_index][new_index] = if old_lines[old_index] == new_lines[new_index] {
                lcs[old_index + 1][new_index + 1] + 1
            } else {
                lcs[old_index + 1][new_index].max(lcs[old_index][new_index + 1])
            };
        }
    }

    lcs
}

fn build_hunk_ranges(diff_lines: &[DiffLine], context_lines: usize) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for (index, line) in diff_lines.iter().enumerate() {
        if line.kind == LineKind::Context {
            continue;
        }

        let start = index.saturating_sub(context_lines);
        let end = (index + context_lines + 1).min(diff_lines.len());
        if let Some((_, previous_end)) = ranges.last_mut() {
            if start <= *previous_end {
                *previous_end = (*previous_end).max(end);
                continue;
            }
        }
        ranges.push((start, end));
    }

    ranges
}
