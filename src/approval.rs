use crate::diff;
use crate::types::SuspendRequest;
use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of one approval interaction. `Aborted` means the user interrupted
/// the wait; the caller must not forward any resume command in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalReply {
    Approved,
    Denied,
    Aborted,
}

/// Synchronous human-interaction boundary for suspend requests.
pub trait ApprovalPrompt {
    fn ask(&mut self, request: &SuspendRequest) -> ApprovalReply;
}

pub struct TerminalApprovalPrompt {
    cancel: CancellationToken,
}

impl TerminalApprovalPrompt {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl ApprovalPrompt for TerminalApprovalPrompt {
    fn ask(&mut self, request: &SuspendRequest) -> ApprovalReply {
        println!();
        println!("{}", "⚠ Permission required".yellow().bold());
        println!("Tool: {}", request.tool_name.as_str().cyan());
        match &request.preview {
            Some(preview) => print_preview(preview),
            None => print_params(&request.params),
        }

        // Unreadable input must never approve.
        match read_yes_no("Allow this action? [y/n] ", Some(&self.cancel)) {
            Ok(Some(true)) => ApprovalReply::Approved,
            Ok(Some(false)) => ApprovalReply::Denied,
            Ok(None) => ApprovalReply::Aborted,
            Err(_) => ApprovalReply::Denied,
        }
    }
}

/// Ask callback for gated local tools: same prompt surface as suspend
/// approvals, with a pending-write diff preview when the params describe a
/// file write.
pub fn terminal_ask(working_dir: &Path, tool_name: &str, params: &serde_json::Value) -> bool {
    println!();
    println!("{}", "⚠ Permission required".yellow().bold());
    println!("Tool: {}", tool_name.cyan());
    match diff::pending_write_preview(working_dir, params) {
        Some(preview) => print_preview(&preview),
        None => print_params(params),
    }

    matches!(
        read_yes_no("Allow execution of this action? [y/n] ", None),
        Ok(Some(true))
    )
}

fn print_params(params: &serde_json::Value) {
    let rendered =
        serde_json::to_string_pretty(params).unwrap_or_else(|_| params.to_string());
    println!("Params: {rendered}");
}

fn print_preview(preview: &str) {
    println!("{}", "Preview:".bold());
    for line in preview.lines() {
        if line.starts_with('+') {
            println!("{}", line.green());
        } else if line.starts_with('-') {
            println!("{}", line.red());
        } else if line.starts_with("@@") {
            println!("{}", line.dark_cyan());
        } else {
            println!("{}", line.dim());
        }
    }
}

/// Read an explicit y/n from the keyboard. Empty input is not accepted; the
/// prompt waits until the user answers, cancels, or input becomes
/// unreadable. Returns None on cancellation.
fn read_yes_no(prompt: &str, cancel: Option<&CancellationToken>) -> Result<Option<bool>> {
    print!("{}", prompt.bold());
    let _ = std::io::stdout().flush();

    if enable_raw_mode().is_err() {
        // No usable terminal; treat as unanswerable rather than approving.
        return Ok(Some(false));
    }

    let answer = poll_yes_no(cancel);
    let _ = disable_raw_mode();

    match &answer {
        Ok(Some(true)) => println!("y"),
        Ok(Some(false)) => println!("n"),
        _ => println!(),
    }
    answer
}

fn poll_yes_no(cancel: Option<&CancellationToken>) -> Result<Option<bool>> {
    loop {
        if let Some(token) = cancel {
            if token.is_cancelled() {
                return Ok(None);
            }
        }

        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind == KeyEventKind::Release {
                continue;
            }
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(Some(true)),
                KeyCode::Char('n') | KeyCode::Char('N') => return Ok(Some(false)),
                KeyCode::Esc => return Ok(Some(false)),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Ok(None)
                }
                _ => {}
            }
        }
    }
}
