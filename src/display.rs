use crossterm::style::Stylize;
use std::io::Write;
use unicode_width::UnicodeWidthChar;

pub const DEFAULT_REASONING_BUFFER_CHARS: usize = 8_000;
const TRUNCATION_MARKER: &str = "[…] ";
const REASONING_BOX_WIDTH: usize = 48;
const PARAMS_PREVIEW_WIDTH: usize = 72;
const OUTPUT_PREVIEW_WIDTH: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Success,
    Error,
}

/// One tool invocation in the turn's audit trail. Steps are appended when a
/// tool starts and mutated in place when it finishes; they are never removed
/// for the lifetime of the display.
#[derive(Debug, Clone)]
pub struct ExecutionStep {
    pub name: String,
    pub params_preview: String,
    pub status: StepStatus,
    pub output_preview: String,
}

/// Inline terminal renderer for one turn: a bounded reasoning buffer that
/// streams as a dim bordered block, plus status lines for each tool step.
/// The terminal scrolls naturally; the newest output stays at the cursor.
pub struct ExecutionDisplay {
    reasoning: String,
    reasoning_cap: usize,
    truncated: bool,
    reasoning_open: bool,
    at_line_start: bool,
    steps: Vec<ExecutionStep>,
}

impl Default for ExecutionDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionDisplay {
    pub fn new() -> Self {
        Self::with_reasoning_cap(resolve_reasoning_cap())
    }

    pub fn with_reasoning_cap(reasoning_cap: usize) -> Self {
        Self {
            reasoning: String::new(),
            reasoning_cap: reasoning_cap.max(1),
            truncated: false,
            reasoning_open: false,
            at_line_start: true,
            steps: Vec::new(),
        }
    }

    /// The retained reasoning text, truncation marker included once the
    /// buffer has been capped.
    pub fn reasoning_text(&self) -> String {
        if self.truncated {
            format!("{TRUNCATION_MARKER}{}", self.reasoning)
        } else {
            self.reasoning.clone()
        }
    }

    pub fn steps(&self) -> &[ExecutionStep] {
        &self.steps
    }

    pub fn on_reasoning(&mut self, chunk: &str) {
        if chunk.is_empty() {
            return;
        }
        if !self.reasoning_open && chunk.trim().is_empty() {
            return;
        }

        self.reasoning.push_str(chunk);
        self.cap_reasoning_buffer();

        if !self.reasoning_open {
            let label = " 💭 Reasoning ";
            let dashes = REASONING_BOX_WIDTH.saturating_sub(label.chars().count());
            print!(
                "\n{}\n",
                format!("╭{label}{}╮", "─".repeat(dashes)).dark_cyan().dim()
            );
            self.reasoning_open = true;
            self.at_line_start = true;
        }

        for (i, line) in chunk.split('\n').enumerate() {
            if i > 0 {
                println!();
                self.at_line_start = true;
            }
            if self.at_line_start {
                print!("{} ", "│".dark_cyan().dim());
                self.at_line_start = false;
            }
            if !line.is_empty() {
                print!("{}", line.grey());
            }
        }
        let _ = std::io::stdout().flush();
    }

    pub fn on_tool_started(&mut self, name: &str, params: &serde_json::Value) {
        self.close_reasoning_block();

        let params_preview = params_preview(params);
        self.steps.push(ExecutionStep {
            name: name.to_string(),
            params_preview: params_preview.clone(),
            status: StepStatus::Running,
            output_preview: String::new(),
        });

        println!(
            "\n  {} {}  {}",
            "⏳".yellow(),
            name.bold(),
            params_preview.dim()
        );
        let _ = std::io::stdout().flush();
    }

    pub fn on_tool_finished(&mut self, name: &str, output: &str, ok: bool) {
        self.close_reasoning_block();

        let brief = output_preview(output);
        let status = if ok { StepStatus::Success } else { StepStatus::Error };

        match self.last_running_step_mut() {
            Some(step) => {
                step.status = status;
                step.output_preview = brief.clone();
            }
            None => {
                // Finish record with no matching start; keep it in the trail.
                self.steps.push(ExecutionStep {
                    name: name.to_string(),
                    params_preview: String::new(),
                    status,
                    output_preview: brief.clone(),
                });
            }
        }

        let icon = if ok {
            "✅".green().to_string()
        } else {
            "❌".red().to_string()
        };
        println!("  {icon} {}  {}", name.bold(), format!("→ {brief}").dim());
        let _ = std::io::stdout().flush();
    }

    /// Report a stream-level failure. Called at most once per pass.
    pub fn on_stream_error(&mut self, message: &str) {
        self.close_reasoning_block();
        println!("  {} {}", "✖".red().bold(), format!("stream error: {message}").red());
        let _ = std::io::stdout().flush();
    }

    /// A user interrupt ended the pass; leave any in-flight step visibly
    /// incomplete instead of dropping it.
    pub fn on_pass_interrupted(&mut self) {
        self.close_reasoning_block();
        if let Some(step) = self.last_running_step_mut() {
            step.output_preview = "interrupted before completion".to_string();
        }
        println!("  {}", "◼ interrupted".yellow());
        let _ = std::io::stdout().flush();
    }

    /// Close any open reasoning block at the end of a turn.
    pub fn finish(&mut self) {
        self.close_reasoning_block();
    }

    fn last_running_step_mut(&mut self) -> Option<&mut ExecutionStep> {
        self.steps
            .iter_mut()
            .rev()
            .find(|step| step.status == StepStatus::Running)
    }

    fn close_reasoning_block(&mut self) {
        if !self.reasoning_open {
            return;
        }
        if !self.at_line_start {
            println!();
            self.at_line_start = true;
        }
        println!(
            "{}",
            format!("╰{}", "─".repeat(REASONING_BOX_WIDTH)).dark_cyan().dim()
        );
        let _ = std::io::stdout().flush();
        self.reasoning_open = false;
    }

    fn cap_reasoning_buffer(&mut self) {
        if self.reasoning.len() <= self.reasoning_cap {
            return;
        }
        let mut cut = self.reasoning.len() - self.reasoning_cap;
        while !self.reasoning.is_char_boundary(cut) {
            cut += 1;
        }
        self.reasoning.drain(..cut);
        self.truncated = true;
    }
}

fn resolve_reasoning_cap() -> usize {
    std::env::var("RUDDER_REASONING_BUFFER_CHARS")
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .map(|v| v.clamp(256, 1_000_000))
        .unwrap_or(DEFAULT_REASONING_BUFFER_CHARS)
}

fn params_preview(params: &serde_json::Value) -> String {
    let rendered = match params {
        serde_json::Value::Null => "{}".to_string(),
        other => serde_json::to_string(other).unwrap_or_else(|_| other.to_string()),
    };
    truncate_display_width(&rendered.replace('\n', " "), PARAMS_PREVIEW_WIDTH)
}

fn output_preview(output: &str) -> String {
    truncate_display_width(&output.replace('\n', " "), OUTPUT_PREVIEW_WIDTH)
}

/// Truncate to a terminal column budget, not a byte or char count.
fn truncate_display_width(text: &str, max_width: usize) -> String {
    let mut width = 0usize;
    let mut out = String::new();
    for ch in text.chars() {
        let char_width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + char_width > max_width {
            out.push('…');
            return out;
        }
        width += char_width;
        out.push(ch);
    }
    out
}
