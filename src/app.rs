use crate::approval::{self, TerminalApprovalPrompt};
use crate::config::{validate_model_name, Config};
use crate::display::ExecutionDisplay;
use crate::engine::client::EngineClient;
use crate::permissions::{PermissionManager, PermissionMode};
use crate::state::TurnContext;
use crate::tools::registry::{builtin_registry, tool_confirm_enabled};
use crate::tools::{AskCallback, Disposition, ToolRegistry};
use crate::turn::TurnController;
use anyhow::Result;
use crossterm::cursor::MoveToColumn;
use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::style::Stylize;
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType};
use crossterm::queue;
use std::io::Write;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;
use unicode_width::UnicodeWidthChar;

/// Interactive REPL: reads turns, routes commands, and keeps the permission
/// mode visible in the prompt. The display for each turn is created at turn
/// start and discarded at turn end; only the permission mode and the session
/// context survive across turns.
pub struct App {
    config: Config,
    permissions: Arc<Mutex<PermissionManager>>,
    engine: EngineClient,
    tools: ToolRegistry,
    context: TurnContext,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        let initial_mode = if tool_confirm_enabled() {
            PermissionMode::Ask
        } else {
            PermissionMode::Auto
        };
        let permissions = Arc::new(Mutex::new(PermissionManager::new(initial_mode)));

        let ask_working_dir = config.working_dir.clone();
        let ask: AskCallback =
            Arc::new(move |name, params| approval::terminal_ask(&ask_working_dir, name, params));
        let tools = builtin_registry(&config.working_dir, Arc::clone(&permissions), ask);

        let engine = EngineClient::new(&config);
        let context = TurnContext::new(config.session.clone());

        Ok(Self {
            config,
            permissions,
            engine,
            tools,
            context,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        self.print_welcome();

        loop {
            let Some(line) = self.read_user_line()? else {
                println!("{}", "Goodbye.".yellow());
                break;
            };
            let line = line.trim().to_string();
            if line.is_empty() {
                continue;
            }

            if line.starts_with('/') {
                if self.handle_command(&line).await? {
                    continue;
                }
                println!("{}", "Goodbye.".yellow());
                break;
            }

            self.run_one_turn(line).await;
        }

        Ok(())
    }

    fn current_mode(&self) -> PermissionMode {
        self.permissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current_mode()
    }

    fn cycle_mode(&self) -> PermissionMode {
        self.permissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cycle()
    }

    fn set_mode(&self, mode: PermissionMode) {
        self.permissions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_mode(mode);
    }

    fn print_welcome(&self) {
        println!();
        println!(
            "{}  {}",
            "rudder".cyan().bold(),
            "interactive agent control loop".dim()
        );
        println!(
            "{} {}   {} {}   {} {}",
            "model:".dim(),
            self.config.model.as_str().green(),
            "session:".dim(),
            self.config.session.as_str().green(),
            "engine:".dim(),
            self.config.engine_url.as_str().green()
        );
        println!(
            "{}",
            "TAB cycles PLAN/ASK/AUTO · /help for commands · /exit to quit".dim()
        );
    }

    fn print_help(&self) {
        println!();
        println!("{}", "Commands".bold());
        println!("  {}      cycle permission mode PLAN -> ASK -> AUTO", "TAB".cyan());
        println!("  {}            set permission mode explicitly", "/mode <m>".cyan());
        println!("  {}   show or switch the model (provider:name)", "/model [p:n]".cyan());
        println!("  {}              list the local tools", "/tools".cyan());
        println!("  {}  run a local tool directly", "/tool <n> <json>".cyan());
        println!("  {}             forget the conversation context", "/reset".cyan());
        println!("  {}              quit", "/exit".cyan());
    }

    /// Returns false when the loop should end.
    async fn handle_command(&mut self, line: &str) -> Result<bool> {
        let mut parts = line.splitn(2, char::is_whitespace);
        let command = parts.next().unwrap_or("");
        let rest = parts.next().map(str::trim).unwrap_or("");

        match command {
            "/exit" | "/quit" => return Ok(false),
            "/help" => self.print_help(),
            "/mode" => match PermissionMode::parse(rest) {
                Some(mode) => {
                    self.set_mode(mode);
                    println!("Mode set to {}", mode.name().bold());
                }
                None => println!("{}", "Usage: /mode plan|ask|auto".red()),
            },
            "/model" => {
                if rest.is_empty() {
                    println!("Current model: {}", self.config.model.as_str().bold());
                } else {
                    match validate_model_name(rest) {
                        Ok(()) => {
                            self.config.model = rest.to_string();
                            self.engine.set_model(rest.to_string());
                            println!("{} Model changed to {}", "✓".green(), rest.bold());
                        }
                        Err(error) => println!("{} {error}", "Error:".red()),
                    }
                }
            }
            "/tools" => {
                println!();
                for (name, description) in self.tools.list() {
                    println!("  {}  {}", name.as_str().cyan(), description.dim());
                }
            }
            "/tool" => {
                let mut tool_parts = rest.splitn(2, char::is_whitespace);
                let name = tool_parts.next().unwrap_or("");
                let raw_params = tool_parts.next().map(str::trim).unwrap_or("{}");
                if name.is_empty() {
                    println!("{}", "Usage: /tool <name> <json-params>".red());
                } else {
                    match serde_json::from_str::<serde_json::Value>(raw_params) {
                        Ok(params) => {
                            let outcome = self.tools.dispatch(name, &params).await;
                            let describe = outcome.describe();
                            match outcome.disposition {
                                Disposition::Executed if outcome.ok => {
                                    println!("{describe}")
                                }
                                Disposition::Executed => println!("{}", describe.red()),
                                _ => println!("{}", describe.yellow()),
                            }
                        }
                        Err(error) => println!("{} invalid JSON params: {error}", "Error:".red()),
                    }
                }
            }
            "/reset" => {
                self.context.reset();
                println!("Conversation context cleared.");
            }
            other => println!("{} unknown command: {other}", "Error:".red()),
        }

        Ok(true)
    }

    async fn run_one_turn(&mut self, input: String) {
        let mode = self.current_mode();
        self.context.set_reasoning_mode(mode.engine_name());

        let cancel = CancellationToken::new();
        let watcher = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let _ = tokio::signal::ctrl_c().await;
                cancel.cancel();
            }
        });

        let mut display = ExecutionDisplay::new();
        let mut prompt = TerminalApprovalPrompt::new(cancel.clone());
        let outcome = {
            let mut controller = TurnController::new(&self.engine, &mut self.context, cancel);
            controller.run_turn(input.clone(), &mut display, &mut prompt).await
        };
        watcher.abort();
        display.finish();

        match outcome.content.as_deref() {
            Some(content) if !content.trim().is_empty() => {
                println!();
                println!("{}", "rudder:".green().bold());
                println!("{content}");
            }
            _ => println!("\n{}", "(no answer produced)".dim()),
        }
        println!("{}", format!("⏱ {:.2}s", outcome.elapsed.as_secs_f64()).dim());

        self.context
            .record_exchange(&input, outcome.content.as_deref().unwrap_or(""));
    }

    /// Raw-mode line reader. Returns None when the user asked to quit.
    fn read_user_line(&mut self) -> Result<Option<String>> {
        println!();
        enable_raw_mode()?;
        let mut editor = LineEditor::default();

        // Raw mode is restored on every exit path, including edit errors.
        let result = self.edit_line(&mut editor);
        let _ = disable_raw_mode();
        println!();
        result
    }

    fn edit_line(&mut self, editor: &mut LineEditor) -> Result<Option<String>> {
        self.redraw_input_line(editor)?;

        loop {
            let read = event::read();
            let Ok(ev) = read else {
                break Ok(None);
            };

            match ev {
                Event::Key(key) => {
                    if key.kind == KeyEventKind::Release {
                        continue;
                    }
                    match key.code {
                        KeyCode::Enter => break Ok(Some(editor.buffer.clone())),
                        KeyCode::Tab => {
                            self.cycle_mode();
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            if editor.buffer.is_empty() {
                                print!("\r\n{}\r\n", "Interrupted. Type /exit to quit.".yellow());
                            } else {
                                editor.clear();
                            }
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                            if editor.buffer.is_empty() {
                                break Ok(None);
                            }
                        }
                        KeyCode::Backspace => {
                            editor.backspace();
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::Delete => {
                            editor.delete_forward();
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::Left => {
                            editor.move_left();
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::Right => {
                            editor.move_right();
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::Home => {
                            editor.cursor = 0;
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::End => {
                            editor.cursor = editor.buffer.len();
                            self.redraw_input_line(&editor)?;
                        }
                        KeyCode::Char(ch)
                            if !key.modifiers.contains(KeyModifiers::CONTROL)
                                && !key.modifiers.contains(KeyModifiers::ALT) =>
                        {
                            editor.insert_char(ch);
                            self.redraw_input_line(&editor)?;
                        }
                        _ => {}
                    }
                }
                Event::Paste(text) => {
                    editor.insert_str(&text);
                    self.redraw_input_line(&editor)?;
                }
                _ => {}
            }
        }
    }

    fn redraw_input_line(&self, editor: &LineEditor) -> Result<()> {
        let mode = self.current_mode();
        let badge_text = format!("[{}]", mode.name());
        let badge = match mode {
            PermissionMode::Plan => badge_text.clone().red().bold(),
            PermissionMode::Ask => badge_text.clone().yellow().bold(),
            PermissionMode::Auto => badge_text.clone().green().bold(),
        };

        let mut stdout = std::io::stdout();
        queue!(stdout, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        write!(stdout, "{badge} {} {}", ">".bold(), editor.buffer)?;

        let prompt_cols = display_width(&badge_text) + 3;
        let cursor_cols = prompt_cols + display_width(&editor.buffer[..editor.cursor]);
        queue!(stdout, MoveToColumn(cursor_cols as u16))?;
        stdout.flush()?;
        Ok(())
    }
}

fn display_width(text: &str) -> usize {
    text.chars()
        .map(|ch| UnicodeWidthChar::width(ch).unwrap_or(0))
        .sum()
}

/// Minimal single-line editor over a byte buffer with a char-boundary
/// cursor.
#[derive(Default)]
struct LineEditor {
    buffer: String,
    cursor: usize,
}

impl LineEditor {
    fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    fn prev_boundary(&self) -> usize {
        if self.cursor == 0 {
            return 0;
        }
        let mut index = self.cursor - 1;
        while index > 0 && !self.buffer.is_char_boundary(index) {
            index -= 1;
        }
        index
    }

    fn next_boundary(&self) -> usize {
        match self.buffer[self.cursor..].chars().next() {
            Some(ch) => self.cursor + ch.len_utf8(),
            None => self.buffer.len(),
        }
    }

    fn insert_char(&mut self, ch: char) {
        self.buffer.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn insert_str(&mut self, text: &str) {
        let cleaned = text.replace(['\r', '\n'], " ");
        self.buffer.insert_str(self.cursor, &cleaned);
        self.cursor += cleaned.len();
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let start = self.prev_boundary();
        self.buffer.replace_range(start..self.cursor, "");
        self.cursor = start;
    }

    fn delete_forward(&mut self) {
        if self.cursor >= self.buffer.len() {
            return;
        }
        let end = self.next_boundary();
        self.buffer.replace_range(self.cursor..end, "");
    }

    fn move_left(&mut self) {
        self.cursor = self.prev_boundary();
    }

    fn move_right(&mut self) {
        if self.cursor < self.buffer.len() {
            self.cursor = self.next_boundary();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_editor_edits_respect_char_boundaries() {
        let mut editor = LineEditor::default();
        editor.insert_str("héllo");
        assert_eq!(editor.cursor, editor.buffer.len());

        editor.move_left();
        editor.move_left();
        editor.move_left();
        editor.move_left();
        editor.backspace();
        assert_eq!(editor.buffer, "éllo");
        assert_eq!(editor.cursor, 0);

        editor.delete_forward();
        assert_eq!(editor.buffer, "llo");
    }

    #[test]
    fn test_line_editor_paste_flattens_newlines() {
        let mut editor = LineEditor::default();
        editor.insert_str("a\nb\r\nc");
        assert_eq!(editor.buffer, "a b  c");
    }

    #[test]
    fn test_display_width_counts_wide_chars() {
        assert_eq!(display_width("abc"), 3);
        assert!(display_width("日本") >= 4);
    }
}
