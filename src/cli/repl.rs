use crossterm::{
    cursor, execute,
    style::Stylize,
    terminal::{self, ClearType},
};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::assistant::{Assistant, AssistantReply};
use crate::chains::{ReasoningEvent, ToolStatus, ToolUsage};
use crate::config::{Backend, InsightConfig};
use crate::error::InsightResult;

const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const MAX_PANEL_WIDTH: usize = 100;

/// Interactive terminal session bound to one conversation thread.
pub struct Repl {
    assistant: Arc<Assistant>,
    thread: String,
    title: String,
}

impl Repl {
    pub fn new(assistant: Arc<Assistant>, thread: impl Into<String>) -> Self {
        Self {
            assistant,
            thread: thread.into(),
            title: "Insight".to_string(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub async fn run(&self) -> InsightResult<()> {
        info!("Starting chat session on thread {}", self.thread);

        println!("{}", format!("{} Chat - Type 'exit' to quit", self.title).bold().cyan());
        println!();

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            print!("{}", "You: ".bold().green());
            io::stdout().flush()?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = tokio::signal::ctrl_c() => None,
            };

            // EOF or Ctrl-C
            let Some(line) = line else {
                println!();
                break;
            };

            let input = line.trim();
            if input.is_empty() {
                continue;
            }
            if matches!(input.to_lowercase().as_str(), "exit" | "quit") {
                break;
            }

            let (progress, mut events) = mpsc::unbounded_channel();
            let spinner = Spinner::start("Thinking...");
            let respond = self.assistant.respond_with_progress(&self.thread, input, Some(&progress));
            tokio::pin!(respond);

            let result = loop {
                tokio::select! {
                    result = &mut respond => break Some(result),
                    Some(event) = events.recv() => print_progress(&event),
                    _ = tokio::signal::ctrl_c() => break None,
                }
            };
            spinner.stop();
            while let Ok(event) = events.try_recv() {
                print_progress(&event);
            }

            match result {
                Some(Ok(reply)) => print_reply(&self.title, &reply),
                Some(Err(e)) => {
                    error!("Failed to process message: {}", e);
                    println!("{}", format!("Error: {}", e).red());
                    println!();
                }
                None => {
                    println!();
                    break;
                }
            }
        }

        println!("{}", "Goodbye!".dim());
        Ok(())
    }
}

pub fn backend_title(config: &InsightConfig) -> String {
    match config.backend {
        Backend::Insight => "Insight",
        Backend::Nebula => "Nebula",
    }
    .to_string()
}

/// Prints the tools line and the boxed answer for one reply.
pub fn print_reply(title: &str, reply: &AssistantReply) {
    if !reply.tools_used.is_empty() {
        println!("{}", format!("Tools used: {}", describe_tools(&reply.tools_used)).dim());
    }

    let width = terminal::size()
        .map(|(columns, _)| columns as usize)
        .unwrap_or(80)
        .min(MAX_PANEL_WIDTH);

    println!("{}", render_panel(title, &reply.response, width));
    println!();
}

fn print_progress(event: &ReasoningEvent) {
    let _ = execute!(
        io::stdout(),
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine)
    );
    println!("{}", progress_line(event).dim());
}

/// One line per reasoning step, shown above the spinner.
pub fn progress_line(event: &ReasoningEvent) -> String {
    match event {
        ReasoningEvent::ToolCalls { step, names } => format!("Step {}: calling {}", step, names.join(", ")),
        ReasoningEvent::ToolFinished(usage) => match usage.status {
            ToolStatus::Success => format!("  {} done", usage.name),
            ToolStatus::Error => format!("  {} failed", usage.name),
        },
    }
}

pub fn describe_tools(tools: &[ToolUsage]) -> String {
    tools
        .iter()
        .map(|usage| match usage.status {
            ToolStatus::Success => usage.name.clone(),
            ToolStatus::Error => format!("{} (failed)", usage.name),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Draws `text` inside a rounded box `width` columns wide.
pub fn render_panel(title: &str, text: &str, width: usize) -> String {
    let inner = width.saturating_sub(4).max(10);

    let heading = format!(" {} ", title);
    let rule = inner + 2 - heading.chars().count().min(inner + 1);
    let mut out = format!("╭─{}{}╮\n", heading, "─".repeat(rule.saturating_sub(1)));

    for line in wrap_text(text, inner) {
        out.push_str(&format!("│ {:<inner$} │\n", line, inner = inner));
    }

    out.push_str(&format!("╰{}╯", "─".repeat(inner + 2)));
    out
}

/// Greedy word wrap that keeps blank lines and splits words longer than `width`.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();

    for paragraph in text.lines() {
        let mut current = String::new();

        for word in paragraph.split_whitespace() {
            let mut word: Vec<char> = word.chars().collect();

            while word.len() > width {
                if !current.is_empty() {
                    lines.push(std::mem::take(&mut current));
                }
                let rest = word.split_off(width);
                lines.push(word.into_iter().collect());
                word = rest;
            }

            let current_len = current.chars().count();
            if current_len > 0 && current_len + 1 + word.len() > width {
                lines.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.extend(word);
        }

        lines.push(current);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

struct Spinner {
    handle: JoinHandle<()>,
}

impl Spinner {
    fn start(label: &'static str) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_millis(80));
            for frame in SPINNER_FRAMES.iter().cycle() {
                interval.tick().await;
                let mut stdout = io::stdout();
                let _ = execute!(stdout, cursor::MoveToColumn(0));
                print!("{} {}", frame.cyan(), label.dim());
                let _ = stdout.flush();
            }
        });
        Self { handle }
    }

    fn stop(self) {
        self.handle.abort();
        let _ = execute!(
            io::stdout(),
            cursor::MoveToColumn(0),
            terminal::Clear(ClearType::CurrentLine)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap_text("the quick brown fox jumps over the lazy dog", 10);
        assert_eq!(lines, vec!["the quick", "brown fox", "jumps over", "the lazy", "dog"]);
    }

    #[test]
    fn splits_long_addresses() {
        let lines = wrap_text("0xdAC17F958D2ee523a2206206994597C13D831ec7", 16);
        assert_eq!(lines[0], "0xdAC17F958D2ee5");
        assert!(lines.iter().all(|line| line.chars().count() <= 16));
        assert_eq!(lines.concat(), "0xdAC17F958D2ee523a2206206994597C13D831ec7");
    }

    #[test]
    fn keeps_blank_lines() {
        let lines = wrap_text("first\n\nsecond", 20);
        assert_eq!(lines, vec!["first", "", "second"]);
    }

    #[test]
    fn panel_lines_share_a_width() {
        let panel = render_panel("Insight", "Balance: 1.5 ETH\nPrice: $3,000", 30);
        let widths: Vec<usize> = panel.lines().map(|line| line.chars().count()).collect();
        assert!(widths.iter().all(|width| *width == 30), "{:?}", widths);
        assert!(panel.starts_with("╭─ Insight "));
    }

    #[test]
    fn failed_tools_are_marked() {
        let tools = vec![
            ToolUsage {
                name: "get_erc20_tokens".to_string(),
                status: ToolStatus::Success,
            },
            ToolUsage {
                name: "retrieve_web_content".to_string(),
                status: ToolStatus::Error,
            },
        ];
        assert_eq!(describe_tools(&tools), "get_erc20_tokens, retrieve_web_content (failed)");
    }

    #[test]
    fn progress_lines_name_each_step() {
        let calls = ReasoningEvent::ToolCalls {
            step: 2,
            names: vec!["get_erc20_tokens".to_string(), "count_json_list".to_string()],
        };
        assert_eq!(progress_line(&calls), "Step 2: calling get_erc20_tokens, count_json_list");

        let failed = ReasoningEvent::ToolFinished(ToolUsage {
            name: "retrieve_web_content".to_string(),
            status: ToolStatus::Error,
        });
        assert_eq!(progress_line(&failed), "  retrieve_web_content failed");
    }
}
