//! CLI output formatting utilities.

use crate::session::ChatTurn;
use crate::vector_store::SearchResult;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print the bot's answer.
    pub fn answer(text: &str) {
        println!("\n{} {}\n", style("Bot:").cyan().bold(), text);
    }

    /// Print the guideline records a turn was grounded on.
    pub fn sources(sources: &[SearchResult]) {
        if sources.is_empty() {
            return;
        }
        Output::header("Retrieved guidelines");
        for (i, source) in sources.iter().enumerate() {
            println!(
                "\n{} {} (distance: {:.3})",
                style(format!("[{}]", i + 1)).green(),
                style(format!("row {}", source.document.row + 1)).bold(),
                source.distance()
            );
            println!("   {}", content_preview(&source.document.content, 200));
        }
        println!();
    }

    /// Print a transcript.
    pub fn transcript(turns: &[ChatTurn]) {
        for turn in turns {
            println!(
                "{} {}",
                style(format!("{}:", turn.role.label())).bold(),
                turn.text
            );
        }
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Flatten to one line and cut at `max_chars` characters.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &content[..idx]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short\ntext", 20), "short text");
        assert_eq!(content_preview("abcdef", 3), "abc...");
        assert_eq!(content_preview("°C°C", 2), "°C...");
    }
}
