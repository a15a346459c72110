//! Interactive chat command.
//!
//! One process, one session: turns accumulate in a [`ChatHistory`] until `/clear` or exit.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::export::{export_to_file, ExportFormat, DEFAULT_EXPORT_FILENAME};
use crate::rag::Assistant;
use crate::sensor::{SENSOR_FIELDS, SENSOR_TEMPLATE};
use crate::session::ChatHistory;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

const EMPTY_TURN_MESSAGE: &str = "Please provide sensor data, a query, or both.";

const HELP: &str = "\
  <text>                    ask a road safety question
  /sensor                   enter a sensor block (end with a blank line), then an optional query
  /history                  show this session's transcript
  /export [path] [format]   export the transcript (pdf, json, text)
  /clear                    start a new session
  /help                     show this help
  /exit                     quit";

/// A parsed line of REPL input.
#[derive(Debug, PartialEq)]
enum ChatCommand {
    Query(String),
    Sensor,
    History,
    Export {
        path: Option<PathBuf>,
        format: Option<String>,
    },
    Clear,
    Help,
    Exit,
    Unknown(String),
    Empty,
}

fn parse_command(line: &str) -> ChatCommand {
    let line = line.trim();
    if line.is_empty() {
        return ChatCommand::Empty;
    }
    if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
        return ChatCommand::Exit;
    }

    let Some(rest) = line.strip_prefix('/') else {
        return ChatCommand::Query(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default().to_lowercase();
    match name.as_str() {
        "sensor" => ChatCommand::Sensor,
        "history" => ChatCommand::History,
        "export" => ChatCommand::Export {
            path: parts.next().map(PathBuf::from),
            format: parts.next().map(str::to_string),
        },
        "clear" => ChatCommand::Clear,
        "help" | "?" => ChatCommand::Help,
        "exit" | "quit" => ChatCommand::Exit,
        _ => ChatCommand::Unknown(line.to_string()),
    }
}

/// Read lines until a blank line or end of input.
fn read_block(input: &mut impl BufRead) -> io::Result<String> {
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        lines.push(line.to_string());
    }
    Ok(lines.join("\n"))
}

/// Run the interactive chat command.
pub async fn run_chat(settings: &Settings, credentials: &Credentials) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, settings, credentials) {
        Output::error(&format!("{}", e));
        Output::info("Run 'roadsafe doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let assistant = Assistant::from_settings(settings, credentials)?;
    let mut history = ChatHistory::new();

    println!("\n{}", style("Road Safety Intervention Chatbot").bold().cyan());
    println!(
        "{}\n",
        style("Describe a road condition, or type /sensor to enter readings. /help lists commands.")
            .dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let (query, sensor) = match parse_command(&line) {
            ChatCommand::Empty => {
                Output::warning(EMPTY_TURN_MESSAGE);
                continue;
            }
            ChatCommand::Exit => break,
            ChatCommand::Help => {
                println!("{}", HELP);
                continue;
            }
            ChatCommand::History => {
                if history.is_empty() {
                    Output::info("No turns yet.");
                } else {
                    Output::transcript(history.turns());
                }
                continue;
            }
            ChatCommand::Clear => {
                history.clear();
                Output::info("Conversation history cleared.");
                continue;
            }
            ChatCommand::Export { path, format } => {
                export_history(&history, path, format.as_deref());
                continue;
            }
            ChatCommand::Unknown(cmd) => {
                Output::warning(&format!("Unknown command: {}. Type /help.", cmd));
                continue;
            }
            ChatCommand::Sensor => {
                println!("{}", style(SENSOR_FIELDS).dim());
                println!("{}", style(format!("Example:\n{}", SENSOR_TEMPLATE)).dim());
                println!("{}", style("Enter readings, blank line to finish:").dim());
                let sensor = read_block(&mut stdin.lock())?;

                print!("{} ", style("Query (optional):").green().bold());
                stdout.flush()?;
                let mut query = String::new();
                stdin.lock().read_line(&mut query)?;
                let query = query.trim_end_matches(['\r', '\n']).to_string();
                (query, sensor)
            }
            ChatCommand::Query(query) => (query, String::new()),
        };

        let spinner = Output::spinner("Analyzing road conditions...");
        let result = assistant.handle(&mut history, &query, &sensor).await;
        spinner.finish_and_clear();

        match result {
            Ok(Some(analysis)) => {
                Output::answer(&analysis.answer);
                Output::sources(&analysis.sources);
            }
            Ok(None) => Output::warning(EMPTY_TURN_MESSAGE),
            Err(e) => Output::error(&format!("Error: {}", e)),
        }
    }

    Output::info("Goodbye!");
    Ok(())
}

fn export_history(history: &ChatHistory, path: Option<PathBuf>, format: Option<&str>) {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_FILENAME));
    let format = match format {
        Some(f) => match f.parse::<ExportFormat>() {
            Ok(format) => format,
            Err(e) => {
                Output::error(&e);
                return;
            }
        },
        None => ExportFormat::from_path(&path),
    };

    match export_to_file(history.turns(), format, &path) {
        Ok(_) => Output::success(&format!("Exported {} turns to {}", history.len(), path.display())),
        Err(e) => Output::error(&format!("{}", e)),
    }
}
