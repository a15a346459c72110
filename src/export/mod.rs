//! Transcript export.
//!
//! Formats:
//! - `pdf`: paginated document, one bold label per turn followed by wrapped text
//! - `json`: the turn list as serialized by [`ChatTurn`]
//! - `text`: a `**Label:** text` transcript

pub mod layout;
mod pdf;

pub use layout::{layout_history, Page, PlacedLine};
pub use pdf::render_pdf;

use crate::error::{Result, RoadSafeError};
use crate::session::ChatTurn;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// File name offered when the user does not pick one.
pub const DEFAULT_EXPORT_FILENAME: &str = "road_safety_chat_history.pdf";

/// Export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Pdf,
    Json,
    Text,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "pdf",
            ExportFormat::Json => "json",
            ExportFormat::Text => "txt",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Pdf => "application/pdf",
            ExportFormat::Json => "application/json",
            ExportFormat::Text => "text/plain; charset=utf-8",
        }
    }

    /// Guess the format from a file extension, defaulting to PDF.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(|e| e.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ExportFormat::Pdf),
            "json" => Ok(ExportFormat::Json),
            "text" | "txt" | "md" => Ok(ExportFormat::Text),
            _ => Err(format!(
                "Unknown export format: {}. Use 'pdf', 'json' or 'text'.",
                s
            )),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Pdf => write!(f, "pdf"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Text => write!(f, "text"),
        }
    }
}

/// Render the turns as a `**Label:** text` transcript.
pub fn render_text(turns: &[ChatTurn]) -> String {
    turns
        .iter()
        .map(|turn| format!("**{}:** {}", turn.role.label(), turn.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render the turns as pretty-printed JSON.
pub fn render_json(turns: &[ChatTurn]) -> Result<String> {
    Ok(serde_json::to_string_pretty(turns)?)
}

/// Render the turns in the given format.
pub fn render(turns: &[ChatTurn], format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Pdf => render_pdf(turns),
        ExportFormat::Json => Ok(render_json(turns)?.into_bytes()),
        ExportFormat::Text => Ok(render_text(turns).into_bytes()),
    }
}

/// Render the turns and write them to `path`.
pub fn export_to_file(turns: &[ChatTurn], format: ExportFormat, path: &Path) -> Result<usize> {
    if turns.is_empty() {
        return Err(RoadSafeError::Export(
            "Chat history is empty; nothing to export".to_string(),
        ));
    }

    let bytes = render(turns, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, &bytes)?;

    info!("Exported {} turns to {} ({})", turns.len(), path.display(), format);
    Ok(bytes.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ChatHistory, Role};

    fn history() -> ChatHistory {
        let mut history = ChatHistory::new();
        history.record_exchange(Some("fog ahead"), Some("PPM: 250"), "Use fog lamps.");
        history
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("PDF".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);
        assert_eq!("md".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!("docx".parse::<ExportFormat>().is_err());
        assert_eq!(
            ExportFormat::from_path(Path::new("chat.json")),
            ExportFormat::Json
        );
        assert_eq!(
            ExportFormat::from_path(Path::new(DEFAULT_EXPORT_FILENAME)),
            ExportFormat::Pdf
        );
        assert_eq!(ExportFormat::from_path(Path::new("chat")), ExportFormat::Pdf);
    }

    #[test]
    fn test_render_text() {
        assert_eq!(
            render_text(history().turns()),
            "**User Query:** fog ahead\n\n**Sensor Data:** PPM: 250\n\n**Bot:** Use fog lamps."
        );
    }

    #[test]
    fn test_render_json() {
        let json = render_json(history().turns()).unwrap();
        let parsed: Vec<ChatTurn> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].role, Role::SensorData);
        assert!(json.contains("\"bot-response\""));
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exports").join(DEFAULT_EXPORT_FILENAME);

        let written = export_to_file(history().turns(), ExportFormat::Pdf, &path).unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len() as usize, written);

        assert!(matches!(
            export_to_file(&[], ExportFormat::Text, &path),
            Err(RoadSafeError::Export(_))
        ));
    }
}
