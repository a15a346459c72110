//! Ask command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::{Output, SensorArgs};
use crate::config::{Credentials, Settings};
use crate::export::{export_to_file, ExportFormat};
use crate::rag::Assistant;
use crate::sensor::combine_sensor_text;
use crate::session::ChatHistory;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// Inputs for a single ask turn.
#[derive(Debug, Default)]
pub struct AskRequest {
    pub query: Option<String>,
    pub sensor: Option<String>,
    pub sensor_file: Option<PathBuf>,
    pub readings: SensorArgs,
    pub export: Option<PathBuf>,
    pub format: Option<String>,
}

impl AskRequest {
    /// The sensor block: inline text or file contents, followed by flag readings.
    fn sensor_text(&self) -> Result<String> {
        let block = match (&self.sensor, &self.sensor_file) {
            (Some(text), _) => Some(text.clone()),
            (None, Some(path)) => Some(std::fs::read_to_string(path)?),
            (None, None) => None,
        };
        Ok(combine_sensor_text(
            block.as_deref(),
            &self.readings.to_readings(),
        ))
    }

    fn export_format(&self, path: &Path) -> Result<ExportFormat> {
        match &self.format {
            Some(f) => f.parse().map_err(|e: String| anyhow::anyhow!(e)),
            None => Ok(ExportFormat::from_path(path)),
        }
    }
}

/// Run the ask command.
pub async fn run_ask(request: AskRequest, settings: &Settings, credentials: &Credentials) -> Result<()> {
    let query = request.query.clone().unwrap_or_default();
    let sensor = request.sensor_text()?;

    if query.trim().is_empty() && sensor.trim().is_empty() {
        Output::warning("Please provide sensor data, a query, or both.");
        return Ok(());
    }

    if let Err(e) = preflight::check(Operation::Ask, settings, credentials) {
        Output::error(&format!("{}", e));
        Output::info("Run 'roadsafe doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let assistant = Assistant::from_settings(settings, credentials)?;
    let mut history = ChatHistory::new();

    let spinner = Output::spinner("Analyzing road conditions...");
    let result = assistant.handle(&mut history, &query, &sensor).await;
    spinner.finish_and_clear();

    let analysis = match result {
        Ok(Some(analysis)) => analysis,
        Ok(None) => return Ok(()),
        Err(e) => {
            Output::error(&format!("Failed to generate recommendation: {}", e));
            return Err(e.into());
        }
    };

    Output::answer(&analysis.answer);
    Output::sources(&analysis.sources);

    if let Some(path) = &request.export {
        let format = request.export_format(path)?;
        export_to_file(history.turns(), format, path)?;
        Output::success(&format!("Exported to {}", path.display()));
    }

    Ok(())
}
