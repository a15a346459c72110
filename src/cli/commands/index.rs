//! Index command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::embedding::OpenAIEmbedder;
use crate::indexer::IndexBuilder;
use crate::vector_store::{create_index, index_file};
use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

/// Run the index command.
pub async fn run_index(input: &Path, settings: &Settings, credentials: &Credentials) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Index, settings, credentials) {
        Output::error(&format!("{}", e));
        Output::info("Run 'roadsafe doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let embedder = Arc::new(OpenAIEmbedder::from_settings(settings, credentials)?);
    let store = create_index(settings)?;
    let builder = IndexBuilder::new(embedder, store);

    let spinner = Output::spinner(&format!("Indexing {}...", input.display()));
    let report = match builder.build(input).await {
        Ok(report) => report,
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Indexing failed: {}", e));
            return Err(e.into());
        }
    };
    spinner.finish_and_clear();

    Output::success(&format!(
        "Indexed {} guideline records",
        report.documents_indexed
    ));
    if report.documents_replaced > 0 {
        Output::info(&format!(
            "Replaced the previous index ({} records)",
            report.documents_replaced
        ));
    }
    Output::kv("Embedding model", &report.meta.embedding_model);
    Output::kv("Dimensions", &report.meta.dimensions.to_string());
    Output::kv(
        "Index",
        &index_file(&settings.index_dir(), settings.vector_store.provider)
            .display()
            .to_string(),
    );

    Ok(())
}
