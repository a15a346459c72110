//! Info command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::vector_store::{index_file, open_index};
use anyhow::Result;

/// Show the index location, build metadata and document count.
pub async fn run_info(settings: &Settings) -> Result<()> {
    if let Err(e) = preflight::check(Operation::Info, settings, &Credentials::default()) {
        Output::error(&format!("{}", e));
        return Err(e.into());
    }

    let store = open_index(settings)?;
    let count = store.document_count().await?;
    let path = index_file(&settings.index_dir(), settings.vector_store.provider);

    Output::header("Guideline Index");
    Output::kv("Location", &path.display().to_string());
    Output::kv("Backend", &settings.vector_store.provider.to_string());
    Output::kv("Documents", &count.to_string());

    if let Some(meta) = store.meta().await? {
        Output::kv("Source", &meta.source);
        Output::kv("Embedding model", &meta.embedding_model);
        Output::kv("Dimensions", &meta.dimensions.to_string());
        Output::kv(
            "Built",
            &meta.built_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        );
    }

    Output::header("Generation");
    Output::kv("Model", &settings.rag.model);
    Output::kv("Template", &settings.rag.template.to_string());
    Output::kv("Top K", &settings.rag.top_k.to_string());
    Output::kv("Context budget", &format!("{} chars", settings.rag.context_chars));

    Ok(())
}
