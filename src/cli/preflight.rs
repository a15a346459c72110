//! Pre-flight checks before expensive operations.
//!
//! Validates that required configuration is available before starting operations that
//! would otherwise fail midway.

use crate::config::{Credentials, Settings, StoreBackend};
use crate::error::{Result, RoadSafeError};
use crate::vector_store::index_file;

/// Requirements for different operations.
#[derive(Debug, Clone, Copy)]
pub enum Operation {
    /// Building the index requires the API key.
    Index,
    /// Answering requires the API key and a built index.
    Ask,
    /// Inspecting the index requires only the index.
    Info,
}

/// Run pre-flight checks for the given operation.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(operation: Operation, settings: &Settings, credentials: &Credentials) -> Result<()> {
    match operation {
        Operation::Index => {
            check_api_key(settings, credentials)?;
        }
        Operation::Ask => {
            check_api_key(settings, credentials)?;
            check_index(settings)?;
        }
        Operation::Info => {
            check_index(settings)?;
        }
    }
    Ok(())
}

/// Check that the provider API key was found at startup.
fn check_api_key(settings: &Settings, credentials: &Credentials) -> Result<()> {
    if credentials.is_present() {
        return Ok(());
    }
    let var = &settings.provider.api_key_env;
    Err(RoadSafeError::Config(format!(
        "{} not set. Set it with: export {}='sk-...' (or add it to a .env file)",
        var, var
    )))
}

/// Check that the index file exists for the configured backend.
fn check_index(settings: &Settings) -> Result<()> {
    let backend: StoreBackend = settings.vector_store.provider;
    let path = index_file(&settings.index_dir(), backend);
    if path.exists() {
        Ok(())
    } else {
        Err(RoadSafeError::IndexNotFound(path.display().to_string()))
    }
}
