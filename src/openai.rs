//! OpenAI-compatible client configuration.

use crate::config::{Credentials, ProviderSettings};
use crate::error::{Result, RoadSafeError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Create a client for the configured provider.
///
/// Requests are made once: the client's built-in retry on rate limits and server errors
/// is disabled, and no timeout applies unless `request_timeout_secs` is set.
pub fn create_client(
    provider: &ProviderSettings,
    credentials: &Credentials,
) -> Result<Client<OpenAIConfig>> {
    let mut config = OpenAIConfig::new();
    if let Some(key) = credentials.api_key() {
        config = config.with_api_key(key);
    }
    if let Some(base) = &provider.api_base {
        config = config.with_api_base(base.trim_end_matches('/'));
    }

    let mut builder = reqwest::Client::builder();
    if let Some(secs) = provider.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let http_client = builder
        .build()
        .map_err(|e| RoadSafeError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let no_retry = backoff::ExponentialBackoff {
        max_elapsed_time: Some(Duration::ZERO),
        ..Default::default()
    };

    Ok(Client::with_config(config)
        .with_http_client(http_client)
        .with_backoff(no_retry))
}
