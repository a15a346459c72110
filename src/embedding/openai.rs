//! OpenAI-compatible embeddings implementation.

use super::Embedder;
use crate::config::{Credentials, Settings};
use crate::error::{Result, RoadSafeError};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Embedding API batch limit.
const BATCH_SIZE: usize = 100;

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder from an existing client.
    pub fn new(client: Client<OpenAIConfig>, model: &str, dimensions: usize) -> Self {
        Self {
            client,
            model: model.to_string(),
            dimensions,
        }
    }

    /// Create an embedder for the configured provider and embedding model.
    pub fn from_settings(settings: &Settings, credentials: &Credentials) -> Result<Self> {
        let client = create_client(&settings.provider, credentials)?;
        Ok(Self::new(
            client,
            &settings.embedding.model,
            settings.embedding.dimensions as usize,
        ))
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| RoadSafeError::Embedding("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()))
                .dimensions(self.dimensions as u32)
                .build()
                .map_err(|e| RoadSafeError::Embedding(format!("Failed to build request: {}", e)))?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| RoadSafeError::OpenAI(format!("Embedding API error: {}", e)))?;

            if response.data.len() != chunk.len() {
                return Err(RoadSafeError::Embedding(format!(
                    "Requested {} embeddings, received {}",
                    chunk.len(),
                    response.data.len()
                )));
            }

            // Sort by index to ensure correct order
            let mut embeddings: Vec<_> = response.data.into_iter().collect();
            embeddings.sort_by_key(|e| e.index);

            for embedding_data in embeddings {
                if embedding_data.embedding.len() != self.dimensions {
                    return Err(RoadSafeError::Embedding(format!(
                        "Model {} returned {} dimensions, expected {}",
                        self.model,
                        embedding_data.embedding.len(),
                        self.dimensions
                    )));
                }
                all_embeddings.push(embedding_data.embedding);
            }
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderSettings;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn embedder_for(server: &MockServer, dimensions: usize) -> OpenAIEmbedder {
        let provider = ProviderSettings {
            api_base: Some(server.uri()),
            ..Default::default()
        };
        let client = create_client(&provider, &Credentials::with_api_key("sk-test")).unwrap();
        OpenAIEmbedder::new(client, "test-embed", dimensions)
    }

    fn embedding_response(vectors: &[(u32, Vec<f32>)]) -> serde_json::Value {
        json!({
            "object": "list",
            "model": "test-embed",
            "data": vectors
                .iter()
                .map(|(index, v)| json!({ "object": "embedding", "index": index, "embedding": v }))
                .collect::<Vec<_>>(),
            "usage": { "prompt_tokens": 4, "total_tokens": 4 }
        })
    }

    #[tokio::test]
    async fn test_embed_batch_orders_by_index() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "test-embed", "dimensions": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[
                (1, vec![0.0, 1.0]),
                (0, vec![1.0, 0.0]),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = embedder_for(&server, 2);
        let vectors = embedder
            .embed_batch(&["fog".to_string(), "pothole".to_string()])
            .await
            .unwrap();

        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
        assert_eq!(embedder.model(), "test-embed");
    }

    #[tokio::test]
    async fn test_embed_rejects_wrong_dimensions() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(embedding_response(&[(0, vec![1.0, 0.0, 0.0])])),
            )
            .mount(&server)
            .await;

        let embedder = embedder_for(&server, 2);
        let err = embedder.embed("fog").await.unwrap_err();
        assert!(matches!(err, RoadSafeError::Embedding(_)));
    }

    #[tokio::test]
    async fn test_embed_propagates_provider_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "invalid_api_key"
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let embedder = embedder_for(&server, 2);
        let err = embedder.embed("fog").await.unwrap_err();
        assert!(matches!(err, RoadSafeError::OpenAI(_)));
    }

    #[tokio::test]
    async fn test_empty_batch_makes_no_request() {
        let server = MockServer::start().await;
        let embedder = embedder_for(&server, 2);
        assert!(embedder.embed_batch(&[]).await.unwrap().is_empty());
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }
}
