//! The top-level turn handler.

use super::generation::{Generator, OpenAIGenerator};
use super::prompt::PromptAssembler;
use super::retrieval::Retriever;
use crate::config::{Credentials, Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::session::ChatHistory;
use crate::vector_store::{open_index, SearchResult};
use std::sync::Arc;
use tracing::{info, instrument};

/// Answer for one turn with the records it was grounded on.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

/// Runs retrieval, prompt assembly and generation for user turns.
///
/// Holds shared read-only handles; per-session state lives in the [`ChatHistory`] passed
/// to [`Assistant::handle`].
pub struct Assistant {
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: Arc<dyn Generator>,
}

impl Assistant {
    pub fn new(
        retriever: Retriever,
        assembler: PromptAssembler,
        generator: Arc<dyn Generator>,
    ) -> Self {
        Self {
            retriever,
            assembler,
            generator,
        }
    }

    /// Wire up the configured index, embedding model, prompt template and chat model.
    ///
    /// Fails if the index is missing or was built with a different embedding model.
    pub fn from_settings(settings: &Settings, credentials: &Credentials) -> Result<Self> {
        let vector_store = open_index(settings)?;
        let embedder = Arc::new(OpenAIEmbedder::from_settings(settings, credentials)?);
        let embedding_model = embedder.model().to_string();
        let retriever = Retriever::new(vector_store, embedder).with_top_k(settings.rag.top_k);

        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;
        let assembler =
            PromptAssembler::new(prompts, settings.rag.template, settings.rag.context_chars);

        let generator = Arc::new(OpenAIGenerator::from_settings(settings, credentials)?);

        info!(
            "Assistant ready ({} template, top {}, {} via {})",
            assembler.variant(),
            retriever.top_k(),
            generator.model(),
            embedding_model
        );
        Ok(Self::new(retriever, assembler, generator))
    }

    /// Analyze a query and/or a sensor block.
    ///
    /// Returns `Ok(None)` without retrieving or generating when both are blank. The query
    /// drives retrieval when present, otherwise the sensor block does. Blankness is judged
    /// on trimmed text; the text itself is used as given.
    #[instrument(skip_all)]
    pub async fn analyze(&self, query: &str, sensor_data: &str) -> Result<Option<Analysis>> {
        let has_query = !is_blank(query);
        let has_sensor_data = !is_blank(sensor_data);

        let retrieval_text = match (has_query, has_sensor_data) {
            (false, false) => return Ok(None),
            (true, _) => query,
            (false, true) => sensor_data,
        };

        info!(
            "Analyzing turn (query: {}, sensor data: {})",
            has_query, has_sensor_data
        );

        let sources = self.retriever.retrieve_default(retrieval_text).await?;
        let prompt = self.assembler.assemble(&sources, query, sensor_data);
        let answer = self.generator.generate(&prompt).await?;

        Ok(Some(Analysis { answer, sources }))
    }

    /// Analyze a turn and record it in `history`.
    ///
    /// History changes only when the turn succeeds: the query turn (if any), the sensor turn
    /// (if any), then the answer.
    pub async fn handle(
        &self,
        history: &mut ChatHistory,
        query: &str,
        sensor_data: &str,
    ) -> Result<Option<Analysis>> {
        let analysis = self.analyze(query, sensor_data).await?;

        if let Some(analysis) = &analysis {
            let query = Some(query).filter(|q| !is_blank(q));
            let sensor_data = Some(sensor_data).filter(|s| !is_blank(s));
            history.record_exchange(query, sensor_data, &analysis.answer);
        }

        Ok(analysis)
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PromptVariant, Prompts};
    use crate::session::Role;
    use crate::testing::{
        guideline_store, FailingGenerator, KeywordEmbedder, RecordingEmbedder,
        RecordingGenerator,
    };

    struct Harness {
        assistant: Assistant,
        embedder: Arc<RecordingEmbedder>,
        generator: Arc<RecordingGenerator>,
    }

    async fn harness() -> Harness {
        let keyword = KeywordEmbedder::new();
        let store = guideline_store(&keyword).await;
        let embedder = Arc::new(RecordingEmbedder::new(keyword));
        let generator = Arc::new(RecordingGenerator::new("Reduce speed (Ref: IRC:SP:73)"));

        let assistant = Assistant::new(
            Retriever::new(store, embedder.clone()).with_top_k(3),
            PromptAssembler::new(Prompts::default(), PromptVariant::Strict, 2500),
            generator.clone(),
        );

        Harness {
            assistant,
            embedder,
            generator,
        }
    }

    #[tokio::test]
    async fn test_empty_input_takes_no_action() {
        let h = harness().await;
        let mut history = ChatHistory::new();

        let result = h.assistant.handle(&mut history, "  ", "\n").await.unwrap();
        assert!(result.is_none());
        assert!(history.is_empty());
        assert!(h.embedder.texts().is_empty());
        assert_eq!(h.generator.calls(), 0);
    }

    #[tokio::test]
    async fn test_query_only_turn() {
        let h = harness().await;
        let mut history = ChatHistory::new();

        let analysis = h
            .assistant
            .handle(&mut history, "pothole on highway", "")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(h.embedder.texts(), vec!["pothole on highway".to_string()]);
        assert_eq!(h.generator.calls(), 1);
        assert_eq!(analysis.sources.len(), 3);

        let turns = history.turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, Role::UserQuery);
        assert_eq!(turns[0].text, "pothole on highway");
        assert_eq!(turns[1].role, Role::Bot);
        assert_eq!(turns[1].text, "Reduce speed (Ref: IRC:SP:73)");

        let prompt = &h.generator.prompts()[0];
        assert!(prompt.contains("pothole on highway"));
        assert!(prompt.contains("SENSOR DATA (may be absent):\nNot provided"));
    }

    #[tokio::test]
    async fn test_sensor_only_turn_retrieves_with_sensor_block() {
        let h = harness().await;
        let mut history = ChatHistory::new();
        let sensor = "Temperature: 20\nHumidity: 80\nPPM: 250";

        h.assistant.handle(&mut history, "", sensor).await.unwrap();

        assert_eq!(h.embedder.texts(), vec![sensor.to_string()]);
        let roles: Vec<Role> = history.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::SensorData, Role::Bot]);
        assert!(h.generator.prompts()[0].contains("USER QUERY (may be absent):\nNot provided"));
    }

    #[tokio::test]
    async fn test_user_text_is_used_as_given() {
        let h = harness().await;
        let mut history = ChatHistory::new();
        let sensor = "  Distance: 0.4\n  PPM: 250\n";

        h.assistant.handle(&mut history, "", sensor).await.unwrap();

        assert_eq!(h.embedder.texts(), vec![sensor.to_string()]);
        assert_eq!(history.turns()[0].role, Role::SensorData);
        assert_eq!(history.turns()[0].text, sensor);
        assert!(h.generator.prompts()[0].contains(sensor));

        let query = " pothole on highway ";
        h.assistant.handle(&mut history, query, "").await.unwrap();
        assert_eq!(h.embedder.texts()[1], query);
        assert_eq!(history.turns()[2].text, query);
    }

    #[tokio::test]
    async fn test_query_and_sensor_turn() {
        let h = harness().await;
        let mut history = ChatHistory::new();

        h.assistant
            .handle(&mut history, "fog on highway", "PPM: 250")
            .await
            .unwrap();

        assert_eq!(h.embedder.texts(), vec!["fog on highway".to_string()]);
        let roles: Vec<Role> = history.turns().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::UserQuery, Role::SensorData, Role::Bot]);
    }

    #[tokio::test]
    async fn test_failed_generation_leaves_history_unchanged() {
        let keyword = KeywordEmbedder::new();
        let store = guideline_store(&keyword).await;
        let assistant = Assistant::new(
            Retriever::new(store, Arc::new(keyword)),
            PromptAssembler::new(Prompts::default(), PromptVariant::Basic, 2500),
            Arc::new(FailingGenerator),
        );

        let mut history = ChatHistory::new();
        history.record_exchange(Some("earlier"), None, "earlier answer");

        assert!(assistant
            .handle(&mut history, "pothole", "")
            .await
            .is_err());
        assert_eq!(history.len(), 2);

        // The session is still usable after a failed turn.
        assert!(assistant.handle(&mut history, "", "").await.unwrap().is_none());
    }
}
