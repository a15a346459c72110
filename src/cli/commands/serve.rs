//! HTTP API server.
//!
//! Exposes the turn handler over HTTP. Each session owns its own chat history, kept in
//! memory until it is deleted or the server stops.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::{Credentials, Settings};
use crate::export::{render, ExportFormat};
use crate::rag::{Analysis, Assistant};
use crate::sensor::{combine_sensor_text, SensorReadings};
use crate::session::{ChatHistory, ChatTurn};
use crate::vector_store::SearchResult;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

type SharedHistory = Arc<Mutex<ChatHistory>>;

/// Sessions idle for longer than this are dropped.
const SESSION_IDLE_TTL: Duration = Duration::from_secs(60 * 60);
/// Upper bound on live sessions; the least recently used one is dropped to make room.
const MAX_SESSIONS: usize = 1024;

struct SessionEntry {
    history: SharedHistory,
    last_used: Instant,
}

/// Shared application state.
struct AppState {
    assistant: Assistant,
    sessions: Mutex<HashMap<Uuid, SessionEntry>>,
    idle_ttl: Duration,
    max_sessions: usize,
}

impl AppState {
    fn new(assistant: Assistant) -> Self {
        Self {
            assistant,
            sessions: Mutex::new(HashMap::new()),
            idle_ttl: SESSION_IDLE_TTL,
            max_sessions: MAX_SESSIONS,
        }
    }

    async fn create_session(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.insert_session(id, ChatHistory::new()).await;
        id
    }

    async fn insert_session(&self, id: Uuid, history: ChatHistory) {
        let mut sessions = self.sessions.lock().await;
        let now = Instant::now();

        let before = sessions.len();
        sessions.retain(|_, entry| now.duration_since(entry.last_used) < self.idle_ttl);
        if sessions.len() < before {
            debug!("Evicted {} idle sessions", before - sessions.len());
        }

        while sessions.len() >= self.max_sessions.max(1) {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(id, _)| *id);
            match oldest {
                Some(oldest) => {
                    sessions.remove(&oldest);
                    debug!("Evicted least recently used session {}", oldest);
                }
                None => break,
            }
        }

        sessions.insert(
            id,
            SessionEntry {
                history: Arc::new(Mutex::new(history)),
                last_used: now,
            },
        );
        debug!("Session {} stored ({} live)", id, sessions.len());
    }

    async fn session(&self, id: &Uuid) -> Option<SharedHistory> {
        let mut sessions = self.sessions.lock().await;
        let entry = sessions.get_mut(id)?;
        if entry.last_used.elapsed() >= self.idle_ttl {
            sessions.remove(id);
            return None;
        }
        entry.last_used = Instant::now();
        Some(entry.history.clone())
    }
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/sessions", post(create_session))
        .route("/analyze", post(analyze))
        .route("/sessions/{id}", delete(delete_session))
        .route("/sessions/{id}/history", get(get_history))
        .route("/sessions/{id}/export", get(export_history))
        .layer(cors)
        .with_state(state)
}

/// Run the HTTP API server.
pub async fn run_serve(
    host: &str,
    port: u16,
    settings: &Settings,
    credentials: &Credentials,
) -> anyhow::Result<()> {
    if let Err(e) = preflight::check(Operation::Ask, settings, credentials) {
        Output::error(&format!("{}", e));
        Output::info("Run 'roadsafe doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let assistant = Assistant::from_settings(settings, credentials)?;
    let app = router(Arc::new(AppState::new(assistant)));

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("RoadSafe API Server");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET    /health");
    Output::kv("New session", "POST   /sessions");
    Output::kv("Analyze", "POST   /analyze");
    Output::kv("History", "GET    /sessions/{id}/history");
    Output::kv("Export", "GET    /sessions/{id}/export?format=pdf|json|text");
    Output::kv("End session", "DELETE /sessions/{id}");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}

// === Request/Response Types ===

#[derive(Deserialize)]
struct AnalyzeRequest {
    /// Existing session; a new one is created when absent.
    #[serde(default)]
    session_id: Option<Uuid>,
    #[serde(default)]
    query: Option<String>,
    /// Free-form sensor block.
    #[serde(default)]
    sensor_data: Option<String>,
    /// Structured readings, appended to the sensor block.
    #[serde(default)]
    sensors: SensorReadings,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    session_id: Uuid,
    answer: String,
    sources: Vec<SourceInfo>,
    turns: usize,
}

#[derive(Serialize)]
struct SourceInfo {
    row: usize,
    content: String,
    distance: f32,
}

impl From<&SearchResult> for SourceInfo {
    fn from(result: &SearchResult) -> Self {
        Self {
            row: result.document.row,
            content: result.document.content.clone(),
            distance: result.distance(),
        }
    }
}

#[derive(Serialize)]
struct SessionResponse {
    session_id: Uuid,
}

#[derive(Serialize)]
struct HistoryResponse {
    session_id: Uuid,
    turns: Vec<ChatTurn>,
}

#[derive(Deserialize)]
struct ExportParams {
    #[serde(default)]
    format: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
        .into_response()
}

fn session_not_found(id: &Uuid) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("Session not found: {}", id))
}

// === Handlers ===

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn create_session(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let session_id = state.create_session().await;
    (StatusCode::CREATED, Json(SessionResponse { session_id }))
}

async fn analyze(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AnalyzeRequest>,
) -> Response {
    let query = req.query.unwrap_or_default();
    let sensor = combine_sensor_text(req.sensor_data.as_deref(), &req.sensors);

    if query.trim().is_empty() && sensor.trim().is_empty() {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Please provide sensor data, a query, or both.",
        );
    }

    match req.session_id {
        Some(id) => match state.session(&id).await {
            Some(history) => {
                let mut history = history.lock().await;
                let result = state.assistant.handle(&mut history, &query, &sensor).await;
                analysis_response(id, result, history.len())
            }
            None => session_not_found(&id),
        },
        None => {
            // A session is only kept once its first turn succeeds.
            let mut history = ChatHistory::new();
            let id = Uuid::new_v4();
            let result = state.assistant.handle(&mut history, &query, &sensor).await;
            let turns = history.len();
            if matches!(result, Ok(Some(_))) {
                state.insert_session(id, history).await;
            }
            analysis_response(id, result, turns)
        }
    }
}

fn analysis_response(
    session_id: Uuid,
    result: crate::Result<Option<Analysis>>,
    turns: usize,
) -> Response {
    match result {
        Ok(Some(analysis)) => Json(AnalyzeResponse {
            session_id,
            answer: analysis.answer,
            sources: analysis.sources.iter().map(SourceInfo::from).collect(),
            turns,
        })
        .into_response(),
        Ok(None) => error_response(
            StatusCode::BAD_REQUEST,
            "Please provide sensor data, a query, or both.",
        ),
        Err(e) => {
            warn!("Analysis failed for session {}: {}", session_id, e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    let Some(history) = state.session(&id).await else {
        return session_not_found(&id);
    };
    let turns = history.lock().await.turns().to_vec();
    Json(HistoryResponse {
        session_id: id,
        turns,
    })
    .into_response()
}

async fn export_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Query(params): Query<ExportParams>,
) -> Response {
    let format = match params.format.as_deref().map(str::parse::<ExportFormat>) {
        None => ExportFormat::Pdf,
        Some(Ok(format)) => format,
        Some(Err(e)) => return error_response(StatusCode::BAD_REQUEST, e),
    };

    let Some(history) = state.session(&id).await else {
        return session_not_found(&id);
    };
    let turns = history.lock().await.turns().to_vec();

    match render(&turns, format) {
        Ok(bytes) => {
            let disposition = format!(
                "attachment; filename=\"road_safety_chat_history.{}\"",
                format.extension()
            );
            (
                [
                    (header::CONTENT_TYPE, format.content_type().to_string()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                bytes,
            )
                .into_response()
        }
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Response {
    match state.sessions.lock().await.remove(&id) {
        Some(_) => {
            info!("Deleted session {}", id);
            StatusCode::NO_CONTENT.into_response()
        }
        None => session_not_found(&id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PromptVariant, Prompts};
    use crate::rag::{Generator, PromptAssembler, Retriever};
    use crate::testing::{guideline_store, FailingGenerator, KeywordEmbedder, RecordingGenerator};
    use serde_json::{json, Value};

    async fn test_state(generator: Arc<dyn Generator>) -> Arc<AppState> {
        let keyword = KeywordEmbedder::new();
        let store = guideline_store(&keyword).await;
        let assistant = Assistant::new(
            Retriever::new(store, Arc::new(keyword)),
            PromptAssembler::new(Prompts::default(), PromptVariant::Strict, 2500),
            generator,
        );
        Arc::new(AppState::new(assistant))
    }

    async fn serve_state(state: Arc<AppState>) -> String {
        let app = router(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    async fn spawn_server(generator: Arc<dyn Generator>) -> String {
        serve_state(test_state(generator).await).await
    }

    async fn spawn_default() -> String {
        spawn_server(Arc::new(RecordingGenerator::new("Reduce speed."))).await
    }

    #[tokio::test]
    async fn test_health() {
        let base = spawn_default().await;
        let body: Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_analyze_empty_input_is_rejected() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/analyze", base))
            .json(&json!({ "query": "  ", "sensor_data": "" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_analyze_records_session_history() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();

        let created: Value = client
            .post(format!("{}/sessions", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let session_id = created["session_id"].as_str().unwrap().to_string();

        let response: Value = client
            .post(format!("{}/analyze", base))
            .json(&json!({
                "session_id": session_id,
                "query": "pothole on highway",
                "sensors": { "distance_m": 0.4 }
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(response["answer"], "Reduce speed.");
        assert_eq!(response["turns"], 3);
        assert_eq!(response["sources"].as_array().unwrap().len(), 3);
        assert_eq!(response["sources"][0]["row"], 0);

        let history: Value = client
            .get(format!("{}/sessions/{}/history", base, session_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let turns = history["turns"].as_array().unwrap();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[0]["role"], "user-query");
        assert_eq!(turns[1]["role"], "sensor-data");
        assert_eq!(turns[1]["text"], "Distance: 0.4");
        assert_eq!(turns[2]["role"], "bot-response");
    }

    #[tokio::test]
    async fn test_analyze_without_session_creates_one() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();

        let response: Value = client
            .post(format!("{}/analyze", base))
            .json(&json!({ "sensor_data": "PPM: 250" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(response["turns"], 2);
        assert!(Uuid::parse_str(response["session_id"].as_str().unwrap()).is_ok());
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();
        let id = Uuid::new_v4();

        let response = client
            .get(format!("{}/sessions/{}/history", base, id))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);

        let response = client
            .post(format!("{}/analyze", base))
            .json(&json!({ "session_id": id, "query": "fog" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_generation_returns_500_and_keeps_history() {
        let base = spawn_server(Arc::new(FailingGenerator)).await;
        let client = reqwest::Client::new();

        let created: Value = client
            .post(format!("{}/sessions", base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let session_id = created["session_id"].as_str().unwrap().to_string();

        let response = client
            .post(format!("{}/analyze", base))
            .json(&json!({ "session_id": session_id, "query": "fog" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);

        let history: Value = client
            .get(format!("{}/sessions/{}/history", base, session_id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(history["turns"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_and_delete() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();

        let response: Value = client
            .post(format!("{}/analyze", base))
            .json(&json!({ "query": "sharp turn" }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let session_id = response["session_id"].as_str().unwrap().to_string();

        let pdf = client
            .get(format!("{}/sessions/{}/export", base, session_id))
            .send()
            .await
            .unwrap();
        assert_eq!(pdf.headers()["content-type"], "application/pdf");
        assert!(pdf.bytes().await.unwrap().starts_with(b"%PDF-"));

        let text = client
            .get(format!("{}/sessions/{}/export?format=text", base, session_id))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert_eq!(text, "**User Query:** sharp turn\n\n**Bot:** Reduce speed.");

        let bad = client
            .get(format!("{}/sessions/{}/export?format=docx", base, session_id))
            .send()
            .await
            .unwrap();
        assert_eq!(bad.status(), reqwest::StatusCode::BAD_REQUEST);

        let deleted = client
            .delete(format!("{}/sessions/{}", base, session_id))
            .send()
            .await
            .unwrap();
        assert_eq!(deleted.status(), reqwest::StatusCode::NO_CONTENT);

        let gone = client
            .delete(format!("{}/sessions/{}", base, session_id))
            .send()
            .await
            .unwrap();
        assert_eq!(gone.status(), reqwest::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_turn_without_session_stores_nothing() {
        let state = test_state(Arc::new(FailingGenerator)).await;
        let base = serve_state(state.clone()).await;
        let client = reqwest::Client::new();

        for _ in 0..5 {
            let response = client
                .post(format!("{}/analyze", base))
                .json(&json!({ "query": "fog" }))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        }

        assert!(state.sessions.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_session_cap_evicts_least_recently_used() {
        let keyword = KeywordEmbedder::new();
        let store = guideline_store(&keyword).await;
        let assistant = Assistant::new(
            Retriever::new(store, Arc::new(keyword)),
            PromptAssembler::new(Prompts::default(), PromptVariant::Strict, 2500),
            Arc::new(RecordingGenerator::new("Reduce speed.")),
        );
        let state = AppState {
            max_sessions: 2,
            ..AppState::new(assistant)
        };

        let first = state.create_session().await;
        let second = state.create_session().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(state.session(&first).await.is_some());

        let third = state.create_session().await;
        let sessions = state.sessions.lock().await;
        assert_eq!(sessions.len(), 2);
        assert!(sessions.contains_key(&first));
        assert!(!sessions.contains_key(&second));
        assert!(sessions.contains_key(&third));
    }

    #[tokio::test]
    async fn test_idle_sessions_expire() {
        let keyword = KeywordEmbedder::new();
        let store = guideline_store(&keyword).await;
        let assistant = Assistant::new(
            Retriever::new(store, Arc::new(keyword)),
            PromptAssembler::new(Prompts::default(), PromptVariant::Strict, 2500),
            Arc::new(RecordingGenerator::new("Reduce speed.")),
        );
        let state = AppState {
            idle_ttl: Duration::from_millis(20),
            ..AppState::new(assistant)
        };

        let stale = state.create_session().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(state.session(&stale).await.is_none());

        let other = state.create_session().await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        state.create_session().await;
        let sessions = state.sessions.lock().await;
        assert!(!sessions.contains_key(&other));
        assert_eq!(sessions.len(), 1);
    }

    #[tokio::test]
    async fn test_analyze_accepts_integer_motion_reading() {
        let base = spawn_default().await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{}/analyze", base))
            .json(&json!({ "sensors": { "motion": 1, "ppm": 250 } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        let history: Value = client
            .get(format!(
                "{}/sessions/{}/history",
                base,
                body["session_id"].as_str().unwrap()
            ))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            history["turns"][0]["text"],
            "Motion Sensor (0 or 1): 1\nPPM: 250"
        );
    }
}
