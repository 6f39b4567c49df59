//! HTTP API for driving a study session from a browser front-end.
//!
//! # Endpoints
//!
//! - `GET /api/session` - Current session snapshot
//! - `POST /api/generate` - Run the generation pipeline
//! - `GET /api/history` - List past generations
//! - `DELETE /api/history` - Clear the history
//! - `GET /api/history/:id` - One full history record
//! - `POST /api/history/:id/select` - Reopen a past generation
//! - `GET /api/theme`, `PUT /api/theme` - Read or change the theme
//! - `POST /api/flashcards/flip` - Flip the current card
//! - `POST /api/flashcards/navigate` - Move to the previous/next card
//! - `POST /api/mcq/select` - Answer the current question
//! - `POST /api/mcq/next` - Advance to the next question
//! - `POST /api/mcq/restart` - Restart the quiz
//! - `GET /ws` - Event stream (see [`crate::events`])
//!
//! Errors are returned as `{"error": "..."}`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use studygen_core::{create_router, AppState, Config, FileStore, GeminiClient, GenerationPipeline};
//!
//! # async fn example() -> studygen_core::Result<()> {
//! let config = Config::load()?;
//! let client = Arc::new(GeminiClient::from_config(&config)?);
//! let pipeline = GenerationPipeline::new(client.clone(), client);
//! let storage = Arc::new(FileStore::new(config.data_path()));
//!
//! let router = create_router(AppState::new(config, storage, pipeline));
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await?;
//! axum::serve(listener, router).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::Config;
use crate::encoder;
use crate::error::{Result, StudyError};
use crate::events::{ws_handler, EventBroadcaster, StudyEvent};
use crate::history::HistoryStore;
use crate::model::{GenerationMode, HistoryRecord, InputKind, Theme};
use crate::pipeline::{GenerationInput, GenerationPipeline, GenerationRequest, ImageSource};
use crate::review::Direction;
use crate::session::{navigate_with_transition, SessionSnapshot, StudySession};
use crate::storage::KeyValueStore;

/// Longest history label returned by the listing endpoint.
const LABEL_MAX_CHARS: usize = 80;

// ============================================================================
// Request/Response Types
// ============================================================================

/// An image uploaded inline as base64.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageUpload {
    /// Base64-encoded image bytes.
    pub data: String,
    /// MIME type of the image.
    pub mime_type: String,
}

/// Request body for `POST /api/generate`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    /// Which input is being used; inferred from the fields when absent.
    #[serde(default)]
    pub input_kind: Option<InputKind>,
    /// Source text.
    #[serde(default)]
    pub text: Option<String>,
    /// Source image.
    #[serde(default)]
    pub image: Option<ImageUpload>,
    /// Generation mode; the session's current mode when absent.
    #[serde(default)]
    pub mode: Option<GenerationMode>,
    /// Whether to generate icons.
    #[serde(default)]
    pub generate_icons: bool,
}

/// One entry of `GET /api/history`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Record id.
    pub id: i64,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Text or image input.
    pub input_kind: InputKind,
    /// Flashcards or MCQs.
    pub mode: GenerationMode,
    /// Short single-line description.
    pub label: String,
    /// Number of items.
    pub items: usize,
    /// Theme at creation time.
    pub theme: Theme,
}

impl From<&HistoryRecord> for HistoryEntry {
    fn from(record: &HistoryRecord) -> Self {
        Self {
            id: record.id,
            timestamp: record.timestamp,
            input_kind: record.input_kind,
            mode: record.mode(),
            label: record.label(LABEL_MAX_CHARS),
            items: record.deck.len(),
            theme: record.theme,
        }
    }
}

/// Body of `PUT /api/theme` and response of both theme endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThemeBody {
    /// Theme name.
    pub theme: String,
}

/// Request body for `POST /api/flashcards/navigate`.
#[derive(Debug, Clone, Deserialize)]
pub struct NavigateBody {
    /// `-1` for the previous card, `1` for the next.
    pub direction: i64,
}

/// Request body for `POST /api/mcq/select`.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectOptionBody {
    /// The chosen option.
    pub option: String,
}

/// Error response body returned on failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Description of the error.
    pub error: String,
}

// ============================================================================
// Application State
// ============================================================================

/// Shared application state for the HTTP server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration.
    pub config: Config,
    /// The single user session.
    pub session: Arc<Mutex<StudySession>>,
    /// Past generations.
    pub history: Arc<Mutex<HistoryStore>>,
    /// The generation pipeline.
    pub pipeline: Arc<GenerationPipeline>,
    /// Event fan-out for WebSocket clients.
    pub broadcaster: EventBroadcaster,
}

impl AppState {
    /// Creates the state, loading history and theme from `storage`.
    #[must_use]
    pub fn new(
        config: Config,
        storage: Arc<dyn KeyValueStore>,
        pipeline: GenerationPipeline,
    ) -> Self {
        let session = StudySession::new(Arc::clone(&storage), config.default_mode);
        let history = HistoryStore::load(storage);
        Self {
            config,
            session: Arc::new(Mutex::new(session)),
            history: Arc::new(Mutex::new(history)),
            pipeline: Arc::new(pipeline),
            broadcaster: EventBroadcaster::default(),
        }
    }
}

// ============================================================================
// API Error Type
// ============================================================================

/// Error returned by handlers.
#[derive(Debug)]
enum ApiError {
    /// The request itself is unusable.
    BadRequest(String),
    /// A core operation failed.
    Study(StudyError),
}

impl From<StudyError> for ApiError {
    fn from(e: StudyError) -> Self {
        Self::Study(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Study(e) => {
                let status = match &e {
                    StudyError::EmptyInput { .. } | StudyError::Encoding { .. } => {
                        StatusCode::BAD_REQUEST
                    }
                    StudyError::RecordNotFound { .. } => StatusCode::NOT_FOUND,
                    StudyError::GenerationInProgress => StatusCode::CONFLICT,
                    e if e.is_pipeline_error() => StatusCode::BAD_GATEWAY,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, e.user_message())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

// ============================================================================
// Router Setup
// ============================================================================

/// Creates the HTTP router with every API route, the event stream, CORS and
/// request tracing.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/session", get(handle_session))
        .route("/generate", post(handle_generate))
        .route("/history", get(handle_list_history).delete(handle_clear_history))
        .route("/history/:id", get(handle_get_record))
        .route("/history/:id/select", post(handle_select_record))
        .route("/theme", get(handle_get_theme).put(handle_set_theme))
        .route("/flashcards/flip", post(handle_flip))
        .route("/flashcards/navigate", post(handle_navigate))
        .route("/mcq/select", post(handle_select_option))
        .route("/mcq/next", post(handle_next_question))
        .route("/mcq/restart", post(handle_restart_quiz));

    Router::new()
        .nest("/api", api_routes)
        .route("/ws", get(ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

async fn handle_session(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.lock().await.snapshot())
}

/// Handler for `POST /api/generate`.
///
/// Marks the session as loading, then runs the generation on its own task.
/// The task outlives the request, so a client that disconnects cannot leave
/// the session stuck in the loading state.
async fn handle_generate(
    State(state): State<AppState>,
    Json(body): Json<GenerateBody>,
) -> std::result::Result<Json<HistoryRecord>, ApiError> {
    let (mode, theme) = {
        let mut session = state.session.lock().await;
        session.begin_generation()?;
        let mode = body.mode.unwrap_or_else(|| session.mode());
        session.set_mode(mode);
        (mode, session.theme())
    };

    let task = tokio::spawn(run_generation(state.clone(), body, mode, theme));
    let outcome = match task.await {
        Ok(outcome) => outcome,
        Err(e) => {
            let outcome = Err(StudyError::TaskFailed {
                message: e.to_string(),
            });
            state.session.lock().await.complete_generation(&outcome);
            outcome
        }
    };

    Ok(Json(outcome?))
}

/// Runs the pipeline, records the outcome in the session and broadcasts it.
async fn run_generation(
    state: AppState,
    body: GenerateBody,
    mode: GenerationMode,
    theme: Theme,
) -> Result<HistoryRecord> {
    let generate_icons = body.generate_icons;
    let input = generation_input(body);
    state
        .broadcaster
        .send(StudyEvent::generation_started(mode, input_kind(&input), generate_icons));

    let outcome = match input {
        Ok(input) => {
            let request = GenerationRequest {
                input,
                mode,
                generate_icons,
            };
            state.pipeline.generate(request, &state.history, theme).await
        }
        Err(e) => Err(e),
    };

    state.session.lock().await.complete_generation(&outcome);

    match &outcome {
        Ok(record) => {
            state.broadcaster.send(StudyEvent::generation_completed(
                record.id,
                record.mode(),
                record.deck.len(),
            ));
        }
        Err(e) => {
            warn!(error = %e, "Generation failed");
            state
                .broadcaster
                .send(StudyEvent::generation_failed(e.user_message()));
        }
    }
    outcome
}

/// Turns the request body into pipeline input, decoding uploaded images.
fn generation_input(body: GenerateBody) -> Result<GenerationInput> {
    let kind = body.input_kind.unwrap_or(if body.image.is_some() {
        InputKind::Image
    } else {
        InputKind::Text
    });

    match kind {
        InputKind::Text => Ok(GenerationInput::Text(body.text.unwrap_or_default())),
        InputKind::Image => {
            let image = body
                .image
                .map(|upload| encoder::decode_upload(&upload.data, &upload.mime_type))
                .transpose()?;
            Ok(GenerationInput::Image(image.map(ImageSource::Encoded)))
        }
    }
}

const fn input_kind(input: &Result<GenerationInput>) -> InputKind {
    match input {
        Ok(input) => input.kind(),
        Err(_) => InputKind::Image,
    }
}

async fn handle_list_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    let history = state.history.lock().await;
    Json(history.records().iter().map(HistoryEntry::from).collect())
}

async fn handle_clear_history(State(state): State<AppState>) -> StatusCode {
    state.history.lock().await.clear().await;
    info!("History cleared");
    state.broadcaster.send(StudyEvent::HistoryCleared);
    StatusCode::NO_CONTENT
}

async fn handle_get_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> std::result::Result<Json<HistoryRecord>, ApiError> {
    let history = state.history.lock().await;
    Ok(Json(history.get(id)?.clone()))
}

async fn handle_select_record(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> std::result::Result<Json<SessionSnapshot>, ApiError> {
    let record = state.history.lock().await.get(id)?.clone();

    let mut session = state.session.lock().await;
    let previous_theme = session.theme();
    session.select_record(&record);
    if session.theme() != previous_theme {
        state.broadcaster.send(StudyEvent::theme_changed(session.theme()));
    }
    Ok(Json(session.snapshot()))
}

async fn handle_get_theme(State(state): State<AppState>) -> Json<ThemeBody> {
    let theme = state.session.lock().await.theme();
    Json(ThemeBody {
        theme: theme.to_string(),
    })
}

async fn handle_set_theme(
    State(state): State<AppState>,
    Json(body): Json<ThemeBody>,
) -> std::result::Result<Json<ThemeBody>, ApiError> {
    let theme: Theme = body.theme.parse().map_err(ApiError::BadRequest)?;
    state.session.lock().await.set_theme(theme);
    state.broadcaster.send(StudyEvent::theme_changed(theme));
    Ok(Json(ThemeBody {
        theme: theme.to_string(),
    }))
}

async fn handle_flip(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let mut session = state.session.lock().await;
    session.flip();
    Json(session.snapshot())
}

async fn handle_navigate(
    State(state): State<AppState>,
    Json(body): Json<NavigateBody>,
) -> std::result::Result<Json<SessionSnapshot>, ApiError> {
    let direction = Direction::try_from(body.direction).map_err(ApiError::BadRequest)?;
    navigate_with_transition(&state.session, direction).await;
    Ok(Json(state.session.lock().await.snapshot()))
}

async fn handle_select_option(
    State(state): State<AppState>,
    Json(body): Json<SelectOptionBody>,
) -> Json<SessionSnapshot> {
    let mut session = state.session.lock().await;
    session.select_option(body.option);
    Json(session.snapshot())
}

async fn handle_next_question(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let mut session = state.session.lock().await;
    session.next_question();
    Json(session.snapshot())
}

async fn handle_restart_quiz(State(state): State<AppState>) -> Json<SessionSnapshot> {
    let mut session = state.session.lock().await;
    session.restart_quiz();
    Json(session.snapshot())
}

// ============================================================================
// Tests
// ============================================================================
