//! HTTP API over a single shared [`Session`].
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/files` | Upload a file as `{ name, content_base64 }` |
//! | `POST` | `/search` | Ranked chunks for `{ query, top_k? }` |
//! | `POST` | `/ask` | Answer `{ question }` from tables or documents |
//! | `GET`  | `/history` | Conversation so far |
//! | `POST` | `/reset` | Drop uploads, index, and history |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "no_documents", "message": "Upload a file first" } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `extraction_failed`, `no_documents` | 400 |
//! | `upstream_error` | 502 |
//! | `answer_unavailable` | 503 |
//! | `timeout` | 504 |
//!
//! The session mutex is held only for local work; it is released while the
//! model request is in flight so uploads and searches are not blocked. A
//! `/reset` during that window wins: the reply is still returned to the
//! caller but is not written into the cleared history.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::answer::{create_generator, AnswerError, DisabledGenerator};
use crate::config::Config;
use crate::index::ScoredChunk;
use crate::models::{Message, Role};
use crate::session::{IngestReport, Route, Session, SessionError};
use crate::traits::AnswerGenerator;

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    generator: Arc<dyn AnswerGenerator>,
}

/// Starts the HTTP server with the generator selected by `[answer]`.
///
/// A generator that cannot be built (for example a missing API key) is
/// logged and replaced by [`DisabledGenerator`]; `/ask` then answers 503
/// for document questions while table questions keep working.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let generator: Arc<dyn AnswerGenerator> = match create_generator(&config.answer) {
        Ok(generator) => Arc::from(generator),
        Err(e) => {
            tracing::warn!("answer generation unavailable: {}", e);
            Arc::new(DisabledGenerator)
        }
    };
    run_server_with_generator(config, generator).await
}

/// Starts the HTTP server with a caller-supplied [`AnswerGenerator`].
///
/// # Example
///
/// ```rust,no_run
/// use docqa::answer::DisabledGenerator;
/// use docqa::server::run_server_with_generator;
/// use std::sync::Arc;
///
/// # async fn example(config: &docqa::config::Config) -> anyhow::Result<()> {
/// run_server_with_generator(config, Arc::new(DisabledGenerator)).await?;
/// # Ok(())
/// # }
/// ```
pub async fn run_server_with_generator(
    config: &Config,
    generator: Arc<dyn AnswerGenerator>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState {
        session: Arc::new(Mutex::new(Session::new(config))),
        generator,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/files", post(handle_upload))
        .route("/search", post(handle_search))
        .route("/ask", post(handle_ask))
        .route("/history", get(handle_history))
        .route("/reset", post(handle_reset))
        .layer(cors)
        .with_state(state);

    println!("docqa server listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn app_error(status: StatusCode, code: &str, message: impl Into<String>) -> AppError {
    AppError {
        status,
        code: code.to_string(),
        message: message.into(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    app_error(StatusCode::BAD_REQUEST, "bad_request", message)
}

impl From<AnswerError> for AppError {
    fn from(err: AnswerError) -> Self {
        let message = err.to_string();
        match err {
            AnswerError::Disabled | AnswerError::MissingApiKey(_) => {
                app_error(StatusCode::SERVICE_UNAVAILABLE, "answer_unavailable", message)
            }
            AnswerError::Timeout(_) => app_error(StatusCode::GATEWAY_TIMEOUT, "timeout", message),
            AnswerError::Http(_)
            | AnswerError::Status { .. }
            | AnswerError::MalformedResponse(_) => {
                app_error(StatusCode::BAD_GATEWAY, "upstream_error", message)
            }
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::NoDocuments => {
                app_error(StatusCode::BAD_REQUEST, "no_documents", message)
            }
            SessionError::Extract(_) => {
                app_error(StatusCode::BAD_REQUEST, "extraction_failed", message)
            }
            SessionError::Core(_) => bad_request(message),
            SessionError::Answer(e) => e.into(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /files ============

#[derive(Deserialize)]
struct UploadRequest {
    name: String,
    content_base64: String,
}

async fn handle_upload(
    State(state): State<AppState>,
    Json(req): Json<UploadRequest>,
) -> Result<Json<IngestReport>, AppError> {
    if req.name.trim().is_empty() {
        return Err(bad_request("name must not be empty"));
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.content_base64.trim())
        .map_err(|e| bad_request(format!("content_base64 is not valid base64: {}", e)))?;

    let report = state.session.lock().await.ingest(&req.name, &bytes)?;
    Ok(Json(report))
}

// ============ POST /search ============

#[derive(Deserialize)]
struct SearchRequest {
    query: String,
    top_k: Option<usize>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<ScoredChunk>,
}

async fn handle_search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Json<SearchResponse> {
    let session = state.session.lock().await;
    let top_k = req.top_k.unwrap_or_else(|| session.top_k());
    Json(SearchResponse {
        results: session.index().search_scored(&req.query, top_k),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    route: &'static str,
    /// Chunks given to the model; empty for table answers.
    context: Vec<String>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }

    let (route, generation) = {
        let mut session = state.session.lock().await;
        let route = session.route(question)?;
        session.record(Role::User, question);
        (route, session.generation())
    };

    let (answer, context) = match &route {
        Route::Table(answer) => (answer.clone(), Vec::new()),
        Route::Documents(context) => {
            let answer = state.generator.generate(context, question).await?;
            (answer, context.clone())
        }
    };

    let mut session = state.session.lock().await;
    if session.generation() == generation {
        session.record(Role::Assistant, answer.clone());
    } else {
        tracing::debug!("session was reset during the model call; reply not recorded");
    }
    drop(session);

    Ok(Json(AskResponse {
        answer,
        route: route.kind(),
        context,
    }))
}

// ============ GET /history ============

#[derive(Serialize)]
struct HistoryResponse {
    messages: Vec<Message>,
}

async fn handle_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    let messages = state.session.lock().await.history().to_vec();
    Json(HistoryResponse { messages })
}

// ============ POST /reset ============

async fn handle_reset(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.session.lock().await.clear();
    Json(serde_json::json!({ "status": "ok" }))
}
