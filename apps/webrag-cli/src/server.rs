//! HTTP host: `/health`, `/ingest` and `/ask` over one shared corpus.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use axum::extract::{ConnectInfo, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

use webrag_core::error::Error;
use webrag_core::traits::TextFetcher;
use webrag_gate::AccessGate;
use webrag_rag::RetrievalOrchestrator;

pub const MIN_QUESTION_CHARS: usize = 3;
pub const MAX_QUESTION_CHARS: usize = 1000;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: RetrievalOrchestrator,
    pub fetcher: Arc<dyn TextFetcher>,
    pub gate: Arc<AccessGate>,
}

#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    pub url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub chunks: usize,
    pub processing_time: f64,
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub question: String,
    pub processing_time: f64,
}

/// Error rendered as `{"error": ..., "timestamp": ...}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message, "timestamp": unix_timestamp() }))).into_response()
    }
}

/// `/ingest` and `/ask` pass through the gate; `/health` is never gated.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/ingest", post(ingest_handler))
        .route("/ask", post(ask_handler))
        .with_state(state)
}

/// Bind `addr` and serve until Ctrl-C, purging idle gate ledgers every
/// `purge_interval`.
pub async fn serve(state: AppState, addr: SocketAddr, purge_interval: Duration) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "webrag server listening");

    let gate = Arc::clone(&state.gate);
    let purger = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(purge_interval);
        loop {
            ticker.tick().await;
            gate.purge_idle(Instant::now());
        }
    });

    let result = axum::serve(listener, build_router(state).into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await;
    purger.abort();
    Ok(result?)
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": unix_timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn ingest_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    admit(&state.gate, peer)?;
    let url = validate_url(&req.url)?;
    let start = Instant::now();
    info!(url, "starting ingestion");

    let text = state.fetcher.fetch_text(url).await.map_err(|e| {
        error!(url, error = %format!("{e:#}"), "fetch failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Ingestion failed: {e}"))
    })?;
    if text.trim().is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Failed to scrape content from the provided URL"));
    }

    let orchestrator = state.orchestrator.clone();
    let chunks = tokio::task::spawn_blocking(move || orchestrator.ingest(&text))
        .await
        .map_err(|e| ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Ingestion failed: {e}")))?
        .map_err(|e| match e {
            Error::EmptyContent => ApiError::new(StatusCode::BAD_REQUEST, "No content could be extracted from the URL"),
            other => {
                error!(url, error = %other, "ingestion failed");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Ingestion failed: {other}"))
            }
        })?;

    let processing_time = start.elapsed().as_secs_f64();
    info!(url, chunks, processing_time, "ingestion finished");
    Ok(Json(IngestResponse { chunks, processing_time, url: url.to_string() }))
}

async fn ask_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, ApiError> {
    admit(&state.gate, peer)?;
    let question = validate_question(&req.question)?;
    let start = Instant::now();
    info!(question = %question.chars().take(100).collect::<String>(), "processing question");

    let answer = state.orchestrator.answer(question).await.map_err(|e| {
        error!(error = %e, "query failed");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, format!("Query failed: {e}"))
    })?;

    let processing_time = start.elapsed().as_secs_f64();
    info!(processing_time, "question answered");
    Ok(Json(AskResponse { answer, question: question.to_string(), processing_time }))
}

fn admit(gate: &AccessGate, peer: SocketAddr) -> Result<(), ApiError> {
    if gate.admit_now(&peer.ip().to_string()) {
        Ok(())
    } else {
        Err(ApiError::new(StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded. Please try again later."))
    }
}

/// Trimmed question, or 422 when it falls outside the accepted length.
pub fn validate_question(raw: &str) -> Result<&str, ApiError> {
    let question = raw.trim();
    let len = question.chars().count();
    if len < MIN_QUESTION_CHARS {
        return Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "Question must be at least 3 characters long"));
    }
    if len > MAX_QUESTION_CHARS {
        return Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "Question must be less than 1000 characters"));
    }
    Ok(question)
}

/// Accepts absolute `http`/`https` URLs with a host.
pub fn validate_url(raw: &str) -> Result<&str, ApiError> {
    let url = raw.trim();
    let valid = reqwest::Url::parse(url)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false);
    if valid {
        Ok(url)
    } else {
        Err(ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "url must be an absolute http or https URL"))
    }
}

fn unix_timestamp() -> f64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs_f64()).unwrap_or(0.0)
}
