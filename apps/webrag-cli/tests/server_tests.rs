use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use webrag_cli::server::{build_router, AppState};
use webrag_core::traits::{AnswerComposer, TextFetcher};
use webrag_embed::{FakeEmbedder, MINILM_DIM};
use webrag_gate::AccessGate;
use webrag_rag::{RetrievalOrchestrator, NO_KNOWLEDGE_SENTINEL};
use webrag_vector::FlatIndex;

struct CannedPages(HashMap<&'static str, &'static str>);

#[async_trait]
impl TextFetcher for CannedPages {
    async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        Ok(self.0.get(url).map(|s| s.to_string()).unwrap_or_default())
    }
}

struct EchoContext;

#[async_trait]
impl AnswerComposer for EchoContext {
    async fn compose(&self, context: &str, _question: &str) -> anyhow::Result<String> {
        Ok(format!("from context: {context}"))
    }
}

const GARDEN_URL: &str = "https://example.org/garden";
const EMPTY_URL: &str = "https://example.org/blocked";

async fn spawn_server(max_requests: usize) -> String {
    let index = Arc::new(FlatIndex::new(MINILM_DIM).expect("index"));
    let orchestrator = RetrievalOrchestrator::new(index, Arc::new(FakeEmbedder::new(MINILM_DIM)), Arc::new(EchoContext))
        .expect("orchestrator");
    let pages = HashMap::from([
        (GARDEN_URL, "Raised beds warm up early in spring. Compost feeds the soil all season."),
        (EMPTY_URL, ""),
    ]);
    let state = AppState {
        orchestrator,
        fetcher: Arc::new(CannedPages(pages)),
        gate: Arc::new(AccessGate::new(max_requests, Duration::from_secs(60))),
    };

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, build_router(state).into_make_service_with_connect_info::<SocketAddr>())
            .await
            .expect("serve");
    });
    format!("http://{addr}")
}

async fn post(base: &str, path: &str, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new().post(format!("{base}{path}")).json(&body).send().await.expect("request");
    let status = response.status().as_u16();
    (status, response.json().await.expect("json body"))
}

#[tokio::test]
async fn health_reports_healthy() {
    let base = spawn_server(10).await;
    let body: Value = reqwest::get(format!("{base}/health")).await.expect("get").json().await.expect("json");
    assert_eq!(body["status"], "healthy");
    assert!(body["timestamp"].as_f64().expect("timestamp") > 0.0);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn ask_before_ingest_returns_sentinel() {
    let base = spawn_server(10).await;
    let (status, body) = post(&base, "/ask", json!({ "question": "  what grows here?  " })).await;
    assert_eq!(status, 200);
    assert_eq!(body["answer"], NO_KNOWLEDGE_SENTINEL);
    assert_eq!(body["question"], "what grows here?");
}

#[tokio::test]
async fn ingest_then_ask_uses_fetched_text() {
    let base = spawn_server(10).await;
    let (status, body) = post(&base, "/ingest", json!({ "url": GARDEN_URL })).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["chunks"], 1);
    assert_eq!(body["url"], GARDEN_URL);
    assert!(body["processing_time"].is_number());

    let (status, body) = post(&base, "/ask", json!({ "question": "When do raised beds warm up?" })).await;
    assert_eq!(status, 200);
    let answer = body["answer"].as_str().expect("answer");
    assert!(answer.starts_with("from context: "));
    assert!(answer.contains("Compost feeds the soil"));
}

#[tokio::test]
async fn empty_page_is_a_bad_request() {
    let base = spawn_server(10).await;
    let (status, body) = post(&base, "/ingest", json!({ "url": EMPTY_URL })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Failed to scrape content from the provided URL");
    assert!(body["timestamp"].is_number());
}

#[tokio::test]
async fn invalid_input_is_rejected() {
    let base = spawn_server(10).await;
    let (status, _) = post(&base, "/ask", json!({ "question": " hi " })).await;
    assert_eq!(status, 422);
    let (status, _) = post(&base, "/ingest", json!({ "url": "file:///etc/passwd" })).await;
    assert_eq!(status, 422);
}

#[tokio::test]
async fn gate_limits_each_client() {
    let base = spawn_server(2).await;
    for _ in 0..2 {
        let (status, _) = post(&base, "/ask", json!({ "question": "anything stored?" })).await;
        assert_eq!(status, 200);
    }
    let (status, body) = post(&base, "/ask", json!({ "question": "anything stored?" })).await;
    assert_eq!(status, 429);
    assert_eq!(body["error"], "Rate limit exceeded. Please try again later.");

    let health = reqwest::get(format!("{base}/health")).await.expect("get");
    assert_eq!(health.status().as_u16(), 200, "health is not gated");
}
