use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use webrag_core::traits::{AnswerComposer, Embedder};
use webrag_core::{ChunkingConfig, Error};
use webrag_embed::{FakeEmbedder, MINILM_DIM};
use webrag_rag::{RetrievalOrchestrator, NO_KNOWLEDGE_SENTINEL};
use webrag_vector::FlatIndex;

/// Counts of three weather words; easy to reason about distances.
struct WeatherEmbedder;

impl Embedder for WeatherEmbedder {
    fn dim(&self) -> usize { 3 }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0; 3];
                for word in t.split_whitespace().map(|w| w.trim_matches(|c: char| !c.is_alphanumeric())) {
                    match word {
                        "sun" => v[0] += 1.0,
                        "rain" => v[1] += 1.0,
                        "snow" => v[2] += 1.0,
                        _ => {}
                    }
                }
                v
            })
            .collect())
    }
}

struct BrokenEmbedder { dim: usize, mode: Broken }

enum Broken { Fails, ShortBatch, WrongDim }

impl Embedder for BrokenEmbedder {
    fn dim(&self) -> usize { self.dim }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        match self.mode {
            Broken::Fails => Err(anyhow!("model crashed")),
            Broken::ShortBatch => Ok(vec![vec![0.0; self.dim]; texts.len().saturating_sub(1)]),
            Broken::WrongDim => Ok(vec![vec![0.0; self.dim + 1]; texts.len()]),
        }
    }
}

/// Records what it was asked and answers with the context it received.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl AnswerComposer for Recorder {
    async fn compose(&self, context: &str, question: &str) -> anyhow::Result<String> {
        self.calls.lock().expect("lock").push((context.to_string(), question.to_string()));
        Ok(format!("ANSWER[{context}]"))
    }
}

struct Unreachable;

#[async_trait]
impl AnswerComposer for Unreachable {
    async fn compose(&self, _context: &str, _question: &str) -> anyhow::Result<String> {
        Err(anyhow!("connection refused"))
    }
}

fn weather(composer: Arc<dyn AnswerComposer>) -> RetrievalOrchestrator {
    let index = Arc::new(FlatIndex::new(3).expect("index"));
    RetrievalOrchestrator::new(index, Arc::new(WeatherEmbedder), composer).expect("orchestrator")
}

#[tokio::test]
async fn context_is_joined_in_ranked_order() {
    let recorder = Arc::new(Recorder::default());
    let orch = weather(recorder.clone()).with_context_size(2);
    for text in ["sun sun sun.", "rain.", "sun rain."] {
        assert_eq!(orch.ingest(text).expect("ingest"), 1);
    }

    let answer = orch.answer("Will there be sun?").await.expect("answer");
    assert_eq!(answer, "ANSWER[sun rain.\n\nrain.]");

    let calls = recorder.calls.lock().expect("lock");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1, "Will there be sun?");
}

#[tokio::test]
async fn context_size_is_clamped_to_corpus() {
    let recorder = Arc::new(Recorder::default());
    let orch = weather(recorder.clone());
    orch.ingest("snow.").expect("ingest");
    let answer = orch.answer_with("snow?", 10).await.expect("answer");
    assert_eq!(answer, "ANSWER[snow.]");
}

#[tokio::test]
async fn sentinel_skips_the_composer() {
    let recorder = Arc::new(Recorder::default());
    let orch = weather(recorder.clone());
    assert_eq!(orch.answer("anything?").await.expect("answer"), NO_KNOWLEDGE_SENTINEL);
    assert!(recorder.calls.lock().expect("lock").is_empty());
}

#[tokio::test]
async fn composer_failure_surfaces_as_compose_error() {
    let orch = weather(Arc::new(Unreachable));
    orch.ingest("rain rain.").expect("ingest");
    let err = orch.answer("rain?").await.unwrap_err();
    assert!(matches!(err, Error::Compose(ref msg) if msg.contains("connection refused")));
}

#[test]
fn failed_embedding_leaves_index_untouched() {
    for mode in [Broken::Fails, Broken::ShortBatch, Broken::WrongDim] {
        let index = Arc::new(FlatIndex::new(4).expect("index"));
        let orch = RetrievalOrchestrator::new(index.clone(), Arc::new(BrokenEmbedder { dim: 4, mode }), Arc::new(Recorder::default()))
            .expect("orchestrator")
            .with_chunking(ChunkingConfig::new(20, 5).expect("chunking"));
        let err = orch.ingest("First sentence here. Second sentence there. Third one too.").unwrap_err();
        assert!(matches!(err, Error::Embed(_) | Error::DimensionMismatch { .. }), "unexpected error: {err}");
        assert!(index.is_empty());
    }
}

#[test]
fn retrieve_with_fake_embeddings_finds_exact_chunk() {
    let index = Arc::new(FlatIndex::new(MINILM_DIM).expect("index"));
    let orch = RetrievalOrchestrator::new(index, Arc::new(FakeEmbedder::new(MINILM_DIM)), Arc::new(Recorder::default()))
        .expect("orchestrator");
    orch.ingest("Chickens need a dry coop and fresh water every day.").expect("ingest");
    orch.ingest("Tomatoes ripen faster in full sun with steady watering.").expect("ingest");

    let ranked = orch.retrieve("Tomatoes ripen faster in full sun with steady watering.", 5).expect("retrieve");
    assert_eq!(ranked.len(), 2);
    assert_eq!(&*ranked[0], "Tomatoes ripen faster in full sun with steady watering.");
}

#[test]
fn clones_share_one_corpus() {
    let orch = weather(Arc::new(Recorder::default()));
    let other = orch.clone();
    other.ingest("sun.").expect("ingest");
    assert_eq!(orch.index().len(), 1);
}
