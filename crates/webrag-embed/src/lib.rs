//! webrag-embed
//!
//! Sentence embeddings for chunks and questions. The default model is
//! all-MiniLM-L6-v2 (BERT, 384 dimensions) run through candle with masked mean
//! pooling and L2 normalization. `APP_USE_FAKE_EMBEDDINGS=1` swaps in a
//! deterministic hashing embedder so tests and development never load weights.

use anyhow::{anyhow, ensure, Result};
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use webrag_core::config::{expand_path, EmbeddingSettings};
use webrag_core::traits::Embedder;

pub mod pool;
pub mod tokenize;

pub use pool::masked_mean_l2;
pub use tokenize::tokenize_batch;

/// Output dimension of all-MiniLM-L6-v2.
pub const MINILM_DIM: usize = 384;

const DEFAULT_MODEL_DIR: &str = "models/all-MiniLM-L6-v2";
const SLOW_BATCH_MS: u128 = 500;

pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    max_len: usize,
    batch_size: usize,
}

impl MiniLmEmbedder {
    /// Load tokenizer, config and weights from `model_dir`.
    ///
    /// Weights are read from `model.safetensors`, falling back to
    /// `pytorch_model.bin`.
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let (device, device_name) = select_device();
        info!(model_dir = %model_dir.display(), device = device_name, "loading sentence embedder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;

        let config_raw = std::fs::read_to_string(model_dir.join("config.json"))?;
        let dim = serde_json::from_str::<serde_json::Value>(&config_raw)?
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;
        let config: BertConfig = serde_json::from_str(&config_raw)?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        info!(dim, max_len, "sentence embedder ready");
        Ok(Self { model, tokenizer, device, dim, max_len, batch_size: batch_size.max(1) })
    }

    fn embed_rows(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for MiniLmEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let start = Instant::now();
            let rows = self.embed_rows(batch)?;
            let elapsed = start.elapsed().as_millis();
            if elapsed > SLOW_BATCH_MS { warn!(rows = batch.len(), elapsed_ms = elapsed, "slow embedding batch"); }
            else { debug!(rows = batch.len(), elapsed_ms = elapsed, "embedded batch"); }
            out.extend(rows);
        }
        ensure!(out.len() == texts.len(), "embedder returned {} vectors for {} texts", out.len(), texts.len());
        Ok(out)
    }
}

/// Metal when built with the `metal` feature and a GPU is present, else CPU.
fn select_device() -> (Device, &'static str) {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            return (dev, "metal");
        }
    }
    (Device::Cpu, "cpu")
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return Ok(weights.into_iter().collect());
    }
    Err(anyhow!("No model weights found in {}", model_dir.display()))
}

/// Token-hashing embedder: deterministic, normalized, and cheap.
///
/// Texts sharing words land close together, which is enough to exercise
/// ranking without a real model.
pub struct FakeEmbedder { dim: usize }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim: dim.max(1) } }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        info!("using FakeEmbedder");
        return Ok(Box::new(FakeEmbedder::new(MINILM_DIM)));
    }
    let model_dir = resolve_model_dir(settings)?;
    Ok(Box::new(MiniLmEmbedder::load(&model_dir, settings.max_len, settings.batch_size)?))
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() { debug!(var, path = %p.display(), "model dir from env"); return Ok(p); }
        }
    }
    if let Some(dir) = &settings.model_dir {
        let p = expand_path(dir);
        if p.exists() { return Ok(p); }
        warn!(path = %p.display(), "configured embedding.model_dir does not exist");
    }
    for candidate in [DEFAULT_MODEL_DIR, "../models/all-MiniLM-L6-v2"] {
        let p = Path::new(candidate);
        if p.exists() { return Ok(p.to_path_buf()); }
    }
    Err(anyhow!("Could not locate the all-MiniLM-L6-v2 model directory"))
}
