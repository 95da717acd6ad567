use webrag_core::config::EmbeddingSettings;
use webrag_embed::{get_default_embedder, MINILM_DIM};

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force fake embedder to avoid loading model weights
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(&EmbeddingSettings::default()).expect("embedder");
    assert_eq!(embedder.dim(), MINILM_DIM);

    let texts = vec!["hello world".to_string(), "hello world".to_string(), "something else".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 3, "one vector per input");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), MINILM_DIM, "embedding dim is 384");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
    assert_ne!(embs[0], embs[2]);

    assert!(embedder.embed_batch(&[]).expect("empty batch").is_empty());
}
