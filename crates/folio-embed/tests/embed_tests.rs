use folio_core::config::EmbeddingSettings;
use folio_core::traits::Embedder;
use folio_core::Error;
use folio_embed::{get_default_embedder, model_fingerprint, EmbeddingModel, FakeEmbedder};

fn cosine(a: &[f32], b: &[f32]) -> f32 { a.iter().zip(b).map(|(x, y)| x * y).sum() }

#[test]
fn fake_embedder_shapes_and_determinism() {
    let settings = EmbeddingSettings { use_fake: true, fake_dim: 384, ..EmbeddingSettings::default() };
    let embedder = get_default_embedder(&settings).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384);
    assert_eq!(embedder.dim(), 384);
    assert_eq!(embedder.embedder_id(), "fake:d384");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn fake_embedder_prefers_shared_tokens() {
    let e = FakeEmbedder::new(256);
    let v = e
        .embed_batch(&[
            "Rust compiler engineer".to_string(),
            "rust compiler".to_string(),
            "gardening and baking bread".to_string(),
        ])
        .unwrap();
    assert!(cosine(&v[0], &v[1]) > cosine(&v[0], &v[2]));
}

#[test]
fn fake_embedder_handles_empty_text() {
    let e = FakeEmbedder::new(8);
    let v = e.embed_batch(&[String::new()]).unwrap();
    let norm: f32 = v[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-6);
}

#[test]
fn missing_model_dir_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let err = EmbeddingModel::load(tmp.path(), 128).err().expect("load must fail");
    assert!(matches!(err, Error::NotFound(_)));
}

fn model_dir(weights_name: &str, weights: &[u8]) -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("config.json"), br#"{"hidden_size": 384}"#).unwrap();
    std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();
    std::fs::write(tmp.path().join(weights_name), weights).unwrap();
    tmp
}

#[test]
fn fingerprint_covers_the_weights() {
    let base = model_dir("model.safetensors", b"weights v1");
    let same = model_dir("model.safetensors", b"weights v1");
    let tuned = model_dir("model.safetensors", b"weights v2");

    let id = model_fingerprint(base.path()).unwrap();
    assert_eq!(id, model_fingerprint(same.path()).unwrap());
    assert_ne!(id, model_fingerprint(tuned.path()).unwrap());

    let pickled = model_dir("pytorch_model.bin", b"weights v1");
    assert_eq!(id, model_fingerprint(pickled.path()).unwrap(), "same bytes, same fingerprint");
}

#[test]
fn fingerprint_requires_weights() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("config.json"), b"{}").unwrap();
    std::fs::write(tmp.path().join("tokenizer.json"), b"{}").unwrap();
    assert!(matches!(model_fingerprint(tmp.path()), Err(Error::NotFound(_))));
}
