//! Sentence embeddings for the knowledge index.
//!
//! [`EmbeddingModel`] runs a BERT-family sentence encoder (the
//! all-MiniLM-L6-v2 layout) with candle and mean-pools the token states.
//! [`FakeEmbedder`] hashes tokens into a fixed-size vector and is used in
//! tests and development when `APP_USE_FAKE_EMBEDDINGS=1`.

pub mod device;
pub mod pool;
pub mod tokenize;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use tokenizers::Tokenizer;

use folio_core::config::EmbeddingSettings;
use folio_core::traits::Embedder;
use folio_core::{Error, Result};

pub use pool::masked_mean_l2;

const BATCH_SIZE: usize = 32;

pub(crate) fn candle_err(e: candle_core::Error) -> Error {
    Error::EmbeddingService(e.to_string())
}

pub struct EmbeddingModel {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    pad_id: u32,
}

impl EmbeddingModel {
    /// Loads `config.json`, `tokenizer.json` and the weights
    /// (`model.safetensors` or `pytorch_model.bin`) from `model_dir`.
    pub fn load(model_dir: &Path, max_len: usize) -> Result<Self> {
        let device = device::select_device();
        let config_path = model_dir.join("config.json");
        let tokenizer_path = model_dir.join("tokenizer.json");
        if !config_path.exists() || !tokenizer_path.exists() {
            return Err(Error::NotFound(format!("embedding model files under {}", model_dir.display())));
        }

        let config_bytes = std::fs::read(&config_path)?;
        let config: BertConfig = serde_json::from_slice(&config_bytes)
            .map_err(|e| Error::InvalidConfig(format!("{}: {e}", config_path.display())))?;
        let tokenizer_bytes = std::fs::read(&tokenizer_path)?;
        let tokenizer = Tokenizer::from_bytes(&tokenizer_bytes)
            .map_err(|e| Error::EmbeddingService(format!("failed to load tokenizer from {}: {e}", tokenizer_path.display())))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DTYPE, &device);
        let model = BertModel::load(vb, &config).map_err(candle_err)?;

        let dim = config.hidden_size;
        let fingerprint = model_fingerprint(model_dir)?;
        let id = format!("bert:{}:d{dim}", &fingerprint[..16]);
        let pad_id = u32::try_from(config.pad_token_id).unwrap_or(0);
        tracing::info!(model_dir = %model_dir.display(), embedder_id = %id, "embedding model loaded");
        Ok(Self { model, tokenizer, device, id, dim, max_len: max_len.min(config.max_position_embeddings), pad_id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) =
            tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like().map_err(candle_err)?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(candle_err)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(candle_err)?;
        pooled.to_device(&Device::Cpu).and_then(|t| t.to_vec2::<f32>()).map_err(candle_err)
    }
}

impl Embedder for EmbeddingModel {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(BATCH_SIZE) {
            out.extend(self.embed_chunk(batch)?);
        }
        tracing::debug!(count = texts.len(), elapsed_ms = start.elapsed().as_millis(), "embedded batch");
        Ok(out)
    }
}

const WEIGHT_FILES: [&str; 2] = ["model.safetensors", "pytorch_model.bin"];

fn weights_path(model_dir: &Path) -> Result<PathBuf> {
    WEIGHT_FILES
        .iter()
        .map(|name| model_dir.join(name))
        .find(|p| p.exists())
        .ok_or_else(|| Error::NotFound(format!("model weights under {}", model_dir.display())))
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let path = weights_path(model_dir)?;
    if path.extension().is_some_and(|ext| ext == "safetensors") {
        return candle_core::safetensors::load(&path, device).map_err(candle_err);
    }
    let weights = candle_core::pickle::read_all(&path).map_err(candle_err)?;
    Ok(weights.into_iter().collect())
}

/// blake3 hex digest over `config.json`, `tokenizer.json` and the weights
/// file of `model_dir`. Two directories differing in any of them get
/// different embedder ids.
pub fn model_fingerprint(model_dir: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for path in [model_dir.join("config.json"), model_dir.join("tokenizer.json"), weights_path(model_dir)?] {
        let mut file = std::fs::File::open(&path)?;
        std::io::copy(&mut file, &mut hasher)?;
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Deterministic bag-of-tokens embedder. Vectors are L2-normalised and
/// texts sharing more tokens end up closer together.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        let dim = dim.max(1);
        Self { dim, id: format!("fake:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for token in text.split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();
            if token.is_empty() { continue; }
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            #[allow(clippy::cast_precision_loss)]
            let val = 0.5 + ((h >> 32) as u32 as f32) / (u32::MAX as f32);
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 1e-6 {
            for x in &mut v { *x /= norm; }
        } else {
            v[0] = 1.0;
        }
        v
    }
}

impl Embedder for FakeEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Picks the embedder described by `settings`, honouring
/// `APP_USE_FAKE_EMBEDDINGS` as an override.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if settings.use_fake || fake_requested_by_env() {
        tracing::info!(dim = settings.fake_dim, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.fake_dim)));
    }
    let model_dir = resolve_model_dir(&settings.model_dir)?;
    Ok(Arc::new(EmbeddingModel::load(&model_dir, settings.max_len)?))
}

fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = folio_core::config::expand_path(&dir);
            if p.exists() {
                tracing::debug!(source = var, path = %p.display(), "model dir");
                return Ok(p);
            }
        }
    }
    let p = folio_core::config::expand_path(configured);
    if p.exists() { return Ok(p); }
    Err(Error::NotFound(format!("embedding model directory {}", p.display())))
}
