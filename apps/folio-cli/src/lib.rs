//! Wiring shared by the folio binaries: config → embedder → store → index.

use std::path::PathBuf;
use std::sync::Arc;

use folio_chat::session::EngineFactory;
use folio_chat::{ConversationEngine, EngineOptions, OpenAiCompatibleClient, ToolInvoker};
use folio_core::config::{Config, Settings};
use folio_core::data_processor::DataProcessor;
use folio_embed::get_default_embedder;
use folio_vector::{open_store, IndexOptions, KnowledgeIndex};
use tracing_subscriber::EnvFilter;

/// Logs go to stderr so the chat transcript on stdout stays clean.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub fn load_config() -> anyhow::Result<Config> {
    Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e.into()
    })
}

pub struct App {
    pub settings: Settings,
    pub documents_dir: PathBuf,
    pub index_path: PathBuf,
    pub index: Arc<KnowledgeIndex>,
}

impl App {
    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        let mut settings = config.settings()?;
        let documents_dir = config.resolve(&settings.data.documents_dir);
        let index_path = config.resolve(&settings.data.index_path);
        settings.embedding.model_dir = config.resolve(&settings.embedding.model_dir).to_string_lossy().into_owned();

        let embedder = get_default_embedder(&settings.embedding)?;
        let store = open_store(settings.index.backend, &index_path)?;
        let options = IndexOptions {
            collection: settings.index.collection.clone(),
            metric: settings.index.metric,
            chunker: settings.chunking.chunker()?,
            show_progress: settings.index.show_progress,
        };
        let index = KnowledgeIndex::open(store, embedder, Arc::new(DataProcessor::new()), options).await?;
        tracing::debug!(documents = %documents_dir.display(), index = %index_path.display(), "app wired");

        Ok(Self { settings, documents_dir, index_path, index: Arc::new(index) })
    }

    /// Builds conversation engines that share one model client and one
    /// tool invoker over the knowledge index.
    pub fn engine_factory(&self) -> anyhow::Result<EngineFactory> {
        let client = Arc::new(OpenAiCompatibleClient::from_settings(&self.settings.llm)?);
        let tools = Arc::new(ToolInvoker::new(self.index.clone()).with_top_k(self.settings.index.top_k));
        let options = EngineOptions::from_settings(&self.settings.llm, &self.settings.chat);
        Ok(Arc::new(move || ConversationEngine::new(client.clone(), Arc::clone(&tools), options.clone())))
    }
}
