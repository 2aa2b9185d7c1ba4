pub mod ollama;

use anyhow::{Result, bail};
use std::sync::{Mutex, OnceLock, PoisonError};
use tracing::info;

use crate::config::{EmbedBackend, EmbedConfig};
use ollama::OllamaEmbedder;

pub type Embedding = Vec<f32>;

pub trait Embedder: Send + Sync {
    fn embed(&self, text: &str) -> Result<Embedding>;
    fn dimensions(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Cosine similarity in [-1, 1]. Zero when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 { 0.0 } else { dot / denom }
}

/// Similarity as a percentage rounded to two decimals.
pub fn similarity_percent(a: &[f32], b: &[f32]) -> f64 {
    let rounded = (cosine_similarity(a, b) * 100.0 * 100.0).round() / 100.0;
    // -0.0 would sort below 0.0 under total ordering
    if rounded == 0.0 { 0.0 } else { rounded }
}

type Factory = Box<dyn Fn() -> Result<Box<dyn Embedder>> + Send + Sync>;

/// Builds the configured embedder on first use and reuses it afterwards.
/// The model is constructed at most once, even under concurrent first calls.
/// A failed build is not cached; the next call tries again.
pub struct LazyEmbedder {
    model_name: String,
    dimensions: usize,
    factory: Factory,
    init: Mutex<()>,
    cell: OnceLock<Box<dyn Embedder>>,
}

impl LazyEmbedder {
    pub fn new(config: EmbedConfig) -> Self {
        let model_name = match &config.backend {
            EmbedBackend::Ollama { model, .. } => model.clone(),
            EmbedBackend::None => "none".to_string(),
        };
        let dimensions = config.dimensions;
        Self::with_factory(model_name, dimensions, move || connect(&config))
    }

    pub fn with_factory<F>(model_name: impl Into<String>, dimensions: usize, factory: F) -> Self
    where
        F: Fn() -> Result<Box<dyn Embedder>> + Send + Sync + 'static,
    {
        Self {
            model_name: model_name.into(),
            dimensions,
            factory: Box::new(factory),
            init: Mutex::new(()),
            cell: OnceLock::new(),
        }
    }

    fn get(&self) -> Result<&dyn Embedder> {
        if let Some(embedder) = self.cell.get() {
            return Ok(embedder.as_ref());
        }
        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(embedder) = self.cell.get() {
            return Ok(embedder.as_ref());
        }
        let built = (self.factory)()?;
        Ok(self.cell.get_or_init(|| built).as_ref())
    }
}

impl Embedder for LazyEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        self.get()?.embed(text)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Construct the backend named in the config.
pub fn connect(config: &EmbedConfig) -> Result<Box<dyn Embedder>> {
    match &config.backend {
        EmbedBackend::Ollama { model, url } => {
            let embedder = OllamaEmbedder::new(url, model)?;
            if embedder.dimensions() != config.dimensions {
                bail!(
                    "model {model} produces {}-dimension vectors, catalog expects {}",
                    embedder.dimensions(),
                    config.dimensions
                );
            }
            info!(
                model = %model,
                url = %url,
                dimensions = embedder.dimensions(),
                "embedding model ready"
            );
            Ok(Box::new(embedder))
        }
        EmbedBackend::None => bail!("no embedding backend configured"),
    }
}
