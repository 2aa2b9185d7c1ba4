use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::debug;

use super::{Embedder, Embedding};

/// Longest prompt sent to the model, in bytes.
const MAX_PROMPT_BYTES: usize = 8192;

pub struct OllamaEmbedder {
    base_url: String,
    model: String,
    dimensions: usize,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaEmbedder {
    /// Connect and probe the model's output dimension.
    pub fn new(base_url: &str, model: &str) -> Result<Self> {
        let mut embedder = Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            dimensions: 0,
        };

        let probe = embedder
            .embed("test")
            .with_context(|| format!("probing ollama model {model} at {base_url}"))?;
        embedder.dimensions = probe.len();
        Ok(embedder)
    }
}

fn clip(text: &str) -> &str {
    if text.len() <= MAX_PROMPT_BYTES {
        return text;
    }
    let mut end = MAX_PROMPT_BYTES;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

impl Embedder for OllamaEmbedder {
    fn embed(&self, text: &str) -> Result<Embedding> {
        let text = if text.trim().is_empty() { " " } else { clip(text) };

        let url = format!("{}/api/embeddings", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "prompt": text,
        });

        let result = ureq::post(&url).send_json(&body);

        let mut response = match result {
            Ok(r) => r,
            Err(ureq::Error::StatusCode(code)) => {
                bail!("ollama returned HTTP {code}");
            }
            Err(e) => {
                return Err(anyhow::anyhow!(e).context("ollama embedding request failed"));
            }
        };

        let resp: EmbeddingResponse = response
            .body_mut()
            .read_json()
            .context("parsing ollama response")?;

        if resp.embedding.is_empty() {
            bail!("ollama returned an empty embedding");
        }
        if resp.embedding.iter().any(|v| !v.is_finite()) {
            bail!("ollama returned non-finite embedding values");
        }
        if self.dimensions != 0 && resp.embedding.len() != self.dimensions {
            bail!(
                "ollama returned {} dimensions, expected {}",
                resp.embedding.len(),
                self.dimensions
            );
        }
        debug!(model = %self.model, bytes = text.len(), "embedded text");

        Ok(resp.embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_respects_char_boundaries() {
        let long = "é".repeat(MAX_PROMPT_BYTES);
        let clipped = clip(&long);
        assert!(clipped.len() <= MAX_PROMPT_BYTES);
        assert!(clipped.chars().all(|c| c == 'é'));
        assert_eq!(clip("short"), "short");
    }

    #[test]
    fn unreachable_server_is_an_error() {
        assert!(OllamaEmbedder::new("http://127.0.0.1:1", "all-minilm").is_err());
    }
}
