use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Instant;

use tracing::debug;

use super::{Match, QueryResult};
use crate::catalog::WorkingSet;
use crate::embed::{Embedder, similarity_percent};
use crate::error::RecipeError;

/// Brute-force cosine ranking over a working set. Borrows the shared model.
pub struct Ranker<'a> {
    embedder: &'a dyn Embedder,
}

/// A candidate's rounded score and catalog position. Greater is better:
/// higher similarity first, then earlier position.
#[derive(Debug, Clone, Copy)]
struct Scored {
    similarity: f64,
    position: usize,
}

impl PartialEq for Scored {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.similarity
            .total_cmp(&other.similarity)
            .then_with(|| other.position.cmp(&self.position))
    }
}

/// Keep the `k` best candidates, returned best first.
fn top_k(candidates: impl Iterator<Item = Scored>, k: usize) -> Vec<Scored> {
    let mut heap: BinaryHeap<Reverse<Scored>> = BinaryHeap::with_capacity(k + 1);
    for scored in candidates {
        heap.push(Reverse(scored));
        if heap.len() > k {
            heap.pop();
        }
    }
    // Ascending by Reverse is descending by score.
    heap.into_sorted_vec().into_iter().map(|Reverse(s)| s).collect()
}

impl<'a> Ranker<'a> {
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self { embedder }
    }

    pub fn embed(&self, text: &str) -> Result<Vec<f32>, RecipeError> {
        self.embedder
            .embed(text)
            .map_err(|e| RecipeError::embedding_failure(format!("{e:#}")))
    }

    /// The `k` recipes of `working_set` most similar to `query`, best first.
    /// Equal scores keep catalog order.
    pub fn rank(
        &self,
        query: &str,
        working_set: &WorkingSet,
        k: usize,
    ) -> Result<QueryResult, RecipeError> {
        if k == 0 || working_set.is_empty() {
            return Ok(QueryResult::default());
        }

        let started = Instant::now();
        let query_vector = self.embed(query)?;

        let dimensions = working_set.catalog().dimensions();
        if query_vector.len() != dimensions {
            return Err(RecipeError::embedding_failure(format!(
                "query embedded to {} dimensions, catalog uses {dimensions}",
                query_vector.len()
            )));
        }
        if query_vector.iter().any(|v| !v.is_finite()) {
            return Err(RecipeError::embedding_failure(
                "query embedding contains non-finite values",
            ));
        }

        let scored = working_set.entries().map(|(position, _, embedding)| Scored {
            similarity: similarity_percent(embedding, &query_vector),
            position,
        });
        let best = top_k(scored, k);

        let recipes = working_set.catalog().recipes();
        let matches: Vec<Match> = best
            .into_iter()
            .map(|s| Match {
                recipe: recipes[s.position].clone(),
                similarity: Some(s.similarity),
            })
            .collect();

        debug!(
            model = self.embedder.model_name(),
            candidates = working_set.len(),
            k,
            returned = matches.len(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "ranked working set"
        );
        Ok(QueryResult { matches })
    }
}
