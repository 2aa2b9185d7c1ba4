pub mod random;
pub mod semantic;

use rand::Rng;
use serde::Serialize;
use tracing::warn;

use crate::catalog::{Recipe, WorkingSet, recipe::normalize_ingredients};
use crate::error::RecipeError;
pub use random::sample_random;
pub use semantic::Ranker;

/// One recipe in a result. `similarity` is a percentage, absent for
/// results that were not ranked.
#[derive(Debug, Clone, Serialize)]
pub struct Match {
    pub recipe: Recipe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub similarity: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    pub matches: Vec<Match>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }
}

/// Look up the first recipe whose name contains `term` and rank the working
/// set against that recipe's name. None when no name matches.
pub fn by_name(
    ranker: &Ranker<'_>,
    working_set: &WorkingSet,
    term: &str,
    k: usize,
) -> Result<Option<QueryResult>, RecipeError> {
    let Some(seed) = working_set.find_by_name(term) else {
        return Ok(None);
    };
    ranker.rank(&seed.name, working_set, k).map(Some)
}

/// Rank by a comma-joined list of selected ingredients. With nothing
/// selected, the head of the working set is returned unranked.
pub fn by_ingredients(
    ranker: &Ranker<'_>,
    working_set: &WorkingSet,
    ingredients: &[String],
    k: usize,
) -> Result<QueryResult, RecipeError> {
    let selected = normalize_ingredients(ingredients);
    if selected.is_empty() {
        let matches = working_set
            .recipes()
            .take(k)
            .map(|recipe| Match {
                recipe: recipe.clone(),
                similarity: None,
            })
            .collect();
        return Ok(QueryResult { matches });
    }
    ranker.rank(&selected.join(", "), working_set, k)
}

/// Random picks for the surprise flow, shrinking the request to what the
/// working set can supply.
pub fn surprise<R: Rng + ?Sized>(
    working_set: &WorkingSet,
    k: usize,
    rng: &mut R,
) -> Result<QueryResult, RecipeError> {
    let k = if k > working_set.len() {
        warn!(
            requested = k,
            available = working_set.len(),
            "not enough recipes for surprise request, returning all of them"
        );
        working_set.len()
    } else {
        k
    };
    sample_random(working_set, k, rng)
}
