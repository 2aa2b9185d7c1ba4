use rand::Rng;

use super::{Match, QueryResult};
use crate::catalog::WorkingSet;
use crate::error::RecipeError;

/// `k` distinct members of `working_set`, uniformly at random, unscored.
pub fn sample_random<R: Rng + ?Sized>(
    working_set: &WorkingSet,
    k: usize,
    rng: &mut R,
) -> Result<QueryResult, RecipeError> {
    let available = working_set.len();
    if k > available {
        return Err(RecipeError::InsufficientCandidates {
            requested: k,
            available,
        });
    }

    let recipes = working_set.catalog().recipes();
    let positions = working_set.positions();
    let matches = rand::seq::index::sample(rng, available, k)
        .iter()
        .map(|i| Match {
            recipe: recipes[positions[i]].clone(),
            similarity: None,
        })
        .collect();
    Ok(QueryResult { matches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::{catalog_of, recipe};
    use crate::catalog::FilterSet;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn five() -> std::sync::Arc<crate::catalog::Catalog> {
        let recipes = (0..5)
            .map(|i| {
                let mut r = recipe(&i.to_string(), &format!("dish {i}"));
                r.is_vegan = i % 2 == 0;
                r
            })
            .collect();
        catalog_of(recipes)
    }

    #[test]
    fn too_many_is_insufficient_candidates() {
        let ws = five().working_set();
        let mut rng = StdRng::seed_from_u64(7);
        let err = sample_random(&ws, 6, &mut rng).unwrap_err();
        assert!(matches!(
            err,
            RecipeError::InsufficientCandidates {
                requested: 6,
                available: 5
            }
        ));
    }

    #[test]
    fn whole_set_once_each() {
        let ws = five().working_set();
        let mut rng = StdRng::seed_from_u64(7);
        let result = sample_random(&ws, 5, &mut rng).unwrap();
        let ids: HashSet<&str> = result.iter().map(|m| m.recipe.id.as_str()).collect();
        assert_eq!(result.len(), 5);
        assert_eq!(ids.len(), 5);
    }

    #[test]
    fn samples_are_distinct_and_unscored() {
        let ws = five().working_set();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..20 {
            let result = sample_random(&ws, 3, &mut rng).unwrap();
            let ids: HashSet<&str> = result.iter().map(|m| m.recipe.id.as_str()).collect();
            assert_eq!(ids.len(), 3);
            assert!(result.iter().all(|m| m.similarity.is_none()));
        }
    }

    #[test]
    fn only_draws_from_the_working_set() {
        let ws = five().filter(&FilterSet {
            vegan: Some(true),
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        let result = sample_random(&ws, 3, &mut rng).unwrap();
        assert!(result.iter().all(|m| m.recipe.is_vegan));
        assert!(sample_random(&ws, 4, &mut rng).is_err());
    }

    #[test]
    fn empty_request_on_empty_set() {
        let ws = five().filter(&FilterSet {
            vegan: Some(true),
            vegetarian: Some(true),
            ..Default::default()
        });
        let mut rng = StdRng::seed_from_u64(1);
        assert!(sample_random(&ws, 0, &mut rng).unwrap().is_empty());
    }
}
