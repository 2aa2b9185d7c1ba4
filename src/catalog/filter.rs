use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::recipe::{Difficulty, Recipe};
use super::Catalog;
use crate::embed::Embedding;

/// Independent, optional predicates. `None` imposes no constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub vegetarian: Option<bool>,
    pub vegan: Option<bool>,
    pub gluten_free: Option<bool>,
    pub dairy_free: Option<bool>,
    pub difficulty: Option<Difficulty>,
}

impl FilterSet {
    pub fn is_empty(&self) -> bool {
        self.vegetarian.is_none()
            && self.vegan.is_none()
            && self.gluten_free.is_none()
            && self.dairy_free.is_none()
            && self.difficulty.is_none()
    }

    pub fn matches(&self, recipe: &Recipe) -> bool {
        fn flag(want: Option<bool>, have: bool) -> bool {
            want.map_or(true, |w| w == have)
        }

        flag(self.vegetarian, recipe.is_vegetarian)
            && flag(self.vegan, recipe.is_vegan)
            && flag(self.gluten_free, recipe.is_gluten_free)
            && flag(self.dairy_free, recipe.is_dairy_free)
            && self.difficulty.map_or(true, |d| recipe.difficulty() == d)
    }

    /// Combine two filter sets. Predicates set in `other` take precedence,
    /// so the result describes the most recent constraint per field only.
    pub fn and(&self, other: &FilterSet) -> FilterSet {
        FilterSet {
            vegetarian: other.vegetarian.or(self.vegetarian),
            vegan: other.vegan.or(self.vegan),
            gluten_free: other.gluten_free.or(self.gluten_free),
            dairy_free: other.dairy_free.or(self.dairy_free),
            difficulty: other.difficulty.or(self.difficulty),
        }
    }
}

/// A filtered view over a shared catalog. Owned by one caller; filtering
/// produces a new set and never touches the catalog or other views.
#[derive(Debug, Clone)]
pub struct WorkingSet {
    catalog: Arc<Catalog>,
    positions: Vec<usize>,
    filters: FilterSet,
}

impl WorkingSet {
    /// Every recipe in the catalog, in catalog order.
    pub fn full(catalog: Arc<Catalog>) -> Self {
        let positions = (0..catalog.len()).collect();
        Self {
            catalog,
            positions,
            filters: FilterSet::default(),
        }
    }

    /// Recipes of this set that satisfy every predicate in `filters`.
    pub fn filter(&self, filters: &FilterSet) -> WorkingSet {
        let positions = if filters.is_empty() {
            self.positions.clone()
        } else {
            self.positions
                .iter()
                .copied()
                .filter(|&pos| filters.matches(&self.catalog.recipes[pos]))
                .collect()
        };
        WorkingSet {
            catalog: Arc::clone(&self.catalog),
            positions,
            filters: self.filters.and(filters),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Whether any predicate narrowed this set, as opposed to the full catalog.
    pub fn is_filtered(&self) -> bool {
        !self.filters.is_empty()
    }

    /// Predicates applied so far, last one winning per field. Members always
    /// satisfy every filter ever applied, so after a contradictory chain such
    /// as vegetarian then non-vegetarian the set is empty even though only the
    /// last predicate is reported here.
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Catalog positions of the members, ascending.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    pub fn recipes(&self) -> impl Iterator<Item = &Recipe> + '_ {
        self.positions.iter().map(|&pos| &self.catalog.recipes[pos])
    }

    /// `(catalog position, recipe, embedding)` for each member.
    pub fn entries(&self) -> impl Iterator<Item = (usize, &Recipe, &Embedding)> + '_ {
        self.positions
            .iter()
            .map(|&pos| (pos, &self.catalog.recipes[pos], &self.catalog.embeddings[pos]))
    }

    /// First member whose name contains `term`, ignoring case.
    pub fn find_by_name(&self, term: &str) -> Option<&Recipe> {
        let needle = term.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.recipes()
            .find(|r| r.name.to_lowercase().contains(&needle))
    }
}
