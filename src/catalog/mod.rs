pub mod filter;
pub mod recipe;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tracing::{debug, info};

use crate::embed::Embedding;
use crate::error::RecipeError;
use crate::store::sqlite::Store;
pub use filter::{FilterSet, WorkingSet};
pub use recipe::{Difficulty, Nutrition, Recipe};

/// The immutable recipe collection with one embedding per recipe.
/// Position in the catalog is insertion order.
#[derive(Debug)]
pub struct Catalog {
    recipes: Vec<Recipe>,
    embeddings: Vec<Embedding>,
    by_id: HashMap<String, usize>,
    dimensions: usize,
}

impl Catalog {
    /// Build a catalog, rejecting anything that would break ranking later.
    pub fn from_parts(
        recipes: Vec<Recipe>,
        embeddings: Vec<Embedding>,
        dimensions: usize,
    ) -> Result<Self, RecipeError> {
        if recipes.len() != embeddings.len() {
            return Err(RecipeError::data_unavailable(format!(
                "{} recipes but {} embeddings",
                recipes.len(),
                embeddings.len()
            )));
        }
        if dimensions == 0 {
            return Err(RecipeError::data_unavailable("embedding dimension is zero"));
        }

        let mut by_id = HashMap::with_capacity(recipes.len());
        for (pos, (recipe, embedding)) in recipes.iter().zip(&embeddings).enumerate() {
            recipe.validate().map_err(RecipeError::data_unavailable)?;
            if embedding.len() != dimensions {
                return Err(RecipeError::data_unavailable(format!(
                    "recipe {} has a {}-dimension embedding, expected {dimensions}",
                    recipe.id,
                    embedding.len()
                )));
            }
            if embedding.iter().any(|v| !v.is_finite()) {
                return Err(RecipeError::data_unavailable(format!(
                    "recipe {} has non-finite embedding values",
                    recipe.id
                )));
            }
            if by_id.insert(recipe.id.clone(), pos).is_some() {
                return Err(RecipeError::data_unavailable(format!(
                    "duplicate recipe id {}",
                    recipe.id
                )));
            }
        }

        Ok(Self {
            recipes,
            embeddings,
            by_id,
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    pub fn get(&self, id: &str) -> Option<&Recipe> {
        self.by_id.get(id).map(|&pos| &self.recipes[pos])
    }

    pub fn working_set(self: &Arc<Self>) -> WorkingSet {
        WorkingSet::full(Arc::clone(self))
    }

    pub fn filter(self: &Arc<Self>, filters: &FilterSet) -> WorkingSet {
        self.working_set().filter(filters)
    }
}

/// Loads the catalog database once and hands out the cached copy afterwards.
pub struct CatalogSource {
    path: PathBuf,
    dimensions: usize,
    cell: OnceLock<Arc<Catalog>>,
}

impl CatalogSource {
    pub fn new(path: impl Into<PathBuf>, dimensions: usize) -> Self {
        Self {
            path: path.into(),
            dimensions,
            cell: OnceLock::new(),
        }
    }

    /// Read the catalog on first call. Racing callers may both read, but every
    /// caller observes the single value that won the cell.
    pub fn load(&self) -> Result<Arc<Catalog>, RecipeError> {
        if let Some(catalog) = self.cell.get() {
            return Ok(Arc::clone(catalog));
        }

        let started = Instant::now();
        let catalog = Arc::new(read_catalog(&self.path, self.dimensions)?);
        info!(
            recipes = catalog.len(),
            dimensions = catalog.dimensions(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "loaded recipe catalog from {}",
            self.path.display()
        );

        Ok(Arc::clone(self.cell.get_or_init(|| catalog)))
    }
}

fn read_catalog(path: &Path, dimensions: usize) -> Result<Catalog, RecipeError> {
    let store = Store::open_read_only(path)
        .map_err(|e| RecipeError::data_unavailable(format!("{e:#}")))?
        .ok_or_else(|| {
            RecipeError::data_unavailable(format!(
                "no catalog at {} (run 'pantry import' first)",
                path.display()
            ))
        })?;

    if let Some(stored) = store
        .meta_usize("dimensions")
        .map_err(|e| RecipeError::data_unavailable(format!("{e:#}")))?
    {
        if stored != dimensions {
            return Err(RecipeError::data_unavailable(format!(
                "catalog was built with {stored}-dimension embeddings, configured for {dimensions}"
            )));
        }
    }

    let entries = store
        .load_recipes(dimensions)
        .map_err(|e| RecipeError::data_unavailable(format!("{e:#}")))?;
    debug!(rows = entries.len(), "decoded catalog rows");

    let (recipes, embeddings) = entries.into_iter().unzip();
    Catalog::from_parts(recipes, embeddings, dimensions)
}
