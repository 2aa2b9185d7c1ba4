use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info};

use crate::catalog::recipe::normalize_ingredients;
use crate::catalog::{Nutrition, Recipe};
use crate::embed::Embedding;
use crate::store::sqlite::Store;

/// One line of an embedded recipe export.
#[derive(Deserialize)]
struct ImportRecord {
    id: Option<String>,
    name: String,
    ingredients: Vec<String>,
    #[serde(default)]
    steps: Vec<String>,
    n_steps: Option<u32>,
    n_ingredients: Option<u32>,
    #[serde(default)]
    minutes: f64,
    nutrition: NutritionField,
    #[serde(default)]
    is_vegetarian: bool,
    #[serde(default)]
    is_vegan: bool,
    #[serde(default)]
    is_gluten_free: bool,
    #[serde(default)]
    is_dairy_free: bool,
    embedding: Vec<f32>,
}

/// Nutrition either as named fields or as the bare five-value array.
#[derive(Deserialize)]
#[serde(untagged)]
enum NutritionField {
    Named(Nutrition),
    Ordered([f64; 5]),
}

impl From<NutritionField> for Nutrition {
    fn from(field: NutritionField) -> Self {
        match field {
            NutritionField::Named(n) => n,
            NutritionField::Ordered([calories, total_fat, sugar, sodium, protein]) => Nutrition {
                calories,
                total_fat,
                sugar,
                sodium,
                protein,
            },
        }
    }
}

impl ImportRecord {
    fn into_entry(self, line_no: usize) -> (Recipe, Embedding) {
        let ingredients = normalize_ingredients(&self.ingredients);
        let recipe = Recipe {
            id: self.id.unwrap_or_else(|| line_no.to_string()),
            n_steps: self.n_steps.unwrap_or(self.steps.len() as u32),
            n_ingredients: self.n_ingredients.unwrap_or(ingredients.len() as u32),
            name: self.name.trim().to_string(),
            ingredients,
            steps: self.steps,
            minutes: self.minutes,
            nutrition: self.nutrition.into(),
            is_vegetarian: self.is_vegetarian,
            is_vegan: self.is_vegan,
            is_gluten_free: self.is_gluten_free,
            is_dairy_free: self.is_dairy_free,
        };
        (recipe, self.embedding)
    }
}

#[derive(Debug)]
pub struct ImportResult {
    pub recipes: usize,
    pub unchanged: bool,
    pub source_hash: String,
}

/// Hash file contents using BLAKE3, streaming.
pub fn hash_file(path: &Path) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::with_capacity(64 * 1024, file);
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().to_hex().to_string())
}

/// Parse and validate a JSON Lines export. Blank lines are skipped; the
/// first bad line aborts with its line number.
fn read_records(source: &Path, dimensions: usize) -> Result<Vec<(Recipe, Embedding)>> {
    let file = std::fs::File::open(source)
        .with_context(|| format!("opening {}", source.display()))?;
    let reader = std::io::BufReader::new(file);

    let mut entries = Vec::new();
    let mut seen = HashSet::new();
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("reading line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let record: ImportRecord = serde_json::from_str(&line)
            .with_context(|| format!("line {line_no}: invalid recipe record"))?;
        let (recipe, embedding) = record.into_entry(entries.len());

        if let Err(reason) = recipe.validate() {
            bail!("line {line_no}: {reason}");
        }
        if embedding.len() != dimensions {
            bail!(
                "line {line_no}: embedding has {} dimensions, expected {dimensions}",
                embedding.len()
            );
        }
        if embedding.iter().any(|v| !v.is_finite()) {
            bail!("line {line_no}: embedding contains non-finite values");
        }
        if !seen.insert(recipe.id.clone()) {
            bail!("line {line_no}: duplicate recipe id {}", recipe.id);
        }
        entries.push((recipe, embedding));
    }
    Ok(entries)
}

/// Replace the catalog at `db_path` with the contents of `source`. A source
/// identical to the last import is left alone.
pub fn import_catalog(source: &Path, db_path: &Path, dimensions: usize) -> Result<ImportResult> {
    let source_hash =
        hash_file(source).with_context(|| format!("hashing {}", source.display()))?;

    let store = Store::open(db_path)?;
    let previous_hash = store.get_meta("source_hash")?;
    let previous_dims = store.meta_usize("dimensions")?;
    if previous_hash.as_deref() == Some(source_hash.as_str()) && previous_dims == Some(dimensions) {
        let recipes = store.recipe_count()? as usize;
        info!(recipes, "catalog already matches {}", source.display());
        return Ok(ImportResult {
            recipes,
            unchanged: true,
            source_hash,
        });
    }

    let entries = read_records(source, dimensions)?;
    debug!(records = entries.len(), "parsed import file");

    store.begin_transaction()?;
    let written = write_entries(&store, &entries, &source_hash, dimensions);
    match written {
        Ok(()) => store.commit_transaction()?,
        Err(e) => {
            store.rollback_transaction()?;
            return Err(e);
        }
    }

    info!(recipes = entries.len(), "imported catalog into {}", db_path.display());
    Ok(ImportResult {
        recipes: entries.len(),
        unchanged: false,
        source_hash,
    })
}

fn write_entries(
    store: &Store,
    entries: &[(Recipe, Embedding)],
    source_hash: &str,
    dimensions: usize,
) -> Result<()> {
    let removed = store.clear_recipes()?;
    if removed > 0 {
        debug!(removed, "cleared previous catalog");
    }
    for (position, (recipe, embedding)) in entries.iter().enumerate() {
        store.insert_recipe(position, recipe, embedding)?;
    }
    store.set_meta("dimensions", &dimensions.to_string())?;
    store.set_meta("source_hash", source_hash)?;
    store.set_meta("imported_at", &chrono::Utc::now().to_rfc3339())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogSource;
    use std::io::Write;

    const PASTA: &str = r#"{"name":"tomato pasta","ingredients":["pasta"," tomato ",""],"steps":["boil","mix"],"minutes":20,"nutrition":[300,10,5,2,12],"is_vegetarian":true,"embedding":[1.0,0.0]}"#;
    const STEW: &str = r#"{"id":"stew-1","name":"beef stew","ingredients":["beef","carrot"],"steps":["brown","simmer"],"n_steps":9,"minutes":120,"nutrition":{"calories":500,"total_fat":20,"sugar":4,"sodium":9,"protein":40},"embedding":[0.0,1.0]}"#;

    fn write_lines(dir: &Path, lines: &[&str]) -> std::path::PathBuf {
        let path = dir.join("recipes.jsonl");
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{line}").unwrap();
        }
        path
    }

    #[test]
    fn imports_and_loads() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_lines(dir.path(), &[PASTA, "", STEW]);
        let db = dir.path().join("recipes.db");

        let result = import_catalog(&source, &db, 2).unwrap();
        assert_eq!(result.recipes, 2);
        assert!(!result.unchanged);

        let catalog = CatalogSource::new(&db, 2).load().unwrap();
        let pasta = catalog.get("0").unwrap();
        assert_eq!(pasta.ingredients, vec!["pasta", "tomato"]);
        assert_eq!(pasta.n_ingredients, 2);
        assert_eq!(pasta.n_steps, 2);
        assert_eq!(pasta.nutrition.protein, 12.0);
        assert!(pasta.is_vegetarian);

        let stew = catalog.get("stew-1").unwrap();
        assert_eq!(stew.n_steps, 9);
        assert_eq!(stew.nutrition.calories, 500.0);
        assert_eq!(catalog.recipes()[1].id, "stew-1");
    }

    #[test]
    fn reimport_of_same_file_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_lines(dir.path(), &[PASTA, STEW]);
        let db = dir.path().join("recipes.db");

        let first = import_catalog(&source, &db, 2).unwrap();
        let second = import_catalog(&source, &db, 2).unwrap();
        assert!(second.unchanged);
        assert_eq!(second.recipes, 2);
        assert_eq!(first.source_hash, second.source_hash);
    }

    #[test]
    fn changed_file_replaces_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("recipes.db");
        let source = write_lines(dir.path(), &[PASTA, STEW]);
        import_catalog(&source, &db, 2).unwrap();

        let source = write_lines(dir.path(), &[STEW]);
        let result = import_catalog(&source, &db, 2).unwrap();
        assert!(!result.unchanged);
        let store = Store::open(&db).unwrap();
        assert_eq!(store.recipe_count().unwrap(), 1);
    }

    #[test]
    fn bad_line_reports_its_number() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_lines(dir.path(), &[PASTA, "{not json"]);
        let err = import_catalog(&source, &dir.path().join("recipes.db"), 2).unwrap_err();
        assert!(format!("{err:#}").contains("line 2"));
    }

    #[test]
    fn wrong_dimension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_lines(dir.path(), &[PASTA]);
        let err = import_catalog(&source, &dir.path().join("recipes.db"), 384).unwrap_err();
        assert!(format!("{err:#}").contains("expected 384"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = write_lines(dir.path(), &[STEW, STEW]);
        let err = import_catalog(&source, &dir.path().join("recipes.db"), 2).unwrap_err();
        assert!(format!("{err:#}").contains("duplicate"));
    }
}
