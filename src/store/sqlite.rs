use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, OptionalExtension, params};
use serde::Serialize;
use std::path::Path;

use super::schema;
use crate::catalog::{Nutrition, Recipe};
use crate::embed::Embedding;

pub struct Store {
    conn: Connection,
}

/// Catalog artifact statistics.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub db_size_bytes: u64,
    pub source_hash: Option<String>,
    pub imported_at: Option<String>,
}

/// Row as stored, before validation.
struct RawRow {
    position: i64,
    id: String,
    name: String,
    ingredients: String,
    steps: String,
    n_steps: i64,
    n_ingredients: i64,
    minutes: f64,
    nutrition: [f64; 5],
    flags: [bool; 4],
    embedding: Vec<u8>,
}

impl Store {
    /// Open (creating if needed) the catalog database at `db_path`.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating storage dir {}", dir.display()))?;
            }
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("opening database at {}", db_path.display()))?;
        schema::run_migrations(&conn)
            .with_context(|| format!("preparing schema in {}", db_path.display()))?;
        Ok(Self { conn })
    }

    /// Open an existing catalog for reading. Returns None when there is
    /// nothing on disk. Never migrates or writes; a file without the catalog
    /// tables or schema version is an error.
    pub fn open_read_only(db_path: &Path) -> Result<Option<Self>> {
        if !db_path.is_file() {
            return Ok(None);
        }
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .with_context(|| format!("opening database at {}", db_path.display()))?;
        let store = Self { conn };

        for table in ["meta", "recipes"] {
            if !store
                .has_table(table)
                .with_context(|| format!("reading schema of {}", db_path.display()))?
            {
                bail!("{} is not a recipe catalog (no {table} table)", db_path.display());
            }
        }
        match store.get_meta("schema_version")? {
            Some(v) if v == schema::SCHEMA_VERSION => {}
            Some(v) => bail!("{} has unsupported schema version {v}", db_path.display()),
            None => bail!("{} has no schema version", db_path.display()),
        }
        Ok(Some(store))
    }

    fn has_table(&self, name: &str) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                params![name],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn get_meta(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |r| {
                r.get(0)
            })
            .optional()?;
        Ok(value)
    }

    pub fn meta_usize(&self, key: &str) -> Result<Option<usize>> {
        match self.get_meta(key)? {
            Some(v) => {
                let n = v
                    .parse()
                    .with_context(|| format!("meta key {key} is not a number: {v:?}"))?;
                Ok(Some(n))
            }
            None => Ok(None),
        }
    }

    pub fn set_meta(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn insert_recipe(&self, position: usize, recipe: &Recipe, embedding: &[f32]) -> Result<()> {
        let ingredients = serde_json::to_string(&recipe.ingredients)?;
        let steps = serde_json::to_string(&recipe.steps)?;
        let n = &recipe.nutrition;
        self.conn
            .execute(
                "INSERT INTO recipes (position, id, name, ingredients, steps, n_steps, n_ingredients,
                                      minutes, calories, total_fat, sugar, sodium, protein,
                                      is_vegetarian, is_vegan, is_gluten_free, is_dairy_free, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)",
                params![
                    position as i64,
                    recipe.id,
                    recipe.name,
                    ingredients,
                    steps,
                    recipe.n_steps,
                    recipe.n_ingredients,
                    recipe.minutes,
                    n.calories,
                    n.total_fat,
                    n.sugar,
                    n.sodium,
                    n.protein,
                    recipe.is_vegetarian,
                    recipe.is_vegan,
                    recipe.is_gluten_free,
                    recipe.is_dairy_free,
                    encode_embedding(embedding),
                ],
            )
            .with_context(|| format!("inserting recipe {}", recipe.id))?;
        Ok(())
    }

    /// Drop every recipe (used before a re-import).
    pub fn clear_recipes(&self) -> Result<usize> {
        let n = self.conn.execute("DELETE FROM recipes", [])?;
        Ok(n)
    }

    /// All recipes with their embeddings, in catalog order. Any malformed row
    /// fails the whole read.
    pub fn load_recipes(&self, dimensions: usize) -> Result<Vec<(Recipe, Embedding)>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, id, name, ingredients, steps, n_steps, n_ingredients, minutes,
                    calories, total_fat, sugar, sodium, protein,
                    is_vegetarian, is_vegan, is_gluten_free, is_dairy_free, embedding
             FROM recipes ORDER BY position",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RawRow {
                position: row.get(0)?,
                id: row.get(1)?,
                name: row.get(2)?,
                ingredients: row.get(3)?,
                steps: row.get(4)?,
                n_steps: row.get(5)?,
                n_ingredients: row.get(6)?,
                minutes: row.get(7)?,
                nutrition: [row.get(8)?, row.get(9)?, row.get(10)?, row.get(11)?, row.get(12)?],
                flags: [row.get(13)?, row.get(14)?, row.get(15)?, row.get(16)?],
                embedding: row.get(17)?,
            })
        })?;

        let mut out = Vec::new();
        for row in rows {
            let raw = row.context("reading recipe row")?;
            let position = raw.position;
            let entry = decode_row(raw, dimensions)
                .with_context(|| format!("malformed recipe row {position}"))?;
            out.push(entry);
        }
        Ok(out)
    }

    pub fn recipe_count(&self) -> Result<i64> {
        let n = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes", [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn begin_transaction(&self) -> Result<()> {
        self.conn.execute_batch("BEGIN TRANSACTION")?;
        Ok(())
    }

    pub fn commit_transaction(&self) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    pub fn rollback_transaction(&self) -> Result<()> {
        self.conn.execute_batch("ROLLBACK")?;
        Ok(())
    }

    pub fn stats(&self, db_path: &Path) -> Result<StoreStats> {
        let db_size_bytes = std::fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
        Ok(StoreStats {
            db_size_bytes,
            source_hash: self.get_meta("source_hash")?,
            imported_at: self.get_meta("imported_at")?,
        })
    }
}

fn decode_row(raw: RawRow, dimensions: usize) -> Result<(Recipe, Embedding)> {
    let ingredients: Vec<String> =
        serde_json::from_str(&raw.ingredients).context("ingredients is not a JSON string array")?;
    let steps: Vec<String> =
        serde_json::from_str(&raw.steps).context("steps is not a JSON string array")?;
    let n_steps = u32::try_from(raw.n_steps).context("n_steps out of range")?;
    let n_ingredients = u32::try_from(raw.n_ingredients).context("n_ingredients out of range")?;
    let [calories, total_fat, sugar, sodium, protein] = raw.nutrition;
    let [is_vegetarian, is_vegan, is_gluten_free, is_dairy_free] = raw.flags;

    let recipe = Recipe {
        id: raw.id,
        name: raw.name,
        ingredients,
        steps,
        n_steps,
        n_ingredients,
        minutes: raw.minutes,
        nutrition: Nutrition {
            calories,
            total_fat,
            sugar,
            sodium,
            protein,
        },
        is_vegetarian,
        is_vegan,
        is_gluten_free,
        is_dairy_free,
    };
    let embedding = decode_embedding(&raw.embedding, dimensions)?;
    Ok((recipe, embedding))
}

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(blob: &[u8], dimensions: usize) -> Result<Embedding> {
    let expected = dimensions * std::mem::size_of::<f32>();
    if blob.len() != expected {
        bail!(
            "embedding blob is {} bytes, expected {expected} for {dimensions} dimensions",
            blob.len()
        );
    }
    let mut out = Vec::with_capacity(dimensions);
    for chunk in blob.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            bail!("embedding contains non-finite values");
        }
        out.push(value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::recipe;

    #[test]
    fn embedding_blob_layout() {
        let blob = encode_embedding(&[1.0, -0.5]);
        assert_eq!(blob.len(), 8);
        assert_eq!(&blob[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_embedding(&blob, 2).unwrap(), vec![1.0, -0.5]);
    }

    #[test]
    fn embedding_blob_wrong_length() {
        let blob = encode_embedding(&[1.0, 2.0, 3.0]);
        assert!(decode_embedding(&blob, 2).is_err());
    }

    #[test]
    fn embedding_blob_non_finite() {
        let blob = encode_embedding(&[f32::INFINITY]);
        assert!(decode_embedding(&blob, 1).is_err());
    }

    #[test]
    fn open_read_only_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Store::open_read_only(&dir.path().join("nope.db")).unwrap().is_none());
    }

    #[test]
    fn open_read_only_requires_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("recipes.db");
        {
            let store = Store::open(&db).unwrap();
            store
                .conn
                .execute("DELETE FROM meta WHERE key = 'schema_version'", [])
                .unwrap();
        }
        let err = Store::open_read_only(&db).err().unwrap();
        assert!(err.to_string().contains("no schema version"));
    }

    #[test]
    fn recipes_come_back_in_position_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("recipes.db")).unwrap();
        let mut pie = recipe("p", "apple pie");
        pie.is_vegetarian = true;
        pie.ingredients = vec!["apples".into(), "butter".into(), "flour".into()];
        store.insert_recipe(1, &pie, &[0.0, 1.0]).unwrap();
        store.insert_recipe(0, &recipe("s", "soup"), &[1.0, 0.0]).unwrap();

        let rows = store.load_recipes(2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0.id, "s");
        assert_eq!(rows[1].0, pie);
        assert_eq!(rows[1].1, vec![0.0, 1.0]);
    }

    #[test]
    fn malformed_row_fails_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("recipes.db")).unwrap();
        store.insert_recipe(0, &recipe("s", "soup"), &[1.0, 0.0]).unwrap();
        store
            .conn
            .execute("UPDATE recipes SET ingredients = 'not json' WHERE id = 's'", [])
            .unwrap();
        let err = store.load_recipes(2).unwrap_err();
        assert!(format!("{err:#}").contains("malformed recipe row 0"));
    }

    #[test]
    fn meta_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(&dir.path().join("recipes.db")).unwrap();
        assert!(store.get_meta("dimensions").unwrap().is_none());
        store.set_meta("dimensions", "384").unwrap();
        store.set_meta("dimensions", "2").unwrap();
        assert_eq!(store.meta_usize("dimensions").unwrap(), Some(2));
        assert_eq!(store.get_meta("schema_version").unwrap().as_deref(), Some("1"));
    }
}
