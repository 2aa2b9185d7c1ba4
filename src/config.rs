use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::{Difficulty, FilterSet};

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub catalog: CatalogConfig,
    pub embed: EmbedConfig,
    pub search: SearchConfig,
    pub preferences: Preferences,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog database (default: .pantry/recipes.db under the project root)
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedConfig {
    pub backend: EmbedBackend,
    /// Vector width the catalog was built with
    pub dimensions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EmbedBackend {
    #[serde(rename = "ollama")]
    Ollama { model: String, url: String },
    #[serde(rename = "none")]
    None,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Recipes shown per query
    pub results: usize,
}

/// Standing dietary and difficulty preferences, applied to every query.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub vegetarian: bool,
    pub vegan: bool,
    pub gluten_free: bool,
    pub dairy_free: bool,
    pub difficulty: Option<Difficulty>,
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            backend: EmbedBackend::Ollama {
                model: "all-minilm".into(),
                url: "http://localhost:11434".into(),
            },
            dimensions: 384,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self { results: 5 }
    }
}

impl Preferences {
    /// Only preferences that are switched on constrain the catalog.
    pub fn filters(&self) -> FilterSet {
        fn on(flag: bool) -> Option<bool> {
            flag.then_some(true)
        }
        FilterSet {
            vegetarian: on(self.vegetarian),
            vegan: on(self.vegan),
            gluten_free: on(self.gluten_free),
            dairy_free: on(self.dairy_free),
            difficulty: self.difficulty,
        }
    }
}

impl Config {
    /// Load config from a .pantry/config.toml file, falling back to defaults.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = project_root.join(".pantry").join("config.toml");
        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("reading config from {}", config_path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("parsing config from {}", config_path.display()))
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the catalog database path.
    pub fn catalog_path(&self, project_root: &Path) -> PathBuf {
        match &self.catalog.path {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => project_root.join(p),
            None => project_root.join(".pantry").join("recipes.db"),
        }
    }

    /// Write current config to disk (for `pantry init`).
    pub fn save(&self, project_root: &Path) -> Result<PathBuf> {
        let dir = project_root.join(".pantry");
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating config dir {}", dir.display()))?;
        let config_path = dir.join("config.toml");
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)
            .with_context(|| format!("writing config to {}", config_path.display()))?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.search.results, 5);
        assert_eq!(config.embed.dimensions, 384);
        assert!(matches!(
            config.embed.backend,
            EmbedBackend::Ollama { ref model, .. } if model == "all-minilm"
        ));
        assert!(config.preferences.filters().is_empty());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path()).unwrap();
        assert_eq!(
            config.catalog_path(dir.path()),
            dir.path().join(".pantry").join("recipes.db")
        );
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".pantry")).unwrap();
        std::fs::write(
            dir.path().join(".pantry/config.toml"),
            "[search]\nresults = 8\n\n[preferences]\nvegan = true\ndifficulty = \"hard\"\n\n[catalog]\npath = \"data/recipes.db\"\n",
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.search.results, 8);
        assert_eq!(config.embed.dimensions, 384);
        assert_eq!(config.catalog_path(dir.path()), dir.path().join("data/recipes.db"));

        let filters = config.preferences.filters();
        assert_eq!(filters.vegan, Some(true));
        assert_eq!(filters.vegetarian, None);
        assert_eq!(filters.difficulty, Some(Difficulty::Hard));
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.embed.backend = EmbedBackend::None;
        config.preferences.dairy_free = true;
        config.save(dir.path()).unwrap();

        let loaded = Config::load(dir.path()).unwrap();
        assert!(matches!(loaded.embed.backend, EmbedBackend::None));
        assert!(loaded.preferences.dairy_free);
    }

    #[test]
    fn bad_toml_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".pantry")).unwrap();
        std::fs::write(dir.path().join(".pantry/config.toml"), "[search\n").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
