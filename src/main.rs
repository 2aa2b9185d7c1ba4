mod catalog;
mod config;
mod embed;
mod error;
mod import;
mod output;
mod search;
mod store;

use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use catalog::{CatalogSource, Difficulty, FilterSet, WorkingSet};
use config::Config;
use embed::LazyEmbedder;
use error::RecipeError;
use search::{QueryResult, Ranker};
use store::sqlite::Store;

#[derive(Parser)]
#[command(
    name = "pantry",
    version,
    about = "Recipe recommendations from a semantic recipe catalog"
)]
struct Cli {
    /// Directory holding the .pantry config and catalog
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank recipes against free text
    Query {
        text: String,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Find a recipe by name and show the recipes most like it
    Search {
        /// Part of a recipe name
        term: String,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Recipes that best fit a set of ingredients
    Ingredients {
        /// Selected ingredients
        items: Vec<String>,
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Random recipe suggestions
    Surprise {
        #[command(flatten)]
        filters: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Show one recipe by id
    Show {
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Show catalog statistics
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Build the catalog from an embedded JSON Lines export
    Import {
        /// Path to the .jsonl file
        file: PathBuf,
    },
    /// Write a default .pantry/config.toml
    Init {
        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },
}

/// Constraints added on top of the configured preferences.
#[derive(Args)]
struct FilterArgs {
    #[arg(long)]
    vegetarian: bool,
    #[arg(long)]
    vegan: bool,
    #[arg(long)]
    gluten_free: bool,
    #[arg(long)]
    dairy_free: bool,
    /// easy, medium or hard
    #[arg(long)]
    difficulty: Option<Difficulty>,
}

impl FilterArgs {
    fn filters(&self) -> FilterSet {
        FilterSet {
            vegetarian: self.vegetarian.then_some(true),
            vegan: self.vegan.then_some(true),
            gluten_free: self.gluten_free.then_some(true),
            dairy_free: self.dairy_free.then_some(true),
            difficulty: self.difficulty,
        }
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Number of recipes to show (default from config)
    #[arg(short = 'n', long)]
    count: Option<usize>,
    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
    /// Include nutrition, ingredients and steps
    #[arg(long)]
    details: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => report(&e),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "pantry=debug" } else { "pantry=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report(e: &anyhow::Error) -> ExitCode {
    match e.downcast_ref::<RecipeError>() {
        Some(RecipeError::DataUnavailable { .. }) => {
            eprintln!("Critical error: failed to load recipe database ({e})");
            eprintln!("Check [catalog] path in .pantry/config.toml or run 'pantry import'.");
            ExitCode::from(2)
        }
        Some(RecipeError::EmbeddingFailure { .. }) => {
            eprintln!("No results: {e}");
            ExitCode::FAILURE
        }
        _ => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let root = cli.root;
    let config = Config::load(&root)?;

    match cli.command {
        Commands::Query {
            text,
            filters,
            output,
        } => {
            let ws = working_set(&root, &config, &filters)?;
            let embedder = LazyEmbedder::new(config.embed.clone());
            let ranker = Ranker::new(&embedder);
            let result = ranker.rank(&text, &ws, count(&output, &config))?;
            emit(&result, &ws, &output)
        }
        Commands::Search {
            term,
            filters,
            output,
        } => {
            let ws = working_set(&root, &config, &filters)?;
            let embedder = LazyEmbedder::new(config.embed.clone());
            let ranker = Ranker::new(&embedder);
            match search::by_name(&ranker, &ws, &term, count(&output, &config))? {
                Some(result) => emit(&result, &ws, &output),
                None => {
                    println!("No recipes found matching your search.");
                    Ok(ExitCode::SUCCESS)
                }
            }
        }
        Commands::Ingredients {
            items,
            filters,
            output,
        } => {
            let ws = working_set(&root, &config, &filters)?;
            let embedder = LazyEmbedder::new(config.embed.clone());
            let ranker = Ranker::new(&embedder);
            let result = search::by_ingredients(&ranker, &ws, &items, count(&output, &config))?;
            emit(&result, &ws, &output)
        }
        Commands::Surprise { filters, output } => {
            let ws = working_set(&root, &config, &filters)?;
            let mut rng = rand::thread_rng();
            let result = search::surprise(&ws, count(&output, &config), &mut rng)?;
            emit(&result, &ws, &output)
        }
        Commands::Show { id, json } => {
            let catalog = catalog_source(&root, &config).load()?;
            match catalog.get(&id) {
                Some(recipe) if json => {
                    println!("{}", serde_json::to_string_pretty(recipe)?);
                    Ok(ExitCode::SUCCESS)
                }
                Some(recipe) => {
                    print!("{}", output::format_recipe(recipe));
                    Ok(ExitCode::SUCCESS)
                }
                None => {
                    println!("No recipe with id {id}.");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Status { json } => status(&root, &config, json),
        Commands::Import { file } => {
            let db_path = config.catalog_path(&root);
            let result = import::import_catalog(&file, &db_path, config.embed.dimensions)?;
            if result.unchanged {
                println!(
                    "Catalog already up to date ({} recipes, source {}).",
                    result.recipes,
                    &result.source_hash[..12]
                );
            } else {
                println!(
                    "Imported {} recipes into {}.",
                    result.recipes,
                    db_path.display()
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Init { force } => {
            let path = root.join(".pantry").join("config.toml");
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            let written = Config::default().save(&root)?;
            println!("Wrote {}", written.display());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn catalog_source(root: &Path, config: &Config) -> CatalogSource {
    CatalogSource::new(config.catalog_path(root), config.embed.dimensions)
}

/// Load the catalog and narrow it by configured preferences plus flags.
fn working_set(root: &Path, config: &Config, args: &FilterArgs) -> Result<WorkingSet> {
    let catalog = catalog_source(root, config).load()?;
    let filters = config.preferences.filters().and(&args.filters());
    let ws = catalog.filter(&filters);
    debug!(filters = ?ws.filters(), size = ws.len(), "working set ready");
    Ok(ws)
}

fn count(output: &OutputArgs, config: &Config) -> usize {
    output.count.unwrap_or(config.search.results)
}

fn emit(result: &QueryResult, ws: &WorkingSet, output: &OutputArgs) -> Result<ExitCode> {
    debug!(returned = result.len(), "rendering results");
    if output.json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(ExitCode::SUCCESS);
    }
    if result.is_empty() {
        if ws.is_empty() && ws.is_filtered() {
            println!("No recipes match your dietary and difficulty preferences.");
        } else {
            println!("No recipes found.");
        }
        return Ok(ExitCode::SUCCESS);
    }
    print!("{}", output::format_results(result, output.details));
    Ok(ExitCode::SUCCESS)
}

fn status(root: &Path, config: &Config, json: bool) -> Result<ExitCode> {
    let db_path = config.catalog_path(root);
    let Some(store) = Store::open_read_only(&db_path)? else {
        println!("No catalog at {}. Run 'pantry import' first.", db_path.display());
        return Ok(ExitCode::FAILURE);
    };
    let stats = store.stats(&db_path)?;
    let catalog = catalog_source(root, config).load()?;

    let by_difficulty: Vec<(Difficulty, usize)> = Difficulty::ALL
        .iter()
        .map(|&d| (d, catalog.recipes().iter().filter(|r| r.difficulty() == d).count()))
        .collect();
    let diets = [
        ("vegetarian", catalog.recipes().iter().filter(|r| r.is_vegetarian).count()),
        ("vegan", catalog.recipes().iter().filter(|r| r.is_vegan).count()),
        ("gluten free", catalog.recipes().iter().filter(|r| r.is_gluten_free).count()),
        ("dairy free", catalog.recipes().iter().filter(|r| r.is_dairy_free).count()),
    ];

    if json {
        let body = json!({
            "catalog": db_path,
            "recipes": catalog.len(),
            "dimensions": catalog.dimensions(),
            "db_size_bytes": stats.db_size_bytes,
            "source_hash": stats.source_hash,
            "imported_at": stats.imported_at,
            "difficulty": by_difficulty
                .iter()
                .map(|(d, n)| (d.label(), *n))
                .collect::<std::collections::BTreeMap<_, _>>(),
            "diet": diets.iter().cloned().collect::<std::collections::BTreeMap<_, _>>(),
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("Catalog:    {}", db_path.display());
    if catalog.is_empty() {
        println!("Recipes:    0 (catalog is empty)");
    } else {
        println!("Recipes:    {}", catalog.len());
    }
    println!("Dimensions: {}", catalog.dimensions());
    println!("Size:       {} bytes", stats.db_size_bytes);
    if let Some(at) = &stats.imported_at {
        println!("Imported:   {at}");
    }
    if let Some(hash) = &stats.source_hash {
        println!("Source:     {hash}");
    }
    println!("Difficulty:");
    for (d, n) in &by_difficulty {
        println!("  {:<8} {n}", d.label());
    }
    println!("Diet:");
    for (label, n) in &diets {
        println!("  {label:<12} {n}");
    }
    Ok(ExitCode::SUCCESS)
}
