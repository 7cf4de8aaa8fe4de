//! # YANG Library CLI (`yanglib`)
//!
//! The `yanglib` binary runs the schema registry and delivery service.
//!
//! ## Usage
//!
//! ```bash
//! yanglib --config ./config/yanglib.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `yanglib init` | Create the catalog database and run schema migrations |
//! | `yanglib sources` | List the schema sources found in the cache directory |
//! | `yanglib catalog` | Print the persisted catalog |
//! | `yanglib serve` | Load the cache, synchronize the catalog, and serve HTTP |

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use yang_library::cache::FilesystemSourceCache;
use yang_library::catalog::CatalogSynchronizer;
use yang_library::config::{load_config, Config};
use yang_library::repository::SharedSourceRepository;
use yang_library::store::{CatalogStore, SqliteCatalogStore};
use yang_library::{db, migrate, server};

/// YANG Library — a schema registry and delivery service.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file holding the cache directory, catalog database path, and server
/// binding.
#[derive(Parser)]
#[command(
    name = "yanglib",
    about = "YANG Library — a schema registry and delivery service",
    version,
    long_about = "YANG Library tracks the YANG schema sources cached on this node, \
    publishes a versioned catalog of them with stable retrieval URLs, and serves \
    the raw schema text over HTTP."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/yanglib.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the catalog database.
    ///
    /// Creates the SQLite database file and the catalog tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// List the schema sources present in the cache directory.
    Sources,

    /// Print the persisted catalog (module set version and entries).
    Catalog,

    /// Start the schema registry and delivery server.
    ///
    /// Loads every source from the cache directory, merges them into the
    /// persisted catalog, and then serves schema text over HTTP until
    /// terminated.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => run_init(&config).await,
        Commands::Sources => run_sources(&config),
        Commands::Catalog => run_catalog(&config).await,
        Commands::Serve => run_serve(&config).await,
    }
}

async fn run_init(config: &Config) -> Result<()> {
    let pool = db::connect(&config.catalog.db_path).await?;
    migrate::run_migrations(&pool).await?;
    pool.close().await;
    println!(
        "Catalog database initialized at {}",
        config.catalog.db_path.display()
    );
    Ok(())
}

fn run_sources(config: &Config) -> Result<()> {
    let cache = FilesystemSourceCache::new(config.cache.dir.clone());
    let identifiers = cache.scan()?;

    println!("{:<40} REVISION", "NAME");
    for identifier in &identifiers {
        println!(
            "{:<40} {}",
            identifier.name,
            identifier.revision.as_deref().unwrap_or("-")
        );
    }
    println!(
        "{} source(s) in {}",
        identifiers.len(),
        config.cache.dir.display()
    );
    Ok(())
}

async fn run_catalog(config: &Config) -> Result<()> {
    let pool = db::connect(&config.catalog.db_path).await?;
    let store = SqliteCatalogStore::new(pool);

    match store.load().await? {
        None => println!("Catalog is empty (no sources registered yet)"),
        Some(catalog) => {
            println!("module set: {}", catalog.module_set_id);
            for module in &catalog.modules {
                let revision = if module.revision.is_empty() {
                    "-"
                } else {
                    module.revision.as_str()
                };
                println!("{:<32} {:<12} {}", module.name, revision, module.schema_url);
            }
        }
    }
    Ok(())
}

async fn run_serve(config: &Config) -> Result<()> {
    let pool = db::connect(&config.catalog.db_path).await?;
    migrate::run_migrations(&pool).await?;
    let store: Arc<dyn CatalogStore> = Arc::new(SqliteCatalogStore::new(pool));

    let repository = Arc::new(SharedSourceRepository::new());
    let synchronizer = Arc::new(CatalogSynchronizer::new(
        store.clone(),
        config.server.bind_address.clone(),
        config.server.bind_port,
    ));
    // The synchronizer must observe the initial cache batch, so it is
    // registered before the scan.
    repository.register_listener(synchronizer).await?;

    info!(
        "starting yang library with sources from {}",
        config.cache.dir.display()
    );
    let cache = FilesystemSourceCache::new(config.cache.dir.clone());
    cache.register_into(&repository).await?;

    server::run_server(config, repository, store).await
}
