//! Catalog Sync - product data from the catalog API into SQLite
//!
//! `sync` refreshes stale products, `search` queries the remote catalog and
//! `add` registers a product to be picked up by the next sync.

use catalog_sync::database::{insert_product, stale_candidates};
use catalog_sync::{
    init_schema, ApiClient, ApiConfig, Candidate, ConfigError, Credentials, RateLimiter,
    SyncRunner,
};
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Product catalog sync - signed API client that keeps SQLite product data fresh
#[derive(Parser, Debug)]
#[command(name = "catalog_sync")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(short, long, global = true, default_value_t = default_db_path())]
    database: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync products that were never synced or are older than --max-age-days
    Sync {
        #[command(flatten)]
        api: ApiArgs,

        /// Maximum number of products to process (default: all)
        #[arg(long)]
        limit: Option<usize>,

        /// Re-sync products last synced more than this many days ago
        #[arg(long, default_value_t = 7)]
        max_age_days: u32,

        /// Sync a single product by internal id (requires --external-id)
        #[arg(long, requires = "external_id")]
        product: Option<i64>,

        /// External catalog id for --product
        #[arg(long, requires = "product")]
        external_id: Option<String>,
    },
    /// Search the remote catalog by keywords
    Search {
        #[command(flatten)]
        api: ApiArgs,

        keywords: String,

        /// Number of results (1-10)
        #[arg(long, default_value_t = 10)]
        count: u32,
    },
    /// Register a product for syncing
    Add {
        external_id: String,

        #[arg(long)]
        title: Option<String>,
    },
}

#[derive(Args, Debug)]
struct ApiArgs {
    /// API access key
    #[arg(long, env = "AMAZON_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// API secret key
    #[arg(long, env = "AMAZON_SECRET_KEY", hide_env_values = true)]
    secret_key: Option<String>,

    /// Partner (associate) tag
    #[arg(long, env = "AMAZON_ASSOCIATE_TAG")]
    partner_tag: Option<String>,

    /// API endpoint
    #[arg(long, default_value = catalog_sync::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Minimum milliseconds between two API calls
    #[arg(long, default_value_t = 1000)]
    min_interval_ms: u64,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
}

impl ApiArgs {
    fn client(&self) -> Result<ApiClient, ConfigError> {
        let access_key = self
            .access_key
            .as_deref()
            .ok_or(ConfigError::Missing("AMAZON_ACCESS_KEY"))?;
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or(ConfigError::Missing("AMAZON_SECRET_KEY"))?;
        let partner_tag = self
            .partner_tag
            .as_deref()
            .ok_or(ConfigError::Missing("AMAZON_ASSOCIATE_TAG"))?;
        let credentials = Credentials::new(access_key, secret_key, partner_tag)?;

        let mut config = ApiConfig::with_base_url(&self.base_url);
        config.min_interval = Duration::from_millis(self.min_interval_ms);
        config.timeout = Duration::from_secs(self.timeout_secs);

        let limiter = Arc::new(RateLimiter::new(config.min_interval));
        ApiClient::new(config, credentials, limiter)
    }
}

/// Returns the default database path: ~/.local/share/catalog_sync/catalog.db
fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("catalog_sync")
        .join("catalog.db")
        .to_string_lossy()
        .to_string()
}

#[tokio::main]
async fn main() {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let db_path = PathBuf::from(&cli.database);
    log::info!("Database path: {}", db_path.display());

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log::error!("Failed to create database directory: {}", e);
                std::process::exit(1);
            }
            log::info!("Created directory: {}", parent.display());
        }
    }

    let mut conn = match Connection::open(&db_path) {
        Ok(conn) => conn,
        Err(e) => {
            log::error!("Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_schema(&conn) {
        log::error!("Failed to initialize database schema: {}", e);
        std::process::exit(1);
    }

    match cli.command {
        Command::Sync {
            api,
            limit,
            max_age_days,
            product,
            external_id,
        } => {
            let client = client_or_exit(&api);
            let candidates = match (product, external_id) {
                (Some(product_id), Some(external_id)) => {
                    vec![Candidate::new(product_id, external_id)]
                }
                _ => match stale_candidates(&conn, max_age_days, limit) {
                    Ok(candidates) => candidates,
                    Err(e) => {
                        log::error!("Failed to select products to sync: {}", e);
                        std::process::exit(1);
                    }
                },
            };

            if candidates.is_empty() {
                log::info!("Nothing to sync");
                return;
            }

            let stats = SyncRunner::new(&client)
                .run(&mut conn, &candidates, limit)
                .await;
            println!("{}", stats);
        }
        Command::Search {
            api,
            keywords,
            count,
        } => {
            let client = client_or_exit(&api);
            let response = match client.search_items(&keywords, count).await {
                Ok(response) => response,
                Err(e) => {
                    log::error!("Search failed: {}", e);
                    std::process::exit(1);
                }
            };

            for item in response.search_items() {
                let price = item
                    .price()
                    .map(|(amount, currency)| format!("{:.2} {}", amount, currency))
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{}\t{}\t{}",
                    item.asin,
                    price,
                    item.title().unwrap_or("(untitled)")
                );
            }
        }
        Command::Add { external_id, title } => {
            match insert_product(&conn, external_id.trim(), title.as_deref()) {
                Ok(id) => println!("Added product {} ({})", id, external_id.trim()),
                Err(e) => {
                    log::error!("Failed to add product: {}", e);
                    std::process::exit(1);
                }
            }
        }
    }
}

fn client_or_exit(api: &ApiArgs) -> ApiClient {
    match api.client() {
        Ok(client) => client,
        Err(e) => {
            log::error!("Invalid API configuration: {}", e);
            std::process::exit(1);
        }
    }
}
