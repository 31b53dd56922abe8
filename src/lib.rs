//! Catalog Sync - signed product-catalog client and SQLite sync pipeline
//!
//! Pulls product data from the Product Advertising API and writes it across
//! the product, brand, variation, category, feature, image and review tables.

pub mod config;
pub mod database;
pub mod error;
pub mod extract;
pub mod paapi;
pub mod sync;

pub use config::{ApiConfig, Credentials};
pub use database::{init_schema, stale_candidates, DbResult};
pub use error::{ApiError, ConfigError, Result, SigningError, SyncError};
pub use paapi::{ApiClient, RateLimiter, RequestSigner};
pub use sync::{Candidate, EntitySynchronizer, RunStats, SyncRunner, SyncStats};
