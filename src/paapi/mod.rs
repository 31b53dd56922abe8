//! Product Advertising API client: signing, pacing and the three operations

mod client;
pub mod models;
mod rate_limiter;
pub mod signer;

pub use client::{
    ApiClient, Operation, ITEM_RESOURCES, MAX_SEARCH_RESULTS, SEARCH_RESOURCES,
    VARIATION_RESOURCES,
};
pub use models::{ApiResponse, BrowseNode, Item};
pub use rate_limiter::RateLimiter;
pub use signer::{RequestSigner, SignedRequest};
