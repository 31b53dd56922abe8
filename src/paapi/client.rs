//! Signed, rate-limited client for the three catalog operations

use super::models::ApiResponse;
use super::rate_limiter::RateLimiter;
use super::signer::{payload_hash, RequestSigner};
use crate::config::{ApiConfig, Credentials, PARTNER_TYPE};
use crate::error::{ApiError, ApiResult, ConfigError};
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

const TARGET_PREFIX: &str = "com.amazon.paapi5.v1.ProductAdvertisingAPIv1.";
const CONTENT_TYPE: &str = "application/json; charset=utf-8";
const CONTENT_ENCODING: &str = "amz-1.0";

/// Maximum `ItemCount` the search operation accepts
pub const MAX_SEARCH_RESULTS: u32 = 10;

/// Field groups requested when syncing a product
pub const ITEM_RESOURCES: &[&str] = &[
    "BrowseNodeInfo.BrowseNodes",
    "BrowseNodeInfo.BrowseNodes.Ancestor",
    "CustomerReviews.Count",
    "CustomerReviews.StarRating",
    "Images.Primary.Large",
    "Images.Variants.Large",
    "ItemInfo.ByLineInfo",
    "ItemInfo.Features",
    "ItemInfo.ProductInfo",
    "ItemInfo.Title",
    "Offers.Listings.Availability.Message",
    "Offers.Listings.Availability.Type",
    "Offers.Listings.Condition",
    "Offers.Listings.MerchantInfo",
    "Offers.Listings.Price",
    "Offers.Listings.SavingBasis",
];

pub const VARIATION_RESOURCES: &[&str] = &[
    "Images.Primary.Large",
    "ItemInfo.Title",
    "Offers.Listings.Availability.Message",
    "Offers.Listings.Price",
];

pub const SEARCH_RESOURCES: &[&str] = &[
    "Images.Primary.Large",
    "ItemInfo.Title",
    "Offers.Listings.Price",
];

/// Remote operations this client knows how to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    GetItems,
    GetVariations,
    SearchItems,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::GetItems => "GetItems",
            Operation::GetVariations => "GetVariations",
            Operation::SearchItems => "SearchItems",
        }
    }

    /// Request path, e.g. `/paapi5/getitems`
    pub fn path(&self) -> String {
        format!("/paapi5/{}", self.name().to_ascii_lowercase())
    }

    /// Value of the `x-amz-target` header
    pub fn target(&self) -> String {
        format!("{}{}", TARGET_PREFIX, self.name())
    }
}

/// Catalog API client
///
/// Every call goes through the shared [`RateLimiter`] before it is signed, so
/// the signing timestamp is taken after any wait.
pub struct ApiClient {
    http: reqwest::Client,
    config: ApiConfig,
    host: String,
    signer: RequestSigner,
    limiter: Arc<RateLimiter>,
}

impl ApiClient {
    pub fn new(
        config: ApiConfig,
        credentials: Credentials,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ConfigError> {
        let host = config.host()?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("catalog_sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        log::info!(
            "Creating catalog API client for {} (key {}…)",
            host,
            credentials.key_prefix()
        );

        let signer = RequestSigner::new(credentials, &config.region, &config.service);
        Ok(Self {
            http,
            config,
            host,
            signer,
            limiter,
        })
    }

    /// Sign and send one operation, returning the raw JSON body
    ///
    /// The response is not validated beyond being JSON; see
    /// [`ApiResponse`] for the tolerant typed view.
    pub async fn execute(&self, operation: Operation, params: Map<String, Value>) -> ApiResult<Value> {
        let mut payload = params;
        payload.insert(
            "PartnerTag".to_string(),
            Value::from(self.signer.credentials().partner_tag()),
        );
        payload.insert("PartnerType".to_string(), Value::from(PARTNER_TYPE));
        payload.insert(
            "Marketplace".to_string(),
            Value::from(self.config.marketplace.as_str()),
        );
        let body = serde_json::to_vec(&Value::Object(payload))?;

        self.limiter.wait().await;

        let timestamp = Utc::now().format("%Y%m%dT%H%M%SZ").to_string();
        let path = operation.path();
        let headers = vec![
            ("host".to_string(), self.host.clone()),
            ("content-encoding".to_string(), CONTENT_ENCODING.to_string()),
            ("content-type".to_string(), CONTENT_TYPE.to_string()),
            ("x-amz-content-sha256".to_string(), payload_hash(&body)),
            ("x-amz-date".to_string(), timestamp.clone()),
            ("x-amz-target".to_string(), operation.target()),
        ];
        let signed = self.signer.sign("POST", &path, &headers, &body, &timestamp)?;

        log::debug!(
            "POST {} ({}, {} bytes)",
            path,
            operation.name(),
            body.len()
        );

        let mut request = self.http.post(self.config.url_for(&path)).body(body);
        for (name, value) in &signed.headers {
            // reqwest derives Host from the URL
            if name != "host" {
                request = request.header(name.as_str(), value.as_str());
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let (code, message) = remote_error(&text, status);
            log::debug!("{} rejected with {}: {}", operation.name(), status, code);
            return Err(ApiError::RemoteRejected {
                status: status.as_u16(),
                code,
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }

    /// fetch-by-id: one external id plus the requested field groups
    pub async fn get_items(&self, external_id: &str, resources: &[&str]) -> ApiResult<ApiResponse> {
        let params = object(json!({
            "ItemIds": [external_id],
            "Resources": resources,
        }));
        let value = self.execute(Operation::GetItems, params).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// fetch-variations: sibling variants of a parent item (first page)
    ///
    /// An item that has no variations is answered with a `NoResults` error by
    /// the remote; that comes back here as an empty response.
    pub async fn get_variations(&self, external_id: &str) -> ApiResult<ApiResponse> {
        let params = object(json!({
            "ASIN": external_id,
            "VariationPage": 1,
            "Resources": VARIATION_RESOURCES,
        }));
        match self.execute(Operation::GetVariations, params).await {
            Ok(value) => Ok(serde_json::from_value(value)?),
            Err(ApiError::RemoteRejected { code, .. }) if code == "NoResults" => {
                log::debug!("No variations for {}", external_id);
                Ok(ApiResponse::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Keyword search; `count` is clamped to `1..=10`
    pub async fn search_items(&self, keywords: &str, count: u32) -> ApiResult<ApiResponse> {
        let params = object(json!({
            "Keywords": keywords,
            "SearchIndex": "All",
            "ItemCount": count.clamp(1, MAX_SEARCH_RESULTS),
            "Resources": SEARCH_RESOURCES,
        }));
        let value = self.execute(Operation::SearchItems, params).await?;
        Ok(serde_json::from_value(value)?)
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Code and message from an error body, falling back to the HTTP status
fn remote_error(body: &str, status: reqwest::StatusCode) -> (String, String) {
    let parsed = serde_json::from_str::<ApiResponse>(body).ok();
    match parsed.as_ref().and_then(|r| r.first_error()) {
        Some(err) => (err.code.clone(), err.message.clone()),
        None => (
            status
                .canonical_reason()
                .unwrap_or("Unknown")
                .replace(' ', ""),
            body.chars().take(200).collect(),
        ),
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
