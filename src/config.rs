//! Credentials and endpoint settings for the catalog API

use crate::error::{ConfigError, SigningError};
use std::fmt;
use std::time::Duration;

/// Production endpoint
pub const DEFAULT_BASE_URL: &str = "https://webservices.amazon.com";
pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_SERVICE: &str = "ProductAdvertisingAPI";
pub const DEFAULT_MARKETPLACE: &str = "www.amazon.com";
pub const PARTNER_TYPE: &str = "Associates";

/// Static long-lived signing credentials
///
/// `Debug` only ever shows the first four characters of the access key.
#[derive(Clone)]
pub struct Credentials {
    access_key: String,
    secret_key: String,
    partner_tag: String,
}

impl Credentials {
    /// Build credentials, rejecting empty values
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        partner_tag: impl Into<String>,
    ) -> Result<Self, SigningError> {
        let access_key = access_key.into().trim().to_string();
        let secret_key = secret_key.into().trim().to_string();
        let partner_tag = partner_tag.into().trim().to_string();

        if access_key.is_empty() {
            return Err(SigningError::MissingCredential("access key"));
        }
        if secret_key.is_empty() {
            return Err(SigningError::MissingCredential("secret key"));
        }
        if partner_tag.is_empty() {
            return Err(SigningError::MissingCredential("partner tag"));
        }

        Ok(Self {
            access_key,
            secret_key,
            partner_tag,
        })
    }

    pub fn access_key(&self) -> &str {
        &self.access_key
    }

    pub(crate) fn secret_key(&self) -> &str {
        &self.secret_key
    }

    pub fn partner_tag(&self) -> &str {
        &self.partner_tag
    }

    /// Short prefix of the access key, safe for logs
    pub fn key_prefix(&self) -> &str {
        let end = self
            .access_key
            .char_indices()
            .nth(4)
            .map(|(i, _)| i)
            .unwrap_or(self.access_key.len());
        &self.access_key[..end]
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key", &format_args!("{}…", self.key_prefix()))
            .field("secret_key", &"<redacted>")
            .field("partner_tag", &self.partner_tag)
            .finish()
    }
}

/// Endpoint, identity and pacing settings for [`crate::paapi::ApiClient`]
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Scheme + authority, e.g. `https://webservices.amazon.com`
    pub base_url: String,
    pub region: String,
    pub service: String,
    pub marketplace: String,
    /// Timeout applied to the transport call only
    pub timeout: Duration,
    /// Minimum gap between two outbound requests
    pub min_interval: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            region: DEFAULT_REGION.to_string(),
            service: DEFAULT_SERVICE.to_string(),
            marketplace: DEFAULT_MARKETPLACE.to_string(),
            timeout: Duration::from_secs(10),
            min_interval: Duration::from_secs(1),
        }
    }
}

impl ApiConfig {
    /// Config pointing at another endpoint (mock servers, other regions)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Value of the `host` header, derived from the base url
    pub fn host(&self) -> Result<String, ConfigError> {
        let url = reqwest::Url::parse(&self.base_url).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        let host = url.host_str().ok_or_else(|| ConfigError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: "no host".to_string(),
        })?;
        Ok(match url.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        })
    }

    /// Full URL for an operation path such as `/paapi5/getitems`
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}
