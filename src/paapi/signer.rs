//! AWS Signature Version 4 request signing
//!
//! Pure functions only: the caller captures the timestamp once and passes it
//! in, so the same inputs always produce the same `Authorization` value.

use crate::config::Credentials;
use crate::error::SigningError;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

type HmacSha256 = Hmac<Sha256>;

pub const ALGORITHM: &str = "AWS4-HMAC-SHA256";
const KEY_PREFIX: &str = "AWS4";
const TERMINATOR: &str = "aws4_request";

/// Output of [`RequestSigner::sign`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Lower-cased, sorted headers that were signed, plus `authorization`
    pub headers: Vec<(String, String)>,
    pub authorization: String,
    pub signature: String,
    pub signed_headers: String,
}

/// Signs requests for one credential set, region and service
#[derive(Debug, Clone)]
pub struct RequestSigner {
    credentials: Credentials,
    region: String,
    service: String,
}

impl RequestSigner {
    pub fn new(
        credentials: Credentials,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        Self {
            credentials,
            region: region.into(),
            service: service.into(),
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Sign a request
    ///
    /// `timestamp` must be `YYYYMMDDTHHMMSSZ` and must be the same value sent in
    /// the `x-amz-date` header.
    pub fn sign(
        &self,
        method: &str,
        path: &str,
        headers: &[(String, String)],
        body: &[u8],
        timestamp: &str,
    ) -> Result<SignedRequest, SigningError> {
        validate_timestamp(timestamp)?;
        let date = &timestamp[..8];

        let canonical = canonicalize_headers(headers)?;
        let signed_headers = canonical.keys().cloned().collect::<Vec<_>>().join(";");
        let canonical_request = canonical_request(
            method,
            path,
            &canonical,
            &signed_headers,
            &payload_hash(body),
        );

        let scope = self.credential_scope(date);
        let string_to_sign = string_to_sign(timestamp, &scope, &canonical_request);
        let key = signing_key(
            self.credentials.secret_key(),
            date,
            &self.region,
            &self.service,
        );
        let signature = hex::encode(hmac_sha256(&key, string_to_sign.as_bytes()));

        let authorization = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            ALGORITHM,
            self.credentials.access_key(),
            scope,
            signed_headers,
            signature
        );

        let mut out: Vec<(String, String)> = canonical.into_iter().collect();
        out.push(("authorization".to_string(), authorization.clone()));

        Ok(SignedRequest {
            headers: out,
            authorization,
            signature,
            signed_headers,
        })
    }

    fn credential_scope(&self, date: &str) -> String {
        format!("{}/{}/{}/{}", date, self.region, self.service, TERMINATOR)
    }
}

/// Lower-case names, trim values, sort by name. Repeated names are joined with `,`.
fn canonicalize_headers(
    headers: &[(String, String)],
) -> Result<BTreeMap<String, String>, SigningError> {
    let mut canonical: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let name = name.trim().to_ascii_lowercase();
        if name.is_empty() || name.contains(':') || name.contains(char::is_whitespace) {
            return Err(SigningError::InvalidHeader(name));
        }
        if value.contains('\n') {
            return Err(SigningError::InvalidHeader(name));
        }
        let value = value.trim();
        canonical
            .entry(name)
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    Ok(canonical)
}

fn canonical_request(
    method: &str,
    path: &str,
    canonical_headers: &BTreeMap<String, String>,
    signed_headers: &str,
    payload_hash: &str,
) -> String {
    let header_block: String = canonical_headers
        .iter()
        .map(|(name, value)| format!("{}:{}\n", name, value))
        .collect();
    // empty query string
    format!(
        "{}\n{}\n\n{}\n{}\n{}",
        method.to_ascii_uppercase(),
        path,
        header_block,
        signed_headers,
        payload_hash
    )
}

fn string_to_sign(timestamp: &str, scope: &str, canonical_request: &str) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        ALGORITHM,
        timestamp,
        scope,
        hex::encode(Sha256::digest(canonical_request.as_bytes()))
    )
}

/// Lowercase hex SHA-256 of the raw body
pub fn payload_hash(body: &[u8]) -> String {
    hex::encode(Sha256::digest(body))
}

fn signing_key(secret: &str, date: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("{}{}", KEY_PREFIX, secret).as_bytes(), date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, TERMINATOR.as_bytes())
}

fn hmac_sha256(key: &[u8], msg: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(msg);
    mac.finalize().into_bytes().to_vec()
}

fn validate_timestamp(timestamp: &str) -> Result<(), SigningError> {
    let bytes = timestamp.as_bytes();
    let well_formed = bytes.len() == 16
        && bytes[8] == b'T'
        && bytes[15] == b'Z'
        && bytes[..8].iter().all(u8::is_ascii_digit)
        && bytes[9..15].iter().all(u8::is_ascii_digit);
    if well_formed {
        Ok(())
    } else {
        Err(SigningError::InvalidTimestamp(timestamp.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMESTAMP: &str = "20240101T120000Z";
    const BODY: &str = r#"{"ItemIds":["B000TEST01"]}"#;

    fn signer() -> RequestSigner {
        let creds = Credentials::new(
            "AKIDEXAMPLE",
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "tag-20",
        )
        .unwrap();
        RequestSigner::new(creds, "us-east-1", "ProductAdvertisingAPI")
    }

    fn headers() -> Vec<(String, String)> {
        vec![
            ("Host".to_string(), "webservices.amazon.com".to_string()),
            ("Content-Encoding".to_string(), "amz-1.0".to_string()),
            (
                "Content-Type".to_string(),
                "application/json; charset=utf-8".to_string(),
            ),
            ("X-Amz-Date".to_string(), TIMESTAMP.to_string()),
            (
                "X-Amz-Target".to_string(),
                "com.amazon.paapi5.v1.ProductAdvertisingAPIv1.GetItems".to_string(),
            ),
        ]
    }

    fn sign(headers: &[(String, String)], body: &str) -> SignedRequest {
        signer()
            .sign("POST", "/paapi5/getitems", headers, body.as_bytes(), TIMESTAMP)
            .unwrap()
    }

    #[test]
    fn matches_reference_vector() {
        let signed = sign(&headers(), BODY);
        assert_eq!(
            signed.signature,
            "3e61fee9eb79371b91c37869e5b4ed7a9a532ab72279d313dad91c7086e00f4e"
        );
        assert_eq!(
            signed.authorization,
            "AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/20240101/us-east-1/ProductAdvertisingAPI/aws4_request, \
             SignedHeaders=content-encoding;content-type;host;x-amz-date;x-amz-target, \
             Signature=3e61fee9eb79371b91c37869e5b4ed7a9a532ab72279d313dad91c7086e00f4e"
        );
    }

    #[test]
    fn canonical_request_hash_matches_reference() {
        let canonical = canonicalize_headers(&headers()).unwrap();
        let signed_headers = canonical.keys().cloned().collect::<Vec<_>>().join(";");
        let request = canonical_request(
            "POST",
            "/paapi5/getitems",
            &canonical,
            &signed_headers,
            &payload_hash(BODY.as_bytes()),
        );
        assert!(request.starts_with("POST\n/paapi5/getitems\n\ncontent-encoding:amz-1.0\n"));
        assert!(request.contains("x-amz-target:com.amazon.paapi5.v1.ProductAdvertisingAPIv1.GetItems\n\ncontent-encoding;"));
        assert_eq!(
            hex::encode(Sha256::digest(request.as_bytes())),
            "12cd5d174016d4c8d9512d2a0983f0854386ad3855deb06e13eb3a3adb129500"
        );
    }

    #[test]
    fn signing_key_matches_reference() {
        let key = signing_key(
            "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY",
            "20240101",
            "us-east-1",
            "ProductAdvertisingAPI",
        );
        assert_eq!(
            hex::encode(key),
            "43fd2dc5983bdd104ecdd34a154be99154516ac51cdc535b247de51fb912b456"
        );
    }

    #[test]
    fn payload_hash_of_empty_body() {
        assert_eq!(
            payload_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn signing_is_deterministic() {
        let first = sign(&headers(), BODY);
        let second = sign(&headers(), BODY);
        assert_eq!(first, second);
    }

    #[test]
    fn header_order_does_not_matter() {
        let mut reversed = headers();
        reversed.reverse();
        assert_eq!(sign(&headers(), BODY), sign(&reversed, BODY));
    }

    #[test]
    fn header_name_case_does_not_matter() {
        let lowered: Vec<(String, String)> = headers()
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        assert_eq!(sign(&headers(), BODY).signature, sign(&lowered, BODY).signature);
    }

    #[test]
    fn single_byte_body_change_changes_signature() {
        let original = sign(&headers(), BODY);
        let tampered = sign(&headers(), r#"{"ItemIds":["B000TEST02"]}"#);
        assert_ne!(original.signature, tampered.signature);
    }

    #[test]
    fn signed_headers_are_sorted_and_include_authorization() {
        let signed = sign(&headers(), BODY);
        let names: Vec<&str> = signed.headers.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "content-encoding",
                "content-type",
                "host",
                "x-amz-date",
                "x-amz-target",
                "authorization"
            ]
        );
    }

    #[test]
    fn rejects_malformed_timestamp() {
        for bad in ["", "2024-01-01T12:00:00Z", "20240101T120000", "2024010XT120000Z"] {
            let err = signer()
                .sign("POST", "/", &headers(), BODY.as_bytes(), bad)
                .unwrap_err();
            assert_eq!(err, SigningError::InvalidTimestamp(bad.to_string()));
        }
    }

    #[test]
    fn rejects_header_names_with_colon() {
        let bad = vec![("x-bad:name".to_string(), "v".to_string())];
        let err = signer()
            .sign("POST", "/", &bad, b"", TIMESTAMP)
            .unwrap_err();
        assert!(matches!(err, SigningError::InvalidHeader(_)));
    }

    #[test]
    fn header_values_are_trimmed() {
        let mut padded = headers();
        padded[1].1 = "  amz-1.0  ".to_string();
        assert_eq!(sign(&headers(), BODY).signature, sign(&padded, BODY).signature);
    }
}
