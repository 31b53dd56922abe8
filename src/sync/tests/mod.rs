//! Unit tests for the sync module.
//!
//! The wiremock-backed tests share the fixtures below: a client with no
//! pacing, an in-memory store and a fully populated sheet-set item.


use std::sync::Arc;
use std::time::Duration;

use rusqlite::{params, Connection};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::config::{ApiConfig, Credentials};
use crate::database::{init_schema, insert_product};
use crate::paapi::{ApiClient, RateLimiter};

pub(super) const EXTERNAL_ID: &str = "B000TEST01";

/// Create an in-memory database for testing
pub(super) fn test_db() -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    init_schema(&conn).unwrap();
    conn
}

/// Database holding one registered product; returns its internal id
pub(super) fn db_with_product(external_id: &str) -> (Connection, i64) {
    let conn = test_db();
    let id = insert_product(&conn, external_id, None).unwrap();
    (conn, id)
}

pub(super) fn client_for(server: &MockServer) -> ApiClient {
    let mut config = ApiConfig::with_base_url(server.uri());
    config.min_interval = Duration::ZERO;
    config.timeout = Duration::from_secs(2);
    let credentials = Credentials::new("AKIDEXAMPLE", "secret", "tag-20").unwrap();
    let limiter = Arc::new(RateLimiter::new(config.min_interval));
    ApiClient::new(config, credentials, limiter).unwrap()
}

pub(super) fn count(conn: &Connection, sql: &str, product_id: i64) -> i64 {
    conn.query_row(sql, params![product_id], |row| row.get(0))
        .unwrap()
}

pub(super) fn table_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Item with every field group the sync maps
pub(super) fn deluxe_item(external_id: &str) -> Value {
    json!({
        "ASIN": external_id,
        "DetailPageURL": format!("https://www.amazon.com/dp/{external_id}"),
        "ItemInfo": {
            "Title": {"DisplayValue": "Deluxe Sheet Set"},
            "ByLineInfo": {
                "Brand": {"DisplayValue": "Acme"},
                "Manufacturer": {"DisplayValue": "Acme Textiles"}
            },
            "ProductInfo": {
                "Color": {"DisplayValue": "05 - Ivory"},
                "Size": {"DisplayValue": "Queen"}
            },
            "Features": {"DisplayValues": ["1000 thread count", "sateen weave"]}
        },
        "Offers": {"Listings": [{
            "Price": {"Amount": 49.99, "Currency": "USD"},
            "SavingBasis": {"Amount": 100.0, "Currency": "USD"},
            "Availability": {"Type": "Now", "Message": "In Stock"},
            "Condition": {"DisplayValue": "New"},
            "MerchantInfo": {"Name": "Acme Store"}
        }]},
        "Images": {
            "Primary": {"Large": {"URL": "https://m.media-amazon.com/images/I/primary.jpg"}},
            "Variants": [
                {"Large": {"URL": "https://m.media-amazon.com/images/I/v1.jpg"}},
                {"Large": {"URL": "https://m.media-amazon.com/images/I/v2.jpg"}}
            ]
        },
        "BrowseNodeInfo": {"BrowseNodes": [
            {
                "Id": "1063252",
                "DisplayName": "Sheets",
                "Ancestor": {
                    "Id": "1063236",
                    "DisplayName": "Bedding",
                    "Ancestor": {"Id": "1055398", "DisplayName": "Home & Kitchen"}
                }
            },
            {
                "Id": "3732341",
                "DisplayName": "Sheet & Pillowcase Sets",
                "Ancestor": {
                    "Id": "1063236",
                    "DisplayName": "Bedding",
                    "Ancestor": {"Id": "1055398", "DisplayName": "Home & Kitchen"}
                }
            }
        ]},
        "CustomerReviews": {"StarRating": {"Value": 4.5}, "Count": 1200}
    })
}

pub(super) fn items_body(items: Vec<Value>) -> Value {
    json!({"ItemsResult": {"Items": items}})
}

pub(super) fn variations_body() -> Value {
    json!({"VariationsResult": {"Items": [
        {
            "ASIN": "B000CHILD1",
            "VariationAttributes": [
                {"Name": "color_name", "Value": "01 - White"},
                {"Name": "size_name", "Value": "Queen"}
            ],
            "Offers": {"Listings": [{"Price": {"Amount": 49.99, "Currency": "USD"}}]}
        },
        {
            "ASIN": "B000CHILD2",
            "VariationAttributes": [
                {"Name": "color_name", "Value": "02 - Grey"},
                {"Name": "size_name", "Value": "King"}
            ],
            "Offers": {"Listings": [{
                "Price": {"Amount": 59.99, "Currency": "USD"},
                "Availability": {"Message": "Only 2 left in stock"}
            }]}
        }
    ]}})
}

/// GetItems for `external_id` answers with `response`
pub(super) async fn mount_items(server: &MockServer, external_id: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/paapi5/getitems"))
        .and(body_partial_json(json!({"ItemIds": [external_id]})))
        .respond_with(response)
        .mount(server)
        .await;
}

pub(super) async fn mount_variations(server: &MockServer, external_id: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/paapi5/getvariations"))
        .and(body_partial_json(json!({"ASIN": external_id})))
        .respond_with(response)
        .mount(server)
        .await;
}

pub(super) fn no_variations() -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({
        "Errors": [{"Code": "NoResults", "Message": "No results found."}]
    }))
}
