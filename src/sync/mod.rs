//! Per-product synchronization from the remote catalog into the store
//!
//! All remote calls for a product finish before its transaction opens, so a
//! failed or interrupted sync leaves the previous rows intact.

mod runner;

pub use runner::{Candidate, RunStats, SyncRunner};

use crate::database::{
    self, CategoryLinkRow, CategoryNode, FeatureRow, ImageRow, ProductUpdate, ReviewSummaryRow,
    VariationRow,
};
use crate::error::{Result, SyncError};
use crate::extract;
use crate::paapi::{ApiClient, BrowseNode, Item, ITEM_RESOURCES};
use rusqlite::{Connection, Transaction};
use std::collections::HashSet;

/// Provenance recorded on category associations written by sync
pub const CATEGORY_SOURCE: &str = "api";
pub const FEATURE_TYPE: &str = "bullet_point";
const HIGHLIGHTED_FEATURES: usize = 3;

/// What one product sync wrote
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncStats {
    pub product_id: i64,
    pub external_id: String,
    pub brand_id: Option<i64>,
    pub brand_created: bool,
    pub variations: usize,
    pub categories: usize,
    pub features: usize,
    pub images: usize,
    pub review_summary: bool,
    /// Error from the variations fetch when the rest of the sync committed
    pub partial: Option<String>,
    /// Optional field groups the remote did not return
    pub missing_fields: Vec<&'static str>,
}

impl SyncStats {
    fn new(product_id: i64, external_id: &str) -> Self {
        Self {
            product_id,
            external_id: external_id.to_string(),
            ..Default::default()
        }
    }

    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }
}

/// Syncs one product at a time against a shared client
pub struct EntitySynchronizer<'a> {
    client: &'a ApiClient,
}

impl<'a> EntitySynchronizer<'a> {
    pub fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Fetch `external_id` and rewrite everything the store holds for
    /// `product_id` in one transaction
    pub async fn sync(
        &self,
        conn: &mut Connection,
        product_id: i64,
        external_id: &str,
    ) -> Result<SyncStats> {
        if !database::product_exists(conn, product_id)? {
            return Err(SyncError::UnknownProduct(product_id));
        }

        let response = self.client.get_items(external_id, ITEM_RESOURCES).await?;
        let item = response
            .items()
            .first()
            .ok_or_else(|| SyncError::NotFound(external_id.to_string()))?;

        let variations = match self.client.get_variations(external_id).await {
            Ok(response) => Ok(variation_rows(response.variations())),
            Err(e) => {
                log::warn!(
                    "Variations for {} unavailable, keeping stored rows: {}",
                    external_id,
                    e
                );
                Err(e.to_string())
            }
        };

        let mut stats = SyncStats::new(product_id, external_id);
        stats.missing_fields = missing_fields(item);
        for field in &stats.missing_fields {
            log::warn!("{}: response has no {}", external_id, field);
        }

        let tx = conn.transaction()?;
        write_item(&tx, product_id, item, variations, &mut stats)?;
        tx.commit()?;

        log::info!(
            "Synced product {} ({}): {} variations, {} categories, {} features, {} images",
            product_id,
            external_id,
            stats.variations,
            stats.categories,
            stats.features,
            stats.images
        );
        Ok(stats)
    }
}

/// Steps run inside the product transaction, in dependency order
fn write_item(
    tx: &Transaction<'_>,
    product_id: i64,
    item: &Item,
    variations: std::result::Result<Vec<VariationRow>, String>,
    stats: &mut SyncStats,
) -> Result<()> {
    let mut update = product_update(item);

    if let Some(brand) = item.brand() {
        let (brand_id, created) = database::find_or_create_brand(tx, brand, item.manufacturer())?;
        update.brand_id = Some(brand_id);
        stats.brand_id = Some(brand_id);
        stats.brand_created = created;
    }
    database::update_product(tx, product_id, &update)?;

    match variations {
        Ok(rows) => stats.variations = database::replace_children(tx, product_id, &rows)?,
        Err(message) => stats.partial = Some(message),
    }

    let links = upsert_categories(tx, item.browse_nodes())?;
    stats.categories = database::replace_children(tx, product_id, &links)?;

    stats.features = database::replace_children(tx, product_id, &feature_rows(item.features()))?;
    stats.images = database::replace_children(tx, product_id, &image_rows(item))?;

    let review = review_row(item);
    database::replace_children(tx, product_id, review.as_slice())?;
    stats.review_summary = review.is_some();

    Ok(())
}

fn missing_fields(item: &Item) -> Vec<&'static str> {
    let checks = [
        ("title", item.title().is_some()),
        ("brand", item.brand().is_some()),
        ("price", item.price().is_some()),
        ("availability", item.availability().is_some()),
        ("features", !item.features().is_empty()),
        ("images", item.primary_image().is_some()),
        ("categories", !item.browse_nodes().is_empty()),
        ("reviews", item.customer_reviews.is_some()),
    ];
    checks
        .into_iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| name)
        .collect()
}

/// Product columns from the item; text attributes come from the bullets only
fn product_update(item: &Item) -> ProductUpdate {
    let text = extract::feature_text(item.features());
    let (price, currency) = match item.price() {
        Some((amount, currency)) => (Some(amount), Some(currency)),
        None => (None, None),
    };

    ProductUpdate {
        title: item.title().map(str::to_string),
        brand_id: None,
        brand_name: item.brand().map(str::to_string),
        manufacturer: item.manufacturer().map(str::to_string),
        color_code: item.color().map(extract::clean_color).map(str::to_string),
        size_code: item.size().map(str::to_string),
        price,
        currency,
        discount_percentage: item.discount_percentage(),
        condition: item.condition().map(str::to_string),
        merchant_name: item.merchant().map(str::to_string),
        availability: extract::availability_status(item.availability()).map(str::to_string),
        material: extract::material(&text).map(str::to_string),
        thread_count: extract::thread_count(&text),
        weave_type: extract::weave_type(&text).map(str::to_string),
    }
}

fn variation_rows(items: &[Item]) -> Vec<VariationRow> {
    items
        .iter()
        .filter(|item| !item.asin.trim().is_empty())
        .enumerate()
        .map(|(ordinal, item)| {
            let color = item.variation_attribute("color").or_else(|| item.color());
            let size = item.variation_attribute("size").or_else(|| item.size());
            let label = extract::variation_label(color, size, ordinal);
            let (price, currency) = match item.price() {
                Some((amount, currency)) => (Some(amount), Some(currency)),
                None => (None, None),
            };

            VariationRow {
                external_id: item.asin.trim().to_string(),
                variation_type: label.axis.as_str(),
                value: label.value,
                code: label.code,
                display_name: item.title().map(str::to_string),
                condition: item.condition().map(str::to_string),
                price,
                currency,
                availability: extract::availability_status(item.availability()),
                image_url: item.primary_image().map(|(url, _)| url.to_string()),
                is_primary: ordinal == 0,
                ordinal: ordinal as i64,
            }
        })
        .collect()
}

fn category_node(node: &BrowseNode) -> Option<CategoryNode> {
    let external_id = node.id.as_deref().filter(|id| !id.is_empty())?;
    let name = node
        .display_name
        .as_deref()
        .or(node.context_free_name.as_deref())
        .unwrap_or(external_id);

    Some(CategoryNode {
        external_id: external_id.to_string(),
        name: name.to_string(),
        context_free_name: node.context_free_name.clone(),
        parent_external_id: node.ancestor.as_ref().and_then(|a| a.id.clone()),
        is_root: node.is_root.unwrap_or(node.ancestor.is_none()),
        path: Some(node.breadcrumb()).filter(|p| !p.is_empty()),
    })
}

/// Upsert each node and its ancestor chain (root first) into the catalog and
/// build the product's association rows in response order
fn upsert_categories(tx: &Transaction<'_>, nodes: &[BrowseNode]) -> Result<Vec<CategoryLinkRow>> {
    let mut links: Vec<CategoryLinkRow> = Vec::new();
    let mut linked = HashSet::new();

    for node in nodes {
        for ancestor in node.ancestors().into_iter().rev() {
            if let Some(category) = category_node(ancestor) {
                database::upsert_category(tx, &category)?;
            }
        }

        let Some(category) = category_node(node) else {
            log::warn!("Skipping browse node without id: {:?}", node.display_name);
            continue;
        };
        let category_id = database::upsert_category(tx, &category)?;

        if linked.insert(category_id) {
            links.push(CategoryLinkRow {
                category_id,
                rank: links.len() as i64 + 1,
                is_primary: links.is_empty(),
                source: CATEGORY_SOURCE,
            });
        }
    }

    Ok(links)
}

fn feature_rows(features: &[String]) -> Vec<FeatureRow> {
    features
        .iter()
        .map(|f| f.trim())
        .filter(|f| !f.is_empty())
        .enumerate()
        .map(|(i, text)| FeatureRow {
            text: text.to_string(),
            feature_type: FEATURE_TYPE,
            is_highlighted: i < HIGHLIGHTED_FEATURES,
            ordinal: i as i64,
        })
        .collect()
}

/// Primary image at ordinal 0; a variant image sits at its response index + 1
fn image_rows(item: &Item) -> Vec<ImageRow> {
    let mut rows = Vec::new();

    if let Some((url, size)) = item.primary_image() {
        rows.push(ImageRow {
            url: url.to_string(),
            image_type: "primary",
            size,
            is_primary: true,
            ordinal: 0,
        });
    }

    for (i, url, size) in item.variant_images() {
        rows.push(ImageRow {
            url: url.to_string(),
            image_type: "variant",
            size,
            is_primary: false,
            ordinal: i as i64 + 1,
        });
    }

    rows
}

fn review_row(item: &Item) -> Option<ReviewSummaryRow> {
    let average_rating = item.star_rating();
    let review_count = item.review_count();
    if average_rating.is_none() && review_count.is_none() {
        return None;
    }
    Some(ReviewSummaryRow {
        average_rating,
        review_count,
    })
}

#[cfg(test)]
#[path = "tests/mod.rs"]
mod tests;
