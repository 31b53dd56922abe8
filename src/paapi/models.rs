//! Response shapes for the catalog API
//!
//! Almost every field the remote sends is optional, missing or `null` for
//! some items, so every struct is `#[serde(default)]`, non-optional fields read
//! `null` as their default, and callers go through the accessor methods
//! instead of walking the nesting themselves.

use serde::{Deserialize, Deserializer};

/// Explicit `null` reads the same as a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level body for all three operations
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct ApiResponse {
    pub items_result: Option<ItemsContainer>,
    pub search_result: Option<SearchContainer>,
    pub variations_result: Option<ItemsContainer>,
    #[serde(deserialize_with = "null_as_default")]
    pub errors: Vec<RemoteError>,
}

impl ApiResponse {
    /// Items from `ItemsResult.Items[]`
    pub fn items(&self) -> &[Item] {
        self.items_result
            .as_ref()
            .map(|r| r.items.as_slice())
            .unwrap_or_default()
    }

    /// Items from `SearchResult.Items[]`
    pub fn search_items(&self) -> &[Item] {
        self.search_result
            .as_ref()
            .map(|r| r.items.as_slice())
            .unwrap_or_default()
    }

    /// Items from `VariationsResult.Items[]`
    pub fn variations(&self) -> &[Item] {
        self.variations_result
            .as_ref()
            .map(|r| r.items.as_slice())
            .unwrap_or_default()
    }

    pub fn first_error(&self) -> Option<&RemoteError> {
        self.errors.first()
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct ItemsContainer {
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct SearchContainer {
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<Item>,
    pub total_result_count: Option<u64>,
}

/// Entry of the top-level `Errors` array
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct RemoteError {
    #[serde(deserialize_with = "null_as_default")]
    pub code: String,
    #[serde(deserialize_with = "null_as_default")]
    pub message: String,
}

/// One catalog item
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct Item {
    #[serde(rename = "ASIN", deserialize_with = "null_as_default")]
    pub asin: String,
    #[serde(rename = "ParentASIN")]
    pub parent_asin: Option<String>,
    #[serde(rename = "DetailPageURL")]
    pub detail_page_url: Option<String>,
    pub item_info: Option<ItemInfo>,
    pub offers: Option<Offers>,
    pub images: Option<Images>,
    pub browse_node_info: Option<BrowseNodeInfo>,
    pub customer_reviews: Option<CustomerReviews>,
    #[serde(deserialize_with = "null_as_default")]
    pub variation_attributes: Vec<VariationAttribute>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct ItemInfo {
    pub title: Option<DisplayValue>,
    pub by_line_info: Option<ByLineInfo>,
    pub product_info: Option<ProductInfo>,
    pub features: Option<DisplayValues>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct ByLineInfo {
    pub brand: Option<DisplayValue>,
    pub manufacturer: Option<DisplayValue>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct ProductInfo {
    pub color: Option<DisplayValue>,
    pub size: Option<DisplayValue>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct DisplayValue {
    pub display_value: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct DisplayValues {
    #[serde(deserialize_with = "null_as_default")]
    pub display_values: Vec<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct Offers {
    #[serde(deserialize_with = "null_as_default")]
    pub listings: Vec<Listing>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct Listing {
    pub price: Option<Money>,
    pub saving_basis: Option<Money>,
    pub availability: Option<Availability>,
    pub condition: Option<DisplayValue>,
    pub merchant_info: Option<MerchantInfo>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct Money {
    pub amount: Option<f64>,
    pub currency: Option<String>,
    pub display_amount: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct Availability {
    #[serde(rename = "Type")]
    pub kind: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct MerchantInfo {
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct Images {
    pub primary: Option<ImageSizes>,
    #[serde(deserialize_with = "null_as_default")]
    pub variants: Vec<ImageSizes>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct ImageSizes {
    pub large: Option<ImageRef>,
    pub medium: Option<ImageRef>,
    pub small: Option<ImageRef>,
}

impl ImageSizes {
    /// Largest available rendition and its size label
    pub fn best(&self) -> Option<(&str, &'static str)> {
        [
            (&self.large, "large"),
            (&self.medium, "medium"),
            (&self.small, "small"),
        ]
        .into_iter()
        .find_map(|(image, label)| {
            image
                .as_ref()
                .and_then(|i| i.url.as_deref())
                .filter(|url| !url.is_empty())
                .map(|url| (url, label))
        })
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct ImageRef {
    #[serde(rename = "URL")]
    pub url: Option<String>,
    pub height: Option<u32>,
    pub width: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct BrowseNodeInfo {
    #[serde(deserialize_with = "null_as_default")]
    pub browse_nodes: Vec<BrowseNode>,
}

/// Category node; `ancestor` links towards the root
#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct BrowseNode {
    pub id: Option<String>,
    pub display_name: Option<String>,
    pub context_free_name: Option<String>,
    pub is_root: Option<bool>,
    pub sales_rank: Option<i64>,
    pub ancestor: Option<Box<BrowseNode>>,
}

impl BrowseNode {
    /// Ancestors from the immediate parent up to the root
    pub fn ancestors(&self) -> Vec<&BrowseNode> {
        let mut chain = Vec::new();
        let mut current = self.ancestor.as_deref();
        while let Some(node) = current {
            chain.push(node);
            current = node.ancestor.as_deref();
        }
        chain
    }

    /// `Root > ... > Self` using display names
    pub fn breadcrumb(&self) -> String {
        let mut names: Vec<&str> = self
            .ancestors()
            .into_iter()
            .rev()
            .filter_map(|n| n.display_name.as_deref())
            .collect();
        if let Some(name) = self.display_name.as_deref() {
            names.push(name);
        }
        names.join(" > ")
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct CustomerReviews {
    pub star_rating: Option<StarRating>,
    pub count: Option<i64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct StarRating {
    pub value: Option<f64>,
}

#[derive(Debug, Default, Deserialize, Clone)]
#[serde(default, rename_all = "PascalCase")]
pub struct VariationAttribute {
    #[serde(deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(deserialize_with = "null_as_default")]
    pub value: String,
}

fn display(value: &Option<DisplayValue>) -> Option<&str> {
    value
        .as_ref()
        .and_then(|v| v.display_value.as_deref())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

impl Item {
    pub fn title(&self) -> Option<&str> {
        self.item_info.as_ref().and_then(|i| display(&i.title))
    }

    pub fn brand(&self) -> Option<&str> {
        self.item_info
            .as_ref()
            .and_then(|i| i.by_line_info.as_ref())
            .and_then(|b| display(&b.brand))
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.item_info
            .as_ref()
            .and_then(|i| i.by_line_info.as_ref())
            .and_then(|b| display(&b.manufacturer))
    }

    pub fn color(&self) -> Option<&str> {
        self.item_info
            .as_ref()
            .and_then(|i| i.product_info.as_ref())
            .and_then(|p| display(&p.color))
    }

    pub fn size(&self) -> Option<&str> {
        self.item_info
            .as_ref()
            .and_then(|i| i.product_info.as_ref())
            .and_then(|p| display(&p.size))
    }

    /// Feature bullets in response order
    pub fn features(&self) -> &[String] {
        self.item_info
            .as_ref()
            .and_then(|i| i.features.as_ref())
            .map(|f| f.display_values.as_slice())
            .unwrap_or_default()
    }

    /// First offer listing, which is the one the catalog shows as the buy box
    pub fn listing(&self) -> Option<&Listing> {
        self.offers.as_ref().and_then(|o| o.listings.first())
    }

    /// Price amount and currency (currency defaults to USD)
    pub fn price(&self) -> Option<(f64, String)> {
        let money = self.listing()?.price.as_ref()?;
        let amount = money.amount.filter(|a| *a > 0.0)?;
        let currency = money
            .currency
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| "USD".to_string());
        Some((amount, currency))
    }

    /// Whole-number percentage saved against the listing's saving basis
    pub fn discount_percentage(&self) -> Option<i64> {
        let listing = self.listing()?;
        let price = listing.price.as_ref()?.amount?;
        let basis = listing.saving_basis.as_ref()?.amount?;
        if basis > price && price > 0.0 {
            Some(((basis - price) / basis * 100.0) as i64)
        } else {
            None
        }
    }

    pub fn availability(&self) -> Option<&Availability> {
        self.listing().and_then(|l| l.availability.as_ref())
    }

    pub fn condition(&self) -> Option<&str> {
        self.listing().and_then(|l| display(&l.condition))
    }

    pub fn merchant(&self) -> Option<&str> {
        self.listing()
            .and_then(|l| l.merchant_info.as_ref())
            .and_then(|m| m.name.as_deref())
            .filter(|s| !s.is_empty())
    }

    /// Primary image URL and size label
    pub fn primary_image(&self) -> Option<(&str, &'static str)> {
        self.images
            .as_ref()
            .and_then(|i| i.primary.as_ref())
            .and_then(ImageSizes::best)
    }

    /// Variant images with their index in the response; entries without a
    /// URL are skipped without shifting the indices of later ones
    pub fn variant_images(&self) -> Vec<(usize, &str, &'static str)> {
        self.images
            .as_ref()
            .map(|i| {
                i.variants
                    .iter()
                    .enumerate()
                    .filter_map(|(index, sizes)| {
                        sizes.best().map(|(url, size)| (index, url, size))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn browse_nodes(&self) -> &[BrowseNode] {
        self.browse_node_info
            .as_ref()
            .map(|b| b.browse_nodes.as_slice())
            .unwrap_or_default()
    }

    pub fn star_rating(&self) -> Option<f64> {
        self.customer_reviews
            .as_ref()
            .and_then(|r| r.star_rating.as_ref())
            .and_then(|s| s.value)
    }

    pub fn review_count(&self) -> Option<i64> {
        self.customer_reviews.as_ref().and_then(|r| r.count)
    }

    /// Value of the first variation attribute whose name mentions `fragment`
    /// (`"color"` matches `color_name`, `Color`, ...); blank values count as
    /// missing
    pub fn variation_attribute(&self, fragment: &str) -> Option<&str> {
        self.variation_attributes
            .iter()
            .find(|a| a.name.to_ascii_lowercase().contains(fragment))
            .map(|a| a.value.trim())
            .filter(|v| !v.is_empty())
    }
}
