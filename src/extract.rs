//! Attributes derived from free text: thread count, weave, material,
//! variant color/size axis and stock status.

use crate::paapi::models::Availability;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    /// "1000 thread count", "1000-Thread-Count", "thread count: 600"
    static ref THREAD_COUNT: Regex = Regex::new(
        r"(?i)\b(\d{3,4})[\s-]*thread[\s-]*count\b|\bthread[\s-]*count\s*(?:of|:|-)?\s*(\d{3,4})\b"
    )
    .expect("thread count pattern is valid");
}

/// Checked in order; the first substring hit wins
const WEAVES: &[&str] = &["sateen", "percale", "flannel"];

/// Most specific first so "egyptian cotton" beats "cotton"
const MATERIALS: &[(&str, &str)] = &[
    ("egyptian cotton", "Egyptian Cotton"),
    ("organic cotton", "Organic Cotton"),
    ("pima cotton", "Pima Cotton"),
    ("bamboo viscose", "Bamboo Viscose"),
    ("bamboo", "Bamboo"),
    ("eucalyptus", "Eucalyptus"),
    ("tencel", "Tencel"),
    ("microfiber", "Microfiber"),
    ("polyester", "Polyester"),
    ("linen", "Linen"),
    ("silk", "Silk"),
    ("modal", "Modal"),
    ("rayon", "Rayon"),
    ("jersey", "Jersey"),
    ("cotton", "Cotton"),
];

/// Feature bullets joined into the text all extractors scan; the title is
/// never part of it
pub fn feature_text(features: &[String]) -> String {
    features.join("; ")
}

/// First 3–4 digit number adjacent to "thread count"
pub fn thread_count(text: &str) -> Option<i64> {
    let caps = THREAD_COUNT.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(2))
        .and_then(|m| m.as_str().parse().ok())
}

pub fn weave_type(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    WEAVES.iter().copied().find(|w| lower.contains(w))
}

pub fn material(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    MATERIALS
        .iter()
        .find(|(pattern, _)| lower.contains(pattern))
        .map(|(_, name)| *name)
}

/// "05 - Ivory" -> "Ivory": everything up to the first `" - "` is a code
pub fn clean_color(value: &str) -> &str {
    match value.split_once(" - ") {
        Some((_, color)) => color.trim(),
        None => value.trim(),
    }
}

/// Which attributes distinguish a variant from its siblings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariationAxis {
    Color,
    Size,
    ColorSize,
    Unspecified,
}

impl VariationAxis {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariationAxis::Color => "color",
            VariationAxis::Size => "size",
            VariationAxis::ColorSize => "color_size",
            VariationAxis::Unspecified => "none",
        }
    }
}

/// Axis, display value and code for one variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariationLabel {
    pub axis: VariationAxis,
    pub value: String,
    pub code: String,
}

/// Label a variant from its (raw) color and size attributes.
/// `ordinal` is zero-based and only used when neither attribute is present.
pub fn variation_label(color: Option<&str>, size: Option<&str>, ordinal: usize) -> VariationLabel {
    let color = color.map(clean_color).filter(|c| !c.is_empty());
    let size = size.map(str::trim).filter(|s| !s.is_empty());

    match (color, size) {
        (Some(color), Some(size)) => VariationLabel {
            axis: VariationAxis::ColorSize,
            value: format!("{} - {}", color, size),
            code: format!("{}_{}", color, size),
        },
        (Some(color), None) => VariationLabel {
            axis: VariationAxis::Color,
            value: color.to_string(),
            code: color.to_string(),
        },
        (None, Some(size)) => VariationLabel {
            axis: VariationAxis::Size,
            value: size.to_string(),
            code: size.to_string(),
        },
        (None, None) => VariationLabel {
            axis: VariationAxis::Unspecified,
            value: format!("Variation {}", ordinal + 1),
            code: format!("var_{}", ordinal + 1),
        },
    }
}

/// Coarse stock status: `in_stock`, `limited`, `out_of_stock` or `preorder`.
/// None when the listing carried no availability at all.
pub fn availability_status(availability: Option<&Availability>) -> Option<&'static str> {
    let availability = availability?;
    let message = availability
        .message
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    let kind = availability.kind.as_deref().unwrap_or_default();

    if message.is_empty() && kind.is_empty() {
        return None;
    }

    let status = if message.contains("out of stock") || message.contains("unavailable") {
        "out_of_stock"
    } else if kind.eq_ignore_ascii_case("preorder") || message.contains("pre-order") {
        "preorder"
    } else if message.contains("limited") || message.contains("only ") {
        "limited"
    } else {
        "in_stock"
    };
    Some(status)
}
