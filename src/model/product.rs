use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Normalized stock status of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    InStock,
    OutOfStock,
    PreOrder,
}

impl Availability {
    /// Finds the first availability token in free text
    ///
    /// Structured-data values usually look like `https://schema.org/InStock`,
    /// so the token is searched anywhere in the string.
    pub fn detect(text: &str) -> Option<Self> {
        let candidates = [
            ("InStock", Self::InStock),
            ("OutOfStock", Self::OutOfStock),
            ("PreOrder", Self::PreOrder),
        ];

        candidates
            .iter()
            .filter_map(|(token, value)| text.find(token).map(|pos| (pos, *value)))
            .min_by_key(|(pos, _)| *pos)
            .map(|(_, value)| value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "InStock",
            Self::OutOfStock => "OutOfStock",
            Self::PreOrder => "PreOrder",
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw page bytes captured alongside a product record
///
/// Held only until the raw-document sink has had a chance to upload it.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    pub url: String,
    pub captured_at: DateTime<Utc>,
}

/// Structured product extracted from a single product page
///
/// Every scalar field is best-effort and may be `None`. Collections are
/// always present and empty when nothing was found.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub source_url: String,
    pub crawled_at: DateTime<Utc>,
    pub site: Option<String>,
    pub brand: Option<String>,
    pub product_name: Option<String>,
    pub sku: Option<String>,
    pub upc: Option<String>,
    pub category: Option<String>,
    pub price: Option<String>,
    pub currency: Option<String>,
    pub availability: Option<Availability>,
    pub description: Option<String>,
    #[serde(default)]
    pub specs: BTreeMap<String, String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub breadcrumbs: Vec<String>,
    pub raw_document_ref: Option<String>,

    #[serde(skip)]
    pub raw_document: Option<RawDocument>,
}

impl ProductRecord {
    /// Creates an empty record for a source URL
    pub fn new(source_url: impl Into<String>, crawled_at: DateTime<Utc>) -> Self {
        Self {
            source_url: source_url.into(),
            crawled_at,
            site: None,
            brand: None,
            product_name: None,
            sku: None,
            upc: None,
            category: None,
            price: None,
            currency: None,
            availability: None,
            description: None,
            specs: BTreeMap::new(),
            images: Vec::new(),
            breadcrumbs: Vec::new(),
            raw_document_ref: None,
            raw_document: None,
        }
    }

    /// Returns the identity used by keyed sinks: the SKU when present,
    /// otherwise the source URL
    pub fn identity_key(&self) -> &str {
        self.sku
            .as_deref()
            .map(str::trim)
            .filter(|sku| !sku.is_empty())
            .unwrap_or(&self.source_url)
    }
}
