//! Product extraction
//!
//! Each record field is filled by an ordered chain of strategies. The first
//! strategy that yields a non-empty value wins; when all fail the field stays
//! `None`. Chains list structured-data attributes first, then class-name
//! heuristics, then free-text regex matches.

use crate::crawler::RenderedPage;
use crate::model::{Availability, ProductRecord, RawDocument, TraversalContext};
use chrono::{DateTime, Utc};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use url::Url;

/// One way of reading a value out of a rendered document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Whitespace-normalized text of the first matching element that has any
    Text(&'static str),
    /// Attribute of the first matching element that carries it
    Attr(&'static str, &'static str),
    /// Text of every matching element, joined
    AllText(&'static str),
    /// First capture group of a regex applied to the joined text of all matches
    TextRegex(&'static str, &'static str),
}

impl Strategy {
    /// Evaluates the strategy; empty results count as no match
    pub fn evaluate(&self, document: &Html) -> Option<String> {
        let value = match *self {
            Strategy::Text(selector) => {
                let selector = Selector::parse(selector).ok()?;
                document
                    .select(&selector)
                    .map(|element| element_text(&element))
                    .find(|text| !text.is_empty())
            }
            Strategy::Attr(selector, attr) => {
                let selector = Selector::parse(selector).ok()?;
                document
                    .select(&selector)
                    .filter_map(|element| element.value().attr(attr))
                    .map(str::trim)
                    .find(|value| !value.is_empty())
                    .map(String::from)
            }
            Strategy::AllText(selector) => Some(joined_text(document, selector)?),
            Strategy::TextRegex(selector, pattern) => {
                let text = joined_text(document, selector)?;
                let re = Regex::new(pattern).ok()?;
                re.captures(&text)
                    .and_then(|caps| caps.get(1).or_else(|| caps.get(0)))
                    .map(|m| m.as_str().to_string())
            }
        };

        value.filter(|v| !v.is_empty())
    }
}

/// Returns the first non-empty value produced by the chain
pub fn first_match(document: &Html, chain: &[Strategy]) -> Option<String> {
    chain.iter().find_map(|strategy| strategy.evaluate(document))
}

pub const PRODUCT_NAME: &[Strategy] = &[Strategy::Text("h1"), Strategy::Text("h1 span")];

pub const BRAND: &[Strategy] = &[
    Strategy::Text("[itemprop=\"brand\"]"),
    Strategy::Attr("meta[itemprop=\"brand\"]", "content"),
    Strategy::Text(".brand"),
];

pub const SKU: &[Strategy] = &[
    Strategy::Text("[itemprop=\"sku\"]"),
    Strategy::Attr("meta[itemprop=\"sku\"]", "content"),
    Strategy::Text("span.sku"),
];

pub const UPC: &[Strategy] = &[
    Strategy::Attr("[itemprop=\"gtin13\"]", "content"),
    Strategy::Attr("[data-upc]", "data-upc"),
];

pub const PRICE: &[Strategy] = &[
    Strategy::Attr("[itemprop=\"price\"]", "content"),
    Strategy::TextRegex(".price", r"\$?\s*([0-9][0-9,]*(?:\.[0-9]+)?)"),
];

pub const CURRENCY: &[Strategy] = &[Strategy::Attr("[itemprop=\"priceCurrency\"]", "content")];

pub const AVAILABILITY: &[Strategy] = &[
    Strategy::Attr("[itemprop=\"availability\"]", "content"),
    Strategy::Attr("[itemprop=\"availability\"]", "href"),
];

pub const DESCRIPTION: &[Strategy] = &[
    Strategy::AllText("[itemprop=\"description\"]"),
    Strategy::AllText(".description"),
];

pub const CATEGORY: &[Strategy] = &[
    Strategy::Text("[itemprop=\"category\"]"),
    Strategy::Attr("meta[itemprop=\"category\"]", "content"),
    Strategy::Text(".category"),
];

/// Currency assumed when a price is found without one
pub const DEFAULT_CURRENCY: &str = "USD";

const SPEC_CONTAINERS: &str = "table, .specs, .product-specs";
const SPEC_ROWS: &str = "tr, .spec-row";
const SPEC_LABELS: &str = "th, .label";
const SPEC_VALUES: &str = "td, .value";
const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-original"];
const BREADCRUMB_LINKS: &str = "nav.breadcrumbs a, .breadcrumbs a";

/// Extracts a product record from a rendered product page
///
/// Never fails: fields that cannot be found are left empty. The page body is
/// attached as a raw document for the persistence stage.
pub fn extract_product(page: &RenderedPage, context: &TraversalContext) -> ProductRecord {
    extract_product_at(page, context, Utc::now())
}

/// Same as [`extract_product`] with an explicit crawl timestamp
pub fn extract_product_at(
    page: &RenderedPage,
    context: &TraversalContext,
    crawled_at: DateTime<Utc>,
) -> ProductRecord {
    let document = Html::parse_document(&page.body);
    let mut record = ProductRecord::new(page.url.clone(), crawled_at);

    record.site = crate::crawler::resolve_site(context, &page.url);
    record.product_name = first_match(&document, PRODUCT_NAME);
    record.brand = first_match(&document, BRAND);
    record.sku = first_match(&document, SKU);
    record.upc = first_match(&document, UPC);
    record.price = first_match(&document, PRICE);
    record.currency = first_match(&document, CURRENCY)
        .or_else(|| record.price.as_ref().map(|_| DEFAULT_CURRENCY.to_string()));
    record.availability = first_match(&document, AVAILABILITY)
        .as_deref()
        .and_then(Availability::detect);
    record.description = first_match(&document, DESCRIPTION);
    record.category = first_match(&document, CATEGORY);
    record.specs = extract_specs(&document);
    record.images = extract_images(&document, &page.url);
    record.breadcrumbs = extract_breadcrumbs(&document);

    record.raw_document = Some(RawDocument {
        bytes: page.body.as_bytes().to_vec(),
        url: page.url.clone(),
        captured_at: crawled_at,
    });

    record
}

/// Label/value pairs from every row of every specs container
///
/// Rows missing a label or a value are skipped. A repeated label keeps the
/// last value seen.
fn extract_specs(document: &Html) -> BTreeMap<String, String> {
    let mut specs = BTreeMap::new();

    let (Ok(containers), Ok(rows), Ok(labels), Ok(values)) = (
        Selector::parse(SPEC_CONTAINERS),
        Selector::parse(SPEC_ROWS),
        Selector::parse(SPEC_LABELS),
        Selector::parse(SPEC_VALUES),
    ) else {
        return specs;
    };

    for container in document.select(&containers) {
        for row in container.select(&rows) {
            let label = joined_element_text(row.select(&labels));
            let value = joined_element_text(row.select(&values));
            if !label.is_empty() && !value.is_empty() {
                specs.insert(label, value);
            }
        }
    }

    specs
}

/// Image sources in document order; lazy-load attributes follow `src`
fn extract_images(document: &Html, page_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("img") else {
        return Vec::new();
    };
    let base = Url::parse(page_url).ok();

    let mut images = Vec::new();
    for img in document.select(&selector) {
        for attr in IMAGE_ATTRS {
            let Some(raw) = img.value().attr(attr).map(str::trim) else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }
            let resolved = base
                .as_ref()
                .and_then(|base| base.join(raw).ok())
                .map(|url| url.to_string())
                .unwrap_or_else(|| raw.to_string());
            images.push(resolved);
        }
    }
    images
}

fn extract_breadcrumbs(document: &Html) -> Vec<String> {
    let Ok(selector) = Selector::parse(BREADCRUMB_LINKS) else {
        return Vec::new();
    };

    document
        .select(&selector)
        .map(|element| element_text(&element))
        .filter(|text| !text.is_empty())
        .collect()
}

fn element_text(element: &ElementRef<'_>) -> String {
    normalize_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn joined_element_text<'a>(elements: impl Iterator<Item = ElementRef<'a>>) -> String {
    let parts: Vec<String> = elements.map(|element| element_text(&element)).collect();
    normalize_whitespace(&parts.join(" "))
}

fn joined_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    Some(joined_element_text(document.select(&selector)))
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
