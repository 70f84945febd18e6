//! URL handling module
//!
//! This module provides domain and site extraction, allow/deny pattern
//! matching for link following, and URL canonicalization for duplicate
//! filtering.

mod canonical;
mod domain;
mod matcher;

pub use canonical::canonicalize_url;
pub use domain::{extract_domain, site_from_url};
pub use matcher::UrlPatterns;

/// Path segments that mark a link as a product detail page
pub const PRODUCT_PATH_MARKERS: &[&str] = &["/product/", "/products/", "/p/"];

/// Returns true if the URL's path contains a product-path marker
///
/// Only the path is inspected; query strings and fragments are ignored.
/// Unparseable input falls back to a plain substring check.
///
/// # Examples
///
/// ```
/// use weedeater_crawler::url::is_product_url;
///
/// assert!(is_product_url("https://shop.example.com/products/abc123?ref=x"));
/// assert!(is_product_url("https://shop.example.com/p/998"));
/// assert!(!is_product_url("https://shop.example.com/c/trimmers?next=/p/1"));
/// ```
pub fn is_product_url(url_str: &str) -> bool {
    let path = match ::url::Url::parse(url_str) {
        Ok(url) => url.path().to_string(),
        Err(_) => url_str.to_string(),
    };
    PRODUCT_PATH_MARKERS.iter().any(|marker| path.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_markers() {
        assert!(is_product_url("https://shop.example.com/product/1"));
        assert!(is_product_url("https://shop.example.com/products/abc123?ref=x"));
        assert!(is_product_url("https://shop.example.com/en/p/42"));
    }

    #[test]
    fn test_listing_urls() {
        assert!(!is_product_url("https://shop.example.com/c/trimmers"));
        assert!(!is_product_url("https://shop.example.com/productsale"));
        assert!(!is_product_url("https://shop.example.com/search?q=/products/"));
    }
}
