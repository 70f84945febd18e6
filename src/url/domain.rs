use url::Url;

/// Extracts the lowercase host from a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use weedeater_crawler::url::extract_domain;
///
/// let url = Url::parse("https://Shop.Example.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("shop.example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Derives a site identifier from a page URL
///
/// Returns the registrable domain according to the public suffix list, so
/// `www.shop.example.co.uk` becomes `example.co.uk`. IP hosts and hosts that
/// are themselves a public suffix (`localhost`) are returned unchanged.
///
/// # Examples
///
/// ```
/// use weedeater_crawler::url::site_from_url;
///
/// assert_eq!(site_from_url("https://www.shop.example.com/c/1"), Some("example.com".to_string()));
/// assert_eq!(site_from_url("https://store.example.co.uk/"), Some("example.co.uk".to_string()));
/// ```
pub fn site_from_url(url_str: &str) -> Option<String> {
    let url = Url::parse(url_str).ok()?;
    let host = extract_domain(&url)?;

    if matches!(url.host(), Some(url::Host::Ipv4(_)) | Some(url::Host::Ipv6(_))) {
        return Some(host);
    }

    let trimmed = host.trim_end_matches('.');
    let site = psl::domain_str(trimmed).unwrap_or(trimmed);
    Some(site.to_string())
}
