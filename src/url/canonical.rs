use crate::UrlError;
use url::Url;

/// Query parameters that never change page content
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "mc_eid",
];

/// Computes the canonical form of a URL used as the frontier's duplicate key
///
/// # Canonicalization Steps
///
/// 1. Parse the URL; reject if malformed or not HTTP(S)
/// 2. Lowercase the host (done by the parser)
/// 3. Remove dot segments and empty segments from the path
/// 4. Remove the fragment
/// 5. Remove tracking query parameters
/// 6. Sort remaining query parameters by key, keeping value order stable
///
/// The fetched URL is never rewritten; only the duplicate key is.
///
/// # Examples
///
/// ```
/// use weedeater_crawler::url::canonicalize_url;
///
/// let key = canonicalize_url("https://SHOP.example.com/c/../p/1?b=2&a=1#top").unwrap();
/// assert_eq!(key, "https://shop.example.com/p/1?a=1&b=2");
/// ```
pub fn canonicalize_url(url_str: &str) -> Result<String, UrlError> {
    let mut url = Url::parse(url_str).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    let path = normalize_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url.to_string())
}

/// Removes dot segments and repeated slashes, keeping a trailing slash
fn normalize_path(path: &str) -> String {
    let trailing_slash = path.len() > 1 && path.ends_with('/');
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if trailing_slash {
        result.push('/');
    }
    result
}

fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort_by(|a, b| a.0.cmp(&b.0));
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_removed() {
        let key = canonicalize_url("https://shop.example.com/p/1#reviews").unwrap();
        assert_eq!(key, "https://shop.example.com/p/1");
    }

    #[test]
    fn test_query_sorted() {
        let key = canonicalize_url("https://shop.example.com/c?page=2&sort=price").unwrap();
        let reordered = canonicalize_url("https://shop.example.com/c?sort=price&page=2").unwrap();
        assert_eq!(key, reordered);
    }

    #[test]
    fn test_tracking_params_removed() {
        let key = canonicalize_url("https://shop.example.com/p/1?utm_source=mail&gclid=x").unwrap();
        assert_eq!(key, "https://shop.example.com/p/1");
    }

    #[test]
    fn test_functional_params_kept() {
        let key = canonicalize_url("https://shop.example.com/products/abc?ref=x").unwrap();
        assert_eq!(key, "https://shop.example.com/products/abc?ref=x");
    }

    #[test]
    fn test_host_lowercased_path_case_kept() {
        let key = canonicalize_url("https://SHOP.Example.COM/Products/ABC").unwrap();
        assert_eq!(key, "https://shop.example.com/Products/ABC");
    }

    #[test]
    fn test_dot_segments() {
        let key = canonicalize_url("https://shop.example.com/a/../b/./c//d/").unwrap();
        assert_eq!(key, "https://shop.example.com/b/c/d/");
    }

    #[test]
    fn test_rejects_non_http() {
        assert!(matches!(
            canonicalize_url("mailto:sales@example.com"),
            Err(UrlError::InvalidScheme(_))
        ));
        assert!(canonicalize_url("not a url").is_err());
    }
}
