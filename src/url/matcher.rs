use regex::Regex;

/// A single allow/deny pattern
///
/// Patterns are regular expressions searched anywhere in the absolute URL.
/// A pattern that is not a valid regex is matched as a literal substring.
#[derive(Debug, Clone)]
enum UrlPattern {
    Regex(Regex),
    Literal(String),
}

impl UrlPattern {
    fn compile(pattern: &str) -> Self {
        match Regex::new(pattern) {
            Ok(re) => Self::Regex(re),
            Err(e) => {
                tracing::debug!("Pattern '{}' is not a regex ({}), matching literally", pattern, e);
                Self::Literal(pattern.to_string())
            }
        }
    }

    fn is_match(&self, url: &str) -> bool {
        match self {
            Self::Regex(re) => re.is_match(url),
            Self::Literal(s) => url.contains(s.as_str()),
        }
    }
}

/// Compiled allow/deny lists for link following
///
/// A URL is accepted when it matches at least one allow pattern (or the
/// allow list is empty) and matches no deny pattern.
#[derive(Debug, Clone)]
pub struct UrlPatterns {
    allow: Vec<UrlPattern>,
    deny: Vec<UrlPattern>,
}

impl UrlPatterns {
    pub fn new<S: AsRef<str>>(allow: &[S], deny: &[S]) -> Self {
        Self {
            allow: allow.iter().map(|p| UrlPattern::compile(p.as_ref())).collect(),
            deny: deny.iter().map(|p| UrlPattern::compile(p.as_ref())).collect(),
        }
    }

    /// Returns true if the absolute URL should be followed
    ///
    /// # Examples
    ///
    /// ```
    /// use weedeater_crawler::url::UrlPatterns;
    ///
    /// let patterns = UrlPatterns::new(&["/products/"], &["/cart"]);
    /// assert!(patterns.accepts("https://shop.example.com/products/abc123?ref=x"));
    /// assert!(!patterns.accepts("https://shop.example.com/cart"));
    /// ```
    pub fn accepts(&self, url: &str) -> bool {
        let allowed = self.allow.is_empty() || self.allow.iter().any(|p| p.is_match(url));
        allowed && !self.deny.iter().any(|p| p.is_match(url))
    }
}
