use crate::model::TraversalContext;
use serde::{Deserialize, Deserializer};

/// One crawl entry point from the seed file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SeedTarget {
    pub url: String,

    #[serde(default)]
    pub site: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub allow_patterns: Vec<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub deny_patterns: Vec<String>,

    #[serde(default)]
    pub scroll_to_load: bool,

    #[serde(default, rename = "type")]
    pub page_type: Option<String>,

    #[serde(default)]
    pub login: Option<LoginTarget>,
}

/// Form login performed by the browser driver before the seed page is read
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LoginTarget {
    pub email: String,

    /// Name of the environment variable holding the password
    pub password_env: String,

    pub email_selector: String,
    pub password_selector: String,
    pub submit_selector: String,
}

impl SeedTarget {
    /// Builds the context inherited by every request derived from this seed
    pub fn context(&self) -> TraversalContext {
        TraversalContext {
            site: self.site.clone(),
            allow_patterns: self.allow_patterns.clone(),
            deny_patterns: self.deny_patterns.clone(),
            scroll_to_load: self.scroll_to_load,
            page_type: self.page_type.clone(),
            expanded: false,
        }
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}
