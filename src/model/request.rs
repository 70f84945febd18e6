use crate::crawler::PageAction;
use crate::identity::RequestIdentity;

/// Which handler processes the response of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Listing or category page: emits more requests
    Listing,
    /// Product detail page: emits a record, nothing further
    Product,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Product => "product",
        }
    }
}

/// Metadata inherited by every request derived from a seed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraversalContext {
    /// Site identifier; derived from the page host when absent
    pub site: Option<String>,

    /// URL patterns a followed link must match (any of)
    pub allow_patterns: Vec<String>,

    /// URL patterns a followed link must not match (none of)
    pub deny_patterns: Vec<String>,

    /// Listing pages lazy-load their content on scroll
    pub scroll_to_load: bool,

    /// Free-form page type hint carried from the seed
    pub page_type: Option<String>,

    /// The page has already been re-fetched with scroll expansion
    pub expanded: bool,
}

/// A follow-up fetch handed to the frontier
#[derive(Debug, Clone, PartialEq)]
pub struct TraversalRequest {
    pub url: String,
    pub context: TraversalContext,
    pub stage: Stage,

    /// Page actions for the browser driver to run before handing back the page
    pub actions: Vec<PageAction>,

    /// Fixed identity for this request; the rotation pool is used when `None`
    pub identity: Option<RequestIdentity>,

    /// Bypass the frontier's duplicate filter
    pub dont_filter: bool,
}

impl TraversalRequest {
    pub fn new(url: impl Into<String>, context: TraversalContext, stage: Stage) -> Self {
        Self {
            url: url.into(),
            context,
            stage,
            actions: Vec::new(),
            identity: None,
            dont_filter: false,
        }
    }

    pub fn listing(url: impl Into<String>, context: TraversalContext) -> Self {
        Self::new(url, context, Stage::Listing)
    }

    pub fn product(url: impl Into<String>, context: TraversalContext) -> Self {
        Self::new(url, context, Stage::Product)
    }

    pub fn with_actions(mut self, actions: Vec<PageAction>) -> Self {
        self.actions = actions;
        self
    }

    /// Copy of this request for re-entry into the frontier after a failure
    pub fn for_retry(&self) -> Self {
        Self {
            dont_filter: true,
            ..self.clone()
        }
    }
}
