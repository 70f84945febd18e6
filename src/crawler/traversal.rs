//! Listing-page traversal
//!
//! A listing page either asks to be re-fetched once with scroll expansion, or
//! fans out into follow-up requests for every accepted link. Product links
//! end traversal at extraction; everything else is treated as another
//! listing page.

use crate::crawler::{extract_document_links, login_sequence, scroll_expansion, PageAction, RenderedPage};
use crate::model::{SeedTarget, Stage, TraversalContext, TraversalRequest};
use crate::url::{is_product_url, site_from_url, UrlPatterns};
use crate::ConfigError;
use scraper::Html;
use url::Url;

/// Site identifier for a page: the context's site, else the page's registrable domain
pub fn resolve_site(context: &TraversalContext, page_url: &str) -> Option<String> {
    context
        .site
        .clone()
        .filter(|site| !site.trim().is_empty())
        .or_else(|| site_from_url(page_url))
}

/// Classifies a rendered listing page into follow-up requests
///
/// # Behavior
///
/// - `scroll_to_load` set and not yet expanded: exactly one request for the
///   same URL, carrying the scroll-expansion actions and marked expanded
/// - otherwise: one request per link accepted by the context's patterns,
///   staged as product or listing by the link's path
///
/// Child requests inherit the context with the site resolved. Visited URLs
/// are not tracked here.
pub fn classify_listing(page: &RenderedPage, context: &TraversalContext) -> Vec<TraversalRequest> {
    let mut inherited = context.clone();
    inherited.site = resolve_site(context, &page.url);

    if context.scroll_to_load && !context.expanded {
        inherited.expanded = true;
        tracing::debug!("Re-fetching {} with scroll expansion", page.url);

        let mut request = TraversalRequest::listing(page.url.clone(), inherited)
            .with_actions(scroll_expansion());
        request.dont_filter = true;
        return vec![request];
    }

    let base_url = match Url::parse(&page.url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot resolve links on {}: {}", page.url, e);
            return Vec::new();
        }
    };

    let links = {
        let document = Html::parse_document(&page.body);
        extract_document_links(&document, &base_url)
    };

    let patterns = UrlPatterns::new(&context.allow_patterns, &context.deny_patterns);
    inherited.expanded = false;

    let requests: Vec<TraversalRequest> = links
        .into_iter()
        .filter(|link| patterns.accepts(link))
        .map(|link| {
            let stage = if is_product_url(&link) {
                Stage::Product
            } else {
                Stage::Listing
            };
            TraversalRequest::new(link, inherited.clone(), stage)
                .with_actions(vec![PageAction::WaitForIdle])
        })
        .collect();

    tracing::debug!("{} follow-up requests from {}", requests.len(), page.url);
    requests
}

/// Builds the first request for a seed
///
/// When the seed has a login block, `password` is filled into the login form
/// before the page is read.
pub fn seed_request(seed: &SeedTarget, password: Option<&str>) -> TraversalRequest {
    let mut actions = Vec::new();

    if let (Some(login), Some(password)) = (&seed.login, password) {
        actions.extend(login_sequence(
            &login.email_selector,
            &login.email,
            &login.password_selector,
            password,
            &login.submit_selector,
        ));
    }
    actions.push(PageAction::WaitForIdle);

    TraversalRequest::listing(seed.url.clone(), seed.context()).with_actions(actions)
}

/// Builds the first request of every seed, resolving login passwords
///
/// # Arguments
///
/// * `seeds` - Seeds in file order
/// * `secrets` - Lookup for the environment variable named by `password_env`
///
/// # Returns
///
/// * `Err(ConfigError::Validation)` - A login seed names an unset variable
pub fn seed_requests<F>(seeds: &[SeedTarget], secrets: F) -> Result<Vec<TraversalRequest>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    seeds
        .iter()
        .map(|seed| match &seed.login {
            Some(login) => {
                let password = secrets(&login.password_env).ok_or_else(|| {
                    ConfigError::Validation(format!(
                        "login for seed {} needs environment variable {}",
                        seed.url, login.password_env
                    ))
                })?;
                Ok(seed_request(seed, Some(&password)))
            }
            None => Ok(seed_request(seed, None)),
        })
        .collect()
}
