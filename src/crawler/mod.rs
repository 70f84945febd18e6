//! Crawler module for page fetching, classification and extraction
//!
//! This module contains the core crawling logic, including:
//! - Rendering pages through a pluggable renderer
//! - Link extraction and listing classification
//! - Product field extraction
//! - Retry and rate-limit backoff
//! - The request frontier and overall crawl coordination

mod actions;
mod backoff;
mod coordinator;
pub mod extract;
mod fetcher;
mod frontier;
mod parser;
mod traversal;

pub use actions::{
    infinite_scroll, login_sequence, scroll_expansion, PageAction, SCROLL_DELAY_SECS,
    SCROLL_MAX_ROUNDS,
};
pub use backoff::{
    parse_retry_after, BackoffController, BackoffDecision, BackoffPolicy, RetryState,
};
pub use coordinator::{run_crawl, CrawlComponents, CrawlReport, Coordinator, DispatchSettings};
pub use extract::{extract_product, extract_product_at, first_match, Strategy};
pub use fetcher::{build_http_client, FetchError, HttpRenderer, PageRenderer, RenderedPage};
pub use frontier::{Frontier, MemoryFrontier};
pub use parser::{extract_document_links, extract_links};
pub use traversal::{classify_listing, resolve_site, seed_request, seed_requests};
