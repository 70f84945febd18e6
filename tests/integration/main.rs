//! Integration tests for the crawler
//!
//! These tests use wiremock to serve a small shop and run the full crawl
//! cycle end-to-end against real sinks.

mod crawl;
mod run;
