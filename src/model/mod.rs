//! Data model shared by the traversal engine and the persistence sinks
//!
//! # Components
//!
//! - `SeedTarget`: a declarative crawl entry point loaded at startup
//! - `TraversalRequest`: a follow-up fetch with inherited context and stage
//! - `ProductRecord`: the structured output of a product page

mod product;
mod request;
mod seed;

pub use product::{Availability, ProductRecord, RawDocument};
pub use request::{Stage, TraversalContext, TraversalRequest};
pub use seed::{LoginTarget, SeedTarget};
