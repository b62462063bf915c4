//! Local pipeline for docsift: fetch a documentation URL, segment it, and rank excerpts.
//!
//! - [`smart_fetch`]: direct fetch with Swagger/OpenAPI and headless fallbacks
//! - [`search`]: format-aware chunking, scoring, and result selection
//! - [`transport`] / [`render_playwright`]: the reqwest and Playwright backends

pub mod chunk;
pub mod format;
pub mod openapi;
pub mod patterns;
pub mod render_playwright;
pub mod score;
pub mod search;
pub mod smart_fetch;
pub mod transport;

pub use render_playwright::PlaywrightRenderer;
pub use search::{search, DEFAULT_MAX_RESULTS};
pub use smart_fetch::{SmartFetchOptions, SmartFetcher};
pub use transport::LocalTransport;
