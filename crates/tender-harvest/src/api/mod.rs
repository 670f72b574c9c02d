//! Upstream listing API
//!
//! - [`endpoints`]: URLs and the fixed JSON request bodies
//! - [`retry`]: the retry/backoff/rate-limit policy and response classification
//! - [`client`]: the pooled HTTP client implementing [`ListingSource`]

pub mod client;
pub mod endpoints;
pub mod retry;

pub use client::{ApiClient, ListingSource};
pub use retry::RetryPolicy;
