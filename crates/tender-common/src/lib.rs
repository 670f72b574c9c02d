//! Tender Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging and error handling for the tender harvest workspace.
//!
//! # Overview
//!
//! - **Types**: the canonical [`Notice`](types::Notice) record, checkpoint and
//!   session status enums, and the per-run [`RunStats`](types::RunStats) accumulator
//! - **Logging**: `tracing` subscriber setup shared by every binary
//! - **Errors**: [`CommonError`] for parsing shared types
//!
//! # Example
//!
//! ```no_run
//! use tender_common::logging::{init_logging, LogConfig};
//! use tender_common::types::CompletionStatus;
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     let status: CompletionStatus = "SUCCESS".parse()?;
//!     tracing::info!(%status, "parsed checkpoint status");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use types::{CompletionStatus, Notice, RunSession, RunStats, SessionStatus};
