//! Command implementations for the `tender-harvest` binary

pub mod export;
pub mod run;
pub mod stats;
