//! Shared types and configuration for the Safar ledger.
//!
//! This crate provides the vocabulary used by every other crate:
//! - Typed IDs for ledger-owned rows and for platform references
//! - Money helpers with fixed two-place rounding
//! - Pagination types for list queries
//! - Layered configuration

pub mod config;
pub mod types;

pub use config::AppConfig;
