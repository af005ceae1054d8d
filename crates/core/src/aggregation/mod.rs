//! Balance aggregation and the pending-balance scan.
//!
//! Pure folds over totals read from the ledger. Storage decides which rows
//! match a scope; this module decides what they add up to.

pub mod pending;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

pub use pending::PendingScanner;
pub use service::AggregationService;
pub use types::*;
