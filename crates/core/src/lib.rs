//! Core ledger logic for Safar.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! All domain types, validation rules, and calculations live here.
//!
//! # Modules
//!
//! - `ledger` - Double-entry posting, reversal, scopes and the posting policy
//! - `aggregation` - Balance summaries, inter-organization settlement, pending scan

pub mod aggregation;
pub mod ledger;
