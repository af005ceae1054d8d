//! Double-entry ledger logic.
//!
//! This module implements everything about postings that does not need a
//! database:
//! - Domain types and read models
//! - Account scopes and entity kinds
//! - Line validation and posting plans
//! - Reversal mirrors
//! - The posting policy behind `request_posting`
//! - History replay for reconciliation

pub mod balance;
pub mod entry;
pub mod error;
pub mod policy;
pub mod posting;
pub mod reconcile;
pub mod reversal;
pub mod scope;
pub mod types;
pub mod validation;

#[cfg(test)]
mod posting_props;

pub use balance::{AccountState, RunningBalance, balance_delta};
pub use entry::{Account, EntryWithLines, LedgerEntry, LedgerLine};
pub use error::LedgerError;
pub use policy::{AccountTarget, PolicyPosting, PostingAmount, PostingPolicy, PostingRequest};
pub use posting::{PlannedLine, PostingPlan, lock_order, simple_lines};
pub use reconcile::{HistoryMismatch, ReconciliationReport, verify_account_history};
pub use reversal::{ReversalDecision, ReversalPlan, ReversalService};
pub use scope::{AccountScope, EntityKind, EntityRef, ScopeFilter};
pub use types::{
    AccountKind, EntryNote, EntryReferences, EntrySpec, EntryState, LineInput, LineTotals,
    ServiceCategory, TransactionKind,
};
pub use validation::{validate_amount, validate_entry_spec, validate_lines};
