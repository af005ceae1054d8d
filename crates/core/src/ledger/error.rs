//! Ledger error types for validation, state and storage errors.
//!
//! Every failure a posting, reversal or balance query can surface is one of
//! these variants. Validation variants are raised before anything is written;
//! the concurrency variants are the only retryable ones.

use rust_decimal::Decimal;
use safar_shared::types::{AccountId, LedgerEntryId};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry has no lines.
    #[error("Entry must have at least one line")]
    EmptyEntry,

    /// Lines do not balance (debits != credits).
    #[error("Entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// A line has both sides zero, both sides set, or a negative side.
    #[error("Line {line} must carry exactly one positive side")]
    InvalidLineAmount {
        /// Zero-based position of the offending line.
        line: usize,
    },

    /// An amount is not usable (non-positive, or finer than cents).
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Scope does not resolve to exactly one owner.
    #[error("Invalid scope: {0}")]
    InvalidScope(String),

    // ========== Lookup Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Entry not found.
    #[error("Ledger entry not found: {0}")]
    EntryNotFound(LedgerEntryId),

    // ========== Reversal Errors ==========
    /// Entry has already been reversed.
    #[error("Ledger entry {0} has already been reversed")]
    AlreadyReversed(LedgerEntryId),

    /// Entry is itself a reversal and cannot be reversed.
    #[error("Ledger entry {0} is a reversal and cannot be reversed")]
    ReversalOfReversal(LedgerEntryId),

    // ========== Concurrency Errors ==========
    /// Row locks could not be acquired in time.
    #[error("Timed out waiting for account locks, please retry")]
    LockTimeout,

    /// The store aborted the transaction to resolve a conflict.
    #[error("Concurrent modification detected, please retry")]
    ConcurrentModification,

    // ========== Integrity Errors ==========
    /// Stored history does not reproduce a recorded balance.
    #[error("Balance mismatch on account {account_id}: expected {expected}, found {actual}")]
    BalanceMismatch {
        /// The account ID.
        account_id: AccountId,
        /// Balance implied by the line history.
        expected: Decimal,
        /// Balance actually recorded.
        actual: Decimal,
    },

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),
}

impl LedgerError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::EmptyEntry => "EMPTY_ENTRY",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::InvalidLineAmount { .. } => "INVALID_LINE_AMOUNT",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidScope(_) => "INVALID_SCOPE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::ReversalOfReversal(_) => "REVERSAL_OF_REVERSAL",
            Self::LockTimeout => "LOCK_TIMEOUT",
            Self::ConcurrentModification => "CONCURRENT_MODIFICATION",
            Self::BalanceMismatch { .. } => "BALANCE_MISMATCH",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - validation errors
            Self::EmptyEntry
            | Self::UnbalancedEntry { .. }
            | Self::InvalidLineAmount { .. }
            | Self::InvalidAmount(_)
            | Self::InvalidScope(_) => 400,

            // 404 Not Found
            Self::AccountNotFound(_) | Self::EntryNotFound(_) => 404,

            // 409 Conflict - state and concurrency errors
            Self::AlreadyReversed(_)
            | Self::ReversalOfReversal(_)
            | Self::ConcurrentModification => 409,

            // 503 Service Unavailable - try again later
            Self::LockTimeout => 503,

            // 500 Internal Server Error
            Self::BalanceMismatch { .. } | Self::Database(_) => 500,
        }
    }

    /// Returns true if the caller should retry the whole operation.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout | Self::ConcurrentModification)
    }
}
