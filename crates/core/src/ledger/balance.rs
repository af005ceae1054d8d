//! Account balance arithmetic.
//!
//! One convention holds for every account kind: a line moves the balance by
//! `debit - credit`. Nothing in the ledger flips the sign per account kind.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance effect of one line.
#[must_use]
pub fn balance_delta(debit: Decimal, credit: Decimal) -> Decimal {
    debit - credit
}

/// Cached state of an account row: its balance and how many lines built it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Current balance (Σdebit − Σcredit).
    pub balance: Decimal,
    /// Number of lines ever applied.
    pub version: i64,
}

/// Running balance information for one applied line.
///
/// - `account_version`: monotonically increasing, one per line
/// - `previous_balance`: balance before the line
/// - `current_balance`: balance after the line, stored as `balance_after`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningBalance {
    /// Account version after this line.
    pub account_version: i64,
    /// Balance before this line.
    pub previous_balance: Decimal,
    /// Balance after this line.
    pub current_balance: Decimal,
}

impl RunningBalance {
    /// Starting point for an account in the given state, before any new line.
    #[must_use]
    pub const fn opening(state: AccountState) -> Self {
        Self {
            account_version: state.version,
            previous_balance: state.balance,
            current_balance: state.balance,
        }
    }

    /// Applies the next line.
    ///
    /// - `current[N] = current[N-1] + change`
    /// - `previous[N] = current[N-1]`
    #[must_use]
    pub fn next_entry(&self, balance_change: Decimal) -> Self {
        Self {
            account_version: self.account_version + 1,
            previous_balance: self.current_balance,
            current_balance: self.current_balance + balance_change,
        }
    }

    /// Account state after this line.
    #[must_use]
    pub const fn state(&self) -> AccountState {
        AccountState {
            balance: self.current_balance,
            version: self.account_version,
        }
    }
}
