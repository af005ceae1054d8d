//! Replaying an account's lines against its recorded snapshots.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use safar_shared::types::{AccountId, LedgerEntryId};

use super::balance::{AccountState, RunningBalance};
use super::entry::LedgerLine;
use super::error::LedgerError;

/// One disagreement found while replaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryMismatch {
    /// A line's `balance_after` differs from the running sum.
    BalanceAfter {
        /// Entry holding the line.
        entry_id: LedgerEntryId,
        /// Line position.
        line_no: i32,
        /// Running sum at that point.
        expected: Decimal,
        /// Stored snapshot.
        recorded: Decimal,
    },
    /// A line's `account_version` skips or repeats.
    Version {
        /// Entry holding the line.
        entry_id: LedgerEntryId,
        /// Line position.
        line_no: i32,
        /// Next version in sequence.
        expected: i64,
        /// Stored version.
        recorded: i64,
    },
    /// The cached account row disagrees with the replayed history.
    CachedState {
        /// Replayed state.
        expected: AccountState,
        /// Account row.
        recorded: AccountState,
    },
}

/// Outcome of replaying one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Account replayed.
    pub account_id: AccountId,
    /// Lines replayed.
    pub lines_checked: usize,
    /// State implied by the lines.
    pub replayed: AccountState,
    /// State on the account row.
    pub cached: AccountState,
    /// Everything that did not match.
    pub mismatches: Vec<HistoryMismatch>,
}

impl ReconciliationReport {
    /// True when history, snapshots and cache all agree.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Turns an inconsistent report into `BalanceMismatch`.
    ///
    /// # Errors
    ///
    /// `BalanceMismatch` carrying the replayed and cached balances.
    pub fn into_result(self) -> Result<Self, LedgerError> {
        if self.is_consistent() {
            Ok(self)
        } else {
            Err(LedgerError::BalanceMismatch {
                account_id: self.account_id,
                expected: self.replayed.balance,
                actual: self.cached.balance,
            })
        }
    }
}

/// Replays `lines` (already in posting order) from an empty account.
#[must_use]
pub fn verify_account_history(
    account_id: AccountId,
    cached: AccountState,
    lines: &[LedgerLine],
) -> ReconciliationReport {
    let mut running = RunningBalance::opening(AccountState::default());
    let mut mismatches = Vec::new();

    for line in lines {
        running = running.next_entry(line.debit - line.credit);

        if line.account_version != running.account_version {
            mismatches.push(HistoryMismatch::Version {
                entry_id: line.entry_id,
                line_no: line.line_no,
                expected: running.account_version,
                recorded: line.account_version,
            });
        }
        if line.balance_after != running.current_balance {
            mismatches.push(HistoryMismatch::BalanceAfter {
                entry_id: line.entry_id,
                line_no: line.line_no,
                expected: running.current_balance,
                recorded: line.balance_after,
            });
        }
    }

    let replayed = running.state();
    if replayed != cached {
        mismatches.push(HistoryMismatch::CachedState {
            expected: replayed,
            recorded: cached,
        });
    }

    ReconciliationReport {
        account_id,
        lines_checked: lines.len(),
        replayed,
        cached,
        mismatches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use safar_shared::types::LedgerLineId;

    fn history(account_id: AccountId, deltas: &[Decimal]) -> Vec<LedgerLine> {
        let mut balance = Decimal::ZERO;
        deltas
            .iter()
            .zip(1i64..)
            .map(|(delta, version)| {
                balance += *delta;
                let (debit, credit) = if delta.is_sign_negative() {
                    (Decimal::ZERO, -*delta)
                } else {
                    (*delta, Decimal::ZERO)
                };
                LedgerLine {
                    id: LedgerLineId::new(),
                    entry_id: LedgerEntryId::new(),
                    account_id,
                    line_no: 1,
                    debit,
                    credit,
                    account_version: version,
                    balance_after: balance,
                    created_at: Utc::now(),
                }
            })
            .collect()
    }

    #[test]
    fn test_consistent_history() {
        let account_id = AccountId::new();
        let lines = history(account_id, &[dec!(1000.00), dec!(-1000.00), dec!(25.50)]);
        let cached = AccountState {
            balance: dec!(25.50),
            version: 3,
        };

        let report = verify_account_history(account_id, cached, &lines);

        assert!(report.is_consistent());
        assert_eq!(report.lines_checked, 3);
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_tampered_snapshot_is_reported() {
        let account_id = AccountId::new();
        let mut lines = history(account_id, &[dec!(10), dec!(20)]);
        lines[1].balance_after = dec!(31);
        let cached = AccountState {
            balance: dec!(30),
            version: 2,
        };

        let report = verify_account_history(account_id, cached, &lines);

        assert_eq!(report.mismatches.len(), 1);
        assert!(matches!(
            report.mismatches[0],
            HistoryMismatch::BalanceAfter { expected, recorded, .. }
                if expected == dec!(30) && recorded == dec!(31)
        ));
    }

    #[test]
    fn test_drifted_cache_is_reported() {
        let account_id = AccountId::new();
        let lines = history(account_id, &[dec!(10)]);
        let cached = AccountState {
            balance: dec!(12),
            version: 1,
        };

        let err = verify_account_history(account_id, cached, &lines)
            .into_result()
            .unwrap_err();

        assert_eq!(
            err,
            LedgerError::BalanceMismatch {
                account_id,
                expected: dec!(10),
                actual: dec!(12),
            }
        );
    }

    #[test]
    fn test_version_gap_is_reported() {
        let account_id = AccountId::new();
        let mut lines = history(account_id, &[dec!(1), dec!(1)]);
        lines[1].account_version = 3;
        let cached = AccountState {
            balance: dec!(2),
            version: 2,
        };

        let report = verify_account_history(account_id, cached, &lines);

        assert_eq!(report.mismatches.len(), 1);
        assert!(matches!(report.mismatches[0], HistoryMismatch::Version { expected: 2, recorded: 3, .. }));
    }
}
