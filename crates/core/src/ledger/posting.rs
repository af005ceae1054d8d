//! Posting plan: the pure half of `post`.
//!
//! Given validated lines and the locked state of every account they touch,
//! the plan fixes each line's `balance_after` and `account_version` and the
//! final state every account row must be updated to. The database layer only
//! persists what the plan says.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use safar_shared::types::AccountId;

use super::balance::{AccountState, RunningBalance};
use super::error::LedgerError;
use super::types::{LineInput, LineTotals};
use super::validation::validate_lines;

/// Distinct accounts of a line set, in the order their rows must be locked.
///
/// Every writer locks in ascending id order, so two postings over
/// overlapping account sets can never wait on each other in a cycle.
#[must_use]
pub fn lock_order(lines: &[LineInput]) -> Vec<AccountId> {
    lines
        .iter()
        .map(|line| line.account_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One line ready to insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedLine {
    /// Position within the entry, from 1.
    pub line_no: i32,
    /// Account posted to.
    pub account_id: AccountId,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Account version after this line.
    pub account_version: i64,
    /// Account balance after this line.
    pub balance_after: Decimal,
}

/// Result of applying a line set to the current account states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostingPlan {
    /// Lines in the order supplied.
    pub lines: Vec<PlannedLine>,
    /// New state of every touched account, keyed in lock order.
    pub accounts: BTreeMap<AccountId, AccountState>,
    /// Line totals.
    pub totals: LineTotals,
}

impl PostingPlan {
    /// Validates `lines` and applies them, in order, on top of `current`.
    ///
    /// # Errors
    ///
    /// Any validation error from [`validate_lines`], or `AccountNotFound`
    /// when a line names an account missing from `current`.
    pub fn build(
        lines: &[LineInput],
        current: &HashMap<AccountId, AccountState>,
    ) -> Result<Self, LedgerError> {
        let totals = validate_lines(lines)?;

        let mut running: BTreeMap<AccountId, RunningBalance> = BTreeMap::new();
        for account_id in lock_order(lines) {
            let state = current
                .get(&account_id)
                .copied()
                .ok_or(LedgerError::AccountNotFound(account_id))?;
            running.insert(account_id, RunningBalance::opening(state));
        }

        let mut planned = Vec::with_capacity(lines.len());
        for (index, line) in lines.iter().enumerate() {
            let slot = running
                .get_mut(&line.account_id)
                .ok_or(LedgerError::AccountNotFound(line.account_id))?;
            let next = slot.next_entry(line.delta());
            *slot = next;

            planned.push(PlannedLine {
                line_no: i32::try_from(index + 1).map_err(|_| {
                    LedgerError::InvalidAmount(format!("entry has too many lines ({})", lines.len()))
                })?,
                account_id: line.account_id,
                debit: line.debit,
                credit: line.credit,
                account_version: next.account_version,
                balance_after: next.current_balance,
            });
        }

        let accounts = running
            .into_iter()
            .map(|(id, rb)| (id, rb.state()))
            .collect();

        Ok(Self {
            lines: planned,
            accounts,
            totals,
        })
    }

    /// Net change per account (new balance minus old), for logging and checks.
    #[must_use]
    pub fn deltas(&self) -> BTreeMap<AccountId, Decimal> {
        let mut deltas = BTreeMap::new();
        for line in &self.lines {
            *deltas.entry(line.account_id).or_insert(Decimal::ZERO) += line.debit - line.credit;
        }
        deltas
    }
}

/// Two-line posting: debit one account, credit another.
///
/// # Errors
///
/// `InvalidAmount` if the amount is not a positive cent value.
pub fn simple_lines(
    debit_account: AccountId,
    credit_account: AccountId,
    amount: Decimal,
) -> Result<Vec<LineInput>, LedgerError> {
    let amount = super::validation::validate_amount(amount)?;
    Ok(vec![
        LineInput::debit(debit_account, amount),
        LineInput::credit(credit_account, amount),
    ])
}
