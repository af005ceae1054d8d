//! Business rule validation for postings.
//!
//! Everything here runs before a transaction is opened, so a rejected
//! posting never touches storage.

use rust_decimal::Decimal;
use safar_shared::types::{AMOUNT_SCALE, MAX_AMOUNT};

use super::error::LedgerError;
use super::types::{EntrySpec, LineInput, LineTotals};

/// Validates a monetary amount: strictly positive, at most two decimals,
/// and below [`MAX_AMOUNT`].
///
/// # Errors
///
/// Returns `InvalidAmount` describing the problem.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, LedgerError> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} is not positive"
        )));
    }
    if amount >= MAX_AMOUNT {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} does not fit a stored amount"
        )));
    }
    if amount.normalize().scale() > AMOUNT_SCALE {
        return Err(LedgerError::InvalidAmount(format!(
            "{amount} has more than {AMOUNT_SCALE} decimal places"
        )));
    }
    Ok(amount)
}

/// Validates a line set and returns its totals.
///
/// Rules:
/// - at least one line
/// - each line has exactly one positive side, the other zero
/// - Σ debit == Σ credit
///
/// # Errors
///
/// `EmptyEntry`, `InvalidLineAmount` or `UnbalancedEntry`.
pub fn validate_lines(lines: &[LineInput]) -> Result<LineTotals, LedgerError> {
    if lines.is_empty() {
        return Err(LedgerError::EmptyEntry);
    }

    for (index, line) in lines.iter().enumerate() {
        let one_sided = match (line.debit.is_zero(), line.credit.is_zero()) {
            (false, true) => validate_amount(line.debit).is_ok(),
            (true, false) => validate_amount(line.credit).is_ok(),
            _ => false,
        };
        if !one_sided {
            return Err(LedgerError::InvalidLineAmount { line: index });
        }
    }

    let totals = LineTotals::of(lines);
    if !totals.is_balanced() {
        return Err(LedgerError::UnbalancedEntry {
            debit: totals.debit,
            credit: totals.credit,
        });
    }

    Ok(totals)
}

/// Validates entry-level attributes.
///
/// # Errors
///
/// Returns `InvalidAmount` for a bad transaction amount.
pub fn validate_entry_spec(spec: &EntrySpec) -> Result<(), LedgerError> {
    validate_amount(spec.transaction_amount)?;
    Ok(())
}
