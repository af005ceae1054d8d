//! Pending-balance scan: which entities owe money.
//!
//! "Pending" means a strictly negative net (`total_debit - total_credit < 0`).
//! An entity at exactly zero is settled and never reported.

use super::types::{EntityTotals, NoteRef, PendingBalance};

/// Stateless pending-balance scanner.
pub struct PendingScanner;

impl PendingScanner {
    /// Keeps the owing entities, largest debt first, ties by entity id.
    #[must_use]
    pub fn select(totals: Vec<EntityTotals>) -> Vec<EntityTotals> {
        let mut owing: Vec<EntityTotals> = totals
            .into_iter()
            .filter(|row| row.summary.is_owing())
            .collect();
        owing.sort_by(|x, y| {
            x.summary
                .net_balance
                .cmp(&y.summary.net_balance)
                .then_with(|| x.entity.raw_id().cmp(&y.entity.raw_id()))
        });
        owing
    }

    /// Builds a report row from selected totals and the entity's notes.
    #[must_use]
    pub fn row(totals: EntityTotals, notes: Vec<NoteRef>) -> PendingBalance {
        PendingBalance {
            entity: totals.entity,
            summary: totals.summary,
            last_updated: totals.last_updated,
            notes,
        }
    }
}
