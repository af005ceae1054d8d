//! Reversal: cancelling an entry with a mirror entry.
//!
//! The mirror posts every original line again on the same account with debit
//! and credit swapped, carries the opposite transaction kind, and points back
//! at the original through `reversed_of`. History is never deleted.

use serde::{Deserialize, Serialize};
use safar_shared::config::ReversalPolicy;
use safar_shared::types::{LedgerEntryId, UserId};

use super::entry::{LedgerEntry, LedgerLine};
use super::error::LedgerError;
use super::types::{EntryNote, EntrySpec, LineInput, LineTotals};

/// Narration prefix on every mirror entry.
pub const REVERSAL_PREFIX: &str = "Reversal: ";

/// What to do with a reversal request once the original is loaded and locked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReversalDecision {
    /// Write a new mirror entry.
    Proceed,
    /// Nothing to write; hand back this existing mirror.
    ReturnExisting(LedgerEntryId),
}

/// Everything needed to persist a reversal.
#[derive(Debug, Clone, PartialEq)]
pub struct ReversalPlan {
    /// Entry being reversed.
    pub reversed_of: LedgerEntryId,
    /// Header of the mirror entry.
    pub spec: EntrySpec,
    /// Mirror lines, in the original's line order.
    pub lines: Vec<LineInput>,
    /// Note appended to the original entry's log.
    pub original_note: EntryNote,
}

/// Stateless service for building reversals.
pub struct ReversalService;

impl ReversalService {
    /// Decides how to handle a reversal of `original`.
    ///
    /// `existing_reversal` is the mirror already pointing at `original`, if any.
    ///
    /// # Errors
    ///
    /// - `ReversalOfReversal` if `original` is itself a mirror
    /// - `AlreadyReversed` if it was reversed and the policy is `Reject`, or
    ///   no mirror can be found for a reversed entry
    pub fn decide(
        original: &LedgerEntry,
        existing_reversal: Option<LedgerEntryId>,
        policy: ReversalPolicy,
    ) -> Result<ReversalDecision, LedgerError> {
        if original.is_reversal() {
            return Err(LedgerError::ReversalOfReversal(original.id));
        }

        if !original.reversed && existing_reversal.is_none() {
            return Ok(ReversalDecision::Proceed);
        }

        match (policy, existing_reversal) {
            (ReversalPolicy::ReturnExisting, Some(mirror)) => {
                Ok(ReversalDecision::ReturnExisting(mirror))
            }
            _ => Err(LedgerError::AlreadyReversed(original.id)),
        }
    }

    /// Swaps debit and credit on every line, keeping accounts and order.
    #[must_use]
    pub fn mirror_lines(lines: &[LedgerLine]) -> Vec<LineInput> {
        lines
            .iter()
            .map(|line| LineInput {
                account_id: line.account_id,
                debit: line.credit,
                credit: line.debit,
            })
            .collect()
    }

    /// Builds the mirror entry for `original`.
    ///
    /// # Errors
    ///
    /// `UnbalancedEntry` if the stored lines do not balance, which would mean
    /// the original was written outside the posting path.
    pub fn plan(
        original: &LedgerEntry,
        lines: &[LedgerLine],
        actor: UserId,
        reason: Option<&str>,
    ) -> Result<ReversalPlan, LedgerError> {
        let mirrored = Self::mirror_lines(lines);
        let totals = LineTotals::of(&mirrored);
        if mirrored.is_empty() || !totals.is_balanced() {
            return Err(LedgerError::UnbalancedEntry {
                debit: totals.debit,
                credit: totals.credit,
            });
        }

        let reason_text = reason.map_or_else(String::new, |r| format!(": {r}"));
        let spec = EntrySpec {
            transaction_kind: original.transaction_kind.opposite(),
            service_category: original.service_category,
            transaction_amount: original.transaction_amount,
            references: original.references.clone(),
            payment_ids: original.payment_ids.clone(),
            narration: format!("{REVERSAL_PREFIX}{}", original.narration),
            remarks: reason.map(str::to_string),
            metadata: original.metadata.clone(),
            actor,
            note: Some(format!("Reversal of entry {}{reason_text}", original.id)),
        };

        Ok(ReversalPlan {
            reversed_of: original.id,
            spec,
            lines: mirrored,
            original_note: EntryNote::now(actor, format!("Reversed by user {actor}{reason_text}")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::types::{EntryReferences, ServiceCategory, TransactionKind};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use safar_shared::types::{AccountId, LedgerLineId, OrganizationId};

    fn original() -> (LedgerEntry, Vec<LedgerLine>) {
        let id = LedgerEntryId::new();
        let entry = LedgerEntry {
            id,
            transaction_kind: TransactionKind::Credit,
            service_category: ServiceCategory::Ticket,
            transaction_amount: dec!(1000.00),
            references: EntryReferences {
                organization_id: Some(OrganizationId(11)),
                ..EntryReferences::default()
            },
            payment_ids: vec![],
            narration: "KHI-JED ticket".to_string(),
            remarks: None,
            metadata: serde_json::json!({"pnr": "AB12CD"}),
            notes: vec![],
            reversed: false,
            reversed_of: None,
            reversed_at: None,
            reversed_by: None,
            created_by: UserId(1),
            created_at: Utc::now(),
        };
        let line = |account_id: AccountId, debit: Decimal, credit: Decimal, line_no: i32| LedgerLine {
            id: LedgerLineId::new(),
            entry_id: id,
            account_id,
            line_no,
            debit,
            credit,
            account_version: 1,
            balance_after: debit - credit,
            created_at: Utc::now(),
        };
        let lines = vec![
            line(AccountId::new(), dec!(1000.00), dec!(0), 1),
            line(AccountId::new(), dec!(0), dec!(1000.00), 2),
        ];
        (entry, lines)
    }

    #[test]
    fn test_mirror_swaps_sides() {
        let (_, lines) = original();
        let mirrored = ReversalService::mirror_lines(&lines);

        assert_eq!(mirrored[0].account_id, lines[0].account_id);
        assert_eq!(mirrored[0].debit, dec!(0));
        assert_eq!(mirrored[0].credit, dec!(1000.00));
        assert_eq!(mirrored[1].debit, dec!(1000.00));
    }

    #[test]
    fn test_plan_mirrors_header() {
        let (entry, lines) = original();
        let plan = ReversalService::plan(&entry, &lines, UserId(7), Some("booking cancelled")).unwrap();

        assert_eq!(plan.reversed_of, entry.id);
        assert_eq!(plan.spec.transaction_kind, TransactionKind::Debit);
        assert_eq!(plan.spec.service_category, ServiceCategory::Ticket);
        assert_eq!(plan.spec.transaction_amount, dec!(1000.00));
        assert_eq!(plan.spec.narration, "Reversal: KHI-JED ticket");
        assert_eq!(plan.spec.references, entry.references);
        assert_eq!(plan.spec.remarks.as_deref(), Some("booking cancelled"));
        assert_eq!(plan.original_note.author, UserId(7));
        assert!(plan.original_note.text.ends_with(": booking cancelled"));
    }

    #[test]
    fn test_plan_rejects_unbalanced_history() {
        let (entry, mut lines) = original();
        lines[1].credit = dec!(999.99);
        assert!(matches!(
            ReversalService::plan(&entry, &lines, UserId(7), None),
            Err(LedgerError::UnbalancedEntry { .. })
        ));
    }

    #[test]
    fn test_decide_active_entry_proceeds() {
        let (entry, _) = original();
        assert_eq!(
            ReversalService::decide(&entry, None, ReversalPolicy::ReturnExisting).unwrap(),
            ReversalDecision::Proceed
        );
    }

    #[test]
    fn test_decide_reversed_entry_by_policy() {
        let (mut entry, _) = original();
        entry.reversed = true;
        let mirror = LedgerEntryId::new();

        assert_eq!(
            ReversalService::decide(&entry, Some(mirror), ReversalPolicy::ReturnExisting).unwrap(),
            ReversalDecision::ReturnExisting(mirror)
        );
        assert_eq!(
            ReversalService::decide(&entry, Some(mirror), ReversalPolicy::Reject),
            Err(LedgerError::AlreadyReversed(entry.id))
        );
    }

    #[test]
    fn test_decide_refuses_to_reverse_a_mirror() {
        let (mut entry, _) = original();
        entry.reversed_of = Some(LedgerEntryId::new());
        assert_eq!(
            ReversalService::decide(&entry, None, ReversalPolicy::ReturnExisting),
            Err(LedgerError::ReversalOfReversal(entry.id))
        );
    }
}
