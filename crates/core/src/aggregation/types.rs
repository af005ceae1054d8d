//! Balance report data types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use safar_shared::types::{LedgerEntryId, OrganizationId};

use crate::ledger::{EntityRef, EntryNote, LedgerEntry, ScopeFilter, ServiceCategory, TransactionKind};

/// Whether a summary sums entry amounts or line amounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// Σ transaction_amount split by transaction kind.
    #[default]
    Entry,
    /// Σ line debit / credit on accounts owned by the scope.
    Line,
}

/// Total of one transaction kind within some group, as read from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTotal {
    /// Direction.
    pub transaction_kind: TransactionKind,
    /// Σ transaction_amount.
    pub total: Decimal,
    /// Entries counted.
    pub entries: u64,
}

/// Debit/credit totals and their net.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSummary {
    /// Σ debit.
    pub total_debit: Decimal,
    /// Σ credit.
    pub total_credit: Decimal,
    /// `total_debit - total_credit`; negative means the scope owes.
    pub net_balance: Decimal,
    /// Entries (or lines) summed.
    pub entries: u64,
}

impl BalanceSummary {
    /// Builds a summary from debit and credit totals.
    #[must_use]
    pub fn new(total_debit: Decimal, total_credit: Decimal, entries: u64) -> Self {
        Self {
            total_debit,
            total_credit,
            net_balance: total_debit - total_credit,
            entries,
        }
    }

    /// Adds one kind total.
    pub fn add(&mut self, row: KindTotal) {
        match row.transaction_kind {
            TransactionKind::Debit => self.total_debit += row.total,
            TransactionKind::Credit => self.total_credit += row.total,
        }
        self.entries += row.entries;
        self.net_balance = self.total_debit - self.total_credit;
    }

    /// True when the scope owes money (strictly negative net).
    #[must_use]
    pub fn is_owing(&self) -> bool {
        self.net_balance < Decimal::ZERO
    }
}

/// Summary for one service category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    /// Category.
    pub service_category: ServiceCategory,
    /// Totals.
    #[serde(flatten)]
    pub summary: BalanceSummary,
}

/// Summary for one calendar month (UTC).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBreakdown {
    /// Month as `YYYY-MM`.
    pub month: String,
    /// Totals.
    #[serde(flatten)]
    pub summary: BalanceSummary,
}

/// Full balance view of a scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceReport {
    /// Scope queried.
    pub scope: ScopeFilter,
    /// How the summary was computed.
    pub granularity: Granularity,
    /// Totals.
    pub summary: BalanceSummary,
    /// Totals per service category (entry granularity).
    pub by_category: Vec<CategoryBreakdown>,
    /// Totals per month (entry granularity).
    pub by_month: Vec<MonthlyBreakdown>,
    /// Most recent entries, newest first.
    pub recent_entries: Vec<LedgerEntry>,
}

/// Who owes whom between two organizations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairSettlement {
    /// Organization the net is read from.
    pub a: OrganizationId,
    /// The other organization.
    pub b: OrganizationId,
    /// Debit/credit totals across both directions.
    #[serde(flatten)]
    pub summary: BalanceSummary,
    /// What A owes B from entries where A sold B's inventory.
    pub a_owes_b: Decimal,
    /// What B owes A from entries where B sold A's inventory.
    pub b_owes_a: Decimal,
    /// `b_owes_a - a_owes_b`; negative means A owes B.
    pub net: Decimal,
    /// Human-readable direction, e.g. "Org 15 owes Org 11 600.00".
    pub description: String,
}

/// An audit note together with the entry it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    /// Entry holding the note.
    pub entry_id: LedgerEntryId,
    /// The note.
    pub note: EntryNote,
}

/// One row of the pending-balance scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingBalance {
    /// Entity that owes.
    pub entity: EntityRef,
    /// Totals; `net_balance` is strictly negative.
    #[serde(flatten)]
    pub summary: BalanceSummary,
    /// Time of the entity's latest entry.
    pub last_updated: Option<DateTime<Utc>>,
    /// Most recent audit notes on the entity's entries.
    pub notes: Vec<NoteRef>,
}

impl PendingBalance {
    /// Amount owed, as a positive number.
    #[must_use]
    pub fn amount_owed(&self) -> Decimal {
        -self.summary.net_balance
    }
}

/// Single-entity balance, without the owing filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalBalance {
    /// Entity.
    pub entity: EntityRef,
    /// Σ debit.
    pub total_debit: Decimal,
    /// Σ credit.
    pub total_credit: Decimal,
    /// `total_debit - total_credit`.
    pub net_balance: Decimal,
    /// Time of the entity's latest entry; `None` when it has none.
    pub last_updated: Option<DateTime<Utc>>,
}

/// Per-entity input to the pending scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityTotals {
    /// Entity.
    pub entity: EntityRef,
    /// Totals.
    pub summary: BalanceSummary,
    /// Time of the latest entry.
    pub last_updated: Option<DateTime<Utc>>,
}
