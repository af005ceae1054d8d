//! Ledger domain types for posting and querying.
//!
//! This module defines the vocabulary shared by the posting, reversal and
//! aggregation paths: account kinds, entry classifications, the caller-facing
//! posting inputs, and the append-only audit note.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use safar_shared::types::{
    AccountId, AgencyId, AreaAgencyId, BookingId, BranchId, OrganizationId, PaymentId, UserId,
};

/// Kind of ledger account in the chart of accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Cash on hand.
    Cash,
    /// Bank balances.
    Bank,
    /// Amounts owed to the owner.
    Receivable,
    /// Amounts the owner owes.
    Payable,
    /// Running account of an agent (agency or branch).
    Agent,
    /// Sales income.
    Sales,
    /// Commission paid or earned.
    Commission,
    /// Holding account for postings with no resolved counterparty.
    Suspense,
}

impl AccountKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Cash,
        Self::Bank,
        Self::Receivable,
        Self::Payable,
        Self::Agent,
        Self::Sales,
        Self::Commission,
        Self::Suspense,
    ];

    /// Returns the storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::Bank => "bank",
            Self::Receivable => "receivable",
            Self::Payable => "payable",
            Self::Agent => "agent",
            Self::Sales => "sales",
            Self::Commission => "commission",
            Self::Suspense => "suspense",
        }
    }

    /// Human-readable label used in generated account names.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Cash => "Cash",
            Self::Bank => "Bank",
            Self::Receivable => "Receivable",
            Self::Payable => "Payable",
            Self::Agent => "Agent",
            Self::Sales => "Sales",
            Self::Commission => "Commission",
            Self::Suspense => "Suspense",
        }
    }
}

impl std::fmt::Display for AccountKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown account kind: {s}"))
    }
}

/// Reporting direction of a whole entry.
///
/// This is not the line-level debit/credit: it says whether the entry
/// counts for (`Debit`) or against (`Credit`) the entities it references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Entry raises the referenced entities' net.
    Debit,
    /// Entry lowers the referenced entities' net.
    Credit,
}

impl TransactionKind {
    /// Returns the opposite direction.
    #[must_use]
    pub const fn opposite(self) -> Self {
        match self {
            Self::Debit => Self::Credit,
            Self::Credit => Self::Debit,
        }
    }

    /// Signs an amount: positive for debit, negative for credit.
    #[must_use]
    pub fn signed(self, amount: Decimal) -> Decimal {
        match self {
            Self::Debit => amount,
            Self::Credit => -amount,
        }
    }

    /// Returns the storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Debit => "debit",
            Self::Credit => "credit",
        }
    }
}

impl std::str::FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "debit" => Ok(Self::Debit),
            "credit" => Ok(Self::Credit),
            _ => Err(format!("Unknown transaction kind: {s}")),
        }
    }
}

/// What the money movement was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceCategory {
    /// Air ticket.
    Ticket,
    /// Hotel stay.
    Hotel,
    /// Ground transport.
    Transport,
    /// Bundled package.
    Package,
    /// Payment received or made.
    Payment,
    /// Refund to a customer or agent.
    Refund,
    /// Commission.
    Commission,
    /// Anything else.
    Other,
}

impl ServiceCategory {
    /// All categories, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Ticket,
        Self::Hotel,
        Self::Transport,
        Self::Package,
        Self::Payment,
        Self::Refund,
        Self::Commission,
        Self::Other,
    ];

    /// Returns the storage code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ticket => "ticket",
            Self::Hotel => "hotel",
            Self::Transport => "transport",
            Self::Package => "package",
            Self::Payment => "payment",
            Self::Refund => "refund",
            Self::Commission => "commission",
            Self::Other => "other",
        }
    }
}

impl std::str::FromStr for ServiceCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("Unknown service category: {s}"))
    }
}

/// Reversal state of an entry.
///
/// `Active -> Reversed` is the only transition and it happens once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
    /// Entry stands.
    Active,
    /// A mirror entry has cancelled this one.
    Reversed,
}

/// Platform references carried by an entry. Any subset may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryReferences {
    /// Booking that caused the movement.
    pub booking_id: Option<BookingId>,
    /// Selling organization.
    pub organization_id: Option<OrganizationId>,
    /// Organization that owns the sold inventory.
    pub inventory_owner_organization_id: Option<OrganizationId>,
    /// Branch involved.
    pub branch_id: Option<BranchId>,
    /// Agency involved.
    pub agency_id: Option<AgencyId>,
    /// Area agency involved.
    pub area_agency_id: Option<AreaAgencyId>,
}

/// One timestamped line in an entry's append-only note log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryNote {
    /// When the note was written.
    pub at: DateTime<Utc>,
    /// Who wrote it.
    pub author: UserId,
    /// Note body.
    pub text: String,
}

impl EntryNote {
    /// Creates a note stamped with the current time.
    #[must_use]
    pub fn now(author: UserId, text: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            author,
            text: text.into(),
        }
    }
}

/// Everything about a new entry except its lines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySpec {
    /// Reporting direction.
    pub transaction_kind: TransactionKind,
    /// Service category.
    pub service_category: ServiceCategory,
    /// Headline amount, strictly positive.
    pub transaction_amount: Decimal,
    /// Platform references.
    #[serde(default)]
    pub references: EntryReferences,
    /// Linked external payments.
    #[serde(default)]
    pub payment_ids: Vec<PaymentId>,
    /// Narration shown on statements.
    pub narration: String,
    /// Free-text remarks.
    pub remarks: Option<String>,
    /// Caller-defined payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Who initiated the posting.
    pub actor: UserId,
    /// Audit note recorded with the entry, supplied by the caller.
    pub note: Option<String>,
}

/// A line as requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineInput {
    /// Account to post to.
    pub account_id: AccountId,
    /// Debit amount, zero on a credit line.
    pub debit: Decimal,
    /// Credit amount, zero on a debit line.
    pub credit: Decimal,
}

impl LineInput {
    /// Creates a debit line.
    #[must_use]
    pub const fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: Decimal::ZERO,
        }
    }

    /// Creates a credit line.
    #[must_use]
    pub const fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self {
            account_id,
            debit: Decimal::ZERO,
            credit: amount,
        }
    }

    /// Effect on the account balance (`debit - credit`).
    #[must_use]
    pub fn delta(&self) -> Decimal {
        self.debit - self.credit
    }
}

/// Debit and credit totals of a line set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineTotals {
    /// Σ debit.
    pub debit: Decimal,
    /// Σ credit.
    pub credit: Decimal,
}

impl LineTotals {
    /// Sums the lines.
    #[must_use]
    pub fn of(lines: &[LineInput]) -> Self {
        lines.iter().fold(Self::default(), |acc, line| Self {
            debit: acc.debit + line.debit,
            credit: acc.credit + line.credit,
        })
    }

    /// Returns true when debits equal credits exactly.
    #[must_use]
    pub fn is_balanced(&self) -> bool {
        self.debit == self.credit
    }
}
