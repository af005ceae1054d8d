//! Read models for stored accounts, entries and lines.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use safar_shared::types::{AccountId, LedgerEntryId, LedgerLineId, PaymentId, UserId};

use super::balance::AccountState;
use super::scope::AccountScope;
use super::types::{
    AccountKind, EntryNote, EntryReferences, EntryState, LineInput, ServiceCategory,
    TransactionKind,
};

/// A ledger account with its cached balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account id.
    pub id: AccountId,
    /// Owner.
    pub scope: AccountScope,
    /// Kind.
    pub kind: AccountKind,
    /// Display name.
    pub name: String,
    /// Σdebit − Σcredit over every line on the account.
    pub balance: Decimal,
    /// Lines applied so far.
    pub version: i64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Time of the last balance change.
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Cached balance and version.
    #[must_use]
    pub const fn state(&self) -> AccountState {
        AccountState {
            balance: self.balance,
            version: self.version,
        }
    }
}

/// A stored entry header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Entry id.
    pub id: LedgerEntryId,
    /// Reporting direction.
    pub transaction_kind: TransactionKind,
    /// Service category.
    pub service_category: ServiceCategory,
    /// Headline amount.
    pub transaction_amount: Decimal,
    /// Platform references.
    pub references: EntryReferences,
    /// Linked external payments.
    pub payment_ids: Vec<PaymentId>,
    /// Narration.
    pub narration: String,
    /// Remarks.
    pub remarks: Option<String>,
    /// Caller payload.
    pub metadata: serde_json::Value,
    /// Append-only audit notes, oldest first.
    pub notes: Vec<EntryNote>,
    /// Whether a mirror entry has cancelled this one.
    pub reversed: bool,
    /// The entry this one reverses, if it is a mirror.
    pub reversed_of: Option<LedgerEntryId>,
    /// When it was reversed.
    pub reversed_at: Option<DateTime<Utc>>,
    /// Who reversed it.
    pub reversed_by: Option<UserId>,
    /// Who posted it.
    pub created_by: UserId,
    /// When it was posted.
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Reversal state.
    #[must_use]
    pub const fn state(&self) -> EntryState {
        if self.reversed {
            EntryState::Reversed
        } else {
            EntryState::Active
        }
    }

    /// True when this entry is itself a reversal mirror.
    #[must_use]
    pub const fn is_reversal(&self) -> bool {
        self.reversed_of.is_some()
    }

    /// Transaction amount signed by direction.
    #[must_use]
    pub fn signed_amount(&self) -> Decimal {
        self.transaction_kind.signed(self.transaction_amount)
    }
}

/// A stored line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerLine {
    /// Line id.
    pub id: LedgerLineId,
    /// Owning entry.
    pub entry_id: LedgerEntryId,
    /// Account posted to.
    pub account_id: AccountId,
    /// Position within the entry, from 1.
    pub line_no: i32,
    /// Debit amount.
    pub debit: Decimal,
    /// Credit amount.
    pub credit: Decimal,
    /// Account version after this line.
    pub account_version: i64,
    /// Account balance after this line.
    pub balance_after: Decimal,
    /// When it was posted.
    pub created_at: DateTime<Utc>,
}

impl LedgerLine {
    /// The line as an input, for mirroring or replay.
    #[must_use]
    pub const fn as_input(&self) -> LineInput {
        LineInput {
            account_id: self.account_id,
            debit: self.debit,
            credit: self.credit,
        }
    }
}

/// An entry together with all its lines, in line order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryWithLines {
    /// Header.
    pub entry: LedgerEntry,
    /// Lines.
    pub lines: Vec<LedgerLine>,
}
