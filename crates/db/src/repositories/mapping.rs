//! Conversions between stored rows and the ledger read models.

use chrono::Utc;
use safar_core::ledger::{
    Account, AccountKind, AccountScope, EntryNote, EntryReferences, LedgerEntry, LedgerError,
    LedgerLine, ServiceCategory, TransactionKind,
};
use safar_shared::types::{
    AccountId, AgencyId, AreaAgencyId, BookingId, BranchId, LedgerEntryId, LedgerLineId,
    OrganizationId, PaymentId, UserId,
};

use crate::entities::{accounts, ledger_entries, ledger_lines, sea_orm_active_enums as db};

macro_rules! enum_mapping {
    ($db:ty, $core:ty, [$($variant:ident),+ $(,)?]) => {
        impl From<$core> for $db {
            fn from(value: $core) -> Self {
                type Source = $core;
                match value {
                    $(Source::$variant => Self::$variant,)+
                }
            }
        }

        impl From<$db> for $core {
            fn from(value: $db) -> Self {
                type Source = $db;
                match value {
                    $(Source::$variant => Self::$variant,)+
                }
            }
        }
    };
}

enum_mapping!(
    db::AccountKind,
    AccountKind,
    [Cash, Bank, Receivable, Payable, Agent, Sales, Commission, Suspense]
);
enum_mapping!(db::TransactionKind, TransactionKind, [Debit, Credit]);
enum_mapping!(
    db::ServiceCategory,
    ServiceCategory,
    [Ticket, Hotel, Transport, Package, Payment, Commission, Refund, Other]
);

fn corrupt(what: &str, id: uuid::Uuid, err: &serde_json::Error) -> LedgerError {
    LedgerError::Database(format!("stored {what} on entry {id} cannot be read: {err}"))
}

pub(crate) fn account(model: accounts::Model) -> Result<Account, LedgerError> {
    let scope = AccountScope::from_parts(
        model.organization_id.map(OrganizationId),
        model.branch_id.map(BranchId),
        model.agency_id.map(AgencyId),
    )?;

    Ok(Account {
        id: AccountId::from_uuid(model.id),
        scope,
        kind: model.kind.into(),
        name: model.name,
        balance: model.balance,
        version: model.version,
        created_at: model.created_at.with_timezone(&Utc),
        updated_at: model.updated_at.with_timezone(&Utc),
    })
}

pub(crate) fn notes(model: &ledger_entries::Model) -> Result<Vec<EntryNote>, LedgerError> {
    serde_json::from_value(model.notes.clone()).map_err(|e| corrupt("notes", model.id, &e))
}

pub(crate) fn entry(model: ledger_entries::Model) -> Result<LedgerEntry, LedgerError> {
    let notes = notes(&model)?;
    let payment_ids: Vec<PaymentId> = serde_json::from_value(model.payment_ids.clone())
        .map_err(|e| corrupt("payment ids", model.id, &e))?;

    Ok(LedgerEntry {
        id: LedgerEntryId::from_uuid(model.id),
        transaction_kind: model.transaction_kind.into(),
        service_category: model.service_category.into(),
        transaction_amount: model.transaction_amount,
        references: EntryReferences {
            booking_id: model.booking_id.map(BookingId),
            organization_id: model.organization_id.map(OrganizationId),
            inventory_owner_organization_id: model
                .inventory_owner_organization_id
                .map(OrganizationId),
            branch_id: model.branch_id.map(BranchId),
            agency_id: model.agency_id.map(AgencyId),
            area_agency_id: model.area_agency_id.map(AreaAgencyId),
        },
        payment_ids,
        narration: model.narration,
        remarks: model.remarks,
        metadata: model.metadata,
        notes,
        reversed: model.reversed,
        reversed_of: model.reversed_of.map(LedgerEntryId::from_uuid),
        reversed_at: model.reversed_at.map(|at| at.with_timezone(&Utc)),
        reversed_by: model.reversed_by.map(UserId),
        created_by: UserId(model.created_by),
        created_at: model.created_at.with_timezone(&Utc),
    })
}

pub(crate) fn line(model: ledger_lines::Model) -> LedgerLine {
    LedgerLine {
        id: LedgerLineId::from_uuid(model.id),
        entry_id: LedgerEntryId::from_uuid(model.entry_id),
        account_id: AccountId::from_uuid(model.account_id),
        line_no: model.line_no,
        debit: model.debit,
        credit: model.credit,
        account_version: model.account_version,
        balance_after: model.balance_after,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub(crate) fn entries(models: Vec<ledger_entries::Model>) -> Result<Vec<LedgerEntry>, LedgerError> {
    models.into_iter().map(entry).collect()
}

pub(crate) fn notes_json(notes: &[EntryNote]) -> Result<serde_json::Value, LedgerError> {
    serde_json::to_value(notes)
        .map_err(|e| LedgerError::Database(format!("notes cannot be encoded: {e}")))
}
