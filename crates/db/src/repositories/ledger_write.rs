//! Write primitives shared by the posting and reversal paths.
//!
//! Every write runs inside one database transaction: set the lock timeout,
//! lock the touched accounts in ascending id order, insert the entry header,
//! then insert the lines and move each account's cached balance and version.
//! Dropping the transaction on any error rolls all of it back.

use std::collections::HashMap;

use chrono::Utc;
use safar_core::ledger::{
    AccountState, EntryNote, EntrySpec, LedgerError, PlannedLine, PostingPlan,
};
use safar_shared::types::{AccountId, LedgerEntryId, LedgerLineId};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ConnectionTrait, DatabaseTransaction, DbErr, EntityTrait,
    QuerySelect, RuntimeErr, Set, SqlErr,
};
use tracing::{debug, warn};

use super::mapping;
use crate::entities::{accounts, ledger_entries, ledger_lines};

/// Postgres `lock_not_available`, raised when `lock_timeout` expires.
const SQLSTATE_LOCK_NOT_AVAILABLE: &str = "55P03";
/// Postgres `deadlock_detected`.
const SQLSTATE_DEADLOCK: &str = "40P01";
/// Postgres `serialization_failure`.
const SQLSTATE_SERIALIZATION: &str = "40001";

fn sqlstate(err: &DbErr) -> Option<String> {
    match err {
        DbErr::Query(RuntimeErr::SqlxError(e))
        | DbErr::Exec(RuntimeErr::SqlxError(e))
        | DbErr::Conn(RuntimeErr::SqlxError(e)) => e
            .as_database_error()
            .and_then(|db| db.code())
            .map(std::borrow::Cow::into_owned),
        _ => None,
    }
}

/// Maps a store error onto the ledger taxonomy.
pub(crate) fn store_error(err: DbErr) -> LedgerError {
    match sqlstate(&err).as_deref() {
        Some(SQLSTATE_LOCK_NOT_AVAILABLE) => {
            warn!(error = %err, "lock timeout");
            LedgerError::LockTimeout
        }
        Some(SQLSTATE_DEADLOCK | SQLSTATE_SERIALIZATION) => {
            warn!(error = %err, "transaction aborted by the store");
            LedgerError::ConcurrentModification
        }
        _ => LedgerError::Database(err.to_string()),
    }
}

/// True when `err` is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Bounds how long this transaction waits on any row lock.
pub(crate) async fn set_lock_timeout(
    txn: &DatabaseTransaction,
    lock_timeout_ms: u64,
) -> Result<(), LedgerError> {
    txn.execute_unprepared(&format!("SET LOCAL lock_timeout = '{lock_timeout_ms}ms'"))
        .await
        .map_err(store_error)?;
    Ok(())
}

/// Locks `ids` one at a time in the given order and returns their states.
///
/// Callers pass ids from `lock_order`, so two writers touching the same
/// accounts always queue in the same order.
pub(crate) async fn lock_accounts(
    txn: &DatabaseTransaction,
    ids: &[AccountId],
) -> Result<HashMap<AccountId, AccountState>, LedgerError> {
    let mut states = HashMap::with_capacity(ids.len());
    for id in ids {
        let account = accounts::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::AccountNotFound(*id))?;
        states.insert(
            *id,
            AccountState {
                balance: account.balance,
                version: account.version,
            },
        );
    }
    debug!(accounts = ids.len(), "account rows locked");
    Ok(states)
}

/// Inserts an entry header. `reversed_of` is set only for mirrors.
pub(crate) async fn insert_entry(
    txn: &DatabaseTransaction,
    spec: &EntrySpec,
    reversed_of: Option<LedgerEntryId>,
) -> Result<ledger_entries::Model, DbErr> {
    let now = Utc::now();
    let note_text = spec
        .note
        .clone()
        .unwrap_or_else(|| format!("Posted by user {}", spec.actor));
    let notes = vec![EntryNote {
        at: now,
        author: spec.actor,
        text: note_text,
    }];
    let refs = &spec.references;

    let entry = ledger_entries::ActiveModel {
        id: Set(LedgerEntryId::new().into_inner()),
        transaction_kind: Set(spec.transaction_kind.into()),
        service_category: Set(spec.service_category.into()),
        transaction_amount: Set(spec.transaction_amount),
        booking_id: Set(refs.booking_id.map(|id| id.get())),
        organization_id: Set(refs.organization_id.map(|id| id.get())),
        inventory_owner_organization_id: Set(refs
            .inventory_owner_organization_id
            .map(|id| id.get())),
        branch_id: Set(refs.branch_id.map(|id| id.get())),
        agency_id: Set(refs.agency_id.map(|id| id.get())),
        area_agency_id: Set(refs.area_agency_id.map(|id| id.get())),
        payment_ids: Set(serde_json::json!(spec.payment_ids)),
        narration: Set(spec.narration.clone()),
        remarks: Set(spec.remarks.clone()),
        metadata: Set(spec.metadata.clone()),
        notes: Set(serde_json::json!(notes)),
        reversed: Set(false),
        reversed_of: Set(reversed_of.map(LedgerEntryId::into_inner)),
        reversed_at: Set(None),
        reversed_by: Set(None),
        created_by: Set(spec.actor.get()),
        created_at: Set(now.into()),
    };

    entry.insert(txn).await
}

/// Writes the planned lines and the accounts' new states.
pub(crate) async fn apply_plan(
    txn: &DatabaseTransaction,
    entry_id: LedgerEntryId,
    plan: &PostingPlan,
) -> Result<Vec<ledger_lines::Model>, LedgerError> {
    let now = Utc::now();
    let mut stored = Vec::with_capacity(plan.lines.len());

    for planned in &plan.lines {
        stored.push(insert_line(txn, entry_id, planned, now).await?);
    }

    for (account_id, state) in &plan.accounts {
        accounts::ActiveModel {
            id: ActiveValue::Unchanged(account_id.into_inner()),
            balance: Set(state.balance),
            version: Set(state.version),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(txn)
        .await
        .map_err(store_error)?;
    }

    Ok(stored)
}

async fn insert_line(
    txn: &DatabaseTransaction,
    entry_id: LedgerEntryId,
    planned: &PlannedLine,
    now: chrono::DateTime<Utc>,
) -> Result<ledger_lines::Model, LedgerError> {
    ledger_lines::ActiveModel {
        id: Set(LedgerLineId::new().into_inner()),
        entry_id: Set(entry_id.into_inner()),
        account_id: Set(planned.account_id.into_inner()),
        line_no: Set(planned.line_no),
        debit: Set(planned.debit),
        credit: Set(planned.credit),
        account_version: Set(planned.account_version),
        balance_after: Set(planned.balance_after),
        created_at: Set(now.into()),
    }
    .insert(txn)
    .await
    .map_err(store_error)
}

/// Appends `note` to the stored note log of `entry`.
pub(crate) fn with_note(
    entry: &ledger_entries::Model,
    note: EntryNote,
) -> Result<serde_json::Value, LedgerError> {
    let mut notes = mapping::notes(entry)?;
    notes.push(note);
    mapping::notes_json(&notes)
}
