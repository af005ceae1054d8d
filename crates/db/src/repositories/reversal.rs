//! Reversal engine: mirror entries that cancel a prior entry.

use chrono::Utc;
use safar_core::ledger::{
    EntryWithLines, LedgerError, PostingPlan, ReversalDecision, ReversalService, lock_order,
};
use safar_shared::config::LedgerConfig;
use safar_shared::types::{LedgerEntryId, UserId};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{info, instrument, warn};

use super::ledger_write::{self, is_unique_violation, store_error};
use super::mapping;
use crate::entities::{ledger_entries, ledger_lines};

/// Reversal repository.
#[derive(Debug, Clone)]
pub struct ReversalRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

pub(crate) async fn load_with_lines<C: ConnectionTrait>(
    conn: &C,
    entry: ledger_entries::Model,
) -> Result<EntryWithLines, LedgerError> {
    let lines = ledger_lines::Entity::find()
        .filter(ledger_lines::Column::EntryId.eq(entry.id))
        .order_by_asc(ledger_lines::Column::LineNo)
        .all(conn)
        .await
        .map_err(store_error)?;
    Ok(EntryWithLines {
        entry: mapping::entry(entry)?,
        lines: lines.into_iter().map(mapping::line).collect(),
    })
}

async fn find_mirror<C: ConnectionTrait>(
    conn: &C,
    original: LedgerEntryId,
) -> Result<Option<ledger_entries::Model>, LedgerError> {
    ledger_entries::Entity::find()
        .filter(ledger_entries::Column::ReversedOf.eq(original.into_inner()))
        .one(conn)
        .await
        .map_err(store_error)
}

impl ReversalRepository {
    /// Creates a new reversal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Reverses an entry.
    ///
    /// The original row is locked first, so two reversals of the same entry
    /// queue on it and the second sees the first one's result. Under the
    /// default policy the second call gets the existing mirror back.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the entry does not exist
    /// - `ReversalOfReversal` if the entry is itself a mirror
    /// - `AlreadyReversed` if it was reversed and the policy is `reject`
    /// - `LockTimeout` / `ConcurrentModification`, both retryable
    #[instrument(skip_all, fields(%entry_id, %actor))]
    pub async fn reverse(
        &self,
        entry_id: LedgerEntryId,
        actor: UserId,
        remarks: Option<&str>,
    ) -> Result<EntryWithLines, LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        ledger_write::set_lock_timeout(&txn, self.config.lock_timeout_ms).await?;

        let original_model = ledger_entries::Entity::find_by_id(entry_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;
        let original = load_with_lines(&txn, original_model.clone()).await?;

        let existing = find_mirror(&txn, entry_id).await?;
        let decision = ReversalService::decide(
            &original.entry,
            existing.as_ref().map(|m| LedgerEntryId::from_uuid(m.id)),
            self.config.reversal_policy,
        )?;
        if let ReversalDecision::ReturnExisting(mirror_id) = decision {
            info!(%mirror_id, "entry already reversed, returning existing reversal");
            let mirror = existing.ok_or(LedgerError::EntryNotFound(mirror_id))?;
            let result = load_with_lines(&txn, mirror).await?;
            txn.commit().await.map_err(store_error)?;
            return Ok(result);
        }

        let plan = ReversalService::plan(&original.entry, &original.lines, actor, remarks)?;
        let current = ledger_write::lock_accounts(&txn, &lock_order(&plan.lines)).await?;
        let posting = PostingPlan::build(&plan.lines, &current)?;

        let mirror = match ledger_write::insert_entry(&txn, &plan.spec, Some(entry_id)).await {
            Ok(mirror) => mirror,
            Err(err) if is_unique_violation(&err) => {
                warn!("reversal raced with another reversal of the same entry");
                drop(txn);
                return self.existing_reversal(entry_id).await;
            }
            Err(err) => return Err(store_error(err)),
        };
        let mirror_id = LedgerEntryId::from_uuid(mirror.id);
        let stored = ledger_write::apply_plan(&txn, mirror_id, &posting).await?;

        let notes = ledger_write::with_note(&original_model, plan.original_note)?;
        ledger_entries::ActiveModel {
            id: ActiveValue::Unchanged(entry_id.into_inner()),
            reversed: Set(true),
            reversed_at: Set(Some(Utc::now().into())),
            reversed_by: Set(Some(actor.get())),
            notes: Set(notes),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(store_error)?;

        txn.commit().await.map_err(store_error)?;

        info!(%mirror_id, lines = stored.len(), "entry reversed");

        Ok(EntryWithLines {
            entry: mapping::entry(mirror)?,
            lines: stored.into_iter().map(mapping::line).collect(),
        })
    }

    /// Resolves a lost reversal race through the configured policy.
    async fn existing_reversal(
        &self,
        entry_id: LedgerEntryId,
    ) -> Result<EntryWithLines, LedgerError> {
        let original = ledger_entries::Entity::find_by_id(entry_id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;
        let mirror = find_mirror(&self.db, entry_id)
            .await?
            .ok_or(LedgerError::ConcurrentModification)?;

        ReversalService::decide(
            &mapping::entry(original)?,
            Some(LedgerEntryId::from_uuid(mirror.id)),
            self.config.reversal_policy,
        )?;
        load_with_lines(&self.db, mirror).await
    }

    /// Reversal entry point for the booking and payment workflow.
    ///
    /// # Errors
    ///
    /// Same as [`Self::reverse`].
    pub async fn request_reversal(
        &self,
        entry_id: LedgerEntryId,
        actor: UserId,
        reason: &str,
    ) -> Result<EntryWithLines, LedgerError> {
        let reason = reason.trim();
        self.reverse(entry_id, actor, (!reason.is_empty()).then_some(reason))
            .await
    }
}
