//! Entry queries and the append-only note log.

use safar_core::ledger::{
    EntryNote, EntryWithLines, LedgerEntry, LedgerError, ScopeFilter, ServiceCategory,
};
use safar_shared::config::LedgerConfig;
use safar_shared::types::{LedgerEntryId, PageRequest, PageResponse, UserId};
use sea_orm::{
    ActiveModelTrait, ActiveValue, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tracing::{debug, info, instrument};

use super::ledger_write::{self, store_error};
use super::mapping;
use super::reversal::load_with_lines;
use crate::entities::{ledger_entries, sea_orm_active_enums as db};

/// Filter options for listing entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    /// Only entries matching this scope.
    pub scope: Option<ScopeFilter>,
    /// Only entries of this category.
    pub service_category: Option<ServiceCategory>,
    /// Keep reversed originals and their mirrors.
    pub include_reversed: bool,
}

/// Entries a scope filter selects.
///
/// Organization scope matches the seller organization. A pair matches the
/// entries where either organization sold the other's inventory.
pub(crate) fn scope_condition(filter: ScopeFilter) -> Condition {
    match filter {
        ScopeFilter::Organization(id) => {
            Condition::all().add(ledger_entries::Column::OrganizationId.eq(id.get()))
        }
        ScopeFilter::Branch(id) => {
            Condition::all().add(ledger_entries::Column::BranchId.eq(id.get()))
        }
        ScopeFilter::Agency(id) => {
            Condition::all().add(ledger_entries::Column::AgencyId.eq(id.get()))
        }
        ScopeFilter::AreaAgency(id) => {
            Condition::all().add(ledger_entries::Column::AreaAgencyId.eq(id.get()))
        }
        ScopeFilter::OrganizationPair { a, b } => Condition::any()
            .add(sold_inventory_of(a.get(), b.get()))
            .add(sold_inventory_of(b.get(), a.get())),
    }
}

/// Entries where `seller` sold inventory owned by `owner`.
pub(crate) fn sold_inventory_of(seller: i64, owner: i64) -> Condition {
    Condition::all()
        .add(ledger_entries::Column::OrganizationId.eq(seller))
        .add(ledger_entries::Column::InventoryOwnerOrganizationId.eq(owner))
}

/// Entry repository.
#[derive(Debug, Clone)]
pub struct EntryRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl EntryRepository {
    /// Creates a new entry repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Gets an entry with all its lines, in line order.
    ///
    /// # Errors
    ///
    /// Returns `EntryNotFound` if it does not exist.
    pub async fn get_entry(&self, entry_id: LedgerEntryId) -> Result<EntryWithLines, LedgerError> {
        debug!(%entry_id, "loading entry");
        let model = ledger_entries::Entity::find_by_id(entry_id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;
        load_with_lines(&self.db, model).await
    }

    /// The mirror of `entry_id`, if it was reversed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_reversal(
        &self,
        entry_id: LedgerEntryId,
    ) -> Result<Option<LedgerEntry>, LedgerError> {
        ledger_entries::Entity::find()
            .filter(ledger_entries::Column::ReversedOf.eq(entry_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(store_error)?
            .map(mapping::entry)
            .transpose()
    }

    /// Lists entries, newest first.
    ///
    /// # Errors
    ///
    /// `InvalidScope` for a malformed pair filter, or a database error.
    pub async fn list_entries(
        &self,
        filter: EntryFilter,
        page: PageRequest,
    ) -> Result<PageResponse<LedgerEntry>, LedgerError> {
        let mut query = ledger_entries::Entity::find();
        if let Some(scope) = filter.scope {
            query = query.filter(scope_condition(scope.validate()?));
        }
        if let Some(category) = filter.service_category {
            query = query
                .filter(ledger_entries::Column::ServiceCategory.eq(db::ServiceCategory::from(category)));
        }
        if !filter.include_reversed {
            query = query
                .filter(ledger_entries::Column::Reversed.eq(false))
                .filter(ledger_entries::Column::ReversedOf.is_null());
        }

        let total = query.clone().count(&self.db).await.map_err(store_error)?;
        let models = query
            .order_by_desc(ledger_entries::Column::CreatedAt)
            .order_by_desc(ledger_entries::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(store_error)?;

        Ok(PageResponse::new(mapping::entries(models)?, page, total))
    }

    /// Appends a note to an entry's log. Nothing else on the entry changes.
    ///
    /// # Errors
    ///
    /// - `EntryNotFound` if the entry does not exist
    /// - `LockTimeout` if the entry stays locked past the configured timeout
    #[instrument(skip(self, text))]
    pub async fn append_note(
        &self,
        entry_id: LedgerEntryId,
        author: UserId,
        text: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let txn = self.db.begin().await.map_err(store_error)?;
        ledger_write::set_lock_timeout(&txn, self.config.lock_timeout_ms).await?;

        let model = ledger_entries::Entity::find_by_id(entry_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::EntryNotFound(entry_id))?;

        let notes = ledger_write::with_note(&model, EntryNote::now(author, text))?;
        let updated = ledger_entries::ActiveModel {
            id: ActiveValue::Unchanged(model.id),
            notes: Set(notes),
            ..Default::default()
        }
        .update(&txn)
        .await
        .map_err(store_error)?;

        txn.commit().await.map_err(store_error)?;
        info!("note appended");
        mapping::entry(updated)
    }
}
