//! Balance aggregation and the pending-balance scan.
//!
//! Queries here only read. They take no locks and may or may not see a
//! posting that commits while they run.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use safar_core::aggregation::{
    AggregationService, BalanceReport, BalanceSummary, CategoryBreakdown, EntityTotals,
    FinalBalance, Granularity, KindTotal, MonthlyBreakdown, NoteRef, PairSettlement,
    PendingBalance, PendingScanner,
};
use safar_core::ledger::{EntityKind, EntityRef, LedgerEntry, LedgerError, ScopeFilter};
use safar_shared::config::LedgerConfig;
use safar_shared::types::{LedgerEntryId, OrganizationId};
use sea_orm::prelude::DateTimeWithTimeZone;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult, JoinType,
    QueryFilter, QueryOrder, QuerySelect, RelationTrait, Select,
};
use tracing::{debug, instrument};

use super::account::owned_by;
use super::entry::{scope_condition, sold_inventory_of};
use super::ledger_write::store_error;
use super::mapping;
use crate::entities::{ledger_entries, ledger_lines, sea_orm_active_enums as db};

const MONTH_EXPR: &str =
    r#"to_char("ledger_entries"."created_at" AT TIME ZONE 'UTC', 'YYYY-MM')"#;

#[derive(Debug, FromQueryResult)]
struct KindRow {
    transaction_kind: db::TransactionKind,
    total: Decimal,
    entries: i64,
}

#[derive(Debug, FromQueryResult)]
struct CategoryRow {
    service_category: db::ServiceCategory,
    transaction_kind: db::TransactionKind,
    total: Decimal,
    entries: i64,
}

#[derive(Debug, FromQueryResult)]
struct MonthRow {
    month: String,
    transaction_kind: db::TransactionKind,
    total: Decimal,
    entries: i64,
}

#[derive(Debug, FromQueryResult)]
struct EntityRow {
    entity_id: i64,
    transaction_kind: db::TransactionKind,
    total: Decimal,
    entries: i64,
    last_at: Option<DateTimeWithTimeZone>,
}

#[derive(Debug, FromQueryResult)]
struct LineSumRow {
    total_debit: Option<Decimal>,
    total_credit: Option<Decimal>,
    lines: i64,
}

fn kind_total(transaction_kind: db::TransactionKind, total: Decimal, entries: i64) -> KindTotal {
    KindTotal {
        transaction_kind: transaction_kind.into(),
        total,
        entries: u64::try_from(entries).unwrap_or_default(),
    }
}

/// Entry column that references an entity of `kind`.
const fn entity_column(kind: EntityKind) -> ledger_entries::Column {
    match kind {
        EntityKind::Agent => ledger_entries::Column::AgencyId,
        EntityKind::AreaAgent => ledger_entries::Column::AreaAgencyId,
        EntityKind::Branch => ledger_entries::Column::BranchId,
        EntityKind::Organization => ledger_entries::Column::OrganizationId,
    }
}

/// Totals per transaction kind over the entries `condition` selects.
fn kind_totals(condition: Condition) -> Select<ledger_entries::Entity> {
    ledger_entries::Entity::find()
        .select_only()
        .column(ledger_entries::Column::TransactionKind)
        .column_as(ledger_entries::Column::TransactionAmount.sum(), "total")
        .column_as(ledger_entries::Column::Id.count(), "entries")
        .filter(condition)
        .group_by(ledger_entries::Column::TransactionKind)
}

/// Balance repository.
#[derive(Debug, Clone)]
pub struct BalanceRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl BalanceRepository {
    /// Creates a new balance repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Debit, credit and net totals for a scope.
    ///
    /// Entry granularity sums `transaction_amount` by transaction kind over
    /// matching entries, reversed originals and mirrors included. Line
    /// granularity sums line debits and credits over the accounts the scope
    /// owns.
    ///
    /// # Errors
    ///
    /// `InvalidScope` for a malformed pair, or for line granularity on an
    /// area agency or a pair.
    #[instrument(skip(self))]
    pub async fn aggregate(
        &self,
        filter: ScopeFilter,
        granularity: Granularity,
    ) -> Result<BalanceSummary, LedgerError> {
        let filter = filter.validate()?;
        match granularity {
            Granularity::Entry => self.entry_summary(scope_condition(filter)).await,
            Granularity::Line => self.line_summary(filter).await,
        }
    }

    async fn entry_summary(&self, condition: Condition) -> Result<BalanceSummary, LedgerError> {
        let rows = kind_totals(condition)
            .into_model::<KindRow>()
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(AggregationService::summarize(
            rows.into_iter()
                .map(|row| kind_total(row.transaction_kind, row.total, row.entries)),
        ))
    }

    async fn line_summary(&self, filter: ScopeFilter) -> Result<BalanceSummary, LedgerError> {
        let scope = filter.account_scope()?;
        let row = ledger_lines::Entity::find()
            .select_only()
            .column_as(ledger_lines::Column::Debit.sum(), "total_debit")
            .column_as(ledger_lines::Column::Credit.sum(), "total_credit")
            .column_as(ledger_lines::Column::Id.count(), "lines")
            .join(JoinType::InnerJoin, ledger_lines::Relation::Accounts.def())
            .filter(owned_by(scope))
            .into_model::<LineSumRow>()
            .one(&self.db)
            .await
            .map_err(store_error)?;

        Ok(row.map_or_else(BalanceSummary::default, |row| {
            BalanceSummary::new(
                row.total_debit.unwrap_or_default(),
                row.total_credit.unwrap_or_default(),
                u64::try_from(row.lines).unwrap_or_default(),
            )
        }))
    }

    /// Breakdown by service category.
    ///
    /// # Errors
    ///
    /// `InvalidScope` for a malformed pair, or a database error.
    pub async fn by_category(
        &self,
        filter: ScopeFilter,
    ) -> Result<Vec<CategoryBreakdown>, LedgerError> {
        let rows = ledger_entries::Entity::find()
            .select_only()
            .column(ledger_entries::Column::ServiceCategory)
            .column(ledger_entries::Column::TransactionKind)
            .column_as(ledger_entries::Column::TransactionAmount.sum(), "total")
            .column_as(ledger_entries::Column::Id.count(), "entries")
            .filter(scope_condition(filter.validate()?))
            .group_by(ledger_entries::Column::ServiceCategory)
            .group_by(ledger_entries::Column::TransactionKind)
            .into_model::<CategoryRow>()
            .all(&self.db)
            .await
            .map_err(store_error)?;

        Ok(AggregationService::by_category(rows.into_iter().map(|row| {
            (
                row.service_category.into(),
                kind_total(row.transaction_kind, row.total, row.entries),
            )
        })))
    }

    /// Breakdown by UTC calendar month, oldest first.
    ///
    /// # Errors
    ///
    /// `InvalidScope` for a malformed pair, or a database error.
    pub async fn by_month(&self, filter: ScopeFilter) -> Result<Vec<MonthlyBreakdown>, LedgerError> {
        let rows = ledger_entries::Entity::find()
            .select_only()
            .column_as(Expr::cust(MONTH_EXPR), "month")
            .column(ledger_entries::Column::TransactionKind)
            .column_as(ledger_entries::Column::TransactionAmount.sum(), "total")
            .column_as(ledger_entries::Column::Id.count(), "entries")
            .filter(scope_condition(filter.validate()?))
            .group_by(Expr::cust(MONTH_EXPR))
            .group_by(ledger_entries::Column::TransactionKind)
            .into_model::<MonthRow>()
            .all(&self.db)
            .await
            .map_err(store_error)?;

        Ok(AggregationService::by_month(rows.into_iter().map(|row| {
            (row.month, kind_total(row.transaction_kind, row.total, row.entries))
        })))
    }

    /// The newest entries in a scope.
    ///
    /// # Errors
    ///
    /// `InvalidScope` for a malformed pair, or a database error.
    pub async fn recent_entries(&self, filter: ScopeFilter) -> Result<Vec<LedgerEntry>, LedgerError> {
        let models = ledger_entries::Entity::find()
            .filter(scope_condition(filter.validate()?))
            .order_by_desc(ledger_entries::Column::CreatedAt)
            .order_by_desc(ledger_entries::Column::Id)
            .limit(self.config.recent_entries_limit)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        mapping::entries(models)
    }

    /// Summary plus every breakdown for a scope.
    ///
    /// # Errors
    ///
    /// Same as [`Self::aggregate`].
    #[instrument(skip(self))]
    pub async fn report(
        &self,
        filter: ScopeFilter,
        granularity: Granularity,
    ) -> Result<BalanceReport, LedgerError> {
        Ok(BalanceReport {
            scope: filter,
            granularity,
            summary: self.aggregate(filter, granularity).await?,
            by_category: self.by_category(filter).await?,
            by_month: self.by_month(filter).await?,
            recent_entries: self.recent_entries(filter).await?,
        })
    }

    /// Who owes whom between two organizations, read from `a`'s side.
    ///
    /// # Errors
    ///
    /// `InvalidScope` when `a == b`, or a database error.
    #[instrument(skip(self))]
    pub async fn organization_pair(
        &self,
        a: OrganizationId,
        b: OrganizationId,
    ) -> Result<PairSettlement, LedgerError> {
        ScopeFilter::OrganizationPair { a, b }.validate()?;
        let a_sold_b = self.entry_summary(sold_inventory_of(a.get(), b.get())).await?;
        let b_sold_a = self.entry_summary(sold_inventory_of(b.get(), a.get())).await?;
        let settlement = AggregationService::settle_pair(a, b, a_sold_b, b_sold_a);
        debug!(net = %settlement.net, "pair settled");
        Ok(settlement)
    }

    /// Totals for every entity of `kind` referenced by at least one entry,
    /// or for the single entity `only`.
    async fn entity_totals(
        &self,
        kind: EntityKind,
        only: Option<i64>,
    ) -> Result<Vec<EntityTotals>, LedgerError> {
        let column = entity_column(kind);
        let mut query = ledger_entries::Entity::find()
            .select_only()
            .column_as(column, "entity_id")
            .column(ledger_entries::Column::TransactionKind)
            .column_as(ledger_entries::Column::TransactionAmount.sum(), "total")
            .column_as(ledger_entries::Column::Id.count(), "entries")
            .column_as(ledger_entries::Column::CreatedAt.max(), "last_at")
            .filter(column.is_not_null());
        if let Some(id) = only {
            query = query.filter(column.eq(id));
        }
        let rows = query
            .group_by(column)
            .group_by(ledger_entries::Column::TransactionKind)
            .into_model::<EntityRow>()
            .all(&self.db)
            .await
            .map_err(store_error)?;

        let mut totals: BTreeMap<i64, EntityTotals> = BTreeMap::new();
        for row in rows {
            let slot = totals.entry(row.entity_id).or_insert_with(|| EntityTotals {
                entity: kind.entity(row.entity_id),
                summary: BalanceSummary::default(),
                last_updated: None,
            });
            slot.summary
                .add(kind_total(row.transaction_kind, row.total, row.entries));
            let last = row.last_at.map(|at| at.with_timezone(&Utc));
            slot.last_updated = slot.last_updated.max(last);
        }
        Ok(totals.into_values().collect())
    }

    /// Latest audit notes on the entries referencing `entity`, newest first.
    async fn entity_notes(&self, entity: EntityRef) -> Result<Vec<NoteRef>, LedgerError> {
        let limit = self.config.pending_notes_limit;
        let models = ledger_entries::Entity::find()
            .filter(entity_column(entity.kind()).eq(entity.raw_id()))
            .order_by_desc(ledger_entries::Column::CreatedAt)
            .limit(u64::try_from(limit).unwrap_or(u64::MAX))
            .all(&self.db)
            .await
            .map_err(store_error)?;

        let mut notes = Vec::new();
        for model in &models {
            let entry_id = LedgerEntryId::from_uuid(model.id);
            notes.extend(
                mapping::notes(model)?
                    .into_iter()
                    .map(|note| NoteRef { entry_id, note }),
            );
        }
        notes.sort_by(|x, y| y.note.at.cmp(&x.note.at));
        notes.truncate(limit);
        Ok(notes)
    }

    /// Entities of `kind` that owe money (`net < 0`), largest debt first.
    ///
    /// An entity at exactly zero is settled and left out.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    #[instrument(skip(self))]
    pub async fn pending_balances(
        &self,
        kind: EntityKind,
    ) -> Result<Vec<PendingBalance>, LedgerError> {
        let owing = PendingScanner::select(self.entity_totals(kind, None).await?);
        debug!(owing = owing.len(), "pending scan complete");

        let mut rows = Vec::with_capacity(owing.len());
        for totals in owing {
            let notes = self.entity_notes(totals.entity).await?;
            rows.push(PendingScanner::row(totals, notes));
        }
        Ok(rows)
    }

    /// One entity's totals, without the owing filter.
    ///
    /// An entity no entry references has zero totals and no `last_updated`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn final_balance(&self, entity: EntityRef) -> Result<FinalBalance, LedgerError> {
        let totals = self
            .entity_totals(entity.kind(), Some(entity.raw_id()))
            .await?
            .into_iter()
            .next()
            .unwrap_or(EntityTotals {
                entity,
                summary: BalanceSummary::default(),
                last_updated: None,
            });
        Ok(AggregationService::final_balance(&totals))
    }
}
