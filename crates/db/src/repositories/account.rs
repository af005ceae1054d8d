//! Account registry: lazily created accounts, one per (scope, kind).

use chrono::Utc;
use rust_decimal::Decimal;
use safar_core::ledger::{
    Account, AccountKind, AccountScope, LedgerError, LedgerLine, ReconciliationReport,
    verify_account_history,
};
use safar_shared::config::LedgerConfig;
use safar_shared::types::{AccountId, PageRequest, PageResponse};
use sea_orm::sea_query::SimpleExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use tracing::{debug, info, instrument, warn};

use super::ledger_write::{is_unique_violation, store_error};
use super::mapping;
use crate::entities::{accounts, ledger_lines, sea_orm_active_enums as db};

/// Filter options for listing accounts.
#[derive(Debug, Clone, Copy, Default)]
pub struct AccountFilter {
    /// Only accounts owned by this scope.
    pub scope: Option<AccountScope>,
    /// Only accounts of this kind.
    pub kind: Option<AccountKind>,
}

/// Account repository.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

fn owner_matches(column: accounts::Column, owner: Option<i64>) -> SimpleExpr {
    match owner {
        Some(id) => column.eq(id),
        None => column.is_null(),
    }
}

/// Accounts owned by exactly `scope`.
pub(crate) fn owned_by(scope: AccountScope) -> Condition {
    let (organization, branch, agency) = scope.parts();
    Condition::all()
        .add(owner_matches(
            accounts::Column::OrganizationId,
            organization.map(|id| id.get()),
        ))
        .add(owner_matches(accounts::Column::BranchId, branch.map(|id| id.get())))
        .add(owner_matches(accounts::Column::AgencyId, agency.map(|id| id.get())))
}

impl AccountRepository {
    /// Creates a new account repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Returns the account for `(scope, kind)`, creating it at 0.00 if needed.
    ///
    /// Concurrent callers racing on a missing account all get the same row:
    /// the loser's insert trips the unique index and it re-reads the winner's.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry budget runs out or the store fails.
    #[instrument(skip_all, fields(%scope, %kind))]
    pub async fn find_or_create_account(
        &self,
        scope: AccountScope,
        kind: AccountKind,
    ) -> Result<Account, LedgerError> {
        let mut retries = 0;
        loop {
            if let Some(existing) = self.find_by_scope(scope, kind).await? {
                return mapping::account(existing);
            }

            match self.insert_account(scope, kind).await {
                Ok(created) => {
                    info!(account_id = %created.id, name = %created.name, "account created");
                    return mapping::account(created);
                }
                Err(err)
                    if is_unique_violation(&err) && retries < self.config.account_create_retries =>
                {
                    retries += 1;
                    warn!(retries, "account created concurrently, re-reading");
                }
                Err(err) => return Err(store_error(err)),
            }
        }
    }

    async fn find_by_scope(
        &self,
        scope: AccountScope,
        kind: AccountKind,
    ) -> Result<Option<accounts::Model>, LedgerError> {
        accounts::Entity::find()
            .filter(owned_by(scope))
            .filter(accounts::Column::Kind.eq(db::AccountKind::from(kind)))
            .one(&self.db)
            .await
            .map_err(store_error)
    }

    async fn insert_account(
        &self,
        scope: AccountScope,
        kind: AccountKind,
    ) -> Result<accounts::Model, DbErr> {
        let (organization, branch, agency) = scope.parts();
        let now = Utc::now().into();
        accounts::ActiveModel {
            id: Set(AccountId::new().into_inner()),
            organization_id: Set(organization.map(|id| id.get())),
            branch_id: Set(branch.map(|id| id.get())),
            agency_id: Set(agency.map(|id| id.get())),
            kind: Set(kind.into()),
            name: Set(scope.account_name(kind)),
            balance: Set(Decimal::ZERO),
            version: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&self.db)
        .await
    }

    /// Gets an account by id.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if it does not exist.
    pub async fn get_account(&self, account_id: AccountId) -> Result<Account, LedgerError> {
        debug!(%account_id, "loading account");
        let model = accounts::Entity::find_by_id(account_id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_error)?
            .ok_or(LedgerError::AccountNotFound(account_id))?;
        mapping::account(model)
    }

    /// Cached balance of an account (Σdebit − Σcredit).
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if it does not exist.
    pub async fn get_balance(&self, account_id: AccountId) -> Result<Decimal, LedgerError> {
        Ok(self.get_account(account_id).await?.balance)
    }

    /// Lists accounts, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_accounts(
        &self,
        filter: AccountFilter,
        page: PageRequest,
    ) -> Result<PageResponse<Account>, LedgerError> {
        let mut query = accounts::Entity::find();
        if let Some(scope) = filter.scope {
            query = query.filter(owned_by(scope));
        }
        if let Some(kind) = filter.kind {
            query = query.filter(accounts::Column::Kind.eq(db::AccountKind::from(kind)));
        }

        let total = query.clone().count(&self.db).await.map_err(store_error)?;
        let models = query
            .order_by_asc(accounts::Column::CreatedAt)
            .order_by_asc(accounts::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await
            .map_err(store_error)?;

        let data = models
            .into_iter()
            .map(mapping::account)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PageResponse::new(data, page, total))
    }

    /// Lines posted against an account, in posting order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn account_lines(&self, account_id: AccountId) -> Result<Vec<LedgerLine>, LedgerError> {
        let lines = ledger_lines::Entity::find()
            .filter(ledger_lines::Column::AccountId.eq(account_id.into_inner()))
            .order_by_asc(ledger_lines::Column::AccountVersion)
            .all(&self.db)
            .await
            .map_err(store_error)?;
        Ok(lines.into_iter().map(mapping::line).collect())
    }

    /// Replays an account's lines against its cached balance and version.
    ///
    /// # Errors
    ///
    /// Returns `AccountNotFound` if the account does not exist. A history
    /// that fails to replay is reported in the result, not as an error.
    #[instrument(skip_all, fields(%account_id))]
    pub async fn verify_account_history(
        &self,
        account_id: AccountId,
    ) -> Result<ReconciliationReport, LedgerError> {
        let account = self.get_account(account_id).await?;
        let lines = self.account_lines(account_id).await?;
        let report = verify_account_history(account_id, account.state(), &lines);
        if report.is_consistent() {
            debug!(lines = report.lines_checked, "account history consistent");
        } else {
            warn!(mismatches = report.mismatches.len(), "account history does not replay");
        }
        Ok(report)
    }
}
