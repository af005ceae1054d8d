//! Posting engine: balanced entries applied atomically to account balances.

use rust_decimal::Decimal;
use safar_core::ledger::{
    EntrySpec, EntryWithLines, LedgerError, LineInput, PostingPlan, PostingPolicy,
    PostingRequest, lock_order, simple_lines, validate_entry_spec, validate_lines,
};
use safar_shared::config::LedgerConfig;
use safar_shared::types::{AccountId, LedgerEntryId};
use sea_orm::{DatabaseConnection, TransactionTrait};
use tracing::{info, instrument};

use super::account::AccountRepository;
use super::ledger_write::{self, store_error};
use super::mapping;

/// Posting repository.
#[derive(Debug, Clone)]
pub struct PostingRepository {
    db: DatabaseConnection,
    config: LedgerConfig,
}

impl PostingRepository {
    /// Creates a new posting repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self { db, config }
    }

    /// Posts one entry with its lines.
    ///
    /// Lines are validated before the transaction opens. Inside it, the
    /// touched accounts are locked in ascending id order, the entry is
    /// inserted, and each line is applied in the order given, recording the
    /// account's balance and version right after it.
    ///
    /// # Errors
    ///
    /// - Validation errors (`EmptyEntry`, `InvalidLineAmount`,
    ///   `UnbalancedEntry`, `InvalidAmount`) with nothing written
    /// - `AccountNotFound` if a line names an unknown account
    /// - `LockTimeout` / `ConcurrentModification`, both retryable
    #[instrument(
        skip_all,
        fields(line_count = lines.len(), amount = %spec.transaction_amount)
    )]
    pub async fn post(
        &self,
        spec: EntrySpec,
        lines: Vec<LineInput>,
    ) -> Result<EntryWithLines, LedgerError> {
        validate_entry_spec(&spec)?;
        validate_lines(&lines)?;

        let txn = self.db.begin().await.map_err(store_error)?;
        ledger_write::set_lock_timeout(&txn, self.config.lock_timeout_ms).await?;

        let current = ledger_write::lock_accounts(&txn, &lock_order(&lines)).await?;
        let plan = PostingPlan::build(&lines, &current)?;

        let entry = ledger_write::insert_entry(&txn, &spec, None)
            .await
            .map_err(store_error)?;
        let entry_id = LedgerEntryId::from_uuid(entry.id);
        let stored = ledger_write::apply_plan(&txn, entry_id, &plan).await?;

        txn.commit().await.map_err(store_error)?;

        info!(%entry_id, total = %plan.totals.debit, "entry posted");

        Ok(EntryWithLines {
            entry: mapping::entry(entry)?,
            lines: stored.into_iter().map(mapping::line).collect(),
        })
    }

    /// Posts the two-line case: debit one account, credit another.
    ///
    /// # Errors
    ///
    /// Same as [`Self::post`].
    pub async fn post_simple(
        &self,
        debit_account: AccountId,
        credit_account: AccountId,
        amount: Decimal,
        spec: EntrySpec,
    ) -> Result<EntryWithLines, LedgerError> {
        let lines = simple_lines(debit_account, credit_account, amount)?;
        self.post(spec, lines).await
    }

    /// The write entry point for the booking and payment workflow.
    ///
    /// Resolves both accounts through the posting policy, creating them on
    /// first use, then posts the two-line entry.
    ///
    /// # Errors
    ///
    /// `InvalidScope` without a seller organization, plus everything
    /// [`Self::post`] returns.
    #[instrument(
        skip_all,
        fields(
            kind = request.transaction_kind.as_str(),
            category = request.service_category.as_str()
        )
    )]
    pub async fn request_posting(
        &self,
        request: PostingRequest,
    ) -> Result<EntryWithLines, LedgerError> {
        let posting = PostingPolicy::plan(&request)?;

        let accounts = AccountRepository::new(self.db.clone(), self.config.clone());
        let debit = accounts
            .find_or_create_account(posting.debit.scope, posting.debit.kind)
            .await?;
        let credit = accounts
            .find_or_create_account(posting.credit.scope, posting.credit.kind)
            .await?;

        let amount = posting.spec.transaction_amount;
        self.post_simple(debit.id, credit.id, amount, posting.spec)
            .await
    }
}
