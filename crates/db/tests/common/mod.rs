//! Shared setup for the database integration tests.
//!
//! Every test connects through `DATABASE_URL` and returns early when it is
//! unset. Tests use fresh random external ids so they never see each other's
//! entries.

#![allow(dead_code)]

use rust_decimal::Decimal;
use safar_core::ledger::{
    Account, AccountKind, AccountScope, EntryReferences, EntrySpec, ServiceCategory,
    TransactionKind,
};
use safar_db::migration::Migrator;
use safar_db::{
    AccountRepository, BalanceRepository, EntryRepository, PostingRepository, ReversalRepository,
};
use safar_shared::config::LedgerConfig;
use safar_shared::types::{OrganizationId, UserId};
use sea_orm::{Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tokio::sync::OnceCell;
use uuid::Uuid;

static MIGRATED: OnceCell<bool> = OnceCell::const_new();

/// Repositories over one connection.
pub struct Ledger {
    pub db: DatabaseConnection,
    pub accounts: AccountRepository,
    pub postings: PostingRepository,
    pub reversals: ReversalRepository,
    pub entries: EntryRepository,
    pub balances: BalanceRepository,
}

impl Ledger {
    pub fn new(db: DatabaseConnection, config: LedgerConfig) -> Self {
        Self {
            accounts: AccountRepository::new(db.clone(), config.clone()),
            postings: PostingRepository::new(db.clone(), config.clone()),
            reversals: ReversalRepository::new(db.clone(), config.clone()),
            entries: EntryRepository::new(db.clone(), config.clone()),
            balances: BalanceRepository::new(db.clone(), config),
            db,
        }
    }
}

/// Connects and migrates, or `None` when no database is configured.
pub async fn connect() -> Option<DatabaseConnection> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("Skipping test - DATABASE_URL is not set");
        return None;
    };

    let migrated = MIGRATED
        .get_or_init(|| async {
            match Database::connect(&url).await {
                Ok(db) => match Migrator::up(&db, None).await {
                    Ok(()) => true,
                    Err(e) => {
                        eprintln!("Skipping test - migration failed: {e}");
                        false
                    }
                },
                Err(e) => {
                    eprintln!("Skipping test - database not available: {e}");
                    false
                }
            }
        })
        .await;
    if !migrated {
        return None;
    }

    Database::connect(&url).await.ok()
}

/// Connects with the default ledger configuration.
pub async fn ledger() -> Option<Ledger> {
    ledger_with(LedgerConfig::default()).await
}

/// Connects with a custom ledger configuration.
pub async fn ledger_with(config: LedgerConfig) -> Option<Ledger> {
    Some(Ledger::new(connect().await?, config))
}

/// A platform id no other test run will pick.
pub fn random_id() -> i64 {
    i64::from(Uuid::new_v4().as_fields().0 >> 1) + 1_000_000
}

pub fn actor() -> UserId {
    UserId(42)
}

/// Entry header for a hand-built posting.
pub fn spec(kind: TransactionKind, amount: Decimal, references: EntryReferences) -> EntrySpec {
    EntrySpec {
        transaction_kind: kind,
        service_category: ServiceCategory::Ticket,
        transaction_amount: amount,
        references,
        payment_ids: vec![],
        narration: "Integration test posting".to_string(),
        remarks: None,
        metadata: serde_json::json!({ "source": "integration-test" }),
        actor: actor(),
        note: Some("posted from the integration suite".to_string()),
    }
}

/// Two fresh accounts under a fresh organization.
pub async fn account_pair(ledger: &Ledger) -> (OrganizationId, Account, Account) {
    let org = OrganizationId(random_id());
    let a = ledger
        .accounts
        .find_or_create_account(AccountScope::Organization(org), AccountKind::Receivable)
        .await
        .expect("create account A");
    let b = ledger
        .accounts
        .find_or_create_account(AccountScope::Organization(org), AccountKind::Sales)
        .await
        .expect("create account B");
    (org, a, b)
}
