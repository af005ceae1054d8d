//! Concurrent access tests for the account registry and posting engine.
//!
//! These verify that:
//! - racing find-or-create callers end up with a single account row
//! - concurrent postings on shared accounts leave exact balances and
//!   gap-free versions, whatever order they commit in
//! - postings touching the same accounts in opposite order do not deadlock
//! - a posting stuck behind a held account lock times out and writes nothing

use std::sync::Arc;

use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use safar_core::ledger::{
    AccountKind, AccountScope, EntryReferences, LedgerError, LineInput, TransactionKind,
};
use safar_db::entities::{
    accounts, ledger_entries, ledger_lines, sea_orm_active_enums::AccountKind as DbAccountKind,
};
use safar_shared::config::LedgerConfig;
use safar_shared::types::OrganizationId;
use sea_orm::{ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QuerySelect, TransactionTrait};
use tokio::sync::Barrier;

mod common;

use common::{account_pair, ledger, ledger_with, spec};

const POSTINGS: i64 = 40;

#[tokio::test]
async fn test_fifty_callers_create_one_account() {
    let Some(ledger) = ledger().await else { return };
    let ledger = Arc::new(ledger);
    let org = OrganizationId(11);
    let barrier = Arc::new(Barrier::new(50));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                ledger
                    .accounts
                    .find_or_create_account(AccountScope::Organization(org), AccountKind::Cash)
                    .await
            })
        })
        .collect();

    let ids: Vec<_> = join_all(handles)
        .await
        .into_iter()
        .map(|joined| joined.expect("task panicked").expect("find or create").id)
        .collect();
    assert!(ids.windows(2).all(|w| w[0] == w[1]));

    let rows = accounts::Entity::find()
        .filter(accounts::Column::OrganizationId.eq(11))
        .filter(accounts::Column::BranchId.is_null())
        .filter(accounts::Column::AgencyId.is_null())
        .filter(accounts::Column::Kind.eq(DbAccountKind::Cash))
        .count(&ledger.db)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[tokio::test]
async fn test_concurrent_postings_commute() {
    let Some(ledger) = ledger().await else { return };
    let ledger = Arc::new(ledger);
    let (org, a, b) = account_pair(&ledger).await;
    let (a_id, b_id) = (a.id, b.id);

    let handles: Vec<_> = (1..=POSTINGS)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let amount = Decimal::new(i * 125, 2);
            tokio::spawn(async move {
                ledger
                    .postings
                    .post_simple(
                        a_id,
                        b_id,
                        amount,
                        spec(
                            TransactionKind::Debit,
                            amount,
                            EntryReferences {
                                organization_id: Some(org),
                                ..EntryReferences::default()
                            },
                        ),
                    )
                    .await
            })
        })
        .collect();

    for joined in join_all(handles).await {
        joined.expect("task panicked").expect("posting");
    }

    // 1.25 * (1 + 2 + ... + 40)
    let expected = dec!(1025.00);
    let a_now = ledger.accounts.get_account(a.id).await.unwrap();
    let b_now = ledger.accounts.get_account(b.id).await.unwrap();
    assert_eq!(a_now.balance, expected);
    assert_eq!(b_now.balance, -expected);
    assert_eq!(a_now.version, POSTINGS);
    assert_eq!(b_now.version, POSTINGS);

    for account in [a.id, b.id] {
        let report = ledger.accounts.verify_account_history(account).await.unwrap();
        assert!(report.is_consistent(), "{report:?}");
    }
}

#[tokio::test]
async fn test_opposite_line_order_does_not_deadlock() {
    let Some(ledger) = ledger().await else { return };
    let ledger = Arc::new(ledger);
    let (org, a, b) = account_pair(&ledger).await;
    let (a_id, b_id) = (a.id, b.id);
    let refs = EntryReferences {
        organization_id: Some(org),
        ..EntryReferences::default()
    };

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            let refs = refs.clone();
            // Half the entries name B first, half name A first.
            let lines = if i % 2 == 0 {
                vec![
                    LineInput::debit(a_id, dec!(10.00)),
                    LineInput::credit(b_id, dec!(10.00)),
                ]
            } else {
                vec![
                    LineInput::credit(b_id, dec!(10.00)),
                    LineInput::debit(a_id, dec!(10.00)),
                ]
            };
            tokio::spawn(async move {
                ledger
                    .postings
                    .post(spec(TransactionKind::Debit, dec!(10.00), refs), lines)
                    .await
            })
        })
        .collect();

    for joined in join_all(handles).await {
        joined.expect("task panicked").expect("no deadlock or timeout");
    }

    assert_eq!(ledger.accounts.get_balance(a.id).await.unwrap(), dec!(200.00));
    assert_eq!(ledger.accounts.get_balance(b.id).await.unwrap(), dec!(-200.00));
}

#[tokio::test]
async fn test_organization_zero_is_not_the_platform_account() {
    let Some(ledger) = ledger().await else { return };

    let platform = ledger
        .accounts
        .find_or_create_account(AccountScope::Unscoped, AccountKind::Cash)
        .await
        .expect("platform cash");
    let org_zero = ledger
        .accounts
        .find_or_create_account(AccountScope::Organization(OrganizationId(0)), AccountKind::Cash)
        .await
        .expect("organization 0 cash");

    assert_ne!(platform.id, org_zero.id);
    assert_eq!(platform.scope, AccountScope::Unscoped);
    assert_eq!(org_zero.scope, AccountScope::Organization(OrganizationId(0)));
}

#[tokio::test]
async fn test_post_behind_held_lock_times_out_cleanly() {
    let config = LedgerConfig {
        lock_timeout_ms: 100,
        ..LedgerConfig::default()
    };
    let Some(ledger) = ledger_with(config).await else { return };
    let (org, a, b) = account_pair(&ledger).await;

    let entries_before = ledger_entries::Entity::find()
        .filter(ledger_entries::Column::OrganizationId.eq(org.get()))
        .count(&ledger.db)
        .await
        .unwrap();
    let lines_before = ledger_lines::Entity::find()
        .filter(ledger_lines::Column::AccountId.is_in([a.id.into_inner(), b.id.into_inner()]))
        .count(&ledger.db)
        .await
        .unwrap();

    let holder = ledger.db.begin().await.unwrap();
    accounts::Entity::find_by_id(a.id.into_inner())
        .lock_exclusive()
        .one(&holder)
        .await
        .unwrap()
        .expect("account A");

    let result = ledger
        .postings
        .post_simple(
            a.id,
            b.id,
            dec!(50.00),
            spec(
                TransactionKind::Debit,
                dec!(50.00),
                EntryReferences {
                    organization_id: Some(org),
                    ..EntryReferences::default()
                },
            ),
        )
        .await;
    holder.rollback().await.unwrap();

    let err = result.unwrap_err();
    assert_eq!(err, LedgerError::LockTimeout);
    assert!(err.is_retryable());

    let entries_after = ledger_entries::Entity::find()
        .filter(ledger_entries::Column::OrganizationId.eq(org.get()))
        .count(&ledger.db)
        .await
        .unwrap();
    let lines_after = ledger_lines::Entity::find()
        .filter(ledger_lines::Column::AccountId.is_in([a.id.into_inner(), b.id.into_inner()]))
        .count(&ledger.db)
        .await
        .unwrap();
    assert_eq!(entries_after, entries_before);
    assert_eq!(lines_after, lines_before);
    assert_eq!(ledger.accounts.get_account(a.id).await.unwrap().version, 0);
    assert_eq!(ledger.accounts.get_account(b.id).await.unwrap().version, 0);
}
