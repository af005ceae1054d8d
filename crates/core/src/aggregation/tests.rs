//! Tests for balance aggregation and the pending scan.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use safar_shared::types::{AgencyId, LedgerEntryId, OrganizationId, UserId};

use super::pending::PendingScanner;
use super::service::AggregationService;
use super::types::{BalanceSummary, EntityTotals, KindTotal};
use crate::ledger::{
    EntityRef, EntryReferences, LedgerEntry, ServiceCategory, TransactionKind,
};

fn kind_total(kind: TransactionKind, total: Decimal) -> KindTotal {
    KindTotal {
        transaction_kind: kind,
        total,
        entries: 1,
    }
}

fn entry(kind: TransactionKind, amount: Decimal) -> LedgerEntry {
    LedgerEntry {
        id: LedgerEntryId::new(),
        transaction_kind: kind,
        service_category: ServiceCategory::Ticket,
        transaction_amount: amount,
        references: EntryReferences::default(),
        payment_ids: vec![],
        narration: String::new(),
        remarks: None,
        metadata: serde_json::Value::Null,
        notes: vec![],
        reversed: false,
        reversed_of: None,
        reversed_at: None,
        reversed_by: None,
        created_by: UserId(1),
        created_at: Utc::now(),
    }
}

fn agency_totals(id: i64, net: Decimal) -> EntityTotals {
    let (debit, credit) = if net.is_sign_negative() {
        (Decimal::ZERO, -net)
    } else {
        (net, Decimal::ZERO)
    };
    EntityTotals {
        entity: EntityRef::Agency(AgencyId(id)),
        summary: BalanceSummary::new(debit, credit, 1),
        last_updated: None,
    }
}

#[test]
fn test_summarize_splits_by_kind() {
    let summary = AggregationService::summarize([
        kind_total(TransactionKind::Debit, dec!(300.00)),
        kind_total(TransactionKind::Credit, dec!(1000.00)),
        kind_total(TransactionKind::Debit, dec!(200.00)),
    ]);

    assert_eq!(summary.total_debit, dec!(500.00));
    assert_eq!(summary.total_credit, dec!(1000.00));
    assert_eq!(summary.net_balance, dec!(-500.00));
    assert_eq!(summary.entries, 3);
    assert!(summary.is_owing());
}

#[test]
fn test_reversed_entry_and_mirror_cancel() {
    let mut original = entry(TransactionKind::Credit, dec!(1000.00));
    original.reversed = true;
    let mut mirror = entry(TransactionKind::Debit, dec!(1000.00));
    mirror.reversed_of = Some(original.id);

    let summary = AggregationService::summarize_entries([&original, &mirror]);

    assert_eq!(summary.entries, 2);
    assert_eq!(summary.net_balance, Decimal::ZERO);
}

#[test]
fn test_org_pair_two_favoring_11_one_favoring_15() {
    let org11 = OrganizationId(11);
    let org15 = OrganizationId(15);
    // Org 15 sold Org 11's inventory twice; Org 11 sold Org 15's once.
    let fifteen_sold_eleven = AggregationService::summarize([
        kind_total(TransactionKind::Credit, dec!(500.00)),
        kind_total(TransactionKind::Credit, dec!(300.00)),
    ]);
    let eleven_sold_fifteen =
        AggregationService::summarize([kind_total(TransactionKind::Credit, dec!(200.00))]);

    let settlement =
        AggregationService::settle_pair(org11, org15, eleven_sold_fifteen, fifteen_sold_eleven);

    assert_eq!(settlement.a_owes_b, dec!(200.00));
    assert_eq!(settlement.b_owes_a, dec!(800.00));
    assert_eq!(settlement.net, dec!(600.00));
    assert_eq!(settlement.description, "Org 15 owes Org 11 600.00");
    assert_eq!(settlement.summary.total_credit, dec!(1000.00));
    assert_eq!(settlement.summary.entries, 3);

    // Same facts read from Org 15's side: the sign flips, the sentence does not.
    let flipped =
        AggregationService::settle_pair(org15, org11, fifteen_sold_eleven, eleven_sold_fifteen);
    assert_eq!(flipped.net, dec!(-600.00));
    assert_eq!(flipped.description, "Org 15 owes Org 11 600.00");
}

#[test]
fn test_org_pair_settled() {
    let same = AggregationService::summarize([kind_total(TransactionKind::Credit, dec!(75.00))]);
    let settlement =
        AggregationService::settle_pair(OrganizationId(1), OrganizationId(2), same, same);
    assert_eq!(settlement.net, Decimal::ZERO);
    assert_eq!(settlement.description, "Org 1 and Org 2 are settled");
}

#[test]
fn test_by_category_and_month_are_ordered() {
    let categories = AggregationService::by_category([
        (ServiceCategory::Payment, kind_total(TransactionKind::Debit, dec!(50))),
        (ServiceCategory::Ticket, kind_total(TransactionKind::Credit, dec!(80))),
        (ServiceCategory::Ticket, kind_total(TransactionKind::Credit, dec!(20))),
    ]);
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].service_category, ServiceCategory::Ticket);
    assert_eq!(categories[0].summary.total_credit, dec!(100));
    assert_eq!(categories[1].summary.net_balance, dec!(50));

    let months = AggregationService::by_month([
        ("2026-03".to_string(), kind_total(TransactionKind::Debit, dec!(1))),
        ("2026-01".to_string(), kind_total(TransactionKind::Credit, dec!(2))),
    ]);
    assert_eq!(months[0].month, "2026-01");
    assert_eq!(months[1].month, "2026-03");
}

#[test]
fn test_pending_excludes_zero_and_positive() {
    let selected = PendingScanner::select(vec![
        agency_totals(1, dec!(-10.00)),
        agency_totals(2, Decimal::ZERO),
        agency_totals(3, dec!(25.00)),
        agency_totals(4, dec!(-400.00)),
    ]);

    let ids: Vec<i64> = selected.iter().map(|row| row.entity.raw_id()).collect();
    assert_eq!(ids, vec![4, 1]);
}

#[test]
fn test_pending_row_and_final_balance() {
    let at = Utc.with_ymd_and_hms(2026, 5, 1, 9, 30, 0).unwrap();
    let mut totals = agency_totals(9, dec!(-120.00));
    totals.last_updated = Some(at);

    let final_balance = AggregationService::final_balance(&totals);
    assert_eq!(final_balance.net_balance, dec!(-120.00));
    assert_eq!(final_balance.last_updated, Some(at));

    let row = PendingScanner::row(totals, vec![]);
    assert_eq!(row.amount_owed(), dec!(120.00));
}

fn arb_kind_total() -> impl Strategy<Value = KindTotal> {
    (any::<bool>(), 1i64..10_000_000).prop_map(|(debit, cents)| KindTotal {
        transaction_kind: if debit {
            TransactionKind::Debit
        } else {
            TransactionKind::Credit
        },
        total: Decimal::new(cents, 2),
        entries: 1,
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// *For any* set of rows, the summary does not depend on their order.
    #[test]
    fn prop_summary_is_order_independent(
        (rows, shuffled) in prop::collection::vec(arb_kind_total(), 0..40)
            .prop_flat_map(|rows| (Just(rows.clone()), Just(rows).prop_shuffle())),
    ) {
        prop_assert_eq!(
            AggregationService::summarize(rows),
            AggregationService::summarize(shuffled)
        );
    }

    /// *For any* entity nets, the scan keeps exactly the strictly negative ones.
    #[test]
    fn prop_pending_filter_is_strict(
        nets in prop::collection::vec(-1_000i64..1_000, 0..30),
    ) {
        let totals: Vec<EntityTotals> = nets
            .iter()
            .zip(1i64..)
            .map(|(cents, id)| agency_totals(id, Decimal::new(*cents, 2)))
            .collect();

        let selected = PendingScanner::select(totals);

        prop_assert_eq!(selected.len(), nets.iter().filter(|n| **n < 0).count());
        for row in &selected {
            prop_assert!(row.summary.net_balance < Decimal::ZERO);
        }
        for pair in selected.windows(2) {
            prop_assert!(pair[0].summary.net_balance <= pair[1].summary.net_balance);
        }
    }

    /// *For any* credit-kind entry and its debit-kind mirror, the pair adds
    /// nothing to a scope's net.
    #[test]
    fn prop_mirror_pairs_cancel(
        amounts in prop::collection::vec(1i64..1_000_000, 1..20),
    ) {
        let mut entries = Vec::new();
        for cents in amounts {
            let amount = Decimal::new(cents, 2);
            entries.push(entry(TransactionKind::Credit, amount));
            entries.push(entry(TransactionKind::Debit, amount));
        }
        prop_assert_eq!(
            AggregationService::summarize_entries(&entries).net_balance,
            Decimal::ZERO
        );
    }
}
