//! Property-based tests for posting plans and reversals.
//!
//! - Balanced line sets always plan, and the plan stays balanced
//! - Unbalanced line sets never plan
//! - A reversal restores every touched account
//! - Postings commute
//! - Snapshots replay

use std::collections::HashMap;

use chrono::Utc;
use proptest::prelude::*;
use rust_decimal::Decimal;
use safar_shared::types::{AccountId, LedgerEntryId, LedgerLineId};

use super::balance::AccountState;
use super::entry::LedgerLine;
use super::error::LedgerError;
use super::posting::PostingPlan;
use super::reconcile::verify_account_history;
use super::reversal::ReversalService;
use super::types::LineInput;

const POOL: usize = 5;

/// Strategy to generate positive amounts (0.01 to 100,000.00).
fn positive_amount() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// A fixed pool of accounts so postings overlap.
fn account_pool() -> Vec<AccountId> {
    (0..POOL).map(|_| AccountId::new()).collect()
}

/// Balanced line set: a list of (debit index, credit index, amount) legs.
fn balanced_legs() -> impl Strategy<Value = Vec<(usize, usize, Decimal)>> {
    prop::collection::vec((0..POOL, 0..POOL, positive_amount()), 1..6)
}

fn legs_to_lines(pool: &[AccountId], legs: &[(usize, usize, Decimal)]) -> Vec<LineInput> {
    legs.iter()
        .flat_map(|(d, c, amount)| {
            [
                LineInput::debit(pool[*d], *amount),
                LineInput::credit(pool[*c], *amount),
            ]
        })
        .collect()
}

fn opening_states() -> impl Strategy<Value = Vec<AccountState>> {
    prop::collection::vec(
        ((-10_000_000i64..10_000_000i64), 0i64..500).prop_map(|(cents, version)| AccountState {
            balance: Decimal::new(cents, 2),
            version,
        }),
        POOL,
    )
}

fn state_map(pool: &[AccountId], states: &[AccountState]) -> HashMap<AccountId, AccountState> {
    pool.iter().copied().zip(states.iter().copied()).collect()
}

/// Applies a plan's results onto a state map, the way the store updates rows.
fn commit(states: &mut HashMap<AccountId, AccountState>, plan: &PostingPlan) {
    for (id, state) in &plan.accounts {
        states.insert(*id, *state);
    }
}

fn stored_lines(entry_id: LedgerEntryId, plan: &PostingPlan) -> Vec<LedgerLine> {
    plan.lines
        .iter()
        .map(|line| LedgerLine {
            id: LedgerLineId::new(),
            entry_id,
            account_id: line.account_id,
            line_no: line.line_no,
            debit: line.debit,
            credit: line.credit,
            account_version: line.account_version,
            balance_after: line.balance_after,
            created_at: Utc::now(),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// *For any* balanced line set, the plan succeeds and its persisted lines
    /// sum to equal debit and credit totals.
    #[test]
    fn prop_balanced_lines_always_plan(
        legs in balanced_legs(),
        opening in opening_states(),
    ) {
        let pool = account_pool();
        let lines = legs_to_lines(&pool, &legs);
        let plan = PostingPlan::build(&lines, &state_map(&pool, &opening)).unwrap();

        let debit: Decimal = plan.lines.iter().map(|l| l.debit).sum();
        let credit: Decimal = plan.lines.iter().map(|l| l.credit).sum();
        prop_assert_eq!(debit, credit);
        prop_assert_eq!(plan.lines.len(), lines.len());

        // Net effect across all touched accounts is zero.
        let net: Decimal = plan.deltas().values().copied().sum();
        prop_assert_eq!(net, Decimal::ZERO);
    }

    /// *For any* balanced set plus one extra positive debit, planning fails
    /// with `UnbalancedEntry`.
    #[test]
    fn prop_unbalanced_lines_never_plan(
        legs in balanced_legs(),
        extra in positive_amount(),
        target in 0..POOL,
    ) {
        let pool = account_pool();
        let mut lines = legs_to_lines(&pool, &legs);
        lines.push(LineInput::debit(pool[target], extra));

        let result = PostingPlan::build(&lines, &state_map(&pool, &[AccountState::default(); POOL]));
        let is_unbalanced = matches!(result, Err(LedgerError::UnbalancedEntry { .. }));
        prop_assert!(is_unbalanced);
    }

    /// *For any* entry, posting its mirror afterwards returns every touched
    /// account to the balance it had before the entry.
    #[test]
    fn prop_reversal_restores_balances(
        legs in balanced_legs(),
        opening in opening_states(),
    ) {
        let pool = account_pool();
        let before = state_map(&pool, &opening);
        let mut states = before.clone();

        let plan = PostingPlan::build(&legs_to_lines(&pool, &legs), &states).unwrap();
        commit(&mut states, &plan);

        let mirror = ReversalService::mirror_lines(&stored_lines(LedgerEntryId::new(), &plan));
        let reversal = PostingPlan::build(&mirror, &states).unwrap();
        commit(&mut states, &reversal);

        for id in &pool {
            prop_assert_eq!(states[id].balance, before[id].balance);
        }
    }

    /// *For any* batch of postings, applying them in a shuffled order yields
    /// the same final balances.
    #[test]
    fn prop_postings_commute(
        (batch, shuffled) in prop::collection::vec(balanced_legs(), 1..8)
            .prop_flat_map(|batch| (Just(batch.clone()), Just(batch).prop_shuffle())),
    ) {
        let pool = account_pool();
        let run = |order: &[Vec<(usize, usize, Decimal)>]| {
            let mut states = state_map(&pool, &[AccountState::default(); POOL]);
            for legs in order {
                let plan = PostingPlan::build(&legs_to_lines(&pool, legs), &states).unwrap();
                commit(&mut states, &plan);
            }
            pool.iter().map(|id| states[id]).collect::<Vec<_>>()
        };

        prop_assert_eq!(run(&batch), run(&shuffled));
    }

    /// *For any* sequence of postings from empty accounts, each account's
    /// stored lines replay to their own snapshots and to the cached row.
    #[test]
    fn prop_snapshots_replay(
        batch in prop::collection::vec(balanced_legs(), 1..6),
    ) {
        let pool = account_pool();
        let mut states = state_map(&pool, &[AccountState::default(); POOL]);
        let mut history: HashMap<AccountId, Vec<LedgerLine>> = HashMap::new();

        for legs in &batch {
            let plan = PostingPlan::build(&legs_to_lines(&pool, legs), &states).unwrap();
            commit(&mut states, &plan);
            for line in stored_lines(LedgerEntryId::new(), &plan) {
                history.entry(line.account_id).or_default().push(line);
            }
        }

        for id in &pool {
            let lines = history.remove(id).unwrap_or_default();
            let report = verify_account_history(*id, states[id], &lines);
            prop_assert!(report.is_consistent(), "{:?}", report.mismatches);
        }
    }
}
