//! Folding stored totals into balance summaries.
//!
//! Every entry matching a scope is summed, reversed originals and their
//! mirrors alike. A mirror carries the opposite transaction kind, so the pair
//! cancels out inside the plain sum.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use safar_shared::types::OrganizationId;

use super::types::{
    BalanceSummary, CategoryBreakdown, EntityTotals, FinalBalance, KindTotal, MonthlyBreakdown,
    PairSettlement,
};
use crate::ledger::{LedgerEntry, ServiceCategory};

/// Stateless aggregation service.
pub struct AggregationService;

impl AggregationService {
    /// Folds kind totals into one summary.
    #[must_use]
    pub fn summarize(rows: impl IntoIterator<Item = KindTotal>) -> BalanceSummary {
        rows.into_iter().fold(BalanceSummary::default(), |mut acc, row| {
            acc.add(row);
            acc
        })
    }

    /// Summarizes entries held in memory.
    #[must_use]
    pub fn summarize_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> BalanceSummary {
        Self::summarize(entries.into_iter().map(|entry| KindTotal {
            transaction_kind: entry.transaction_kind,
            total: entry.transaction_amount,
            entries: 1,
        }))
    }

    /// Folds keyed kind totals into one summary per key, ordered by key.
    #[must_use]
    pub fn summarize_by<K: Ord>(
        rows: impl IntoIterator<Item = (K, KindTotal)>,
    ) -> BTreeMap<K, BalanceSummary> {
        let mut grouped: BTreeMap<K, BalanceSummary> = BTreeMap::new();
        for (key, row) in rows {
            grouped.entry(key).or_default().add(row);
        }
        grouped
    }

    /// Breakdown by service category.
    #[must_use]
    pub fn by_category(
        rows: impl IntoIterator<Item = (ServiceCategory, KindTotal)>,
    ) -> Vec<CategoryBreakdown> {
        Self::summarize_by(rows)
            .into_iter()
            .map(|(service_category, summary)| CategoryBreakdown {
                service_category,
                summary,
            })
            .collect()
    }

    /// Breakdown by `YYYY-MM` month, oldest first.
    #[must_use]
    pub fn by_month(rows: impl IntoIterator<Item = (String, KindTotal)>) -> Vec<MonthlyBreakdown> {
        Self::summarize_by(rows)
            .into_iter()
            .map(|(month, summary)| MonthlyBreakdown { month, summary })
            .collect()
    }

    /// Settles two organizations.
    ///
    /// `a_sold_b` totals entries where A is the seller and B owns the
    /// inventory; `b_sold_a` the reverse. In each direction the credit
    /// surplus is what the seller owes the owner.
    #[must_use]
    pub fn settle_pair(
        a: OrganizationId,
        b: OrganizationId,
        a_sold_b: BalanceSummary,
        b_sold_a: BalanceSummary,
    ) -> PairSettlement {
        let a_owes_b = a_sold_b.total_credit - a_sold_b.total_debit;
        let b_owes_a = b_sold_a.total_credit - b_sold_a.total_debit;
        let net = b_owes_a - a_owes_b;

        let description = match net.cmp(&Decimal::ZERO) {
            std::cmp::Ordering::Less => format!("Org {a} owes Org {b} {}", -net),
            std::cmp::Ordering::Greater => format!("Org {b} owes Org {a} {net}"),
            std::cmp::Ordering::Equal => format!("Org {a} and Org {b} are settled"),
        };

        PairSettlement {
            a,
            b,
            summary: BalanceSummary::new(
                a_sold_b.total_debit + b_sold_a.total_debit,
                a_sold_b.total_credit + b_sold_a.total_credit,
                a_sold_b.entries + b_sold_a.entries,
            ),
            a_owes_b,
            b_owes_a,
            net,
            description,
        }
    }

    /// Single-entity balance.
    #[must_use]
    pub fn final_balance(totals: &EntityTotals) -> FinalBalance {
        FinalBalance {
            entity: totals.entity,
            total_debit: totals.summary.total_debit,
            total_credit: totals.summary.total_credit,
            net_balance: totals.summary.net_balance,
            last_updated: totals.last_updated,
        }
    }
}
