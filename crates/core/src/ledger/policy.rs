//! Posting policy: turns a booking-side posting request into a balanced
//! two-line posting between a house account and a counterparty account.
//!
//! | category                                   | house account            |
//! |--------------------------------------------|--------------------------|
//! | ticket, hotel, transport, package, other   | sales                    |
//! | refund                                     | sales                    |
//! | payment                                    | cash (bank with payments)|
//! | commission                                 | commission               |
//!
//! A `credit` entry credits the counterparty and debits the house; a `debit`
//! entry does the opposite. The counterparty account therefore moves with
//! the same sign as the counterparty's entity-level net.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use safar_shared::types::{Money, OrganizationId, PaymentId, UserId};

use super::error::LedgerError;
use super::scope::AccountScope;
use super::types::{
    AccountKind, EntryReferences, EntrySpec, ServiceCategory, TransactionKind,
};
use super::validation::validate_amount;

/// Amount of a posting request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PostingAmount {
    /// Already in ledger currency.
    Ledger {
        /// Amount.
        amount: Decimal,
    },
    /// Foreign amount with the rate supplied by the currency service.
    Foreign {
        /// Amount in its own currency.
        money: Money,
        /// Ledger units per foreign unit.
        rate: Decimal,
    },
}

impl PostingAmount {
    /// Amount in ledger currency, rounded to cents with banker's rounding.
    ///
    /// # Errors
    ///
    /// `InvalidAmount` for a non-positive amount or rate, or a result too
    /// large to store.
    pub fn resolve(&self) -> Result<Decimal, LedgerError> {
        match *self {
            Self::Ledger { amount } => validate_amount(amount),
            Self::Foreign { money, rate } => {
                if rate <= Decimal::ZERO {
                    return Err(LedgerError::InvalidAmount(format!(
                        "exchange rate {rate} is not positive"
                    )));
                }
                if !money.is_positive() {
                    return Err(LedgerError::InvalidAmount(format!("{money} is not positive")));
                }
                let amount = money.converted_amount(rate).ok_or_else(|| {
                    LedgerError::InvalidAmount(format!("{money} at rate {rate} overflows"))
                })?;
                validate_amount(amount)
            }
        }
    }
}

/// Inbound request from the booking/payment workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostingRequest {
    /// Amount to post.
    pub amount: PostingAmount,
    /// Reporting direction.
    pub transaction_kind: TransactionKind,
    /// Service category.
    pub service_category: ServiceCategory,
    /// Booking and organization references.
    pub references: EntryReferences,
    /// Linked external payments.
    #[serde(default)]
    pub payment_ids: Vec<PaymentId>,
    /// Narration.
    pub narration: String,
    /// Remarks.
    pub remarks: Option<String>,
    /// Caller payload.
    #[serde(default)]
    pub metadata: serde_json::Value,
    /// Who initiated the posting.
    pub actor: UserId,
}

/// An account the registry must resolve (find or create).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountTarget {
    /// Owner.
    pub scope: AccountScope,
    /// Kind.
    pub kind: AccountKind,
}

/// The two sides chosen by the policy, plus the entry header.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyPosting {
    /// Account to debit.
    pub debit: AccountTarget,
    /// Account to credit.
    pub credit: AccountTarget,
    /// Entry header; `transaction_amount` is the amount of both lines.
    pub spec: EntrySpec,
}

/// Stateless posting policy.
pub struct PostingPolicy;

impl PostingPolicy {
    /// Chooses accounts and builds the entry header for `request`.
    ///
    /// # Errors
    ///
    /// - `InvalidScope` when no seller organization is given
    /// - `InvalidAmount` when the amount does not resolve
    pub fn plan(request: &PostingRequest) -> Result<PolicyPosting, LedgerError> {
        let house = request.references.organization_id.ok_or_else(|| {
            LedgerError::InvalidScope("posting needs a seller organization".to_string())
        })?;
        let amount = request.amount.resolve()?;

        let house_account = AccountTarget {
            scope: AccountScope::Organization(house),
            kind: Self::house_kind(request.service_category, !request.payment_ids.is_empty()),
        };
        let counterparty = Self::counterparty(house, &request.references);

        let (debit, credit) = match request.transaction_kind {
            TransactionKind::Credit => (house_account, counterparty),
            TransactionKind::Debit => (counterparty, house_account),
        };

        let metadata = match request.amount {
            PostingAmount::Ledger { .. } => request.metadata.clone(),
            PostingAmount::Foreign { money, rate } => {
                with_foreign_amount(request.metadata.clone(), money, rate)
            }
        };

        Ok(PolicyPosting {
            debit,
            credit,
            spec: EntrySpec {
                transaction_kind: request.transaction_kind,
                service_category: request.service_category,
                transaction_amount: amount,
                references: request.references.clone(),
                payment_ids: request.payment_ids.clone(),
                narration: request.narration.clone(),
                remarks: request.remarks.clone(),
                metadata,
                actor: request.actor,
                note: Some(format!(
                    "{} {} posted by user {}",
                    request.service_category.as_str(),
                    request.transaction_kind.as_str(),
                    request.actor
                )),
            },
        })
    }

    /// House-side account kind for a category.
    #[must_use]
    pub const fn house_kind(category: ServiceCategory, has_payments: bool) -> AccountKind {
        match category {
            ServiceCategory::Payment if has_payments => AccountKind::Bank,
            ServiceCategory::Payment => AccountKind::Cash,
            ServiceCategory::Commission => AccountKind::Commission,
            ServiceCategory::Ticket
            | ServiceCategory::Hotel
            | ServiceCategory::Transport
            | ServiceCategory::Package
            | ServiceCategory::Refund
            | ServiceCategory::Other => AccountKind::Sales,
        }
    }

    /// Counterparty account: agency, else branch, else a different
    /// inventory owner, else the house suspense account.
    #[must_use]
    pub fn counterparty(house: OrganizationId, references: &EntryReferences) -> AccountTarget {
        if let Some(agency) = references.agency_id {
            return AccountTarget {
                scope: AccountScope::Agency(agency),
                kind: AccountKind::Agent,
            };
        }
        if let Some(branch) = references.branch_id {
            return AccountTarget {
                scope: AccountScope::Branch(branch),
                kind: AccountKind::Agent,
            };
        }
        match references.inventory_owner_organization_id {
            Some(owner) if owner != house => AccountTarget {
                scope: AccountScope::Organization(owner),
                kind: AccountKind::Payable,
            },
            _ => AccountTarget {
                scope: AccountScope::Organization(house),
                kind: AccountKind::Suspense,
            },
        }
    }
}

fn with_foreign_amount(metadata: serde_json::Value, money: Money, rate: Decimal) -> serde_json::Value {
    let foreign = serde_json::json!({
        "amount": money.amount.to_string(),
        "currency": money.currency.to_string(),
        "rate": rate.to_string(),
    });
    match metadata {
        serde_json::Value::Object(mut map) => {
            map.insert("foreign".to_string(), foreign);
            serde_json::Value::Object(map)
        }
        serde_json::Value::Null => serde_json::json!({ "foreign": foreign }),
        other => serde_json::json!({ "foreign": foreign, "payload": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use safar_shared::types::{AgencyId, BranchId, Currency};

    fn request(kind: TransactionKind, category: ServiceCategory) -> PostingRequest {
        PostingRequest {
            amount: PostingAmount::Ledger {
                amount: dec!(1000.00),
            },
            transaction_kind: kind,
            service_category: category,
            references: EntryReferences {
                organization_id: Some(OrganizationId(11)),
                agency_id: Some(AgencyId(501)),
                ..EntryReferences::default()
            },
            payment_ids: vec![],
            narration: "LHE-DXB".to_string(),
            remarks: None,
            metadata: serde_json::Value::Null,
            actor: UserId(3),
        }
    }

    #[test]
    fn test_ticket_charge_credits_agent() {
        let posting =
            PostingPolicy::plan(&request(TransactionKind::Credit, ServiceCategory::Ticket)).unwrap();

        assert_eq!(posting.debit.scope, AccountScope::Organization(OrganizationId(11)));
        assert_eq!(posting.debit.kind, AccountKind::Sales);
        assert_eq!(posting.credit.scope, AccountScope::Agency(AgencyId(501)));
        assert_eq!(posting.credit.kind, AccountKind::Agent);
        assert_eq!(posting.spec.transaction_amount, dec!(1000.00));
    }

    #[test]
    fn test_payment_debits_agent() {
        let mut req = request(TransactionKind::Debit, ServiceCategory::Payment);
        req.payment_ids = vec![PaymentId(88)];

        let posting = PostingPolicy::plan(&req).unwrap();

        assert_eq!(posting.debit.scope, AccountScope::Agency(AgencyId(501)));
        assert_eq!(posting.credit.kind, AccountKind::Bank);
    }

    #[rstest]
    #[case(ServiceCategory::Payment, false, AccountKind::Cash)]
    #[case(ServiceCategory::Payment, true, AccountKind::Bank)]
    #[case(ServiceCategory::Commission, false, AccountKind::Commission)]
    #[case(ServiceCategory::Refund, false, AccountKind::Sales)]
    #[case(ServiceCategory::Hotel, true, AccountKind::Sales)]
    fn test_house_kind(
        #[case] category: ServiceCategory,
        #[case] has_payments: bool,
        #[case] expected: AccountKind,
    ) {
        assert_eq!(PostingPolicy::house_kind(category, has_payments), expected);
    }

    #[test]
    fn test_counterparty_precedence() {
        let house = OrganizationId(11);
        let mut refs = EntryReferences {
            organization_id: Some(house),
            inventory_owner_organization_id: Some(OrganizationId(15)),
            branch_id: Some(BranchId(7)),
            ..EntryReferences::default()
        };
        assert_eq!(
            PostingPolicy::counterparty(house, &refs).scope,
            AccountScope::Branch(BranchId(7))
        );

        refs.branch_id = None;
        let owner = PostingPolicy::counterparty(house, &refs);
        assert_eq!(owner.scope, AccountScope::Organization(OrganizationId(15)));
        assert_eq!(owner.kind, AccountKind::Payable);

        refs.inventory_owner_organization_id = Some(house);
        let fallback = PostingPolicy::counterparty(house, &refs);
        assert_eq!(fallback.scope, AccountScope::Organization(house));
        assert_eq!(fallback.kind, AccountKind::Suspense);
    }

    #[test]
    fn test_missing_seller_is_invalid_scope() {
        let mut req = request(TransactionKind::Credit, ServiceCategory::Ticket);
        req.references.organization_id = None;
        assert_eq!(
            PostingPolicy::plan(&req).unwrap_err().error_code(),
            "INVALID_SCOPE"
        );
    }

    #[test]
    fn test_foreign_amount_is_converted_and_recorded() {
        let mut req = request(TransactionKind::Credit, ServiceCategory::Hotel);
        req.amount = PostingAmount::Foreign {
            money: Money::new(dec!(350.00), Currency::Sar),
            rate: dec!(74.125),
        };
        req.metadata = serde_json::json!({"voucher": "HV-1"});

        let posting = PostingPolicy::plan(&req).unwrap();

        // 350 * 74.125 = 25943.75
        assert_eq!(posting.spec.transaction_amount, dec!(25943.75));
        assert_eq!(posting.spec.metadata["voucher"], "HV-1");
        assert_eq!(posting.spec.metadata["foreign"]["currency"], "SAR");
    }

    #[test]
    fn test_foreign_overflow_is_invalid_amount() {
        let amount = PostingAmount::Foreign {
            money: Money::new(dec!(1000000000000000000000), Currency::Sar),
            rate: dec!(1000000000),
        };
        assert_eq!(amount.resolve().unwrap_err().error_code(), "INVALID_AMOUNT");
    }

    #[rstest]
    #[case(PostingAmount::Ledger { amount: dec!(100000000000000000000) })]
    #[case(PostingAmount::Foreign {
        money: Money::new(dec!(1000000000000), Currency::Sar),
        rate: dec!(1000000),
    })]
    fn test_unstorable_amount_is_rejected(#[case] amount: PostingAmount) {
        assert_eq!(amount.resolve().unwrap_err().error_code(), "INVALID_AMOUNT");
    }

    #[rstest]
    #[case(dec!(0))]
    #[case(dec!(-1.5))]
    fn test_foreign_rate_must_be_positive(#[case] rate: Decimal) {
        let amount = PostingAmount::Foreign {
            money: Money::new(dec!(10), Currency::Usd),
            rate,
        };
        assert!(amount.resolve().is_err());
    }
}
