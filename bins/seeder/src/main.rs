//! Demo data seeder for Safar ledger development and testing.
//!
//! Seeds two organizations that sell each other's inventory (Org 11 and
//! Org 15), a few agencies and a branch, all through `request_posting` so
//! every account is created by the posting policy.
//!
//! Usage: cargo run --bin seeder

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safar_core::aggregation::Granularity;
use safar_core::ledger::{
    EntryReferences, PostingAmount, PostingRequest, ScopeFilter, ServiceCategory,
    TransactionKind,
};
use safar_db::{BalanceRepository, PostingRepository, ReversalRepository};
use safar_shared::AppConfig;
use safar_shared::types::{
    AgencyId, BookingId, BranchId, Currency, Money, OrganizationId, PaymentId, UserId,
};

/// Seller in most demo bookings.
const HOME_ORG: OrganizationId = OrganizationId(11);
/// Partner organization whose inventory Org 11 resells, and vice versa.
const PARTNER_ORG: OrganizationId = OrganizationId(15);
/// User recorded as the author of seeded postings.
const SEED_USER: UserId = UserId(1);

struct Seeder {
    postings: PostingRepository,
    reversals: ReversalRepository,
    balances: BalanceRepository,
    next_booking: i64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "safar=info,sea_orm=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let db = safar_db::connect_with(&config.database).await?;
    info!("Connected to database");

    let mut seeder = Seeder {
        postings: PostingRepository::new(db.clone(), config.ledger.clone()),
        reversals: ReversalRepository::new(db.clone(), config.ledger.clone()),
        balances: BalanceRepository::new(db, config.ledger),
        next_booking: 70_001,
    };

    let existing = seeder
        .balances
        .aggregate(ScopeFilter::Organization(HOME_ORG), Granularity::Entry)
        .await?;
    if existing.entries > 0 {
        info!(entries = existing.entries, "Demo ledger already seeded, skipping");
        return Ok(());
    }

    seeder.seed_partner_sales().await?;
    seeder.seed_agencies().await?;
    seeder.seed_branch().await?;

    let pair = seeder.balances.organization_pair(HOME_ORG, PARTNER_ORG).await?;
    info!(net = %pair.net, "{}", pair.description);
    info!("Seeding complete");
    Ok(())
}

impl Seeder {
    fn references(&mut self, seller: OrganizationId) -> EntryReferences {
        self.next_booking += 1;
        EntryReferences {
            booking_id: Some(BookingId(self.next_booking)),
            organization_id: Some(seller),
            ..EntryReferences::default()
        }
    }

    async fn post(
        &self,
        kind: TransactionKind,
        category: ServiceCategory,
        amount: PostingAmount,
        references: EntryReferences,
        payment_ids: Vec<PaymentId>,
        narration: &str,
    ) -> anyhow::Result<safar_core::ledger::EntryWithLines> {
        let posted = self
            .postings
            .request_posting(PostingRequest {
                amount,
                transaction_kind: kind,
                service_category: category,
                references,
                payment_ids,
                narration: narration.to_string(),
                remarks: None,
                metadata: serde_json::json!({ "source": "seeder" }),
                actor: SEED_USER,
            })
            .await?;
        info!(entry_id = %posted.entry.id, %narration, "Seeded entry");
        Ok(posted)
    }

    /// Org 15 resells Org 11's inventory twice, Org 11 resells Org 15's once.
    /// Settlement: Org 15 owes Org 11 600.00.
    async fn seed_partner_sales(&mut self) -> anyhow::Result<()> {
        info!("Seeding inter-organization sales...");
        let sales: [(OrganizationId, OrganizationId, ServiceCategory, Decimal, &str); 3] = [
            (PARTNER_ORG, HOME_ORG, ServiceCategory::Ticket, dec!(500.00), "LHE-JED ticket resold"),
            (PARTNER_ORG, HOME_ORG, ServiceCategory::Hotel, dec!(300.00), "Makkah hotel resold"),
            (HOME_ORG, PARTNER_ORG, ServiceCategory::Transport, dec!(200.00), "Ziyarat transport resold"),
        ];

        for (seller, owner, category, amount, narration) in sales {
            let mut references = self.references(seller);
            references.inventory_owner_organization_id = Some(owner);
            self.post(
                TransactionKind::Credit,
                category,
                PostingAmount::Ledger { amount },
                references,
                vec![],
                narration,
            )
            .await?;
        }
        Ok(())
    }

    /// Agency 101 owes part of a package; agency 102's ticket is cancelled.
    async fn seed_agencies(&mut self) -> anyhow::Result<()> {
        info!("Seeding agency postings...");
        let mut package = self.references(HOME_ORG);
        package.agency_id = Some(AgencyId(101));
        self.post(
            TransactionKind::Credit,
            ServiceCategory::Package,
            PostingAmount::Ledger { amount: dec!(1250.00) },
            package,
            vec![],
            "Umrah package, 14 nights",
        )
        .await?;

        let mut hotel = self.references(HOME_ORG);
        hotel.agency_id = Some(AgencyId(101));
        self.post(
            TransactionKind::Credit,
            ServiceCategory::Hotel,
            PostingAmount::Foreign {
                money: Money::new(dec!(350.00), Currency::Sar),
                rate: dec!(74.125),
            },
            hotel,
            vec![],
            "Madinah hotel billed in SAR",
        )
        .await?;

        let mut payment = self.references(HOME_ORG);
        payment.agency_id = Some(AgencyId(101));
        self.post(
            TransactionKind::Debit,
            ServiceCategory::Payment,
            PostingAmount::Ledger { amount: dec!(1000.00) },
            payment,
            vec![PaymentId(9001)],
            "Bank transfer from agency 101",
        )
        .await?;

        let mut ticket = self.references(HOME_ORG);
        ticket.agency_id = Some(AgencyId(102));
        let cancelled = self
            .post(
                TransactionKind::Credit,
                ServiceCategory::Ticket,
                PostingAmount::Ledger { amount: dec!(420.00) },
                ticket,
                vec![],
                "KHI-DXB ticket",
            )
            .await?;
        self.reversals
            .request_reversal(cancelled.entry.id, SEED_USER, "Booking cancelled by agency")
            .await?;
        Ok(())
    }

    async fn seed_branch(&mut self) -> anyhow::Result<()> {
        info!("Seeding branch commission...");
        let mut commission = self.references(HOME_ORG);
        commission.branch_id = Some(BranchId(21));
        self.post(
            TransactionKind::Debit,
            ServiceCategory::Commission,
            PostingAmount::Ledger { amount: dec!(75.00) },
            commission,
            vec![],
            "Branch commission for March",
        )
        .await?;
        Ok(())
    }
}
