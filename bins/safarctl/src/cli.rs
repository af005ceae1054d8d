use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

use safar_core::ledger::{
    AccountKind, AccountScope, EntityKind, EntityRef, ScopeFilter, ServiceCategory,
    TransactionKind,
};
use safar_shared::types::{
    AccountId, AgencyId, AreaAgencyId, BookingId, BranchId, LedgerEntryId, OrganizationId,
    PageRequest, UserId,
};

#[derive(Parser)]
#[command(name = "safarctl", about = "Safar ledger operator console", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// List accounts, optionally by owner and kind
    Accounts(AccountsArgs),
    /// Show the cached balance of one account
    Balance(AccountArg),
    /// Debit, credit and net totals for a scope
    Summary(SummaryArgs),
    /// Settlement between two organizations
    Pair(PairArgs),
    /// Entities of a kind that currently owe money
    Pending(PendingArgs),
    /// Totals and last activity of one entity
    FinalBalance(EntityArg),
    /// Show one entry with its lines
    Entry(EntryArg),
    /// List entries, newest first
    Entries(EntriesArgs),
    /// Post a two-line entry between two existing accounts
    PostSimple(PostSimpleArgs),
    /// Reverse an entry
    Reverse(ReverseArgs),
    /// Replay an account's lines against its cached balance
    Verify(AccountArg),
}

#[derive(Args)]
pub struct PageArgs {
    #[arg(long, default_value = "1")]
    pub page: u32,
    #[arg(long, default_value = "20")]
    pub per_page: u32,
}

impl PageArgs {
    pub fn request(&self) -> PageRequest {
        PageRequest::new(self.page, self.per_page)
    }
}

#[derive(Args)]
pub struct AccountsArgs {
    /// Owner: `platform`, `org:ID`, `branch:ID` or `agency:ID`
    #[arg(long, value_parser = parse_owner)]
    pub owner: Option<AccountScope>,
    #[arg(long)]
    pub kind: Option<AccountKind>,
    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Args)]
pub struct AccountArg {
    pub account_id: AccountId,
}

#[derive(Args)]
pub struct SummaryArgs {
    /// `org:ID`, `branch:ID`, `agency:ID`, `area-agency:ID` or `pair:A:B`
    #[arg(value_parser = parse_scope)]
    pub scope: ScopeFilter,
    /// Sum account lines instead of entry amounts
    #[arg(long)]
    pub lines: bool,
    /// Add category, month and recent-entry breakdowns
    #[arg(long)]
    pub breakdown: bool,
}

#[derive(Args)]
pub struct PairArgs {
    pub a: OrganizationId,
    pub b: OrganizationId,
}

#[derive(Args)]
pub struct PendingArgs {
    /// `agent`, `area-agent`, `branch` or `organization`
    pub kind: EntityKind,
}

#[derive(Args)]
pub struct EntityArg {
    /// `org:ID`, `branch:ID`, `agency:ID` or `area-agency:ID`
    #[arg(value_parser = parse_entity)]
    pub entity: EntityRef,
}

#[derive(Args)]
pub struct EntryArg {
    pub entry_id: LedgerEntryId,
}

#[derive(Args)]
pub struct EntriesArgs {
    #[arg(long, value_parser = parse_scope)]
    pub scope: Option<ScopeFilter>,
    #[arg(long)]
    pub category: Option<ServiceCategory>,
    /// Also list reversed entries and their reversals
    #[arg(long)]
    pub include_reversed: bool,
    #[command(flatten)]
    pub page: PageArgs,
}

#[derive(Args)]
pub struct PostSimpleArgs {
    #[arg(long)]
    pub debit: AccountId,
    #[arg(long)]
    pub credit: AccountId,
    #[arg(long)]
    pub amount: Decimal,
    #[arg(long, default_value = "debit")]
    pub kind: TransactionKind,
    #[arg(long, default_value = "other")]
    pub category: ServiceCategory,
    #[arg(long)]
    pub narration: String,
    #[arg(long)]
    pub remarks: Option<String>,
    #[arg(long, env = "SAFAR_ACTOR")]
    pub actor: UserId,
    #[command(flatten)]
    pub references: ReferenceArgs,
}

#[derive(Args)]
pub struct ReferenceArgs {
    #[arg(long)]
    pub booking: Option<BookingId>,
    /// Seller organization
    #[arg(long)]
    pub org: Option<OrganizationId>,
    /// Organization owning the sold inventory
    #[arg(long)]
    pub owner_org: Option<OrganizationId>,
    #[arg(long)]
    pub branch: Option<BranchId>,
    #[arg(long)]
    pub agency: Option<AgencyId>,
    #[arg(long)]
    pub area_agency: Option<AreaAgencyId>,
}

#[derive(Args)]
pub struct ReverseArgs {
    pub entry_id: LedgerEntryId,
    #[arg(long, env = "SAFAR_ACTOR")]
    pub actor: UserId,
    #[arg(long, default_value = "")]
    pub reason: String,
}

fn split_ref(value: &str) -> Result<(String, Vec<i64>), String> {
    let mut parts = value.trim().split(':');
    let tag = parts.next().unwrap_or_default().to_lowercase().replace('_', "-");
    let ids = parts
        .map(|part| {
            part.trim()
                .parse::<i64>()
                .map_err(|e| format!("bad id {part:?} in {value:?}: {e}"))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok((tag, ids))
}

pub fn parse_entity(value: &str) -> Result<EntityRef, String> {
    match split_ref(value)? {
        (tag, ids) if ids.len() == 1 => {
            let kind: EntityKind = tag.parse()?;
            Ok(kind.entity(ids[0]))
        }
        _ => Err(format!("expected KIND:ID, got {value:?}")),
    }
}

pub fn parse_scope(value: &str) -> Result<ScopeFilter, String> {
    match split_ref(value)? {
        (tag, ids) if tag == "pair" && ids.len() == 2 => Ok(ScopeFilter::OrganizationPair {
            a: OrganizationId(ids[0]),
            b: OrganizationId(ids[1]),
        }),
        _ => parse_entity(value).map(EntityRef::filter),
    }
}

pub fn parse_owner(value: &str) -> Result<AccountScope, String> {
    if value.trim().eq_ignore_ascii_case("platform") {
        return Ok(AccountScope::Unscoped);
    }
    match parse_entity(value)? {
        EntityRef::Organization(org) => Ok(AccountScope::Organization(org)),
        EntityRef::Branch(branch) => Ok(AccountScope::Branch(branch)),
        EntityRef::Agency(agency) => Ok(AccountScope::Agency(agency)),
        EntityRef::AreaAgency(_) => Err("area agencies do not own accounts".to_string()),
    }
}
