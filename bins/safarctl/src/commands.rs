use serde::Serialize;
use tracing::info;

use safar_core::aggregation::{BalanceSummary, Granularity};
use safar_core::ledger::{EntryReferences, EntrySpec, EntryWithLines, LedgerEntry};
use safar_db::{
    AccountFilter, AccountRepository, BalanceRepository, EntryFilter, EntryRepository,
    PostingRepository, ReversalRepository,
};
use safar_shared::AppConfig;
use sea_orm::DatabaseConnection;

use crate::cli::{
    AccountArg, AccountsArgs, Cli, Command, EntriesArgs, OutputFormat, PostSimpleArgs,
    ReferenceArgs, ReverseArgs, SummaryArgs,
};

/// Repositories the commands run against.
pub struct Ledger {
    accounts: AccountRepository,
    postings: PostingRepository,
    reversals: ReversalRepository,
    entries: EntryRepository,
    balances: BalanceRepository,
}

impl Ledger {
    pub fn new(db: DatabaseConnection, config: &AppConfig) -> Self {
        let ledger = &config.ledger;
        Self {
            accounts: AccountRepository::new(db.clone(), ledger.clone()),
            postings: PostingRepository::new(db.clone(), ledger.clone()),
            reversals: ReversalRepository::new(db.clone(), ledger.clone()),
            entries: EntryRepository::new(db.clone(), ledger.clone()),
            balances: BalanceRepository::new(db, ledger.clone()),
        }
    }
}

pub async fn run_command(ledger: &Ledger, cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    match cli.command {
        Command::Accounts(args) => cmd_accounts(ledger, format, args).await,
        Command::Balance(AccountArg { account_id }) => {
            let account = ledger.accounts.get_account(account_id).await?;
            emit(format, &account, |a| {
                println!("{} ({}, {})", a.name, a.kind, a.scope);
                println!("  balance: {}  version: {}", a.balance, a.version);
            })
        }
        Command::Summary(args) => cmd_summary(ledger, format, args).await,
        Command::Pair(args) => {
            let settlement = ledger.balances.organization_pair(args.a, args.b).await?;
            emit(format, &settlement, |s| {
                println!("{}", s.description);
                println!("  org {} owes org {}: {}", s.a, s.b, s.a_owes_b);
                println!("  org {} owes org {}: {}", s.b, s.a, s.b_owes_a);
                print_summary(&s.summary);
            })
        }
        Command::Pending(args) => {
            let pending = ledger.balances.pending_balances(args.kind).await?;
            emit(format, &pending, |rows| {
                if rows.is_empty() {
                    println!("No {} owes anything.", args.kind);
                }
                for row in rows {
                    println!("{}: owes {} ({} entries)", row.entity, row.amount_owed(), row.summary.entries);
                    for note in &row.notes {
                        println!("    {} user {}: {}", note.note.at, note.note.author, note.note.text);
                    }
                }
            })
        }
        Command::FinalBalance(args) => {
            let balance = ledger.balances.final_balance(args.entity).await?;
            emit(format, &balance, |b| {
                println!("{}", b.entity);
                println!("  debit: {}  credit: {}  net: {}", b.total_debit, b.total_credit, b.net_balance);
                match b.last_updated {
                    Some(at) => println!("  last updated: {at}"),
                    None => println!("  no entries"),
                }
            })
        }
        Command::Entry(args) => {
            let entry = ledger.entries.get_entry(args.entry_id).await?;
            emit(format, &entry, print_entry_with_lines)
        }
        Command::Entries(args) => cmd_entries(ledger, format, args).await,
        Command::PostSimple(args) => cmd_post_simple(ledger, format, args).await,
        Command::Reverse(args) => cmd_reverse(ledger, format, args).await,
        Command::Verify(AccountArg { account_id }) => {
            let report = ledger.accounts.verify_account_history(account_id).await?;
            let consistent = report.is_consistent();
            emit(format, &report, |r| {
                println!(
                    "account {}: {} lines replayed, balance {} version {}",
                    r.account_id, r.lines_checked, r.replayed.balance, r.replayed.version
                );
                for mismatch in &r.mismatches {
                    println!("  mismatch: {mismatch:?}");
                }
            })?;
            if !consistent {
                anyhow::bail!("account {account_id} history does not match its balance");
            }
            Ok(())
        }
    }
}

async fn cmd_accounts(ledger: &Ledger, format: OutputFormat, args: AccountsArgs) -> anyhow::Result<()> {
    let filter = AccountFilter {
        scope: args.owner,
        kind: args.kind,
    };
    let page = ledger.accounts.list_accounts(filter, args.page.request()).await?;
    emit(format, &page, |p| {
        for account in &p.data {
            println!("{}  {:<36} {:>14}  v{}", account.id, account.name, account.balance, account.version);
        }
        println!("page {}/{} ({} accounts)", p.meta.page, p.meta.total_pages, p.meta.total);
    })
}

async fn cmd_summary(ledger: &Ledger, format: OutputFormat, args: SummaryArgs) -> anyhow::Result<()> {
    let granularity = if args.lines {
        Granularity::Line
    } else {
        Granularity::Entry
    };

    if !args.breakdown {
        let summary = ledger.balances.aggregate(args.scope, granularity).await?;
        return emit(format, &summary, |s| {
            println!("{}", args.scope);
            print_summary(s);
        });
    }

    let report = ledger.balances.report(args.scope, granularity).await?;
    emit(format, &report, |r| {
        println!("{}", r.scope);
        print_summary(&r.summary);
        println!("by category:");
        for row in &r.by_category {
            println!("  {:<12} net {:>14}", row.service_category.as_str(), row.summary.net_balance);
        }
        println!("by month:");
        for row in &r.by_month {
            println!("  {:<12} net {:>14}", row.month, row.summary.net_balance);
        }
        println!("recent entries:");
        for entry in &r.recent_entries {
            print_entry(entry);
        }
    })
}

async fn cmd_entries(ledger: &Ledger, format: OutputFormat, args: EntriesArgs) -> anyhow::Result<()> {
    let filter = EntryFilter {
        scope: args.scope,
        service_category: args.category,
        include_reversed: args.include_reversed,
    };
    let page = ledger.entries.list_entries(filter, args.page.request()).await?;
    emit(format, &page, |p| {
        for entry in &p.data {
            print_entry(entry);
        }
        println!("page {}/{} ({} entries)", p.meta.page, p.meta.total_pages, p.meta.total);
    })
}

async fn cmd_post_simple(ledger: &Ledger, format: OutputFormat, args: PostSimpleArgs) -> anyhow::Result<()> {
    let spec = EntrySpec {
        transaction_kind: args.kind,
        service_category: args.category,
        transaction_amount: args.amount,
        references: references(&args.references),
        payment_ids: vec![],
        narration: args.narration,
        remarks: args.remarks,
        metadata: serde_json::json!({ "source": "safarctl" }),
        actor: args.actor,
        note: None,
    };
    let posted = ledger
        .postings
        .post_simple(args.debit, args.credit, args.amount, spec)
        .await?;
    info!(entry_id = %posted.entry.id, "Posted from console");
    emit(format, &posted, print_entry_with_lines)
}

async fn cmd_reverse(ledger: &Ledger, format: OutputFormat, args: ReverseArgs) -> anyhow::Result<()> {
    let mirror = ledger
        .reversals
        .request_reversal(args.entry_id, args.actor, &args.reason)
        .await?;
    emit(format, &mirror, print_entry_with_lines)
}

fn references(args: &ReferenceArgs) -> EntryReferences {
    EntryReferences {
        booking_id: args.booking,
        organization_id: args.org,
        inventory_owner_organization_id: args.owner_org,
        branch_id: args.branch,
        agency_id: args.agency,
        area_agency_id: args.area_agency,
    }
}

fn emit<T: Serialize>(format: OutputFormat, value: &T, text: impl FnOnce(&T)) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => text(value),
    }
    Ok(())
}

fn print_summary(summary: &BalanceSummary) {
    println!(
        "  debit: {}  credit: {}  net: {}  ({} entries)",
        summary.total_debit, summary.total_credit, summary.net_balance, summary.entries
    );
}

fn print_entry(entry: &LedgerEntry) {
    let marker = match (entry.reversed, entry.reversed_of) {
        (true, _) => " [reversed]".to_string(),
        (false, Some(original)) => format!(" [reverses {original}]"),
        (false, None) => String::new(),
    };
    println!(
        "{}  {}  {:<6} {:<10} {:>14}  {}{marker}",
        entry.id,
        entry.created_at.format("%Y-%m-%d %H:%M"),
        entry.transaction_kind.as_str(),
        entry.service_category.as_str(),
        entry.transaction_amount,
        entry.narration,
    );
}

fn print_entry_with_lines(posted: &EntryWithLines) {
    print_entry(&posted.entry);
    for line in &posted.lines {
        println!(
            "  #{} {}  dr {:>12}  cr {:>12}  -> {} (v{})",
            line.line_no, line.account_id, line.debit, line.credit, line.balance_after, line.account_version
        );
    }
    for note in &posted.entry.notes {
        println!("  note {} user {}: {}", note.at, note.author, note.text);
    }
}
