use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use dokkan_sync::config::{SyncConfig, DEFAULT_DB_PATH, WIKI_API};
use dokkan_sync::models::{CardType, Rarity, SyncMode};
use dokkan_sync::store::{CardQuery, Store};
use dokkan_sync::sync::run_sync;
use dokkan_sync::wiki::WikiClient;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "dokkan-sync")]
#[command(about = "Sync Dokkan Battle cards from the wiki into SQLite")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv); RUST_LOG takes precedence
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// SQLite database file
    #[arg(long, env = "DOKKAN_DB", default_value = DEFAULT_DB_PATH, global = true)]
    db: PathBuf,

    #[command(flatten)]
    sync: SyncArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct SyncArgs {
    /// Only sync new cards and cards edited in the last 24 hours
    #[arg(long, conflicts_with = "resync")]
    update: bool,

    /// Re-sync every card, overwriting existing records
    #[arg(long)]
    resync: bool,

    /// MediaWiki API endpoint
    #[arg(long, default_value = WIKI_API)]
    api: String,

    /// Pages fetched concurrently per batch
    #[arg(long, default_value_t = dokkan_sync::config::BATCH_SIZE)]
    batch_size: usize,

    /// Pause between batches in milliseconds (0 disables)
    #[arg(long, default_value_t = dokkan_sync::config::BATCH_DELAY_MS)]
    delay_ms: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Show card count and last sync time
    Stats,
    /// Search synced cards by name or title
    Search(SearchArgs),
    /// Print one stored card as JSON
    Card(CardArgs),
    /// List upcoming cards from the last schedule refresh
    Schedule(ScheduleArgs),
}

#[derive(Args)]
struct SearchArgs {
    /// Text matched against name, title and page title
    query: String,

    /// Only cards of this type (AGL, TEQ, INT, STR, PHY)
    #[arg(long = "type")]
    card_type: Option<CardType>,

    /// Only cards of this rarity (N, R, SR, SSR, UR, LR)
    #[arg(long)]
    rarity: Option<Rarity>,

    /// Maximum results
    #[arg(long, default_value_t = 10)]
    limit: usize,
}

#[derive(Args)]
struct CardArgs {
    /// Wiki page title of the card
    page_title: String,
}

#[derive(Args)]
struct ScheduleArgs {
    /// Only entries with this type or rarity
    #[arg(long)]
    filter: Option<String>,
}

fn run_sync_command(db: &Path, args: SyncArgs) -> Result<()> {
    let mode = if args.update {
        SyncMode::Update
    } else if args.resync {
        SyncMode::Resync
    } else {
        SyncMode::Full
    };

    let config = SyncConfig {
        api_url: args.api,
        batch_size: args.batch_size.max(1),
        batch_delay: Duration::from_millis(args.delay_ms),
        ..SyncConfig::default()
    };

    let mut store = Store::open(db)?;
    let client = WikiClient::new(&config).context("Failed to build HTTP client")?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .thread_name("dokkan-sync-worker")
        .enable_io()
        .enable_time()
        .build()?;
    let report = rt.block_on(run_sync(&client, &mut store, &config, mode))?;

    println!();
    println!("=== Summary ===");
    println!("Mode:               {}", report.mode);
    println!("Total time:         {:.2}s", report.elapsed.as_secs_f64());
    println!();
    println!("Titles attempted:   {}", report.attempted);
    println!("Cards synced:       {}", report.synced);
    println!("Pages skipped:      {}", report.skipped);
    println!("Pages failed:       {}", report.failed);
    println!("Upcoming cards:     {}", report.scheduled);
    println!("Cards in database:  {}", report.total_in_db);

    Ok(())
}

fn run_stats(db: &Path) -> Result<()> {
    let stats = Store::open(db)?.stats()?;
    println!("Cards:        {}", stats.cards);
    println!(
        "Last synced:  {}",
        stats.last_synced.as_deref().unwrap_or("never")
    );
    Ok(())
}

fn run_search(db: &Path, args: SearchArgs) -> Result<()> {
    let query = CardQuery {
        text: args.query,
        card_type: args.card_type,
        rarity: args.rarity,
        limit: args.limit,
    };
    let cards = Store::open(db)?.search_cards(&query)?;
    if cards.is_empty() {
        println!("No cards found for \"{}\"", query.text);
        return Ok(());
    }
    for stored in &cards {
        let card = &stored.card;
        println!(
            "{:<4} {:<4} {}  ({})",
            card.rarity.map(|r| r.as_str()).unwrap_or("-"),
            card.card_type.map(|t| t.as_str()).unwrap_or("-"),
            card.display_name(),
            card.page_title
        );
    }
    Ok(())
}

fn run_card(db: &Path, args: CardArgs) -> Result<()> {
    let card = Store::open(db)?
        .get_card(&args.page_title)?
        .with_context(|| format!("No stored card with page title: {}", args.page_title))?;
    println!("{}", serde_json::to_string_pretty(&card)?);
    Ok(())
}

fn run_schedule(db: &Path, args: ScheduleArgs) -> Result<()> {
    let entries = Store::open(db)?.schedule(args.filter.as_deref())?;
    if entries.is_empty() {
        println!("No upcoming cards stored");
        return Ok(());
    }
    for entry in &entries {
        println!(
            "{:<4} {:<4} {}",
            entry.rarity.as_deref().unwrap_or("-"),
            entry.card_type.as_deref().unwrap_or("-"),
            entry.name.as_deref().unwrap_or(&entry.title)
        );
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        None => run_sync_command(&cli.db, cli.sync),
        Some(Commands::Stats) => run_stats(&cli.db),
        Some(Commands::Search(args)) => run_search(&cli.db, args),
        Some(Commands::Card(args)) => run_card(&cli.db, args),
        Some(Commands::Schedule(args)) => run_schedule(&cli.db, args),
    };

    match result {
        Ok(()) => {
            info!("Completed successfully");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Error: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
