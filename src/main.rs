use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::info;

use matchday_miner::config::{MinerConfig, SinkKind};
use matchday_miner::executor::Executor;
use matchday_miner::feed_fetch::{FeedClient, FeedRun};
use matchday_miner::http_client::SourceClient;
use matchday_miner::logging::init_logging;
use matchday_miner::match_fetch::{InlineReconcile, MatchOrchestrator};
use matchday_miner::primary_fetch::PrimaryClient;
use matchday_miner::ratings_fetch::RatingsRun;
use matchday_miner::records::Record;
use matchday_miner::secondary_fetch::SecondaryClient;
use matchday_miner::sink::{AnySink, Sink, SinkOutput};
use matchday_miner::store::open_db;
use matchday_miner::tabular_sink::write_csv;

#[derive(Debug, Parser)]
#[command(name = "matchday_miner", about = "Fetch, normalize and store football match data")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Overrides the configured sink (tabular, queued, null). Ratings and feed runs default
    /// to queued.
    #[arg(long, global = true)]
    sink: Option<SinkKind>,
    /// Directory for the CSV files of the tabular sink.
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    #[arg(long, global = true)]
    threads: Option<usize>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Every configured match played between two dates, both inclusive.
    Dates {
        start: NaiveDate,
        end: Option<NaiveDate>,
    },
    /// Explicit primary-source event ids.
    Matches {
        #[arg(required = true)]
        ids: Vec<u64>,
    },
    /// Secondary ratings for stored players not looked up yet.
    Ratings {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Feed odds and statistics for stored matches that lack them.
    Feed { start: NaiveDate, end: NaiveDate },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = MinerConfig::load(cli.config.as_deref())?;
    if let Some(threads) = cli.threads {
        config.multithreading = threads > 1;
        config.num_of_threads = threads.max(1);
    }
    init_logging(&config.log_level)?;

    let http = SourceClient::new(&config.http)?;
    let executor = Executor::new(config.worker_threads());

    let store_run = matches!(cli.command, Command::Ratings { .. } | Command::Feed { .. });
    let sink_kind = if store_run {
        config.store_run_sink(cli.sink)?
    } else {
        cli.sink.unwrap_or(config.sink)
    };
    let needs_db = store_run || sink_kind == SinkKind::Queued;
    let mut conn = if needs_db {
        let path = config
            .resolved_db_path()
            .context("unable to resolve sqlite path")?;
        info!(path = %path.display(), "opening store");
        Some(open_db(&path)?)
    } else {
        None
    };

    let records = collect_records(&cli.command, &config, &http, &executor, conn.as_ref())?;

    let mut sink = AnySink::for_kind(sink_kind, conn.as_mut())?;
    sink.accept_all(records);
    report(sink.finalize()?, cli.out.as_deref())
}

fn collect_records(
    command: &Command,
    config: &MinerConfig,
    http: &SourceClient,
    executor: &Executor,
    conn: Option<&Connection>,
) -> Result<Vec<Record>> {
    let primary = PrimaryClient::new(http);
    let secondary = SecondaryClient::new(http, config.search_max_pages);

    Ok(match command {
        Command::Dates { .. } | Command::Matches { .. } => {
            let mut orchestrator = MatchOrchestrator::new(
                &primary,
                executor,
                config.tournament_ids(),
                config.reference_tz()?,
            );
            if config.reconcile_inline {
                orchestrator = orchestrator.with_inline_reconcile(InlineReconcile {
                    source: &secondary,
                    aliases: &config.alias,
                });
            }
            match command {
                Command::Dates { start, end } => orchestrator.fetch_dates(*start, *end),
                Command::Matches { ids } => orchestrator.fetch_matches(ids),
                _ => Vec::new(),
            }
        }
        Command::Ratings { limit } => {
            let conn = conn.context("ratings need the store")?;
            RatingsRun::new(&primary, &secondary, &config.alias, executor)
                .fetch_ratings(conn, limit.unwrap_or(config.ratings_limit))?
        }
        Command::Feed { start, end } => {
            let conn = conn.context("feed run needs the store")?;
            let feed = FeedClient::new(http);
            let codes: HashMap<u64, String> = config
                .tournaments
                .values()
                .filter_map(|id| config.feed_code_for(*id).map(|code| (*id, code.to_string())))
                .collect();
            FeedRun::new(&feed, executor, codes, &config.team_alias).fetch_feed(
                conn,
                *start,
                *end,
            )?
        }
    })
}

fn report(output: SinkOutput, out_dir: Option<&Path>) -> Result<()> {
    match output {
        SinkOutput::Tabular(tables) => {
            println!("Tabular output");
            println!("Matches: {}", tables.matches.len());
            println!("Player stats: {}", tables.player_stats.len());
            if let Some(dir) = out_dir {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("create output dir {}", dir.display()))?;
                write_csv(&tables.matches, &dir.join("matches.csv"))?;
                write_csv(&tables.player_stats, &dir.join("player_stats.csv"))?;
                println!("Written to {}", dir.display());
            }
        }
        SinkOutput::Queued(flush) => {
            println!("Store flush complete");
            println!("Statements: {} ok, {} failed", flush.executed, flush.failed);
            println!("Rows changed: {}", flush.rows_changed);
        }
        SinkOutput::Null { discarded } => {
            println!("Dry run: {discarded} records discarded");
        }
    }
    Ok(())
}
