use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use roundlog_config::{RoundlogConfig, load_config, save_config};
use roundlog_engine::Analytics;
use roundlog_ingest_tsv::TsvSampleSource;
use roundlog_ports::{RoundFilter, SampleSink};
use roundlog_store_sqlite::SqliteStore;
use roundlog_sync::SyncPipeline;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "roundlog")]
#[command(about = "Reconstruct rounds from player samples and report activity analytics.", long_about = None)]
struct Cli {
    /// Config file (YAML or JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// SQLite database; overrides `store.path` from the config.
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write the default configuration to a file.
    Init {
        #[arg(long, default_value = "roundlog.yaml")]
        out: PathBuf,
    },
    /// Import samples from a tab-separated file.
    Ingest {
        #[arg(long)]
        samples: PathBuf,
    },
    /// Run one incremental sync of rounds.
    Sync,
    /// List published rounds.
    Rounds {
        #[arg(long)]
        player: Option<String>,
        #[arg(long)]
        server: Option<String>,
        #[arg(long)]
        map: Option<String>,
        /// Include bot rounds.
        #[arg(long)]
        bots: bool,
    },
    /// Composite progression report for a player.
    Progression {
        #[arg(long)]
        player: String,
    },
    /// Cumulative-kill milestones for a player.
    Milestones {
        #[arg(long)]
        player: String,
    },
    /// Busy/quiet indicator for one server, or all servers combined.
    Busy {
        #[arg(long)]
        server: Option<String>,
    },
    /// Forecast, peak hours and a recommendation for a server.
    Insight {
        #[arg(long)]
        server: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Init { out } = &cli.cmd {
        save_config(&RoundlogConfig::default(), out)?;
        println!("wrote {}", out.display());
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => RoundlogConfig::default(),
    };
    if let Some(db) = cli.db {
        config.store.path = db;
    }
    roundlog_logging::init(&config.logging)?;

    let store = Arc::new(
        SqliteStore::open(&config.store.path)
            .with_context(|| format!("open store {}", config.store.path.display()))?,
    );

    match cli.cmd {
        Command::Init { .. } => {}

        Command::Ingest { samples } => {
            let fetched = TsvSampleSource::new(&samples).read_all()?;
            let inserted = store.insert_samples(&fetched.rows)?;
            info!(file = %samples.display(), inserted, skipped = fetched.skipped, "ingested samples");
            print_json(&serde_json::json!({
                "read": fetched.rows.len(),
                "inserted": inserted,
                "skipped": fetched.skipped,
            }))?;
        }

        Command::Sync => {
            let mut pipeline = SyncPipeline::new(
                store.as_ref(),
                store.as_ref(),
                &config.segmentation,
                config.sync.clone(),
            );
            let result = pipeline.run().await;
            print_json(&result)?;
            if let Some(message) = result.error_message {
                bail!("sync failed after {} rounds: {message}", result.processed_count);
            }
        }

        Command::Rounds {
            player,
            server,
            map,
            bots,
        } => {
            let analytics = Analytics::new(store, config);
            let filter = RoundFilter {
                player,
                server,
                map,
                include_bots: bots,
                ..RoundFilter::default()
            };
            print_json(&analytics.rounds(filter).await?)?;
        }

        Command::Progression { player } => {
            let analytics = Analytics::new(store, config);
            print_json(&analytics.player_progression(&player, Utc::now()).await)?;
        }

        Command::Milestones { player } => {
            let analytics = Analytics::new(store, config);
            print_json(&analytics.milestones(&player).await?)?;
        }

        Command::Busy { server } => {
            let analytics = Analytics::new(store, config);
            print_json(&analytics.busy_indicator(server.as_deref(), Utc::now()).await?)?;
        }

        Command::Insight { server } => {
            let analytics = Analytics::new(store, config);
            print_json(&analytics.server_insight(&server, Utc::now()).await?)?;
        }
    }

    Ok(())
}
