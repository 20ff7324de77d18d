use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter};

use nodewatch::analysis;
use nodewatch::config::ProbeConfig;
use nodewatch::storage::{HistoryStore, JsonFileStore};
use nodewatch::{format_timestamp, Clock, FixedClock};

#[derive(Parser)]
#[command(
    name = "nodewatch",
    about = "Serving-node rotation and failover tracker",
    version,
    long_about = None
)]
struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the target once and append the observation (default)
    Poll {
        /// Page to probe
        #[arg(long)]
        url: Option<String>,

        /// History file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the appended record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize the stored history
    History {
        /// History file
        #[arg(long)]
        history: Option<PathBuf>,

        /// Number of recent records to list
        #[arg(long, default_value = "10")]
        limit: usize,

        /// Only list failover records
        #[arg(long)]
        failovers: bool,

        /// JSON output for machine parsing
        #[arg(long)]
        json: bool,
    },

    /// List known nodes
    Nodes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Subscriber goes up before the config is read so fallback warnings are
    // visible; the configured level is swapped in afterwards unless RUST_LOG
    // is set. Logs go to stderr so stdout stays clean for --json.
    let from_env = EnvFilter::try_from_default_env().ok();
    let level_from_env = from_env.is_some();
    let (filter, filter_handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new("info")));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ProbeConfig::resolve(cli.config.as_deref())?;
    if !level_from_env {
        filter_handle.reload(EnvFilter::new(&config.logging.level))?;
    }

    let command = cli.command.unwrap_or(Commands::Poll {
        url: None,
        history: None,
        json: false,
    });

    match command {
        Commands::Poll { url, history, json } => {
            if let Some(url) = url {
                config.target.url = url;
            }
            if let Some(history) = history {
                config.history.path = history;
            }

            // One instant for both the progress line and the record.
            let clock = FixedClock(chrono::Utc::now());
            if !json {
                println!(
                    "[{}] Polling {}...",
                    format_timestamp(clock.now()),
                    config.target.url
                );
            }

            let outcome = nodewatch::run_with_config(&config, &clock).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.record)?);
            } else {
                println!("{}", outcome);
                println!(
                    "Saved → {} ({} records)",
                    config.history.path.display(),
                    outcome.total_records
                );
            }
        }
        Commands::History {
            history,
            limit,
            failovers,
            json,
        } => {
            if let Some(history) = history {
                config.history.path = history;
            }
            let doc = JsonFileStore::new(&config.history.path).load();
            let summary = analysis::summarize(&doc);

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
                return Ok(());
            }

            println!("\nHistory: {}", config.history.path.display());
            println!(
                "Records: {} (OK {}, parse errors {}, fetch errors {})",
                summary.total, summary.ok, summary.parse_errors, summary.fetch_errors
            );
            if let Some(pct) = summary.availability_pct() {
                println!("Availability: {:.1}%", pct);
            }
            println!(
                "Current node: {}  version: {}",
                summary.current_node.as_deref().unwrap_or("-"),
                summary.current_version.as_deref().unwrap_or("-")
            );
            println!(
                "Failovers: {} (last: {})",
                summary.failovers,
                summary.last_failover_at.as_deref().unwrap_or("never")
            );

            if !summary.nodes.is_empty() {
                println!("\n{:<8} | {:<10} | {:>6} | Avg ms", "Node", "Label", "Seen");
                println!("{:-<8}-|-{:-<10}-|-{:->6}-|-{:-<7}", "", "", "", "");
                for (id, stats) in &summary.nodes {
                    let avg = stats
                        .avg_response_ms
                        .map(|ms| format!("{:.1}", ms))
                        .unwrap_or_else(|| "-".to_string());
                    println!("{:<8} | {:<10} | {:>6} | {}", id, stats.label, stats.observations, avg);
                }
            }

            let listed = if failovers {
                analysis::failover_records(&doc)
            } else {
                doc.records.iter().collect()
            };
            let start = listed.len().saturating_sub(limit);
            if !listed[start..].is_empty() {
                println!("\n{:<24} | {:<11} | {:<8} | Detail", "Timestamp", "Status", "Node");
                println!("{:-<24}-|-{:-<11}-|-{:-<8}-|-{:-<30}", "", "", "", "");
                for r in &listed[start..] {
                    let detail = match (&r.error, r.failover) {
                        (Some(e), _) => e.clone(),
                        (None, true) => "failover".to_string(),
                        (None, false) => r.version.clone().unwrap_or_default(),
                    };
                    println!(
                        "{:<24} | {:<11} | {:<8} | {}",
                        r.timestamp,
                        r.status.to_string(),
                        r.display_node(),
                        detail
                    );
                }
            }
            println!();
        }
        Commands::Nodes => {
            println!("{:<8} | {:<12} | Label", "Id", "Host");
            println!("{:-<8}-|-{:-<12}-|-{:-<8}", "", "", "");
            for node in config.registry().iter() {
                println!("{:<8} | {:<12} | {}", node.short_id, node.host, node.label);
            }
        }
    }

    Ok(())
}
