//! One probe run: fetch, parse, resolve, compare, append.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::ProbeConfig;
use crate::detect::{detect_failover, Failover};
use crate::footer::parse_footer;
use crate::nodes::NodeRegistry;
use crate::probes::{FetchError, Fetcher, HttpFetcher};
use crate::storage::{HistoryStore, JsonFileStore, ObservationRecord, ProbeStatus, StoreError};

/// Source of the probe timestamp.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant, so a caller can announce the run with the
/// same timestamp the record will carry.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// Record timestamp format: RFC 3339, UTC, millisecond precision.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// What a run appended, and whether it was a failover.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub record: ObservationRecord,
    pub failover: Option<Failover>,
    /// History length after the append.
    pub total_records: usize,
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = &self.record;
        let error = r.error.as_deref().unwrap_or("unknown error");
        match r.status {
            ProbeStatus::Ok => {
                write!(
                    f,
                    "OK -- Node: {} ({}) | v{} | {}",
                    r.display_node(),
                    r.node_host.as_deref().unwrap_or("?"),
                    r.version.as_deref().unwrap_or("?"),
                    r.response_time_ms
                        .map(|ms| format!("{ms}ms"))
                        .unwrap_or_else(|| "?ms".to_string()),
                )?;
            }
            ProbeStatus::ParseError => write!(f, "PARSE ERROR: {error}")?,
            ProbeStatus::FetchError => write!(f, "FETCH ERROR: {error}")?,
        }
        if let Some(failover) = &self.failover {
            write!(f, "\n*** FAILOVER DETECTED: {failover} ***")?;
        }
        Ok(())
    }
}

/// Probe `target` once and append the observation to `store`.
///
/// Fetch and parse failures become classified records; only a failed save
/// is returned as an error.
pub async fn run(
    target: &str,
    clock: &dyn Clock,
    fetcher: &dyn Fetcher,
    store: &dyn HistoryStore,
    nodes: &NodeRegistry,
) -> Result<ProbeOutcome, StoreError> {
    let timestamp = format_timestamp(clock.now());

    let mut record = match fetcher.fetch(target).await {
        Err(e) => {
            error!(url = %target, error = %e, "fetch failed");
            ObservationRecord::fetch_error(&timestamp, e.to_string())
        }
        Ok(body) => match parse_footer(&body) {
            None => {
                error!(url = %target, body_len = body.len(), "footer pattern not found");
                ObservationRecord::parse_error(&timestamp)
            }
            Some(footer) => {
                let node = nodes.resolve(&footer.node_short_id);
                info!(
                    node = %node.label,
                    host = %node.host,
                    version = ?footer.version,
                    response_time_ms = ?footer.response_time_ms,
                    tier = ?footer.tier,
                    "footer parsed"
                );
                ObservationRecord::ok(&timestamp, &footer, &node)
            }
        },
    };

    let mut history = store.load();

    let failover = detect_failover(history.last(), &record);
    if let Some(f) = &failover {
        warn!(from = %f.from_label, to = %f.to_label, "failover detected");
        record.failover = true;
    }

    history.append(record.clone());
    store.save(&history)?;

    Ok(ProbeOutcome {
        record,
        failover,
        total_records: history.len(),
    })
}

/// Stands in for the HTTP client when it cannot be built, so the run still
/// records a fetch error.
struct Unavailable(FetchError);

#[async_trait]
impl Fetcher for Unavailable {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        Err(self.0.clone())
    }
}

/// Run once against the real network and the configured history file.
pub async fn run_with_config(
    config: &ProbeConfig,
    clock: &dyn Clock,
) -> anyhow::Result<ProbeOutcome> {
    let fetcher: Box<dyn Fetcher> = match HttpFetcher::new(&config.fetch_settings()) {
        Ok(f) => Box::new(f),
        Err(e) => {
            let message = format!("{e:#}");
            error!(error = %message, "http client unavailable");
            Box::new(Unavailable(FetchError::Transport(message)))
        }
    };
    let store = JsonFileStore::new(&config.history.path);
    let outcome = run(
        &config.target.url,
        clock,
        fetcher.as_ref(),
        &store,
        &config.registry(),
    )
    .await?;
    Ok(outcome)
}
