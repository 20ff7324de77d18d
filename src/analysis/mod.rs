//! Read-only roll-up of a history document.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::storage::{HistoryDocument, ObservationRecord, ProbeStatus};

/// Per-node tally across the whole history.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeStats {
    pub label: String,
    pub observations: usize,
    pub avg_response_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct HistorySummary {
    pub total: usize,
    pub ok: usize,
    pub parse_errors: usize,
    pub fetch_errors: usize,
    pub failovers: usize,
    /// Node of the most recent OK record.
    pub current_node: Option<String>,
    pub current_version: Option<String>,
    pub last_failover_at: Option<String>,
    pub first_timestamp: Option<String>,
    pub last_timestamp: Option<String>,
    pub nodes: BTreeMap<String, NodeStats>,
}

impl HistorySummary {
    /// Share of attempts that produced an OK record, 0-100.
    pub fn availability_pct(&self) -> Option<f64> {
        (self.total > 0).then(|| self.ok as f64 * 100.0 / self.total as f64)
    }
}

pub fn summarize(doc: &HistoryDocument) -> HistorySummary {
    let mut summary = HistorySummary {
        total: doc.records.len(),
        first_timestamp: doc.records.first().map(|r| r.timestamp.clone()),
        last_timestamp: doc.records.last().map(|r| r.timestamp.clone()),
        ..Default::default()
    };
    let mut latency: BTreeMap<String, (u64, usize)> = BTreeMap::new();

    for r in &doc.records {
        match r.status {
            ProbeStatus::Ok => summary.ok += 1,
            ProbeStatus::ParseError => summary.parse_errors += 1,
            ProbeStatus::FetchError => summary.fetch_errors += 1,
        }
        if r.failover {
            summary.failovers += 1;
            summary.last_failover_at = Some(r.timestamp.clone());
        }

        let Some(node) = r.node_short_id.as_deref() else {
            continue;
        };
        let stats = summary.nodes.entry(node.to_string()).or_default();
        stats.label = r.display_node().to_string();
        stats.observations += 1;
        if let Some(ms) = r.response_time_ms {
            let acc = latency.entry(node.to_string()).or_default();
            acc.0 = acc.0.saturating_add(ms);
            acc.1 += 1;
        }

        if r.status == ProbeStatus::Ok {
            summary.current_node = Some(node.to_string());
            summary.current_version = r.version.clone().or(summary.current_version.take());
        }
    }

    for (node, (sum, n)) in latency {
        if let Some(stats) = summary.nodes.get_mut(&node) {
            stats.avg_response_ms = Some(sum as f64 / n as f64);
        }
    }

    summary
}

/// The failover records, oldest first.
pub fn failover_records(doc: &HistoryDocument) -> Vec<&ObservationRecord> {
    doc.records.iter().filter(|r| r.failover).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::detect_failover;
    use crate::footer::parse_footer;
    use crate::nodes::resolve;

    fn push_ok(doc: &mut HistoryDocument, ts: &str, footer: &str) {
        let footer = parse_footer(footer).unwrap();
        let mut record = ObservationRecord::ok(ts, &footer, &resolve(&footer.node_short_id));
        record.failover = detect_failover(doc.last(), &record).is_some();
        doc.append(record);
    }

    fn sample() -> HistoryDocument {
        let mut doc = HistoryDocument::default();
        push_ok(&mut doc, "t1", "9.14.6-i068 | 4 ms");
        push_ok(&mut doc, "t2", "9.14.6-i068 | 6 ms");
        doc.append(ObservationRecord::fetch_error("t3", "Timeout"));
        push_ok(&mut doc, "t4", "9.14.7-i069 | 10 ms");
        doc.append(ObservationRecord::parse_error("t5"));
        doc
    }

    #[test]
    fn test_summary_counts() {
        let s = summarize(&sample());

        assert_eq!(s.total, 5);
        assert_eq!(s.ok, 3);
        assert_eq!(s.fetch_errors, 1);
        assert_eq!(s.parse_errors, 1);
        // t3 has no node, so t2 -> t4 is not adjacent and not a failover.
        assert_eq!(s.failovers, 0);
        assert_eq!(s.current_node.as_deref(), Some("i069"));
        assert_eq!(s.current_version.as_deref(), Some("9.14.7"));
        assert_eq!(s.first_timestamp.as_deref(), Some("t1"));
        assert_eq!(s.last_timestamp.as_deref(), Some("t5"));
        assert_eq!(s.availability_pct(), Some(60.0));

        let i068 = &s.nodes["i068"];
        assert_eq!(i068.label, "IDT068");
        assert_eq!(i068.observations, 2);
        assert_eq!(i068.avg_response_ms, Some(5.0));
    }

    #[test]
    fn test_failovers_listed() {
        let mut doc = HistoryDocument::default();
        push_ok(&mut doc, "t1", "9.14.7-i068 | 3 ms");
        push_ok(&mut doc, "t2", "9.14.7-i069 | 3 ms");
        push_ok(&mut doc, "t3", "9.14.7-i067 | 3 ms");

        let s = summarize(&doc);
        assert_eq!(s.failovers, 2);
        assert_eq!(s.last_failover_at.as_deref(), Some("t3"));

        let stamps: Vec<_> = failover_records(&doc).iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(stamps, ["t2", "t3"]);
    }

    #[test]
    fn test_empty_history() {
        let s = summarize(&HistoryDocument::default());
        assert_eq!(s, HistorySummary::default());
        assert_eq!(s.availability_pct(), None);
    }
}
