//! On-disk shape of the rotation history.
//!
//! Field names are camelCase and optional fields are written as explicit
//! `null`, matching documents produced by other tools that share this
//! schema. Missing optional fields read back as `None`.

use crate::footer::Footer;
use crate::nodes::NodeDescriptor;
use serde::{Deserialize, Serialize};

/// Error text for a page that was fetched but carried no recognizable footer.
pub const PARSE_ERROR_MESSAGE: &str = "Footer pattern not found in page";

/// Terminal classification of one probe attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProbeStatus {
    Ok,
    ParseError,
    FetchError,
}

impl std::fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeStatus::Ok => write!(f, "OK"),
            ProbeStatus::ParseError => write!(f, "PARSE_ERROR"),
            ProbeStatus::FetchError => write!(f, "FETCH_ERROR"),
        }
    }
}

/// One observation. Written once, never edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationRecord {
    pub timestamp: String,
    pub status: ProbeStatus,
    #[serde(default)]
    pub node_short_id: Option<String>,
    #[serde(default)]
    pub node_label: Option<String>,
    #[serde(default)]
    pub node_host: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub response_time_ms: Option<u64>,
    #[serde(default)]
    pub failover: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ObservationRecord {
    fn bare(timestamp: impl Into<String>, status: ProbeStatus) -> Self {
        Self {
            timestamp: timestamp.into(),
            status,
            node_short_id: None,
            node_label: None,
            node_host: None,
            version: None,
            response_time_ms: None,
            failover: false,
            error: None,
        }
    }

    /// A successful observation of `node`.
    pub fn ok(timestamp: impl Into<String>, footer: &Footer, node: &NodeDescriptor) -> Self {
        Self {
            node_short_id: Some(footer.node_short_id.clone()),
            node_label: Some(node.label.clone()),
            node_host: Some(node.host.clone()),
            version: footer.version.clone(),
            response_time_ms: footer.response_time_ms,
            ..Self::bare(timestamp, ProbeStatus::Ok)
        }
    }

    pub fn parse_error(timestamp: impl Into<String>) -> Self {
        Self {
            error: Some(PARSE_ERROR_MESSAGE.to_string()),
            ..Self::bare(timestamp, ProbeStatus::ParseError)
        }
    }

    pub fn fetch_error(timestamp: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::bare(timestamp, ProbeStatus::FetchError)
        }
    }

    /// Label if resolved, else the short id, else `"?"`.
    pub fn display_node(&self) -> &str {
        self.node_label
            .as_deref()
            .or(self.node_short_id.as_deref())
            .unwrap_or("?")
    }
}

/// The whole history file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryDocument {
    #[serde(default)]
    pub records: Vec<ObservationRecord>,
    #[serde(default)]
    pub last_updated: Option<String>,
}

impl HistoryDocument {
    pub fn last(&self) -> Option<&ObservationRecord> {
        self.records.last()
    }

    /// Append `record` and stamp `lastUpdated` with its timestamp.
    pub fn append(&mut self, record: ObservationRecord) {
        self.last_updated = Some(record.timestamp.clone());
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footer::MatchTier;

    const TS: &str = "2025-03-01T08:12:00.000Z";

    fn footer() -> Footer {
        Footer {
            version: Some("9.14.7".to_string()),
            node_short_id: "i068".to_string(),
            response_time_ms: Some(3),
            tier: MatchTier::Full,
        }
    }

    #[test]
    fn test_ok_record_json_shape() {
        let node = NodeDescriptor::new("i068", "idt183068", "IDT068");
        let record = ObservationRecord::ok(TS, &footer(), &node);
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "timestamp": TS,
                "status": "OK",
                "nodeShortId": "i068",
                "nodeLabel": "IDT068",
                "nodeHost": "idt183068",
                "version": "9.14.7",
                "responseTimeMs": 3,
                "failover": false,
                "error": null
            })
        );
    }

    #[test]
    fn test_error_records_carry_no_node() {
        let fetch = ObservationRecord::fetch_error(TS, "Timeout");
        assert_eq!(fetch.status, ProbeStatus::FetchError);
        assert_eq!(fetch.error.as_deref(), Some("Timeout"));
        assert!(fetch.node_short_id.is_none());

        let parse = ObservationRecord::parse_error(TS);
        assert_eq!(parse.status, ProbeStatus::ParseError);
        assert_eq!(parse.error.as_deref(), Some(PARSE_ERROR_MESSAGE));
        assert!(parse.version.is_none());

        let json = serde_json::to_string(&parse).unwrap();
        assert!(json.contains("\"status\":\"PARSE_ERROR\""));
        assert!(json.contains("\"nodeShortId\":null"));
    }

    #[test]
    fn test_sparse_record_reads_with_defaults() {
        let record: ObservationRecord =
            serde_json::from_str(r#"{"timestamp": "t", "status": "FETCH_ERROR"}"#).unwrap();
        assert!(!record.failover);
        assert!(record.error.is_none());
        assert_eq!(record.display_node(), "?");
    }

    #[test]
    fn test_append_updates_last_updated() {
        let mut doc = HistoryDocument::default();
        assert!(doc.is_empty());
        assert!(doc.last_updated.is_none());

        doc.append(ObservationRecord::parse_error("t1"));
        doc.append(ObservationRecord::fetch_error("t2", "HTTP 502"));

        assert_eq!(doc.len(), 2);
        assert_eq!(doc.last_updated.as_deref(), Some("t2"));
        assert_eq!(doc.last().unwrap().timestamp, "t2");
    }
}
