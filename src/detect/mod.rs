//! Failover detection between consecutive observations.

use crate::storage::ObservationRecord;
use serde::Serialize;

/// The serving node changed between two adjacent records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failover {
    pub from_node: String,
    pub from_label: String,
    pub to_node: String,
    pub to_label: String,
}

impl std::fmt::Display for Failover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} → {}", self.from_label, self.to_label)
    }
}

/// Compare `next` with the record stored just before it.
///
/// Only the adjacent pair matters. Both records must carry a node id, so an
/// error record never starts or ends a failover, and the first record of a
/// history never counts as one.
pub fn detect_failover(prev: Option<&ObservationRecord>, next: &ObservationRecord) -> Option<Failover> {
    let prev = prev?;
    let from = prev.node_short_id.as_deref()?;
    let to = next.node_short_id.as_deref()?;
    if from == to {
        return None;
    }

    Some(Failover {
        from_node: from.to_string(),
        from_label: prev.display_node().to_string(),
        to_node: to.to_string(),
        to_label: next.display_node().to_string(),
    })
}
