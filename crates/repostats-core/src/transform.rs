//! Raw AQL results to report-ready data.

use tracing::{info, warn};

use crate::error::Result;
use crate::record::{ArtifactRecord, RawRecord};
use crate::stats::SummaryStats;

/// Normalized records plus their aggregates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    /// One record per result item, in the order received
    pub records: Vec<ArtifactRecord>,
    pub summary: SummaryStats,
}

/// Normalizes every result item and computes the summary.
///
/// A single malformed item fails the whole run. Items without a usable
/// created timestamp are kept; the summary reports how many there were.
pub fn transform(raw: &[RawRecord]) -> Result<Transformed> {
    let records = raw
        .iter()
        .enumerate()
        .map(|(index, item)| ArtifactRecord::from_raw(index, item))
        .collect::<Result<Vec<_>>>()?;

    let summary = SummaryStats::from_records(&records);

    if summary.excluded_from_time > 0 {
        warn!(
            excluded = summary.excluded_from_time,
            "Records without a valid created timestamp are left out of yearly and monthly counts"
        );
    }
    info!(
        count = summary.total_count,
        total_size = summary.total_size,
        users = summary.by_user.len(),
        "Transformed artifact metadata"
    );

    Ok(Transformed { records, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StatsError;
    use serde_json::{json, Value};

    fn items(values: Vec<Value>) -> Vec<RawRecord> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_keeps_every_item_in_order() {
        let raw = items(vec![
            json!({ "repo": "libs", "name": "same.jar", "size": 1 }),
            json!({ "repo": "libs", "name": "same.jar", "size": 1 }),
            json!({ "repo": "other", "name": "b.jar", "size": 2 }),
        ]);
        let out = transform(&raw).unwrap();

        // No deduplication
        assert_eq!(out.records.len(), 3);
        assert_eq!(out.records[2].repository, "other");
        assert_eq!(out.summary.total_count, 3);
        assert_eq!(out.summary.total_size, 4);
    }

    #[test]
    fn test_malformed_item_fails_run() {
        let raw = items(vec![
            json!({ "repo": "libs", "name": "ok.jar" }),
            json!({ "repo": "libs" }),
        ]);
        let err = transform(&raw).unwrap_err();

        assert!(matches!(err, StatsError::Transform { index: 1, .. }));
    }

    #[test]
    fn test_twice_yields_identical_summary() {
        let raw = items(vec![
            json!({ "repo": "libs", "name": "a", "created": "2023-01-01T00:00:00Z", "created_by": "alice" }),
            json!({ "repo": "libs", "name": "b", "created": "garbage" }),
        ]);

        let first = transform(&raw).unwrap();
        let second = transform(&raw).unwrap();
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.summary.excluded_from_time, 1);
    }
}
