//! Summary aggregates over normalized artifact records.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Datelike;

use crate::record::ArtifactRecord;

/// Labels of the download-count buckets, in order.
///
/// Buckets are right-closed: `(0, 10]`, `(10, 20]`, ... `(50, inf)`. Artifacts
/// that were never downloaded fall in no bucket; they are counted by
/// [`SummaryStats::zero_downloads`] instead.
pub const DOWNLOAD_RANGE_LABELS: [&str; 6] = ["1-10", "11-20", "21-30", "31-40", "41-50", "50+"];

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Calendar month key, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Aggregates computed once per run from the full record set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SummaryStats {
    pub total_count: u64,
    /// Sum of all sizes, in bytes
    pub total_size: u64,
    /// Uploads per calendar year of the created timestamp
    pub by_year: BTreeMap<i32, u64>,
    /// Uploads per user, [`crate::UNKNOWN_USER`] included
    pub by_user: BTreeMap<String, u64>,
    /// Uploads per (year, month) of the created timestamp
    pub by_month: BTreeMap<YearMonth, u64>,
    /// Records with no usable created timestamp, left out of `by_year` and `by_month`
    pub excluded_from_time: u64,
    pub zero_downloads: u64,
    /// Counts per bucket of [`DOWNLOAD_RANGE_LABELS`]
    pub download_ranges: [u64; 6],
    /// Bytes uploaded per calendar year
    pub size_by_year: BTreeMap<i32, u64>,
}

impl SummaryStats {
    /// Computes every aggregate in one pass over `records`.
    pub fn from_records(records: &[ArtifactRecord]) -> Self {
        let mut stats = SummaryStats::default();

        for record in records {
            stats.total_count += 1;
            stats.total_size = stats.total_size.saturating_add(record.size);
            *stats.by_user.entry(record.user.clone()).or_insert(0) += 1;

            match download_range(record.downloads) {
                Some(bucket) => stats.download_ranges[bucket] += 1,
                None => stats.zero_downloads += 1,
            }

            match record.created {
                Some(created) => {
                    let year = created.year();
                    *stats.by_year.entry(year).or_insert(0) += 1;
                    let size = stats.size_by_year.entry(year).or_insert(0);
                    *size = size.saturating_add(record.size);
                    let month = YearMonth {
                        year,
                        month: created.month(),
                    };
                    *stats.by_month.entry(month).or_insert(0) += 1;
                }
                None => stats.excluded_from_time += 1,
            }
        }

        stats
    }

    /// Bucket labels paired with their counts.
    pub fn download_range_counts(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        DOWNLOAD_RANGE_LABELS
            .iter()
            .copied()
            .zip(self.download_ranges.iter().copied())
    }

    /// Number of records that made it into the time-based groupings.
    pub fn timed_count(&self) -> u64 {
        self.total_count - self.excluded_from_time
    }
}

/// Index into [`DOWNLOAD_RANGE_LABELS`], or `None` for zero downloads.
fn download_range(downloads: u64) -> Option<usize> {
    match downloads {
        0 => None,
        1..=50 => Some(((downloads - 1) / 10) as usize),
        _ => Some(5),
    }
}

/// Converts bytes to GiB, rounded to two decimals.
pub fn bytes_to_gb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_GB * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::UNKNOWN_USER;
    use chrono::NaiveDate;

    fn record(user: &str, created: Option<(i32, u32, u32)>, size: u64, downloads: u64) -> ArtifactRecord {
        ArtifactRecord {
            name: format!("{}-{}.bin", user, size),
            repository: "libs".to_string(),
            size,
            created: created.map(|(y, m, d)| {
                NaiveDate::from_ymd_opt(y, m, d)
                    .unwrap()
                    .and_hms_opt(12, 0, 0)
                    .unwrap()
            }),
            modified: None,
            downloads,
            user: user.to_string(),
        }
    }

    #[test]
    fn test_empty_input() {
        let stats = SummaryStats::from_records(&[]);

        assert_eq!(stats, SummaryStats::default());
        assert_eq!(stats.timed_count(), 0);
    }

    #[test]
    fn test_three_record_scenario() {
        let records = vec![
            record("alice", Some((2023, 1, 10)), 100, 0),
            record("bob", Some((2023, 6, 1)), 200, 3),
            record("alice", Some((2024, 2, 29)), 300, 0),
        ];
        let stats = SummaryStats::from_records(&records);

        assert_eq!(stats.total_count, 3);
        assert_eq!(stats.total_size, 600);
        assert_eq!(stats.by_year, BTreeMap::from([(2023, 2), (2024, 1)]));
        assert_eq!(
            stats.by_user,
            BTreeMap::from([("alice".to_string(), 2), ("bob".to_string(), 1)])
        );
        assert_eq!(stats.size_by_year, BTreeMap::from([(2023, 300), (2024, 300)]));
        assert_eq!(stats.excluded_from_time, 0);
    }

    #[test]
    fn test_missing_created_is_excluded_from_time_groupings_only() {
        let records = vec![
            record("alice", Some((2023, 1, 10)), 1, 0),
            record(UNKNOWN_USER, None, 5, 0),
        ];
        let stats = SummaryStats::from_records(&records);

        assert_eq!(stats.total_count, 2);
        assert_eq!(stats.total_size, 6);
        assert_eq!(stats.excluded_from_time, 1);
        assert_eq!(stats.by_year.values().sum::<u64>(), 1);
        assert_eq!(stats.by_month.values().sum::<u64>(), 1);
        assert_eq!(stats.by_user[UNKNOWN_USER], 1);
        assert_eq!(stats.timed_count(), 1);
    }

    #[test]
    fn test_months_are_chronological() {
        let records = vec![
            record("a", Some((2024, 1, 1)), 0, 0),
            record("a", Some((2023, 12, 31)), 0, 0),
            record("a", Some((2023, 2, 1)), 0, 0),
            record("a", Some((2023, 12, 1)), 0, 0),
        ];
        let stats = SummaryStats::from_records(&records);

        let keys: Vec<String> = stats.by_month.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, vec!["2023-02", "2023-12", "2024-01"]);
        assert_eq!(stats.by_month[&YearMonth { year: 2023, month: 12 }], 2);
    }

    #[test]
    fn test_user_counts_sum_to_total() {
        let records: Vec<ArtifactRecord> = (0..25)
            .map(|i| {
                let user = match i % 3 {
                    0 => "alice",
                    1 => "bob",
                    _ => UNKNOWN_USER,
                };
                let created = if i % 4 == 0 { None } else { Some((2020 + i % 3, 1 + (i % 12) as u32, 1)) };
                record(user, created, i as u64, i as u64)
            })
            .collect();
        let stats = SummaryStats::from_records(&records);

        assert_eq!(stats.by_user.values().sum::<u64>(), stats.total_count);
        assert_eq!(
            stats.by_year.values().sum::<u64>() + stats.excluded_from_time,
            stats.total_count
        );
        assert_eq!(stats.total_size, (0..25).sum::<u64>());
    }

    #[test]
    fn test_size_totals_saturate() {
        let records = vec![
            record("alice", Some((2023, 1, 1)), u64::MAX, 0),
            record("bob", Some((2023, 2, 1)), 10, 0),
        ];
        let stats = SummaryStats::from_records(&records);

        assert_eq!(stats.total_size, u64::MAX);
        assert_eq!(stats.size_by_year[&2023], u64::MAX);
    }

    #[test]
    fn test_download_buckets_are_right_closed() {
        let records: Vec<ArtifactRecord> = [0, 1, 10, 11, 20, 30, 41, 50, 51, 1000]
            .iter()
            .map(|&d| record("a", None, 0, d))
            .collect();
        let stats = SummaryStats::from_records(&records);

        assert_eq!(stats.zero_downloads, 1);
        assert_eq!(stats.download_ranges, [2, 2, 1, 0, 2, 2]);

        let labelled: Vec<(&str, u64)> = stats.download_range_counts().collect();
        assert_eq!(labelled[0], ("1-10", 2));
        assert_eq!(labelled[5], ("50+", 2));
    }

    #[test]
    fn test_from_records_is_idempotent() {
        let records = vec![
            record("alice", Some((2023, 3, 3)), 10, 4),
            record("bob", None, 20, 0),
        ];

        assert_eq!(
            SummaryStats::from_records(&records),
            SummaryStats::from_records(&records)
        );
    }

    #[test]
    fn test_bytes_to_gb_rounds_to_two_decimals() {
        assert_eq!(bytes_to_gb(0), 0.0);
        assert_eq!(bytes_to_gb(1024 * 1024 * 1024), 1.0);
        assert_eq!(bytes_to_gb(1536 * 1024 * 1024), 1.5);
        assert_eq!(bytes_to_gb(10 * 1024 * 1024), 0.01);
    }
}
