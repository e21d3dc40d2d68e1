//! repostats - artifact statistics reports for Artifactory repositories
//!
//! Builds an AQL query over one or more repositories, fetches the matching
//! items, aggregates them and writes an xlsx report with charts.

pub mod client;
pub mod config;
pub mod error;
pub mod query;
pub mod record;
pub mod report;
pub mod stats;
pub mod transform;

pub use client::{fetch_all, fetch_records, AqlRange, AqlResponse, AqlSearch, ArtifactoryClient};
pub use config::StatsConfig;
pub use error::{Result, StatsError};
pub use query::{AqlQuery, DEFAULT_FIELDS};
pub use record::{ArtifactRecord, RawRecord, UNKNOWN_USER};
pub use report::ReportWriter;
pub use stats::{bytes_to_gb, SummaryStats, YearMonth};
pub use transform::{transform, Transformed};
