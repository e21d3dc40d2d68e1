//! Artifactory AQL client.
//!
//! One blocking `POST /api/search/aql` per query. When paging is enabled that
//! becomes one request per page, plus a download statistics lookup per page.
//! Failures are surfaced as-is; nothing is retried.

use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::StatsConfig;
use crate::error::{Result, StatsError};
use crate::query::{AqlQuery, ItemKey, STATS_FIELDS};
use crate::record::RawRecord;

/// Body of an AQL search response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AqlResponse {
    #[serde(default)]
    pub results: Vec<RawRecord>,
    #[serde(default)]
    pub range: Option<AqlRange>,
}

/// Position of the returned slice within the full result set.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AqlRange {
    pub start_pos: u64,
    pub end_pos: u64,
    pub total: u64,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Anything that can execute an AQL query.
pub trait AqlSearch {
    fn search(&self, query: &AqlQuery) -> Result<AqlResponse>;
}

/// Blocking HTTP client for a single Artifactory instance.
pub struct ArtifactoryClient {
    agent: ureq::Agent,
    url: String,
    authorization: String,
}

impl ArtifactoryClient {
    /// Creates a client using basic auth and the configured timeout.
    pub fn new(config: &StatsConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build();

        let credentials = format!("{}:{}", config.username, config.password);
        let authorization = format!("Basic {}", BASE64_STANDARD.encode(credentials));

        Self {
            agent,
            url: config.aql_url(),
            authorization,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl AqlSearch for ArtifactoryClient {
    fn search(&self, query: &AqlQuery) -> Result<AqlResponse> {
        let body = query.to_aql();
        debug!(url = %self.url, aql = %body, "Executing AQL query");

        let response = self
            .agent
            .post(&self.url)
            .set("Authorization", &self.authorization)
            .set("Content-Type", "text/plain")
            .send_string(&body)?;

        let status = response.status();
        response
            .into_json::<AqlResponse>()
            .map_err(|e| StatsError::Request {
                status,
                message: format!("Failed to parse response: {}", e),
            })
    }
}

/// Runs `query` and returns every result item, in the order received.
///
/// With `page_size` unset a single request is made and the endpoint's own
/// result limit applies; a `range.total` larger than what came back is
/// logged as possible truncation.
///
/// With a page size, pages are requested until the reported `range.total` is
/// reached (or, without a range, until a page comes back short). Each page
/// advances by the number of items actually returned, so a server capping
/// pages below the requested size is still read to the end. If the query
/// includes `stat`, download statistics are fetched per page with a separate
/// unpaged lookup, because paged queries may only include item fields.
pub fn fetch_all<S: AqlSearch + ?Sized>(
    search: &S,
    query: &AqlQuery,
    page_size: Option<u64>,
) -> Result<Vec<RawRecord>> {
    let Some(limit) = page_size else {
        let response = search.search(query)?;
        if let Some(range) = &response.range {
            if range.total > response.results.len() as u64 {
                warn!(
                    returned = response.results.len(),
                    total = range.total,
                    "AQL returned fewer items than matched; results may be truncated (consider --page-size)"
                );
            }
        }
        info!(count = response.results.len(), "Fetched artifact metadata");
        return Ok(response.results);
    };

    if limit == 0 {
        return Err(StatsError::Config("page size must be positive".to_string()));
    }

    let wants_stats = query.includes("stat");
    let mut records = Vec::new();
    let mut offset = 0u64;
    loop {
        let AqlResponse { mut results, range } = search.search(&query.page(offset, limit))?;
        let returned = results.len() as u64;
        debug!(offset, returned, "Fetched AQL page");

        if wants_stats {
            attach_stats(search, &mut results)?;
        }
        records.extend(results);

        match range {
            Some(range) => {
                if offset == 0 {
                    if let Some(cap) = range.limit.filter(|cap| *cap < limit) {
                        warn!(requested = limit, cap, "Server caps AQL pages below the requested page size");
                    }
                }
                if records.len() as u64 >= range.total {
                    break;
                }
                if returned == 0 {
                    warn!(
                        returned = records.len(),
                        total = range.total,
                        "AQL stopped returning items before the reported total; results are truncated"
                    );
                    break;
                }
            }
            None if returned < limit => break,
            None => {}
        }
        offset += returned;
    }

    info!(count = records.len(), page_size = limit, "Fetched artifact metadata");
    Ok(records)
}

/// Fills in `stats` for one page of items from a lookup by item key.
fn attach_stats<S: AqlSearch + ?Sized>(search: &S, page: &mut [RawRecord]) -> Result<()> {
    let keys: Vec<ItemKey> = page.iter().filter_map(ItemKey::from_raw).collect();
    if keys.is_empty() {
        return Ok(());
    }

    let response = search.search(&AqlQuery::for_items(&keys, STATS_FIELDS)?)?;
    let mut stats: HashMap<ItemKey, Value> = response
        .results
        .into_iter()
        .filter_map(|mut item| {
            let key = ItemKey::from_raw(&item)?;
            Some((key, item.remove("stats")?))
        })
        .collect();

    for item in page.iter_mut() {
        if let Some(found) = ItemKey::from_raw(item).and_then(|key| stats.remove(&key)) {
            item.insert("stats".to_string(), found);
        }
    }
    debug!(items = keys.len(), "Attached download statistics");
    Ok(())
}

/// Validates `config`, then queries its repositories over HTTP.
pub fn fetch_records(config: &StatsConfig) -> Result<Vec<RawRecord>> {
    config.validate()?;
    let query = AqlQuery::for_config(config)?;
    let client = ArtifactoryClient::new(config);

    info!(
        url = client.url(),
        repositories = ?query.repositories(),
        "Querying Artifactory"
    );
    fetch_all(&client, &query, config.page_size)
}
