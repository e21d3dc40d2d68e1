//! AQL query construction.
//!
//! Produces expressions of the form
//! `items.find({"$or":[{"repo":"a"},{"repo":"b"}]}).include("name","repo",...)`
//! for the `/api/search/aql` endpoint.

use std::fmt;

use serde_json::{json, Value};

use crate::config::StatsConfig;
use crate::error::{Result, StatsError};
use crate::record::RawRecord;

/// Item fields requested by default. `stat` pulls in download statistics.
pub const DEFAULT_FIELDS: &[&str] = &[
    "name",
    "repo",
    "path",
    "type",
    "size",
    "created",
    "created_by",
    "modified",
    "modified_by",
    "updated",
    "stat",
];

/// Fields used to look up download statistics for known items.
pub const STATS_FIELDS: &[&str] = &["repo", "path", "name", "stat"];

/// Includes that pull in another AQL domain. Artifactory only honours
/// `.sort/.offset/.limit` when every include belongs to `items` itself.
const RELATED_DOMAINS: &[&str] = &[
    "stat",
    "property",
    "archive",
    "artifact",
    "dependency",
    "release",
    "release_artifact",
];

/// Returns true when `field` belongs to the `items` domain.
pub fn is_item_field(field: &str) -> bool {
    !field.contains('.') && !RELATED_DOMAINS.contains(&field)
}

/// Identity of one artifact within Artifactory.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ItemKey {
    pub repo: String,
    pub path: String,
    pub name: String,
}

impl ItemKey {
    /// Reads the key of a result item; `None` when `repo` or `name` is missing.
    pub fn from_raw(raw: &RawRecord) -> Option<Self> {
        let text = |field: &str| raw.get(field).and_then(|v| v.as_str()).map(str::to_string);
        Some(Self {
            repo: text("repo")?,
            path: text("path").unwrap_or_default(),
            name: text("name")?,
        })
    }
}

/// A single AQL `items.find` expression restricted to a set of repositories,
/// or to an explicit set of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AqlQuery {
    repositories: Vec<String>,
    items: Vec<ItemKey>,
    fields: Vec<String>,
    page: Option<Page>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Page {
    offset: u64,
    limit: u64,
}

impl AqlQuery {
    /// Builds a query matching artifacts in any of `repositories`.
    ///
    /// Blank names are ignored and duplicates collapse onto their first
    /// occurrence. Fails with [`StatsError::Config`] when no name remains,
    /// so an unbounded query is never issued.
    pub fn build<S: AsRef<str>>(repositories: &[S], fields: &[&str]) -> Result<Self> {
        let mut distinct: Vec<String> = Vec::new();
        for name in repositories {
            let name = name.as_ref().trim();
            if name.is_empty() || distinct.iter().any(|seen| seen == name) {
                continue;
            }
            distinct.push(name.to_string());
        }

        if distinct.is_empty() {
            return Err(StatsError::Config(
                "At least one repository name is required to build an AQL query".to_string(),
            ));
        }

        Ok(Self {
            repositories: distinct,
            items: Vec::new(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            page: None,
        })
    }

    /// Builds a query matching exactly the given items.
    pub fn for_items(items: &[ItemKey], fields: &[&str]) -> Result<Self> {
        if items.is_empty() {
            return Err(StatsError::Config(
                "At least one item is required to build an AQL query".to_string(),
            ));
        }

        let mut repositories: Vec<String> = Vec::new();
        for item in items {
            if !repositories.contains(&item.repo) {
                repositories.push(item.repo.clone());
            }
        }

        Ok(Self {
            repositories,
            items: items.to_vec(),
            fields: fields.iter().map(|f| f.to_string()).collect(),
            page: None,
        })
    }

    /// Builds the default query for the repositories named in `config`.
    pub fn for_config(config: &StatsConfig) -> Result<Self> {
        Self::build(&config.repository_names, DEFAULT_FIELDS)
    }

    /// Returns a copy of this query restricted to one page of results.
    ///
    /// Includes from other domains (see [`is_item_field`]) are dropped from
    /// the copy, since the endpoint rejects them alongside paging.
    pub fn page(&self, offset: u64, limit: u64) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .filter(|f| is_item_field(f))
                .cloned()
                .collect(),
            page: Some(Page { offset, limit }),
            ..self.clone()
        }
    }

    /// Whether `field` is in the include list.
    pub fn includes(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f == field)
    }

    /// Distinct repository names, in the order first given.
    pub fn repositories(&self) -> &[String] {
        &self.repositories
    }

    pub fn repository_filter_count(&self) -> usize {
        self.repositories.len()
    }

    /// The `find` criteria as a JSON value.
    pub fn criteria(&self) -> Value {
        let mut filters: Vec<Value> = if self.items.is_empty() {
            self.repositories
                .iter()
                .map(|name| json!({ "repo": name }))
                .collect()
        } else {
            self.items
                .iter()
                .map(|item| json!({ "repo": item.repo, "path": item.path, "name": item.name }))
                .collect()
        };

        if filters.len() == 1 {
            filters.remove(0)
        } else {
            json!({ "$or": filters })
        }
    }

    /// Renders the full AQL text sent as the request body.
    pub fn to_aql(&self) -> String {
        let mut aql = format!("items.find({})", self.criteria());

        if !self.fields.is_empty() {
            let include: Vec<String> = self
                .fields
                .iter()
                .map(|f| Value::String(f.clone()).to_string())
                .collect();
            aql.push_str(&format!(".include({})", include.join(",")));
        }

        if let Some(page) = self.page {
            // Paging is only stable over a fixed ordering.
            aql.push_str(r#".sort({"$asc":["repo","path","name"]})"#);
            aql.push_str(&format!(".offset({}).limit({})", page.offset, page.limit));
        }

        aql
    }
}

impl fmt::Display for AqlQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_aql())
    }
}
