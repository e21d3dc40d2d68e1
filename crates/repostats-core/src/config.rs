//! Run configuration.
//!
//! Built once by the caller (the CLI reads flags, the environment and `.env`)
//! and passed by reference to the client and the fetch step. Nothing in this
//! crate reads process-wide state.

use crate::error::{Result, StatsError};

/// Default request timeout for the AQL call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Path of the AQL search endpoint, relative to the Artifactory base URL.
pub const AQL_ENDPOINT: &str = "/api/search/aql";

/// Immutable settings for one report run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsConfig {
    /// Base URL of the Artifactory instance (e.g. `https://repo.example.com/artifactory`)
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Repositories to report on, in the order given
    pub repository_names: Vec<String>,
    /// Timeout applied to the whole AQL request
    pub timeout_secs: u64,
    /// When set, results are fetched in pages of this many items
    pub page_size: Option<u64>,
}

impl StatsConfig {
    /// Creates a configuration with the default timeout and no paging.
    pub fn new(
        base_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
        repository_names: Vec<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            repository_names,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            page_size: None,
        }
    }

    /// Checks that everything needed for a query is present.
    ///
    /// # Validation Rules
    /// 1. Base URL, username and password must be non-empty
    /// 2. Base URL must use http or https
    /// 3. At least one non-blank repository name must be given
    /// 4. Timeout and page size (when set) must be positive
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.base_url.trim().is_empty() {
            missing.push("ARTIFACTORY_URL");
        }
        if self.username.trim().is_empty() {
            missing.push("USERNAME");
        }
        if self.password.is_empty() {
            missing.push("PASSWORD");
        }
        if self.repository_names.iter().all(|n| n.trim().is_empty()) {
            missing.push("REPOSITORY_NAMES");
        }
        if !missing.is_empty() {
            return Err(StatsError::Config(format!(
                "One or more required values are missing: {}",
                missing.join(", ")
            )));
        }

        let url = self.base_url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(StatsError::Config(format!(
                "Artifactory URL must start with http:// or https://, got '{}'",
                url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(StatsError::Config(
                "timeout must be at least one second".to_string(),
            ));
        }

        if self.page_size == Some(0) {
            return Err(StatsError::Config(
                "page size must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Full URL of the AQL search endpoint.
    pub fn aql_url(&self) -> String {
        format!("{}{}", self.base_url.trim().trim_end_matches('/'), AQL_ENDPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> StatsConfig {
        StatsConfig::new(
            "https://repo.example.com/artifactory",
            "admin",
            "secret",
            vec!["libs-release".to_string()],
        )
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = valid_config();
        assert_eq!(config.timeout_secs, DEFAULT_TIMEOUT_SECS);
        assert!(config.page_size.is_none());
    }

    #[test]
    fn test_validate_accepts_complete_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validate_lists_every_missing_value() {
        let config = StatsConfig::new("", "", "", vec![]);
        let err = config.validate().unwrap_err().to_string();

        assert!(err.contains("ARTIFACTORY_URL"));
        assert!(err.contains("USERNAME"));
        assert!(err.contains("PASSWORD"));
        assert!(err.contains("REPOSITORY_NAMES"));
    }

    #[test]
    fn test_validate_rejects_blank_repository_names() {
        let mut config = valid_config();
        config.repository_names = vec!["".to_string(), "  ".to_string()];

        let result = config.validate();
        assert!(matches!(result, Err(StatsError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_url_without_scheme() {
        let mut config = valid_config();
        config.base_url = "repo.example.com".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http:// or https://"));
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let mut config = valid_config();
        config.page_size = Some(0);

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("page size"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = valid_config();
        config.timeout_secs = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_aql_url_trims_trailing_slash() {
        let mut config = valid_config();
        config.base_url = "https://repo.example.com/artifactory/".to_string();

        assert_eq!(
            config.aql_url(),
            "https://repo.example.com/artifactory/api/search/aql"
        );
    }
}
