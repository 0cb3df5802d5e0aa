// src/config/sources.rs
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "remote-jobs-aggregator/0.1 (+https://github.com/remote-jobs-aggregator)";

/// Resolved settings for one upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Cache lifetime of a successful response.
    pub ttl_secs: u64,
    /// Whole-request timeout applied by the HTTP client.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Only USAJobs uses a key. "ENV" means: read `USAJOBS_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
}

impl SourceConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// USAJobs asks callers to send a contact address as the User-Agent.
    pub fn usajobs_default() -> Self {
        Self {
            enabled: true,
            base_url: "https://data.usajobs.gov/api/search".to_string(),
            ttl_secs: 30 * 60,
            timeout_secs: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_key: Some("ENV".to_string()),
        }
    }

    pub fn jobicy_default() -> Self {
        Self {
            enabled: true,
            base_url: "https://jobicy.com/api/v2/remote-jobs".to_string(),
            ttl_secs: 60 * 60,
            timeout_secs: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_key: None,
        }
    }

    pub fn remoteboard_default() -> Self {
        Self {
            enabled: true,
            base_url: "https://api.remoteboard.io/v1/jobs".to_string(),
            ttl_secs: 30 * 60,
            timeout_secs: 8,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            api_key: None,
        }
    }
}

/// A `[sources.<name>]` table as written in the TOML file. Every field is
/// optional; missing ones fall back to that source's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceSection {
    pub enabled: Option<bool>,
    pub base_url: Option<String>,
    pub ttl_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
    pub api_key: Option<String>,
}

impl SourceSection {
    pub fn resolve(self, defaults: SourceConfig) -> SourceConfig {
        SourceConfig {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            base_url: self
                .base_url
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.base_url),
            ttl_secs: self.ttl_secs.unwrap_or(defaults.ttl_secs),
            timeout_secs: self.timeout_secs.unwrap_or(defaults.timeout_secs),
            user_agent: self
                .user_agent
                .filter(|u| !u.trim().is_empty())
                .unwrap_or(defaults.user_agent),
            api_key: self.api_key.or(defaults.api_key),
        }
    }
}
