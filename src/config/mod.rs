// src/config/mod.rs
//! Service configuration: TOML file + env overrides + built-in defaults.
//!
//! Lookup order for the file:
//! 1) $JOBS_CONFIG_PATH (must exist when set)
//! 2) config/sources.toml
//! 3) built-in defaults

pub mod sources;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};
use tracing::warn;

pub use sources::{SourceConfig, SourceSection, DEFAULT_USER_AGENT};

pub const ENV_CONFIG_PATH: &str = "JOBS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/sources.toml";
pub const ENV_USAJOBS_API_KEY: &str = "USAJOBS_API_KEY";
pub const ENV_USAJOBS_USER_AGENT: &str = "USAJOBS_USER_AGENT";
pub const ENV_SOURCE_TIMEOUT_SECS: &str = "JOBS_SOURCE_TIMEOUT_SECS";

fn default_source_timeout_secs() -> u64 {
    8
}
fn default_limit() -> usize {
    24
}
fn default_max_limit() -> usize {
    60
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Upper bound for one source inside the fan-out join.
    #[serde(default = "default_source_timeout_secs")]
    pub source_timeout_secs: u64,
    #[serde(default = "default_limit")]
    pub default_limit: usize,
    #[serde(default = "default_max_limit")]
    pub max_limit: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            source_timeout_secs: default_source_timeout_secs(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

impl AggregatorConfig {
    pub fn source_timeout(&self) -> Duration {
        Duration::from_secs(self.source_timeout_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub aggregator: AggregatorConfig,
    pub usajobs: SourceConfig,
    pub jobicy: SourceConfig,
    pub remoteboard: SourceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            usajobs: SourceConfig::usajobs_default(),
            jobicy: SourceConfig::jobicy_default(),
            remoteboard: SourceConfig::remoteboard_default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    aggregator: AggregatorConfig,
    #[serde(default)]
    sources: FileSources,
}

#[derive(Debug, Default, Deserialize)]
struct FileSources {
    #[serde(default)]
    usajobs: SourceSection,
    #[serde(default)]
    jobicy: SourceSection,
    #[serde(default)]
    remoteboard: SourceSection,
}

impl AppConfig {
    /// Parse TOML text (without env resolution).
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let file: FileConfig = toml::from_str(s).context("parsing sources config")?;
        Ok(Self {
            aggregator: file.aggregator,
            usajobs: file.sources.usajobs.resolve(SourceConfig::usajobs_default()),
            jobicy: file.sources.jobicy.resolve(SourceConfig::jobicy_default()),
            remoteboard: file
                .sources
                .remoteboard
                .resolve(SourceConfig::remoteboard_default()),
        })
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let mut cfg = Self::from_toml_str(&content)?;
        cfg.apply_env();
        Ok(cfg)
    }

    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            return Self::load_from(&pb);
        }
        let default_p = PathBuf::from(DEFAULT_CONFIG_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        let mut cfg = Self::default();
        cfg.apply_env();
        Ok(cfg)
    }

    /// Resolve "ENV" placeholders and env overrides. A USAJobs source left
    /// without a key is disabled rather than failing every request with 401.
    pub fn apply_env(&mut self) {
        if let Some(secs) = env_u64(ENV_SOURCE_TIMEOUT_SECS) {
            self.aggregator.source_timeout_secs = secs;
        }

        if let Ok(ua) = env::var(ENV_USAJOBS_USER_AGENT) {
            if !ua.trim().is_empty() {
                self.usajobs.user_agent = ua.trim().to_string();
            }
        }

        let wants_env = match self.usajobs.api_key.as_deref() {
            None => true,
            Some(k) => k.trim().eq_ignore_ascii_case("env") || k.trim().is_empty(),
        };
        if wants_env {
            self.usajobs.api_key = env::var(ENV_USAJOBS_API_KEY)
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty());
        }

        if self.usajobs.enabled && self.usajobs.api_key.is_none() {
            warn!(
                source = "usajobs",
                "no API key configured ({ENV_USAJOBS_API_KEY}); disabling source"
            );
            self.usajobs.enabled = false;
        }
    }

    /// Clamp a requested result count into `1..=max_limit`, using the default
    /// when absent.
    pub fn clamp_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.aggregator.default_limit)
            .clamp(1, self.aggregator.max_limit.max(1))
    }
}

fn env_u64(var: &str) -> Option<u64> {
    let raw = env::var(var).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(v) => Some(v),
        Err(e) => {
            warn!("Invalid value '{}' for {}: {}. Ignoring.", raw, var, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn sections_override_selected_fields() {
        let toml = r#"
            [aggregator]
            source_timeout_secs = 3
            max_limit = 40

            [sources.jobicy]
            enabled = false

            [sources.remoteboard]
            base_url = "http://localhost:9999/jobs"
            ttl_secs = 60
        "#;
        let cfg = AppConfig::from_toml_str(toml).unwrap();
        assert_eq!(cfg.aggregator.source_timeout_secs, 3);
        assert_eq!(cfg.aggregator.max_limit, 40);
        assert_eq!(cfg.aggregator.default_limit, 24);
        assert!(!cfg.jobicy.enabled);
        assert_eq!(cfg.remoteboard.base_url, "http://localhost:9999/jobs");
        assert_eq!(cfg.remoteboard.ttl_secs, 60);
        assert_eq!(cfg.usajobs, SourceConfig::usajobs_default());
    }

    #[test]
    fn invalid_toml_is_an_error() {
        assert!(AppConfig::from_toml_str("[aggregator\nmax_limit = ").is_err());
    }

    #[test]
    fn clamp_limit_respects_bounds() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.clamp_limit(None), 24);
        assert_eq!(cfg.clamp_limit(Some(0)), 1);
        assert_eq!(cfg.clamp_limit(Some(500)), 60);
        assert_eq!(cfg.clamp_limit(Some(10)), 10);
    }

    #[serial_test::serial]
    #[test]
    fn env_key_enables_usajobs_and_missing_key_disables_it() {
        env::remove_var(ENV_USAJOBS_API_KEY);
        let mut cfg = AppConfig::default();
        cfg.apply_env();
        assert!(!cfg.usajobs.enabled);
        assert_eq!(cfg.usajobs.api_key, None);

        env::set_var(ENV_USAJOBS_API_KEY, "  k-123  ");
        env::set_var(ENV_USAJOBS_USER_AGENT, "ops@example.org");
        let mut cfg = AppConfig::default();
        cfg.apply_env();
        assert!(cfg.usajobs.enabled);
        assert_eq!(cfg.usajobs.api_key.as_deref(), Some("k-123"));
        assert_eq!(cfg.usajobs.user_agent, "ops@example.org");

        env::remove_var(ENV_USAJOBS_API_KEY);
        env::remove_var(ENV_USAJOBS_USER_AGENT);
    }

    #[serial_test::serial]
    #[test]
    fn literal_key_in_file_is_kept() {
        env::remove_var(ENV_USAJOBS_API_KEY);
        let cfg_text = r#"
            [sources.usajobs]
            api_key = "from-file"
        "#;
        let mut cfg = AppConfig::from_toml_str(cfg_text).unwrap();
        cfg.apply_env();
        assert!(cfg.usajobs.enabled);
        assert_eq!(cfg.usajobs.api_key.as_deref(), Some("from-file"));
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_path_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        // No file in the temp CWD -> defaults
        let v = AppConfig::load_default().unwrap();
        assert_eq!(v.aggregator, AggregatorConfig::default());

        // Env path wins
        let p = tmp.path().join("custom.toml");
        fs::write(&p, "[aggregator]\ndefault_limit = 12\n").unwrap();
        env::set_var(ENV_CONFIG_PATH, p.display().to_string());
        let v2 = AppConfig::load_default().unwrap();
        assert_eq!(v2.aggregator.default_limit, 12);

        // Env path that does not exist is an error
        env::set_var(ENV_CONFIG_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(AppConfig::load_default().is_err());
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
