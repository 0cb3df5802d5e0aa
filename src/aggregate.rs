// src/aggregate.rs
//! Combined search: fan out to every enabled source, normalize, merge.
//!
//! The join is settle-all. A source that errors or exceeds the per-source
//! timeout contributes nothing and is reported in `failed_sources`; the
//! response only carries `error` when no source produced an answer.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::future::join_all;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::normalize::{normalize_response, UnifiedJob};
use crate::sources::error::SourceError;
use crate::sources::providers::jobicy::{self, geo_slug, JobicyParams};
use crate::sources::providers::remoteboard;
use crate::sources::providers::usajobs::{self, UsaJobsParams};
use crate::sources::types::SourceTag;
use crate::sources::{
    record_failure, JobSource, JobicyClient, RemoteBoardClient, SourceRequest, SourceResponse,
    UsaJobsClient,
};

pub const ALL_SOURCES_FAILED: &str = "All job sources are currently unavailable";

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "jobs_combined_searches_total",
            "Combined searches served, by mode (all|source)."
        );
        describe_counter!(
            "jobs_combined_all_failed_total",
            "Combined searches where every queried source failed."
        );
        describe_gauge!(
            "jobs_combined_last_total",
            "Number of jobs returned by the most recent combined search."
        );
    });
}

/// Caller-facing query shared by every source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedQuery {
    pub keyword: Option<String>,
    pub location: Option<String>,
    pub remote_only: bool,
    pub limit: usize,
}

impl Default for CombinedQuery {
    fn default() -> Self {
        Self {
            keyword: None,
            location: None,
            remote_only: false,
            limit: 24,
        }
    }
}

impl CombinedQuery {
    pub fn keyword(&self) -> Option<&str> {
        self.keyword.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// Merged result set. Counts are per source, after normalization and before
/// the remote filter and truncation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedResponse {
    pub jobs: Vec<UnifiedJob>,
    pub usajobs_count: usize,
    pub jobicy_count: usize,
    pub remoteboard_count: usize,
    pub total_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed_sources: Vec<SourceTag>,
}

impl CombinedResponse {
    fn set_count(&mut self, tag: SourceTag, n: usize) {
        match tag {
            SourceTag::UsaJobs => self.usajobs_count = n,
            SourceTag::Jobicy => self.jobicy_count = n,
            SourceTag::RemoteBoard => self.remoteboard_count = n,
        }
    }

    pub fn all_failed(failed: Vec<SourceTag>) -> Self {
        Self {
            error: Some(ALL_SOURCES_FAILED.to_string()),
            failed_sources: failed,
            ..Default::default()
        }
    }
}

/* ----------------------------
Presets
---------------------------- */

/// Canned searches selectable through the HTTP `type` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchPreset {
    Tech,
    Remote,
    Design,
    Marketing,
    Writing,
    Data,
    Sales,
    HighPaying,
}

impl SearchPreset {
    pub const ALL: [SearchPreset; 8] = [
        SearchPreset::Tech,
        SearchPreset::Remote,
        SearchPreset::Design,
        SearchPreset::Marketing,
        SearchPreset::Writing,
        SearchPreset::Data,
        SearchPreset::Sales,
        SearchPreset::HighPaying,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchPreset::Tech => "tech",
            SearchPreset::Remote => "remote",
            SearchPreset::Design => "design",
            SearchPreset::Marketing => "marketing",
            SearchPreset::Writing => "writing",
            SearchPreset::Data => "data",
            SearchPreset::Sales => "sales",
            SearchPreset::HighPaying => "high-paying",
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            SearchPreset::Tech => "software engineer",
            SearchPreset::Remote => "remote",
            SearchPreset::Design => "designer",
            SearchPreset::Marketing => "marketing",
            SearchPreset::Writing => "writer",
            SearchPreset::Data => "data analyst",
            SearchPreset::Sales => "sales",
            SearchPreset::HighPaying => "senior",
        }
    }

    pub fn limit(self) -> usize {
        match self {
            SearchPreset::Tech | SearchPreset::Remote | SearchPreset::HighPaying => 60,
            _ => 48,
        }
    }

    pub fn query(self) -> CombinedQuery {
        CombinedQuery {
            keyword: Some(self.keyword().to_string()),
            location: None,
            remote_only: matches!(self, SearchPreset::Remote),
            limit: self.limit(),
        }
    }
}

impl fmt::Display for SearchPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchPreset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tech" => Ok(SearchPreset::Tech),
            "remote" => Ok(SearchPreset::Remote),
            "design" => Ok(SearchPreset::Design),
            "marketing" => Ok(SearchPreset::Marketing),
            "writing" => Ok(SearchPreset::Writing),
            "data" => Ok(SearchPreset::Data),
            "sales" => Ok(SearchPreset::Sales),
            "high-paying" | "high_paying" | "highpaying" => Ok(SearchPreset::HighPaying),
            other => Err(format!("unknown search type '{other}'")),
        }
    }
}

/* ----------------------------
Request planning
---------------------------- */

/// Translate the shared query into one source's parameters. Without a keyword
/// each source falls back to its tech-jobs preset. Upstream page sizes stay
/// fixed so cache keys do not depend on the caller's limit.
pub fn plan_request(tag: SourceTag, query: &CombinedQuery) -> SourceRequest {
    let keyword = query.keyword();
    let location = query.location();

    match tag {
        SourceTag::UsaJobs => {
            let mut p = match keyword {
                Some(k) => UsaJobsParams {
                    keyword: Some(k.to_string()),
                    results_per_page: Some(usajobs::DEFAULT_RESULTS_PER_PAGE),
                    ..Default::default()
                },
                None => UsaJobsClient::tech_preset(usajobs::DEFAULT_RESULTS_PER_PAGE),
            };
            p.location_name = location.map(str::to_string);
            if query.remote_only {
                p.remote_indicator = Some(true);
            }
            SourceRequest::UsaJobs(p)
        }
        SourceTag::Jobicy => {
            let mut p = match keyword {
                Some(k) => JobicyParams {
                    count: Some(jobicy::DEFAULT_COUNT),
                    tag: Some(k.to_string()),
                    ..Default::default()
                },
                None => JobicyClient::tech_preset(jobicy::DEFAULT_COUNT),
            };
            p.geo = location.map(geo_slug);
            SourceRequest::Jobicy(p)
        }
        SourceTag::RemoteBoard => SourceRequest::RemoteBoard(RemoteBoardClient::newest_first(
            Some(keyword.unwrap_or(remoteboard::TECH_QUERY)),
            location,
            remoteboard::DEFAULT_LIMIT,
        )),
    }
}

/// Concatenate, stable-sort newest first (unparseable dates last), drop
/// non-remote jobs when asked, then truncate.
pub fn merge_jobs(pools: Vec<Vec<UnifiedJob>>, remote_only: bool, limit: usize) -> Vec<UnifiedJob> {
    let mut keyed: Vec<_> = pools
        .into_iter()
        .flatten()
        .map(|job| (job.posted_at(), job))
        .collect();
    // None < Some, so a descending compare puts undated jobs at the end
    keyed.sort_by(|a, b| b.0.cmp(&a.0));

    keyed
        .into_iter()
        .map(|(_, job)| job)
        .filter(|job| !remote_only || job.remote)
        .take(limit)
        .collect()
}

/* ----------------------------
Aggregator
---------------------------- */

pub struct Aggregator {
    sources: Vec<Arc<dyn JobSource>>,
    source_timeout: Duration,
}

impl Aggregator {
    pub fn new(sources: Vec<Arc<dyn JobSource>>, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
        }
    }

    /// Build a client for every enabled source in `cfg`.
    pub fn from_config(cfg: &AppConfig) -> Result<Self> {
        let mut sources: Vec<Arc<dyn JobSource>> = Vec::new();
        if cfg.usajobs.enabled {
            sources.push(Arc::new(UsaJobsClient::new(&cfg.usajobs)?));
        }
        if cfg.jobicy.enabled {
            sources.push(Arc::new(JobicyClient::new(&cfg.jobicy)?));
        }
        if cfg.remoteboard.enabled {
            sources.push(Arc::new(RemoteBoardClient::new(&cfg.remoteboard)?));
        }
        if sources.is_empty() {
            warn!("no job sources enabled; every search will report unavailability");
        }
        info!(
            sources = ?sources.iter().map(|s| s.tag().as_str()).collect::<Vec<_>>(),
            timeout_s = cfg.aggregator.source_timeout_secs,
            "aggregator ready"
        );
        Ok(Self::new(sources, cfg.aggregator.source_timeout()))
    }

    pub fn source_tags(&self) -> Vec<SourceTag> {
        self.sources.iter().map(|s| s.tag()).collect()
    }

    pub fn source_timeout(&self) -> Duration {
        self.source_timeout
    }

    /// Query every enabled source concurrently and merge the results.
    pub async fn search_all(&self, query: &CombinedQuery) -> CombinedResponse {
        let settled = self.settle(self.sources.clone(), query).await;
        self.combine("all", settled, query)
    }

    /// Same pipeline restricted to one source.
    pub async fn search_source(&self, tag: SourceTag, query: &CombinedQuery) -> CombinedResponse {
        let selected: Vec<_> = self
            .sources
            .iter()
            .filter(|s| s.tag() == tag)
            .cloned()
            .collect();
        if selected.is_empty() {
            debug!(source = tag.as_str(), "source not enabled");
            ensure_metrics_described();
            counter!("jobs_combined_searches_total", "mode" => "source").increment(1);
            counter!("jobs_combined_all_failed_total").increment(1);
            return CombinedResponse::all_failed(vec![tag]);
        }
        let settled = self.settle(selected, query).await;
        self.combine("source", settled, query)
    }

    pub async fn search_preset(&self, preset: SearchPreset) -> CombinedResponse {
        self.search_all(&preset.query()).await
    }

    pub async fn tech_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::Tech).await
    }

    pub async fn remote_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::Remote).await
    }

    pub async fn design_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::Design).await
    }

    pub async fn marketing_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::Marketing).await
    }

    pub async fn writing_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::Writing).await
    }

    pub async fn data_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::Data).await
    }

    pub async fn sales_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::Sales).await
    }

    pub async fn high_paying_jobs(&self) -> CombinedResponse {
        self.search_preset(SearchPreset::HighPaying).await
    }

    async fn settle(
        &self,
        selected: Vec<Arc<dyn JobSource>>,
        query: &CombinedQuery,
    ) -> Vec<(SourceTag, Result<SourceResponse, SourceError>)> {
        let limit = self.source_timeout;
        let calls = selected.into_iter().map(|src| {
            let tag = src.tag();
            let request = plan_request(tag, query);
            async move {
                let outcome = match tokio::time::timeout(limit, src.fetch(&request)).await {
                    Ok(res) => res,
                    Err(_) => Err(SourceError::Timeout { tag, after: limit }),
                };
                (tag, outcome)
            }
        });
        join_all(calls).await
    }

    fn combine(
        &self,
        mode: &'static str,
        settled: Vec<(SourceTag, Result<SourceResponse, SourceError>)>,
        query: &CombinedQuery,
    ) -> CombinedResponse {
        ensure_metrics_described();
        counter!("jobs_combined_searches_total", "mode" => mode).increment(1);

        let attempted = settled.len();
        let mut out = CombinedResponse::default();
        let mut pools = Vec::with_capacity(attempted);

        for (tag, outcome) in settled {
            match outcome {
                Ok(resp) => {
                    let jobs = normalize_response(&resp);
                    out.set_count(tag, jobs.len());
                    pools.push(jobs);
                }
                Err(e) => {
                    record_failure(&e);
                    out.failed_sources.push(tag);
                }
            }
        }

        if out.failed_sources.len() == attempted {
            counter!("jobs_combined_all_failed_total").increment(1);
            warn!(attempted, "all job sources failed");
            out.error = Some(ALL_SOURCES_FAILED.to_string());
        }

        out.jobs = merge_jobs(pools, query.remote_only, query.limit);
        out.total_count = out.jobs.len();
        gauge!("jobs_combined_last_total").set(out.total_count as f64);

        info!(
            mode,
            usajobs = out.usajobs_count,
            jobicy = out.jobicy_count,
            remoteboard = out.remoteboard_count,
            returned = out.total_count,
            failed = out.failed_sources.len(),
            "combined search"
        );
        out
    }
}
