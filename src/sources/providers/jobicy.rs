// src/sources/providers/jobicy.rs
//! Jobicy remote-jobs feed. Public, unauthenticated, every listing is remote.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::config::SourceConfig;
use crate::sources::cache::ResponseCache;
use crate::sources::error::SourceError;
use crate::sources::types::{JobSource, SourceRequest, SourceResponse, SourceTag};
use crate::sources::{
    build_http_client, cached_fetch, flexible_f64, get_json, null_as_default, record_failure,
    string_list, string_or_number,
};

const TAG: SourceTag = SourceTag::Jobicy;

/// Upstream cap on `count`.
pub const MAX_COUNT: u32 = 100;
pub const DEFAULT_COUNT: u32 = 50;
/// Jobicy's industry slug for software development.
pub const TECH_INDUSTRY: &str = "dev";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct JobicyParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    /// Region slug, e.g. "usa", "canada", "europe".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    /// Free-text tag search.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawJobicyJob")]
pub struct JobicyJob {
    pub id: String,
    pub url: String,
    pub job_title: String,
    pub company_name: String,
    pub company_logo: Option<String>,
    pub job_industry: Vec<String>,
    pub job_type: Vec<String>,
    pub job_geo: Option<String>,
    pub job_level: Option<String>,
    pub job_excerpt: Option<String>,
    pub pub_date: Option<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    pub salary_currency: Option<String>,
    /// "yearly" when absent.
    pub salary_period: Option<String>,
}

/// Wire shape. The feed reports salary bounds as `annualSalaryMin/Max`,
/// re-encoded payloads use `salaryMin/Max`; either may be present, or both.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJobicyJob {
    #[serde(default, deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    job_title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    company_name: String,
    #[serde(default)]
    company_logo: Option<String>,
    #[serde(default, deserialize_with = "string_list")]
    job_industry: Vec<String>,
    #[serde(default, deserialize_with = "string_list")]
    job_type: Vec<String>,
    #[serde(default)]
    job_geo: Option<String>,
    #[serde(default)]
    job_level: Option<String>,
    #[serde(default)]
    job_excerpt: Option<String>,
    #[serde(default)]
    pub_date: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    salary_min: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    annual_salary_min: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    salary_max: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    annual_salary_max: Option<f64>,
    #[serde(default)]
    salary_currency: Option<String>,
    #[serde(default)]
    salary_period: Option<String>,
}

impl From<RawJobicyJob> for JobicyJob {
    fn from(raw: RawJobicyJob) -> Self {
        Self {
            id: raw.id,
            url: raw.url,
            job_title: raw.job_title,
            company_name: raw.company_name,
            company_logo: raw.company_logo,
            job_industry: raw.job_industry,
            job_type: raw.job_type,
            job_geo: raw.job_geo,
            job_level: raw.job_level,
            job_excerpt: raw.job_excerpt,
            pub_date: raw.pub_date,
            salary_min: raw.salary_min.or(raw.annual_salary_min),
            salary_max: raw.salary_max.or(raw.annual_salary_max),
            salary_currency: raw.salary_currency,
            salary_period: raw.salary_period,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawJobicyResponse")]
pub struct JobicyResponse {
    pub jobs: Vec<JobicyJob>,
    pub count: u64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawJobicyResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    jobs: Vec<JobicyJob>,
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    job_count: Option<u64>,
}

impl From<RawJobicyResponse> for JobicyResponse {
    fn from(raw: RawJobicyResponse) -> Self {
        Self {
            jobs: raw.jobs,
            count: raw.count.or(raw.job_count).unwrap_or_default(),
        }
    }
}

impl JobicyResponse {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

pub struct JobicyClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache: ResponseCache<JobicyResponse>,
}

impl JobicyClient {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(cfg)?,
            base_url: cfg.base_url.clone(),
            timeout: cfg.timeout(),
            cache: ResponseCache::new(cfg.ttl()),
        })
    }

    pub async fn try_search(&self, params: &JobicyParams) -> Result<JobicyResponse, SourceError> {
        cached_fetch(TAG, &self.cache, params, move || async move {
            let resp: JobicyResponse = get_json(
                &self.http,
                TAG,
                &self.base_url,
                params,
                HeaderMap::new(),
                self.timeout,
            )
            .await?;
            tracing::info!(source = TAG.as_str(), jobs = resp.jobs.len(), total = resp.count, "fetched");
            Ok(resp)
        })
        .await
    }

    pub async fn search(&self, params: &JobicyParams) -> JobicyResponse {
        match self.try_search(params).await {
            Ok(r) => r,
            Err(e) => {
                record_failure(&e);
                JobicyResponse::default()
            }
        }
    }

    pub async fn remote_jobs(&self, count: u32) -> JobicyResponse {
        self.search(&JobicyParams {
            count: Some(count.min(MAX_COUNT)),
            ..Default::default()
        })
        .await
    }

    pub async fn tech_jobs(&self) -> JobicyResponse {
        self.search(&Self::tech_preset(DEFAULT_COUNT)).await
    }

    pub async fn jobs_by_geo(&self, geo: &str) -> JobicyResponse {
        self.search(&JobicyParams {
            count: Some(DEFAULT_COUNT),
            geo: Some(geo_slug(geo)),
            ..Default::default()
        })
        .await
    }

    pub async fn jobs_by_industry(&self, industry: &str) -> JobicyResponse {
        self.search(&JobicyParams {
            count: Some(DEFAULT_COUNT),
            industry: Some(industry.to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn jobs_by_tag(&self, tag: &str) -> JobicyResponse {
        self.search(&JobicyParams {
            count: Some(DEFAULT_COUNT),
            tag: Some(tag.to_string()),
            ..Default::default()
        })
        .await
    }

    pub fn tech_preset(count: u32) -> JobicyParams {
        JobicyParams {
            count: Some(count.min(MAX_COUNT)),
            industry: Some(TECH_INDUSTRY.to_string()),
            ..Default::default()
        }
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Jobicy expects lowercase, hyphenated region slugs ("United Kingdom" -> "united-kingdom").
pub fn geo_slug(location: &str) -> String {
    location
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_ascii_lowercase()
}

#[async_trait]
impl JobSource for JobicyClient {
    fn tag(&self) -> SourceTag {
        TAG
    }

    async fn fetch(&self, request: &SourceRequest) -> Result<SourceResponse, SourceError> {
        match request {
            SourceRequest::Jobicy(p) => self.try_search(p).await.map(SourceResponse::Jobicy),
            other => Err(SourceError::RequestMismatch {
                tag: TAG,
                got: other.tag(),
            }),
        }
    }
}
