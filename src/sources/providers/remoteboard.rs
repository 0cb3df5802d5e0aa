// src/sources/providers/remoteboard.rs
//! RemoteBoard paginated job API. Public, unauthenticated; responses carry
//! `page`, `limit` and `total` alongside the job list.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SourceConfig;
use crate::sources::cache::ResponseCache;
use crate::sources::error::SourceError;
use crate::sources::types::{JobSource, SourceRequest, SourceResponse, SourceTag};
use crate::sources::{
    build_http_client, cached_fetch, first_filled, get_json, null_as_default, record_failure,
    string_or_number,
};

const TAG: SourceTag = SourceTag::RemoteBoard;

pub const MAX_LIMIT: u32 = 100;
pub const DEFAULT_LIMIT: u32 = 50;
pub const TECH_QUERY: &str = "software engineer";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteBoardParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_loc: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// "asc" | "desc"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sorted_by: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "RawRemoteBoardJob")]
pub struct RemoteBoardJob {
    pub id: String,
    pub title: String,
    pub company: String,
    pub company_logo: Option<String>,
    pub location: Option<String>,
    /// Already formatted upstream, e.g. "$90k - $120k".
    pub salary: Option<String>,
    pub job_type: Option<String>,
    pub category: Option<String>,
    pub experience_level: Option<String>,
    pub url: String,
    pub posted_date: Option<String>,
    pub description: Option<String>,
    /// Optional explicit flag; bool or "true".
    pub remote: Option<Value>,
}

/// Wire shape. Older board records use different names for several fields
/// and some records carry both; the preferred name wins when both are filled.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRemoteBoardJob {
    #[serde(default, deserialize_with = "string_or_number")]
    id: String,
    #[serde(default, rename = "_id", deserialize_with = "string_or_number")]
    legacy_id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    company_logo: Option<String>,
    #[serde(default)]
    logo: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    salary: Option<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    experience_level: Option<String>,
    #[serde(default)]
    experience: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    apply_url: Option<String>,
    #[serde(default)]
    posted_date: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    posted_at: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    remote: Option<Value>,
}

impl From<RawRemoteBoardJob> for RemoteBoardJob {
    fn from(raw: RawRemoteBoardJob) -> Self {
        Self {
            id: first_filled([Some(raw.id), Some(raw.legacy_id)]).unwrap_or_default(),
            title: raw.title.unwrap_or_default(),
            company: first_filled([raw.company, raw.company_name]).unwrap_or_default(),
            company_logo: first_filled([raw.company_logo, raw.logo]),
            location: raw.location,
            salary: raw.salary,
            job_type: first_filled([raw.job_type, raw.kind]),
            category: raw.category,
            experience_level: first_filled([raw.experience_level, raw.experience]),
            url: first_filled([raw.url, raw.apply_url]).unwrap_or_default(),
            posted_date: first_filled([raw.posted_date, raw.created_at, raw.posted_at]),
            description: first_filled([raw.description, raw.summary]),
            remote: raw.remote,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemoteBoardResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub jobs: Vec<RemoteBoardJob>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub page: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub limit: u32,
}

impl RemoteBoardResponse {
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(body)
    }
}

pub struct RemoteBoardClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    cache: ResponseCache<RemoteBoardResponse>,
}

impl RemoteBoardClient {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        Ok(Self {
            http: build_http_client(cfg)?,
            base_url: cfg.base_url.clone(),
            timeout: cfg.timeout(),
            cache: ResponseCache::new(cfg.ttl()),
        })
    }

    pub async fn try_search(
        &self,
        params: &RemoteBoardParams,
    ) -> Result<RemoteBoardResponse, SourceError> {
        cached_fetch(TAG, &self.cache, params, move || async move {
            let resp: RemoteBoardResponse = get_json(
                &self.http,
                TAG,
                &self.base_url,
                params,
                HeaderMap::new(),
                self.timeout,
            )
            .await?;
            tracing::info!(
                source = TAG.as_str(),
                jobs = resp.jobs.len(),
                total = resp.total,
                page = resp.page,
                "fetched"
            );
            Ok(resp)
        })
        .await
    }

    pub async fn search(&self, params: &RemoteBoardParams) -> RemoteBoardResponse {
        match self.try_search(params).await {
            Ok(r) => r,
            Err(e) => {
                record_failure(&e);
                RemoteBoardResponse::default()
            }
        }
    }

    pub async fn latest_jobs(&self, limit: u32) -> RemoteBoardResponse {
        self.search(&Self::newest_first(None, None, limit)).await
    }

    pub async fn tech_jobs(&self) -> RemoteBoardResponse {
        self.search(&Self::tech_preset(DEFAULT_LIMIT)).await
    }

    pub async fn jobs_by_location(&self, location: &str) -> RemoteBoardResponse {
        self.search(&Self::newest_first(None, Some(location), DEFAULT_LIMIT))
            .await
    }

    pub async fn search_keyword(&self, keyword: &str) -> RemoteBoardResponse {
        self.search(&Self::newest_first(Some(keyword), None, DEFAULT_LIMIT))
            .await
    }

    /// First page sorted by posting date, newest first.
    pub fn newest_first(q: Option<&str>, location: Option<&str>, limit: u32) -> RemoteBoardParams {
        RemoteBoardParams {
            q: q.map(str::to_string),
            job_loc: location.map(str::to_string),
            page: Some(1),
            limit: Some(limit.min(MAX_LIMIT)),
            sort: Some("desc".to_string()),
            sorted_by: Some("postedDate".to_string()),
        }
    }

    pub fn tech_preset(limit: u32) -> RemoteBoardParams {
        Self::newest_first(Some(TECH_QUERY), None, limit)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }
}

#[async_trait]
impl JobSource for RemoteBoardClient {
    fn tag(&self) -> SourceTag {
        TAG
    }

    async fn fetch(&self, request: &SourceRequest) -> Result<SourceResponse, SourceError> {
        match request {
            SourceRequest::RemoteBoard(p) => {
                self.try_search(p).await.map(SourceResponse::RemoteBoard)
            }
            other => Err(SourceError::RequestMismatch {
                tag: TAG,
                got: other.tag(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_paginated_payload() {
        let body = r#"{
            "jobs": [
                { "id": 7, "title": "Backend Dev", "companyName": "Acme", "location": "Remote - US",
                  "salary": "$100k - $140k", "type": "Contract", "applyUrl": "https://x.test/7",
                  "createdAt": "2024-02-01T00:00:00Z" }
            ],
            "total": 120, "page": 1, "limit": 50
        }"#;
        let r = RemoteBoardResponse::from_json(body).unwrap();
        assert_eq!((r.total, r.page, r.limit), (120, 1, 50));
        let j = &r.jobs[0];
        assert_eq!(j.id, "7");
        assert_eq!(j.company, "Acme");
        assert_eq!(j.job_type.as_deref(), Some("Contract"));
        assert_eq!(j.url, "https://x.test/7");
        assert_eq!(j.posted_date.as_deref(), Some("2024-02-01T00:00:00Z"));
    }

    #[test]
    fn record_with_both_spellings_prefers_current_names() {
        let body = r#"{
            "jobs": [
                { "id": "rb-1", "_id": "legacy-1", "title": "Platform Engineer",
                  "company": "Acme", "companyName": "Acme Corp",
                  "type": "Contract", "jobType": "Full-time",
                  "url": "https://x.test/1", "applyUrl": "https://x.test/apply/1",
                  "createdAt": "2024-01-01T00:00:00Z", "postedDate": "2024-02-01T00:00:00Z",
                  "summary": "short", "description": "long form" },
                { "id": 2, "title": "Data Engineer", "companyName": "Beta" }
            ],
            "total": 2, "page": 1, "limit": 50
        }"#;
        let r = RemoteBoardResponse::from_json(body).unwrap();
        assert_eq!(r.jobs.len(), 2);
        let j = &r.jobs[0];
        assert_eq!(j.id, "rb-1");
        assert_eq!(j.company, "Acme");
        assert_eq!(j.job_type.as_deref(), Some("Full-time"));
        assert_eq!(j.url, "https://x.test/1");
        assert_eq!(j.posted_date.as_deref(), Some("2024-02-01T00:00:00Z"));
        assert_eq!(j.description.as_deref(), Some("long form"));
        assert_eq!(r.jobs[1].company, "Beta");
    }

    #[test]
    fn blank_current_name_falls_back_to_legacy() {
        let j: RemoteBoardJob = serde_json::from_str(
            r#"{ "_id": "9", "company": "", "companyName": "Gamma", "logo": "https://x.test/l.png" }"#,
        )
        .unwrap();
        assert_eq!(j.id, "9");
        assert_eq!(j.company, "Gamma");
        assert_eq!(j.company_logo.as_deref(), Some("https://x.test/l.png"));
    }

    #[test]
    fn serialized_job_decodes_back() {
        let j = RemoteBoardJob {
            id: "3".into(),
            company: "Delta".into(),
            job_type: Some("Part-time".into()),
            ..Default::default()
        };
        let back: RemoteBoardJob = serde_json::from_value(serde_json::to_value(&j).unwrap()).unwrap();
        assert_eq!(back, j);
    }

    #[test]
    fn newest_first_serializes_upstream_names() {
        let p = RemoteBoardClient::newest_first(Some("rust"), Some("Berlin"), 500);
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["q"], "rust");
        assert_eq!(v["jobLoc"], "Berlin");
        assert_eq!(v["limit"], MAX_LIMIT);
        assert_eq!(v["sortedBy"], "postedDate");
    }
}
