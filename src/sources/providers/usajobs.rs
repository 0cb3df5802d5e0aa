//! USAJobs search API client (government job board).
//!
//! Auth is header based (`Authorization-Key`, plus `Host` and a `User-Agent`
//! that identifies the caller). The upstream payload is deeply nested; it is
//! flattened into [`UsaJob`] records right after parsing.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, HOST, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SourceConfig;
use crate::sources::cache::ResponseCache;
use crate::sources::error::SourceError;
use crate::sources::types::{JobSource, SourceRequest, SourceResponse, SourceTag};
use crate::sources::{
    build_http_client, cached_fetch, flexible_f64, get_json, is_truthy, null_as_default,
    record_failure, string_or_number,
};

const TAG: SourceTag = SourceTag::UsaJobs;

/// Upstream page size cap.
pub const MAX_RESULTS_PER_PAGE: u32 = 500;
pub const DEFAULT_RESULTS_PER_PAGE: u32 = 50;
/// OPM series 2210, Information Technology Management.
pub const TECH_CATEGORY_CODE: &str = "2210";

/// Query parameters, serialized with USAJobs' PascalCase names. Absent fields
/// are left out of both the query string and the cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct UsaJobsParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_category_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remuneration_minimum_amount: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remuneration_maximum_amount: Option<u32>,
    /// Only postings from the last N days.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_posted: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results_per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_indicator: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_direction: Option<String>,
}

/// Flattened USAJobs posting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsaJob {
    pub id: String,
    pub title: String,
    pub organization: String,
    pub department: String,
    pub location: String,
    pub apply_url: String,
    pub position_url: String,
    pub categories: Vec<String>,
    pub schedules: Vec<String>,
    pub salary_min: Option<f64>,
    pub salary_max: Option<f64>,
    /// "PA" (per annum), "PH" (per hour), ...
    pub rate_interval: Option<String>,
    pub posted: String,
    pub summary: String,
    pub pay_plan: Option<String>,
    pub low_grade: Option<String>,
    pub high_grade: Option<String>,
    pub remote: bool,
    pub telework_eligible: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UsaJobsResponse {
    pub jobs: Vec<UsaJob>,
    pub count: u64,
}

impl UsaJobsResponse {
    /// Parse a raw USAJobs body into flat records.
    pub fn from_json(body: &str) -> Result<Self, serde_json::Error> {
        let env: RawEnvelope = serde_json::from_str(body)?;
        Ok(env.into())
    }
}

/* ----------------------------
Raw upstream shape
---------------------------- */

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawEnvelope {
    #[serde(default, deserialize_with = "null_as_default")]
    search_result: RawSearchResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawSearchResult {
    #[serde(default, deserialize_with = "null_as_default")]
    search_result_count_all: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    search_result_items: Vec<RawItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawItem {
    #[serde(default, deserialize_with = "string_or_number")]
    matched_object_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    matched_object_descriptor: RawDescriptor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDescriptor {
    #[serde(rename = "PositionID", default, deserialize_with = "string_or_number")]
    position_id: String,
    #[serde(default)]
    position_title: Option<String>,
    #[serde(rename = "PositionURI", default)]
    position_uri: Option<String>,
    #[serde(rename = "ApplyURI", default, deserialize_with = "null_as_default")]
    apply_uri: Vec<String>,
    #[serde(default)]
    position_location_display: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    position_location: Vec<RawLocation>,
    #[serde(default)]
    organization_name: Option<String>,
    #[serde(default)]
    department_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    job_category: Vec<RawNamed>,
    #[serde(default, deserialize_with = "null_as_default")]
    job_grade: Vec<RawNamed>,
    #[serde(default, deserialize_with = "null_as_default")]
    position_schedule: Vec<RawNamed>,
    #[serde(default)]
    qualification_summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    position_remuneration: Vec<RawRemuneration>,
    #[serde(default)]
    publication_start_date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    user_area: RawUserArea,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawLocation {
    #[serde(default)]
    location_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawNamed {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawRemuneration {
    #[serde(default, deserialize_with = "flexible_f64")]
    minimum_range: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    maximum_range: Option<f64>,
    #[serde(default)]
    rate_interval_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawUserArea {
    #[serde(default, deserialize_with = "null_as_default")]
    details: RawDetails,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RawDetails {
    #[serde(default)]
    job_summary: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    low_grade: Option<String>,
    #[serde(default, deserialize_with = "flexible_string")]
    high_grade: Option<String>,
    // bool upstream in some records, "true"/"false" strings in others
    #[serde(default)]
    remote_indicator: Option<Value>,
    #[serde(default)]
    telework_eligible: Option<Value>,
}

fn flexible_string<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = string_or_number(d)?;
    Ok(if s.trim().is_empty() { None } else { Some(s) })
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl From<RawEnvelope> for UsaJobsResponse {
    fn from(env: RawEnvelope) -> Self {
        let sr = env.search_result;
        let jobs: Vec<UsaJob> = sr.search_result_items.into_iter().map(UsaJob::from).collect();
        let count = if sr.search_result_count_all > 0 {
            sr.search_result_count_all
        } else {
            jobs.len() as u64
        };
        Self { jobs, count }
    }
}

impl From<RawItem> for UsaJob {
    fn from(item: RawItem) -> Self {
        let d = item.matched_object_descriptor;
        let details = d.user_area.details;

        let id = if item.matched_object_id.is_empty() {
            d.position_id.clone()
        } else {
            item.matched_object_id
        };

        let position_url = d.position_uri.unwrap_or_default();
        let apply_url = d
            .apply_uri
            .into_iter()
            .find(|u| !u.trim().is_empty())
            .unwrap_or_else(|| position_url.clone());

        let location = non_empty(d.position_location_display).unwrap_or_else(|| {
            d.position_location
                .into_iter()
                .filter_map(|l| non_empty(l.location_name))
                .collect::<Vec<_>>()
                .join("; ")
        });

        let pay = d.position_remuneration.into_iter().next().unwrap_or_default();

        Self {
            id,
            title: d.position_title.unwrap_or_default(),
            organization: d.organization_name.unwrap_or_default(),
            department: d.department_name.unwrap_or_default(),
            location,
            apply_url,
            position_url,
            categories: d.job_category.into_iter().filter_map(|c| non_empty(c.name)).collect(),
            schedules: d
                .position_schedule
                .into_iter()
                .filter_map(|s| non_empty(s.name))
                .collect(),
            salary_min: pay.minimum_range,
            salary_max: pay.maximum_range,
            rate_interval: non_empty(pay.rate_interval_code),
            posted: d.publication_start_date.unwrap_or_default(),
            summary: non_empty(details.job_summary)
                .or_else(|| non_empty(d.qualification_summary))
                .unwrap_or_default(),
            pay_plan: d.job_grade.into_iter().find_map(|g| non_empty(g.code)),
            low_grade: details.low_grade,
            high_grade: details.high_grade,
            remote: is_truthy(details.remote_indicator.as_ref()),
            telework_eligible: is_truthy(details.telework_eligible.as_ref()),
        }
    }
}

/* ----------------------------
Client
---------------------------- */

pub struct UsaJobsClient {
    http: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    timeout: Duration,
    cache: ResponseCache<UsaJobsResponse>,
}

impl UsaJobsClient {
    pub fn new(cfg: &SourceConfig) -> Result<Self> {
        let api_key = cfg
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("USAJobs requires an api_key"))?;

        let url = reqwest::Url::parse(&cfg.base_url)
            .with_context(|| format!("invalid USAJobs base_url {}", cfg.base_url))?;
        let host = match (url.host_str(), url.port()) {
            (Some(h), Some(p)) => format!("{h}:{p}"),
            (Some(h), None) => h.to_string(),
            _ => return Err(anyhow!("USAJobs base_url has no host")),
        };

        let mut headers = HeaderMap::new();
        headers.insert(HOST, HeaderValue::from_str(&host)?);
        headers.insert(USER_AGENT, HeaderValue::from_str(&cfg.user_agent)?);
        headers.insert(
            HeaderName::from_static("authorization-key"),
            HeaderValue::from_str(api_key)?,
        );

        Ok(Self {
            http: build_http_client(cfg)?,
            base_url: cfg.base_url.clone(),
            headers,
            timeout: cfg.timeout(),
            cache: ResponseCache::new(cfg.ttl()),
        })
    }

    /// Cached search; upstream failures are returned to the caller.
    pub async fn try_search(&self, params: &UsaJobsParams) -> Result<UsaJobsResponse, SourceError> {
        cached_fetch(TAG, &self.cache, params, move || async move {
            let env: RawEnvelope = get_json(
                &self.http,
                TAG,
                &self.base_url,
                params,
                self.headers.clone(),
                self.timeout,
            )
            .await?;
            let resp = UsaJobsResponse::from(env);
            tracing::info!(source = TAG.as_str(), jobs = resp.jobs.len(), total = resp.count, "fetched");
            Ok(resp)
        })
        .await
    }

    /// Cached search that degrades to an empty response on any failure.
    pub async fn search(&self, params: &UsaJobsParams) -> UsaJobsResponse {
        match self.try_search(params).await {
            Ok(r) => r,
            Err(e) => {
                record_failure(&e);
                UsaJobsResponse::default()
            }
        }
    }

    pub async fn remote_jobs(&self, keyword: Option<&str>) -> UsaJobsResponse {
        self.search(&Self::remote_preset(keyword)).await
    }

    pub async fn tech_jobs(&self) -> UsaJobsResponse {
        self.search(&Self::tech_preset(DEFAULT_RESULTS_PER_PAGE)).await
    }

    pub async fn jobs_by_location(&self, location: &str) -> UsaJobsResponse {
        self.search(&UsaJobsParams {
            location_name: Some(location.to_string()),
            results_per_page: Some(DEFAULT_RESULTS_PER_PAGE),
            ..Default::default()
        })
        .await
    }

    pub async fn jobs_by_category(&self, category_code: &str) -> UsaJobsResponse {
        self.search(&UsaJobsParams {
            job_category_code: Some(category_code.to_string()),
            results_per_page: Some(DEFAULT_RESULTS_PER_PAGE),
            ..Default::default()
        })
        .await
    }

    pub async fn high_paying_jobs(&self, min_salary: u32) -> UsaJobsResponse {
        self.search(&UsaJobsParams {
            remuneration_minimum_amount: Some(min_salary),
            results_per_page: Some(DEFAULT_RESULTS_PER_PAGE),
            sort_field: Some("Salary".to_string()),
            sort_direction: Some("Desc".to_string()),
            ..Default::default()
        })
        .await
    }

    pub async fn recent_jobs(&self, days: u32) -> UsaJobsResponse {
        self.search(&UsaJobsParams {
            date_posted: Some(days),
            results_per_page: Some(DEFAULT_RESULTS_PER_PAGE),
            ..Default::default()
        })
        .await
    }

    pub fn remote_preset(keyword: Option<&str>) -> UsaJobsParams {
        UsaJobsParams {
            keyword: keyword.map(str::to_string),
            remote_indicator: Some(true),
            results_per_page: Some(DEFAULT_RESULTS_PER_PAGE),
            ..Default::default()
        }
    }

    pub fn tech_preset(results: u32) -> UsaJobsParams {
        UsaJobsParams {
            job_category_code: Some(TECH_CATEGORY_CODE.to_string()),
            results_per_page: Some(results.min(MAX_RESULTS_PER_PAGE)),
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

#[async_trait]
impl JobSource for UsaJobsClient {
    fn tag(&self) -> SourceTag {
        TAG
    }

    async fn fetch(&self, request: &SourceRequest) -> Result<SourceResponse, SourceError> {
        match request {
            SourceRequest::UsaJobs(p) => self.try_search(p).await.map(SourceResponse::UsaJobs),
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
    use serde_json::json;

    fn body(details: Value) -> String {
        json!({
            "SearchResult": {
                "SearchResultCount": 1,
                "SearchResultCountAll": 1,
                "SearchResultItems": [{
                    "MatchedObjectId": "12345",
                    "MatchedObjectDescriptor": {
                        "PositionID": "IT-2024-01",
                        "PositionTitle": "IT Specialist",
                        "PositionURI": "https://www.usajobs.gov/job/12345",
                        "ApplyURI": ["https://www.usajobs.gov/job/12345/apply"],
                        "PositionLocationDisplay": "Washington, DC",
                        "OrganizationName": "Office of Personnel Management",
                        "DepartmentName": "Office of Personnel Management",
                        "JobCategory": [{ "Name": "Information Technology Management", "Code": "2210" }],
                        "JobGrade": [{ "Code": "GS" }],
                        "PositionSchedule": [{ "Name": "Full-time", "Code": "1" }],
                        "PositionRemuneration": [{
                            "MinimumRange": "80000.0",
                            "MaximumRange": "120000.0",
                            "RateIntervalCode": "PA"
                        }],
                        "PublicationStartDate": "2024-03-01T00:00:00.0000",
                        "UserArea": { "Details": details }
                    }
                }]
            }
        })
        .to_string()
    }

    #[test]
    fn nested_item_is_flattened() {
        let r = UsaJobsResponse::from_json(&body(json!({
            "JobSummary": "Manage systems.",
            "LowGrade": "12",
            "HighGrade": "13",
            "RemoteIndicator": true,
            "TeleworkEligible": "true"
        })))
        .unwrap();
        assert_eq!(r.count, 1);
        let j = &r.jobs[0];
        assert_eq!(j.id, "12345");
        assert_eq!(j.title, "IT Specialist");
        assert_eq!(j.apply_url, "https://www.usajobs.gov/job/12345/apply");
        assert_eq!(j.salary_min, Some(80_000.0));
        assert_eq!(j.salary_max, Some(120_000.0));
        assert_eq!(j.rate_interval.as_deref(), Some("PA"));
        assert_eq!(j.categories, vec!["Information Technology Management".to_string()]);
        assert_eq!(j.pay_plan.as_deref(), Some("GS"));
        assert_eq!(j.low_grade.as_deref(), Some("12"));
        assert!(j.remote);
        assert!(j.telework_eligible);
    }

    #[test]
    fn string_false_and_missing_flags_are_not_remote() {
        let r = UsaJobsResponse::from_json(&body(json!({
            "RemoteIndicator": "false"
        })))
        .unwrap();
        assert!(!r.jobs[0].remote);
        assert!(!r.jobs[0].telework_eligible);
    }

    #[test]
    fn missing_search_result_is_empty() {
        let r = UsaJobsResponse::from_json("{}").unwrap();
        assert!(r.jobs.is_empty());
        assert_eq!(r.count, 0);

        let r = UsaJobsResponse::from_json(r#"{"SearchResult":{"SearchResultItems":null}}"#).unwrap();
        assert!(r.jobs.is_empty());
    }

    #[test]
    fn params_skip_absent_fields() {
        let p = UsaJobsParams {
            keyword: Some("analyst".into()),
            results_per_page: Some(10),
            ..Default::default()
        };
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v, json!({ "Keyword": "analyst", "ResultsPerPage": 10 }));
    }

    #[test]
    fn client_requires_api_key() {
        let mut cfg = SourceConfig::usajobs_default();
        cfg.api_key = None;
        assert!(UsaJobsClient::new(&cfg).is_err());
        cfg.api_key = Some("secret".into());
        assert!(UsaJobsClient::new(&cfg).is_ok());
    }
}
