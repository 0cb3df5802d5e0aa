// src/api.rs
use std::fmt;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::CorsLayer;

use crate::aggregate::{Aggregator, CombinedQuery, SearchPreset};
use crate::config::AppConfig;
use crate::sources::types::SourceTag;

/// CDN caching for `/api/jobs`: half an hour fresh, an hour stale-while-revalidate.
pub const JOBS_CACHE_CONTROL: &str = "public, s-maxage=1800, stale-while-revalidate=3600";

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<Aggregator>,
    config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(aggregator: Arc<Aggregator>, config: Arc<AppConfig>) -> Self {
        Self { aggregator, config }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/jobs", get(jobs))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(Debug)]
pub enum ApiError {
    InvalidRequest(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Raw query string. Values stay strings so malformed input gets a JSON 400
/// instead of the extractor's plain-text rejection.
#[derive(Debug, Default, Deserialize)]
struct JobsParams {
    keyword: Option<String>,
    location: Option<String>,
    remote: Option<String>,
    limit: Option<String>,
    #[serde(rename = "type")]
    preset: Option<String>,
    source: Option<String>,
}

fn parse_flag(raw: Option<&str>) -> Result<bool, ApiError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) => match v.as_str() {
            "" | "0" | "false" | "no" | "off" => Ok(false),
            "1" | "true" | "yes" | "on" => Ok(true),
            _ => Err(ApiError::InvalidRequest(format!("remote must be a boolean, got '{v}'"))),
        },
    }
}

fn parse_limit(raw: Option<&str>) -> Result<Option<usize>, ApiError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(v) => v
            .parse::<usize>()
            .map(Some)
            .map_err(|_| ApiError::InvalidRequest(format!("limit must be a positive integer, got '{v}'"))),
    }
}

/// `GET /api/jobs`: `source` bypasses aggregation, `type` selects a preset,
/// otherwise a combined search over the free-form parameters.
async fn jobs(
    State(state): State<AppState>,
    Query(params): Query<JobsParams>,
) -> Result<impl IntoResponse, ApiError> {
    let remote = parse_flag(params.remote.as_deref())?;
    let requested_limit = parse_limit(params.limit.as_deref())?;

    let source = params
        .source
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<SourceTag>().map_err(ApiError::InvalidRequest))
        .transpose()?;
    let preset = params
        .preset
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .map(|s| s.parse::<SearchPreset>().map_err(ApiError::InvalidRequest))
        .transpose()?;

    let mut query = match preset {
        Some(p) => {
            let mut q = p.query();
            q.limit = state.config.clamp_limit(Some(requested_limit.unwrap_or(q.limit)));
            q
        }
        None => CombinedQuery {
            keyword: params.keyword.clone(),
            limit: state.config.clamp_limit(requested_limit),
            ..Default::default()
        },
    };
    query.location = params.location.clone();
    query.remote_only |= remote;

    tracing::debug!(?query, ?source, ?preset, "jobs request");

    let body = match source {
        Some(tag) => state.aggregator.search_source(tag, &query).await,
        None => state.aggregator.search_all(&query).await,
    };

    Ok(([(header::CACHE_CONTROL, JOBS_CACHE_CONTROL)], Json(body)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_parsing_accepts_common_spellings() {
        assert!(!parse_flag(None).unwrap());
        assert!(parse_flag(Some("true")).unwrap());
        assert!(parse_flag(Some("1")).unwrap());
        assert!(parse_flag(Some("Yes")).unwrap());
        assert!(!parse_flag(Some("false")).unwrap());
        assert!(parse_flag(Some("maybe")).is_err());
    }

    #[test]
    fn limit_parsing() {
        assert_eq!(parse_limit(None).unwrap(), None);
        assert_eq!(parse_limit(Some(" ")).unwrap(), None);
        assert_eq!(parse_limit(Some("12")).unwrap(), Some(12));
        assert!(parse_limit(Some("-3")).is_err());
        assert!(parse_limit(Some("ten")).is_err());
    }

    #[test]
    fn api_error_is_json_400() {
        let resp = ApiError::InvalidRequest("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
