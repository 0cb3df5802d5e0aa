// src/sources/mod.rs
pub mod cache;
pub mod error;
pub mod providers;
pub mod types;

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use once_cell::sync::OnceCell;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::config::SourceConfig;
use crate::sources::cache::{cache_key, ResponseCache};
use crate::sources::error::SourceError;
use crate::sources::types::SourceTag;

pub use crate::sources::providers::jobicy::JobicyClient;
pub use crate::sources::providers::remoteboard::RemoteBoardClient;
pub use crate::sources::providers::usajobs::UsaJobsClient;
pub use crate::sources::types::{JobSource, SourceRequest, SourceResponse};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "jobs_source_requests_total",
            "Upstream HTTP requests issued per source."
        );
        describe_counter!(
            "jobs_source_cache_hits_total",
            "Searches answered from the per-source cache."
        );
        describe_counter!(
            "jobs_source_cache_misses_total",
            "Searches that required an upstream call."
        );
        describe_counter!(
            "jobs_source_errors_total",
            "Upstream failures by source and kind."
        );
        describe_histogram!(
            "jobs_source_fetch_ms",
            "Upstream request + parse time in milliseconds."
        );
    });
}

/// Build the HTTP client a source uses: per-source timeout and descriptive UA.
pub(crate) fn build_http_client(cfg: &SourceConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .connect_timeout(cfg.timeout().min(Duration::from_secs(4)))
        .timeout(cfg.timeout())
        .build()
        .context("building reqwest client")
}

/// Answer from cache when fresh, otherwise run `fetch` and remember the result.
pub(crate) async fn cached_fetch<P, R, F, Fut>(
    tag: SourceTag,
    cache: &ResponseCache<R>,
    params: &P,
    fetch: F,
) -> Result<R, SourceError>
where
    P: Serialize,
    R: Clone,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<R, SourceError>>,
{
    ensure_metrics_described();
    let key = cache_key(params);
    if let Some(hit) = cache.get(&key) {
        counter!("jobs_source_cache_hits_total", "source" => tag.as_str()).increment(1);
        tracing::debug!(source = tag.as_str(), %key, "cache hit");
        return Ok(hit);
    }
    counter!("jobs_source_cache_misses_total", "source" => tag.as_str()).increment(1);

    let fresh = fetch().await?;
    cache.insert(key, fresh.clone());
    Ok(fresh)
}

/// GET `url` with `query` serialized into the query string and decode the JSON body.
pub(crate) async fn get_json<Q, T>(
    http: &reqwest::Client,
    tag: SourceTag,
    url: &str,
    query: &Q,
    headers: HeaderMap,
    timeout: Duration,
) -> Result<T, SourceError>
where
    Q: Serialize + ?Sized,
    T: DeserializeOwned,
{
    let t0 = Instant::now();
    counter!("jobs_source_requests_total", "source" => tag.as_str()).increment(1);

    let resp = http
        .get(url)
        .headers(headers)
        .query(query)
        .send()
        .await
        .map_err(|e| SourceError::from_reqwest(tag, e, timeout))?;

    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            tag,
            status: status.as_u16(),
        });
    }

    let body = resp
        .bytes()
        .await
        .map_err(|e| SourceError::from_reqwest(tag, e, timeout))?;
    let parsed = serde_json::from_slice::<T>(&body).map_err(|e| SourceError::Decode {
        tag,
        message: e.to_string(),
    })?;

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("jobs_source_fetch_ms", "source" => tag.as_str()).record(ms);
    Ok(parsed)
}

/// Log and count a failed search. Used by the infallible `search` wrappers and
/// by the aggregator.
pub fn record_failure(err: &SourceError) {
    ensure_metrics_described();
    let tag = err.tag();
    counter!(
        "jobs_source_errors_total",
        "source" => tag.as_str(),
        "kind" => err.kind()
    )
    .increment(1);
    match err {
        SourceError::Status { status, .. } => {
            tracing::warn!(source = tag.as_str(), status = *status, "upstream http error")
        }
        other => tracing::warn!(source = tag.as_str(), kind = other.kind(), error = %other, "upstream failure"),
    }
}

/* ----------------------------
Tolerant field decoders shared by the providers
---------------------------- */

/// `null` (or a missing field, with `#[serde(default)]`) becomes `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// Ids arrive as numbers from some feeds and strings from others.
pub(crate) fn string_or_number<'de, D>(d: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Numeric field that may be a JSON number, a numeric string ("80000.00",
/// "80,000"), empty, or null.
pub(crate) fn flexible_f64<'de, D>(d: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse::<f64>().ok(),
        _ => None,
    })
}

/// Accept either `["a", "b"]` or `"a"`.
pub(crate) fn string_list<'de, D>(d: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(d)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        Value::String(s) if !s.trim().is_empty() => vec![s],
        _ => Vec::new(),
    })
}

/// First candidate that is present and not blank. Fields a feed spells two
/// ways are decoded as separate fields and coalesced here, since a serde alias
/// fails on a record that carries both spellings.
pub(crate) fn first_filled<const N: usize>(candidates: [Option<String>; N]) -> Option<String> {
    candidates.into_iter().flatten().find(|s| !s.trim().is_empty())
}

/// Upstream flags are typed inconsistently: `true` and `"true"` both count.
pub fn is_truthy(v: Option<&Value>) -> bool {
    match v {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}
