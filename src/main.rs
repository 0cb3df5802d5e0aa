//! Job aggregation service: binary entrypoint.
//! Boots the Axum HTTP server with the combined-search API and `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use remote_jobs_aggregator::metrics::Metrics;
use remote_jobs_aggregator::{create_router, Aggregator, AppConfig, AppState};

/// Structured logs; `LOG_FORMAT=json` switches to JSON lines.
fn enable_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("remote_jobs_aggregator=info,warn"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    // try_init: Shuttle may already have installed a global subscriber
    let _ = if json {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer().compact()).try_init()
    };
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    enable_tracing();

    let config = AppConfig::load_default().context("loading job source config")?;
    let aggregator = Aggregator::from_config(&config).context("building job source clients")?;
    let enabled = aggregator.source_tags().len();

    let state = AppState::new(Arc::new(aggregator), Arc::new(config));
    let mut router = create_router(state);

    match Metrics::init(enabled) {
        Ok(metrics) => router = router.merge(metrics.router()),
        Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
    }

    Ok(router.into())
}
