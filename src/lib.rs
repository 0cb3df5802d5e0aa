// src/lib.rs
// Public library surface for the binary, integration tests and the demo.

pub mod aggregate;
pub mod api;
pub mod config;
pub mod metrics;
pub mod normalize;
pub mod sources;

use std::sync::Arc;

use axum::Router;

pub use crate::aggregate::{Aggregator, CombinedQuery, CombinedResponse, SearchPreset};
pub use crate::api::{create_router, AppState};
pub use crate::config::AppConfig;
pub use crate::normalize::UnifiedJob;
pub use crate::sources::types::SourceTag;

/// Build the full HTTP app (without `/metrics`) from a resolved config.
pub fn app(config: AppConfig) -> anyhow::Result<Router> {
    let aggregator = Aggregator::from_config(&config)?;
    Ok(create_router(AppState::new(
        Arc::new(aggregator),
        Arc::new(config),
    )))
}
