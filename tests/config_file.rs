// tests/config_file.rs
//
// The shipped config/sources.toml must parse and agree with built-in defaults.

use std::path::Path;

use remote_jobs_aggregator::config::{AppConfig, SourceConfig};

#[test]
fn shipped_config_matches_defaults() {
    let text = std::fs::read_to_string(Path::new("config/sources.toml"))
        .expect("missing config/sources.toml");
    let cfg = AppConfig::from_toml_str(&text).expect("valid TOML");

    assert_eq!(cfg, AppConfig::default());
    assert_eq!(cfg.usajobs.api_key.as_deref(), Some("ENV"));
    assert_eq!(cfg.jobicy, SourceConfig::jobicy_default());
    assert_eq!(cfg.aggregator.max_limit, 60);
}

#[test]
fn disabled_sources_are_not_built() {
    let cfg = AppConfig::from_toml_str(
        r#"
        [sources.usajobs]
        enabled = false
        [sources.remoteboard]
        enabled = false
        "#,
    )
    .unwrap();
    let agg = remote_jobs_aggregator::Aggregator::from_config(&cfg).unwrap();
    assert_eq!(
        agg.source_tags(),
        vec![remote_jobs_aggregator::SourceTag::Jobicy]
    );
}
