//! Runs one combined search from the command line and prints a summary.
//!
//! Usage: `search_demo [keyword] [--remote] [--limit N] [--type PRESET] [--source NAME]`

use remote_jobs_aggregator::{Aggregator, AppConfig, CombinedQuery, SearchPreset, SourceTag};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let mut query = CombinedQuery::default();
    let mut preset: Option<SearchPreset> = None;
    let mut source: Option<SourceTag> = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--remote" => query.remote_only = true,
            "--limit" => {
                let v = args.next().unwrap_or_default();
                query.limit = v.parse()?;
            }
            "--type" => {
                let v = args.next().unwrap_or_default();
                preset = Some(v.parse().map_err(anyhow::Error::msg)?);
            }
            "--source" => {
                let v = args.next().unwrap_or_default();
                source = Some(v.parse().map_err(anyhow::Error::msg)?);
            }
            kw => query.keyword = Some(kw.to_string()),
        }
    }

    let cfg = AppConfig::load_default()?;
    let agg = Aggregator::from_config(&cfg)?;

    let resp = match (source, preset) {
        (Some(tag), _) => agg.search_source(tag, &query).await,
        (None, Some(p)) => agg.search_preset(p).await,
        (None, None) => agg.search_all(&query).await,
    };

    for job in &resp.jobs {
        println!(
            "{:<12} {:<20} {:<45} {:<30} {}",
            job.source.as_str(),
            job.posted_date,
            job.title.chars().take(45).collect::<String>(),
            job.company.chars().take(30).collect::<String>(),
            job.salary.as_deref().unwrap_or("-"),
        );
    }
    println!(
        "usajobs={} jobicy={} remoteboard={} returned={}",
        resp.usajobs_count, resp.jobicy_count, resp.remoteboard_count, resp.total_count
    );
    if let Some(err) = resp.error {
        println!("error: {err}");
    }
    Ok(())
}
