// tests/normalize_fixtures.rs
//
// Raw fixture payloads through the per-source normalizers.

use std::collections::HashSet;
use std::fs;

use remote_jobs_aggregator::normalize::{normalize_response, UnifiedJob};
use remote_jobs_aggregator::sources::providers::jobicy::JobicyResponse;
use remote_jobs_aggregator::sources::providers::remoteboard::RemoteBoardResponse;
use remote_jobs_aggregator::sources::providers::usajobs::UsaJobsResponse;
use remote_jobs_aggregator::sources::SourceResponse;
use remote_jobs_aggregator::SourceTag;

fn load(name: &str) -> String {
    fs::read_to_string(format!("tests/fixtures/{name}"))
        .unwrap_or_else(|e| panic!("missing tests/fixtures/{name}: {e}"))
}

fn all_fixtures() -> Vec<SourceResponse> {
    vec![
        SourceResponse::UsaJobs(UsaJobsResponse::from_json(&load("usajobs.json")).unwrap()),
        SourceResponse::Jobicy(JobicyResponse::from_json(&load("jobicy.json")).unwrap()),
        SourceResponse::RemoteBoard(RemoteBoardResponse::from_json(&load("remoteboard.json")).unwrap()),
    ]
}

fn by_id<'a>(jobs: &'a [UnifiedJob], id: &str) -> &'a UnifiedJob {
    jobs.iter()
        .find(|j| j.id == id)
        .unwrap_or_else(|| panic!("no job {id}"))
}

#[test]
fn usajobs_fixture_normalizes() {
    let jobs = normalize_response(&all_fixtures()[0]);
    assert_eq!(jobs.len(), 2);

    let it = by_id(&jobs, "usa-781234500");
    assert_eq!(it.company, "Bureau of the Fiscal Service");
    assert_eq!(it.salary.as_deref(), Some("$99,200 - $128,956"));
    assert_eq!(it.summary, "Develops & maintains payment applications.");
    assert_eq!(it.experience.as_deref(), Some("GS-12 to GS-13"));
    assert!(it.remote);

    let va = by_id(&jobs, "usa-781234777");
    assert_eq!(va.company, "Department of Veterans Affairs");
    assert_eq!(va.salary.as_deref(), Some("$19.50 - $25.35/hr"));
    assert_eq!(va.experience.as_deref(), Some("GS-5"));
    assert!(!va.remote);
}

#[test]
fn jobicy_fixture_normalizes() {
    let jobs = normalize_response(&all_fixtures()[1]);
    let rust = by_id(&jobs, "jobicy-105521");
    assert_eq!(rust.salary.as_deref(), Some("$140,000 - $180,000"));
    assert_eq!(rust.summary, "We build systems & tooling.");
    assert_eq!(rust.industry.as_deref(), Some("Programming, DevOps & Sysadmin"));
    assert_eq!(rust.experience.as_deref(), Some("Senior"));
    assert!(rust.logo.is_some());

    let writer = by_id(&jobs, "jobicy-105400");
    assert_eq!(writer.salary, None);
    assert_eq!(writer.job_type, "Part-time, Contract");
    assert_eq!(writer.industry.as_deref(), Some("Copywriting"));
    assert!(jobs.iter().all(|j| j.remote && j.source == SourceTag::Jobicy));
}

#[test]
fn ids_are_unique_across_sources() {
    let mut seen = HashSet::new();
    for resp in all_fixtures() {
        for job in normalize_response(&resp) {
            assert!(seen.insert(job.id.clone()), "duplicate id {}", job.id);
            assert!(job.id.starts_with(job.source.id_prefix()));
        }
    }
    assert_eq!(seen.len(), 6);
}

#[test]
fn normalizing_twice_is_identical() {
    for resp in all_fixtures() {
        assert_eq!(normalize_response(&resp), normalize_response(&resp));
    }
}
