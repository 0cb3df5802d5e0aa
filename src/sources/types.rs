// src/sources/types.rs
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::sources::error::SourceError;
use crate::sources::providers::jobicy::{JobicyParams, JobicyResponse};
use crate::sources::providers::remoteboard::{RemoteBoardParams, RemoteBoardResponse};
use crate::sources::providers::usajobs::{UsaJobsParams, UsaJobsResponse};

/// One of the external job-search providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceTag {
    UsaJobs,
    Jobicy,
    RemoteBoard,
}

impl SourceTag {
    pub const ALL: [SourceTag; 3] = [SourceTag::UsaJobs, SourceTag::Jobicy, SourceTag::RemoteBoard];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::UsaJobs => "usajobs",
            SourceTag::Jobicy => "jobicy",
            SourceTag::RemoteBoard => "remoteboard",
        }
    }

    /// Prefix that namespaces native ids so merged results never collide.
    pub fn id_prefix(self) -> &'static str {
        match self {
            SourceTag::UsaJobs => "usa-",
            SourceTag::Jobicy => "jobicy-",
            SourceTag::RemoteBoard => "rb-",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceTag {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "usajobs" | "usa" => Ok(SourceTag::UsaJobs),
            "jobicy" => Ok(SourceTag::Jobicy),
            "remoteboard" | "rb" => Ok(SourceTag::RemoteBoard),
            other => Err(format!("unknown job source '{other}'")),
        }
    }
}

/// Source-specific request, one variant per provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRequest {
    UsaJobs(UsaJobsParams),
    Jobicy(JobicyParams),
    RemoteBoard(RemoteBoardParams),
}

impl SourceRequest {
    pub fn tag(&self) -> SourceTag {
        match self {
            SourceRequest::UsaJobs(_) => SourceTag::UsaJobs,
            SourceRequest::Jobicy(_) => SourceTag::Jobicy,
            SourceRequest::RemoteBoard(_) => SourceTag::RemoteBoard,
        }
    }
}

/// Parsed upstream payload, one variant per provider.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceResponse {
    UsaJobs(UsaJobsResponse),
    Jobicy(JobicyResponse),
    RemoteBoard(RemoteBoardResponse),
}

/// A job provider the aggregator can fan out to.
#[async_trait::async_trait]
pub trait JobSource: Send + Sync {
    fn tag(&self) -> SourceTag;

    /// Run one search. Errors are returned, not swallowed, so the caller can
    /// tell a failed source from a source with zero results.
    async fn fetch(&self, request: &SourceRequest) -> Result<SourceResponse, SourceError>;
}
