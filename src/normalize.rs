// src/normalize.rs
//! Maps each provider's raw record into one [`UnifiedJob`].
//!
//! Everything here is pure: same input, same output, no I/O.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::sources::is_truthy;
use crate::sources::providers::jobicy::JobicyJob;
use crate::sources::providers::remoteboard::RemoteBoardJob;
use crate::sources::providers::usajobs::UsaJob;
use crate::sources::types::{SourceResponse, SourceTag};

pub const SUMMARY_MAX_CHARS: usize = 300;

/// Canonical job record returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedJob {
    /// Native id prefixed with the source tag, unique across sources.
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salary: Option<String>,
    #[serde(rename = "type")]
    pub job_type: String,
    pub remote: bool,
    pub apply_url: String,
    pub posted_date: String,
    pub summary: String,
    pub source: SourceTag,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<String>,
}

impl UnifiedJob {
    pub fn posted_at(&self) -> Option<DateTime<Utc>> {
        parse_posted_date(&self.posted_date)
    }
}

/// Normalize every record of a source payload. Exhaustive over sources.
pub fn normalize_response(resp: &SourceResponse) -> Vec<UnifiedJob> {
    match resp {
        SourceResponse::UsaJobs(r) => r.jobs.iter().map(normalize_usajobs).collect(),
        SourceResponse::Jobicy(r) => r.jobs.iter().map(normalize_jobicy).collect(),
        SourceResponse::RemoteBoard(r) => r.jobs.iter().map(normalize_remoteboard).collect(),
    }
}

pub fn normalize_usajobs(job: &UsaJob) -> UnifiedJob {
    let salary = format_salary(&SalaryRange {
        min: job.salary_min,
        max: job.salary_max,
        currency: None,
        period: job
            .rate_interval
            .as_deref()
            .map(SalaryPeriod::from_usajobs_code)
            .unwrap_or_default(),
    });

    let company = first_non_empty(&[&job.organization, &job.department])
        .unwrap_or("U.S. Federal Government")
        .to_string();

    let job_type = if job.schedules.is_empty() {
        "Full-time".to_string()
    } else {
        job.schedules.join(", ")
    };

    let apply_url = first_non_empty(&[&job.apply_url, &job.position_url])
        .unwrap_or_default()
        .to_string();

    UnifiedJob {
        id: prefixed_id(SourceTag::UsaJobs, &job.id),
        title: clean_text(&job.title),
        company,
        location: non_blank(&job.location).unwrap_or("United States").to_string(),
        salary,
        job_type,
        remote: job.remote,
        apply_url,
        posted_date: canonical_date(&job.posted),
        summary: summarize(&job.summary),
        source: SourceTag::UsaJobs,
        logo: None,
        industry: join_display(&job.categories),
        experience: grade_range(
            job.pay_plan.as_deref(),
            job.low_grade.as_deref(),
            job.high_grade.as_deref(),
        ),
    }
}

/// Jobicy only lists remote positions.
pub fn normalize_jobicy(job: &JobicyJob) -> UnifiedJob {
    let salary = format_salary(&SalaryRange {
        min: job.salary_min,
        max: job.salary_max,
        currency: job.salary_currency.clone(),
        period: job
            .salary_period
            .as_deref()
            .map(SalaryPeriod::from_label)
            .unwrap_or_default(),
    });

    let job_type = if job.job_type.is_empty() {
        "Full-time".to_string()
    } else {
        job.job_type
            .iter()
            .map(|t| display_case(t))
            .collect::<Vec<_>>()
            .join(", ")
    };

    UnifiedJob {
        id: prefixed_id(SourceTag::Jobicy, &job.id),
        title: clean_text(&job.job_title),
        company: clean_text(&job.company_name),
        location: job
            .job_geo
            .as_deref()
            .and_then(non_blank)
            .map(clean_text)
            .unwrap_or_else(|| "Anywhere".to_string()),
        salary,
        job_type,
        remote: true,
        apply_url: job.url.clone(),
        posted_date: job.pub_date.as_deref().map(canonical_date).unwrap_or_default(),
        summary: job.job_excerpt.as_deref().map(summarize).unwrap_or_default(),
        source: SourceTag::Jobicy,
        logo: job.company_logo.as_deref().and_then(non_blank).map(str::to_string),
        industry: join_display(&job.job_industry),
        experience: job
            .job_level
            .as_deref()
            .and_then(non_blank)
            .filter(|l| !l.eq_ignore_ascii_case("any"))
            .map(str::to_string),
    }
}

/// RemoteBoard has no reliable remote flag; a location mentioning "remote"
/// counts, as does an explicit `remote: true` when the record carries one.
pub fn normalize_remoteboard(job: &RemoteBoardJob) -> UnifiedJob {
    let location = job.location.as_deref().and_then(non_blank).map(clean_text);
    let remote = is_truthy(job.remote.as_ref())
        || location
            .as_deref()
            .is_some_and(|l| l.to_ascii_lowercase().contains("remote"));

    UnifiedJob {
        id: prefixed_id(SourceTag::RemoteBoard, &job.id),
        title: clean_text(&job.title),
        company: clean_text(&job.company),
        location: location.unwrap_or_else(|| "Not specified".to_string()),
        salary: job.salary.as_deref().and_then(non_blank).map(str::to_string),
        job_type: job
            .job_type
            .as_deref()
            .and_then(non_blank)
            .map(display_case)
            .unwrap_or_else(|| "Full-time".to_string()),
        remote,
        apply_url: job.url.clone(),
        posted_date: job.posted_date.as_deref().map(canonical_date).unwrap_or_default(),
        summary: job.description.as_deref().map(summarize).unwrap_or_default(),
        source: SourceTag::RemoteBoard,
        logo: job.company_logo.as_deref().and_then(non_blank).map(str::to_string),
        industry: job.category.as_deref().and_then(non_blank).map(clean_text),
        experience: job
            .experience_level
            .as_deref()
            .and_then(non_blank)
            .map(str::to_string),
    }
}

pub fn prefixed_id(tag: SourceTag, native: &str) -> String {
    format!("{}{}", tag.id_prefix(), native.trim())
}

/* ----------------------------
Salary
---------------------------- */

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SalaryPeriod {
    #[default]
    Yearly,
    Monthly,
    Biweekly,
    Weekly,
    Daily,
    Hourly,
}

impl SalaryPeriod {
    /// USAJobs `RateIntervalCode`: PA, PM, BW, PW, PD, PH. Unknown codes are
    /// treated as annual.
    pub fn from_usajobs_code(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "PM" => SalaryPeriod::Monthly,
            "BW" => SalaryPeriod::Biweekly,
            "PW" => SalaryPeriod::Weekly,
            "PD" => SalaryPeriod::Daily,
            "PH" => SalaryPeriod::Hourly,
            _ => SalaryPeriod::Yearly,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "monthly" | "month" => SalaryPeriod::Monthly,
            "biweekly" => SalaryPeriod::Biweekly,
            "weekly" | "week" => SalaryPeriod::Weekly,
            "daily" | "day" => SalaryPeriod::Daily,
            "hourly" | "hour" => SalaryPeriod::Hourly,
            _ => SalaryPeriod::Yearly,
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            SalaryPeriod::Yearly => "",
            SalaryPeriod::Monthly => "/mo",
            SalaryPeriod::Biweekly => "/2wk",
            SalaryPeriod::Weekly => "/wk",
            SalaryPeriod::Daily => "/day",
            SalaryPeriod::Hourly => "/hr",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SalaryRange {
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// ISO code; `None` means USD.
    pub currency: Option<String>,
    pub period: SalaryPeriod,
}

impl SalaryRange {
    pub fn usd(min: Option<f64>, max: Option<f64>) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }
}

/// "$80,000 - $120,000", "$80,000+", "Up to $120,000", or `None` when no
/// usable figure exists. Zero, negative and non-finite values count as absent.
pub fn format_salary(range: &SalaryRange) -> Option<String> {
    let usable = |v: Option<f64>| v.filter(|x| x.is_finite() && *x > 0.0);
    let min = usable(range.min);
    let max = usable(range.max);
    let cur = range.currency.as_deref();
    let suffix = range.period.suffix();

    let body = match (min, max) {
        (Some(lo), Some(hi)) if (hi - lo).abs() < f64::EPSILON => money(lo, cur),
        (Some(lo), Some(hi)) if hi > lo => format!("{} - {}", money(lo, cur), money(hi, cur)),
        // inverted bounds: trust the lower one as a floor
        (Some(lo), Some(_)) => format!("{}+", money(lo, cur)),
        (Some(lo), None) => format!("{}+", money(lo, cur)),
        (None, Some(hi)) => format!("Up to {}", money(hi, cur)),
        (None, None) => return None,
    };
    Some(format!("{body}{suffix}"))
}

fn money(amount: f64, currency: Option<&str>) -> String {
    let digits = format_thousands(amount);
    match currency.map(|c| c.trim().to_ascii_uppercase()) {
        None => format!("${digits}"),
        Some(c) => match c.as_str() {
            "" | "USD" => format!("${digits}"),
            "EUR" => format!("€{digits}"),
            "GBP" => format!("£{digits}"),
            other => format!("{other} {digits}"),
        },
    }
}

/// 80000 -> "80,000"; 25.5 -> "25.50". Whole amounts drop the decimals.
pub fn format_thousands(amount: f64) -> String {
    let cents = (amount * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let raw = whole.to_string();
    let mut grouped = String::with_capacity(raw.len() + raw.len() / 3);
    for (i, ch) in raw.chars().enumerate() {
        if i > 0 && (raw.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if frac == 0 {
        grouped
    } else {
        format!("{grouped}.{frac:02}")
    }
}

/* ----------------------------
Dates
---------------------------- */

/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM:SS[.f]`, `YYYY-MM-DD HH:MM:SS`
/// and bare `YYYY-MM-DD`. Naive values are taken as UTC.
pub fn parse_posted_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
}

/// RFC 3339 (UTC, seconds) when parseable, otherwise the trimmed input.
fn canonical_date(raw: &str) -> String {
    match parse_posted_date(raw) {
        Some(dt) => dt.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => raw.trim().to_string(),
    }
}

/* ----------------------------
Text
---------------------------- */

/// Decode entities, strip tags, fold quotes and whitespace.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace (incl. nbsp)
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"[\s\u{00A0}]+").expect("ws regex"));
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Clean text capped at [`SUMMARY_MAX_CHARS`], ending in "..." when cut.
pub fn summarize(s: &str) -> String {
    let cleaned = clean_text(s);
    if cleaned.chars().count() <= SUMMARY_MAX_CHARS {
        return cleaned;
    }
    let cut: String = cleaned.chars().take(SUMMARY_MAX_CHARS).collect();
    // prefer a word boundary
    // rfind gives a byte offset, so compare against the byte length
    let trimmed = match cut.rfind(' ') {
        Some(i) if i > cut.len() / 2 => &cut[..i],
        _ => cut.as_str(),
    };
    format!("{}...", trimmed.trim_end_matches([',', ';', ':', '.', ' ']))
}

fn non_blank(s: &str) -> Option<&str> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t)
    }
}

fn first_non_empty<'a>(candidates: &[&'a String]) -> Option<&'a str> {
    candidates.iter().find_map(|s| non_blank(s.as_str()))
}

fn join_display(values: &[String]) -> Option<String> {
    let parts: Vec<String> = values
        .iter()
        .filter_map(|v| non_blank(v))
        .map(clean_text)
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

/// "full-time" -> "Full-time"
fn display_case(s: &str) -> String {
    let t = s.trim();
    let mut chars = t.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// "GS-12" or "GS-12 to GS-13"; grade numbers alone when no pay plan.
fn grade_range(plan: Option<&str>, low: Option<&str>, high: Option<&str>) -> Option<String> {
    let fmt = |g: &str| match plan {
        Some(p) => format!("{}-{}", p.trim(), g.trim()),
        None => format!("Grade {}", g.trim()),
    };
    match (low.and_then(non_blank), high.and_then(non_blank)) {
        (Some(l), Some(h)) if l == h => Some(fmt(l)),
        (Some(l), Some(h)) => Some(format!("{} to {}", fmt(l), fmt(h))),
        (Some(g), None) | (None, Some(g)) => Some(fmt(g)),
        (None, None) => None,
    }
}
