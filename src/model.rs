//! Runs-service data model, wire validation, and repository aggregation.

use crate::error::ValidationError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

// ── Shared utility functions ──

/// Format a duration in seconds into a human-readable string (e.g. "2m 5s").
pub fn format_duration(secs: i64) -> String {
    let secs = secs.max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// "3m ago" style age relative to `now`.
pub fn format_age(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(at).num_seconds();
    if secs < 60 {
        "just now".to_string()
    } else {
        let full = format_duration(secs);
        let first = full.split(' ').next().unwrap_or(&full);
        format!("{first} ago")
    }
}

/// Unicode-width-aware truncation with ellipsis.
/// Returns `""` when `max_width` is 0.
pub fn truncate(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthStr;
    if max_width == 0 {
        return String::new();
    }
    if UnicodeWidthStr::width(s) <= max_width {
        s.to_string()
    } else {
        let mut result = String::new();
        let mut width = 0;
        for c in s.chars() {
            let cw = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
            if width + cw + 1 > max_width {
                result.push('\u{2026}');
                break;
            }
            result.push(c);
            width += cw;
        }
        result
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Initializing,
    Processing,
    PostProcess,
    Done,
    Failed,
}

/// Whether a run can still change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunClass {
    Active,
    Terminal,
}

impl RunStatus {
    pub const ALL: [RunStatus; 6] = [
        RunStatus::Queued,
        RunStatus::Initializing,
        RunStatus::Processing,
        RunStatus::PostProcess,
        RunStatus::Done,
        RunStatus::Failed,
    ];

    pub fn class(self) -> RunClass {
        match self {
            RunStatus::Queued
            | RunStatus::Initializing
            | RunStatus::Processing
            | RunStatus::PostProcess => RunClass::Active,
            RunStatus::Done | RunStatus::Failed => RunClass::Terminal,
        }
    }

    pub fn is_active(self) -> bool {
        self.class() == RunClass::Active
    }

    pub fn label(self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Initializing => "initializing",
            RunStatus::Processing => "processing",
            RunStatus::PostProcess => "post-process",
            RunStatus::Done => "done",
            RunStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RunStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        match normalized.as_str() {
            "queued" => Ok(RunStatus::Queued),
            "initializing" => Ok(RunStatus::Initializing),
            "processing" => Ok(RunStatus::Processing),
            "post_process" | "postprocess" => Ok(RunStatus::PostProcess),
            "done" => Ok(RunStatus::Done),
            "failed" => Ok(RunStatus::Failed),
            _ => Err(ValidationError::UnknownStatus(s.to_string())),
        }
    }
}

/// How a run points at its repository. Upstream sends either or both.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RepositoryRef {
    pub name: Option<String>,
    pub id: Option<u64>,
}

impl RepositoryRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            id: None,
        }
    }

    /// Same repository: ids decide when both sides carry one, names otherwise.
    pub fn matches(&self, other: &RepositoryRef) -> bool {
        match (self.id, other.id) {
            (Some(a), Some(b)) => a == b,
            _ => self.name.is_some() && self.name == other.name,
        }
    }
}

impl fmt::Display for RepositoryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.name, self.id) {
            (Some(name), Some(id)) => write!(f, "{name} (#{id})"),
            (Some(name), None) => f.write_str(name),
            (None, Some(id)) => write!(f, "#{id}"),
            (None, None) => f.write_str("?"),
        }
    }
}

/// A run as the dashboard sees it. Replaced wholesale on every load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub id: u64,
    pub title: Option<String>,
    pub status: RunStatus,
    pub repository: RepositoryRef,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub message: Option<String>,
}

impl RunSnapshot {
    pub fn class(&self) -> RunClass {
        self.status.class()
    }

    pub fn display_title(&self) -> String {
        match self.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("Run #{}", self.id),
        }
    }

    pub fn repository_name(&self) -> Option<&str> {
        self.repository.name.as_deref()
    }
}

/// Run as delivered on the wire. Every field is optional so that one bad
/// record can be rejected without failing the whole page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunRecord {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "repository_name")]
    pub repository: Option<String>,
    pub repository_id: Option<u64>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub created_by: Option<String>,
    pub message: Option<String>,
}

impl RunRecord {
    pub fn from_json(value: serde_json::Value) -> Result<Self, ValidationError> {
        serde_json::from_value(value).map_err(|e| ValidationError::Malformed(e.to_string()))
    }
}

fn parse_timestamp(id: u64, field: &'static str, raw: &str) -> Result<DateTime<Utc>, ValidationError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ValidationError::BadTimestamp {
            id,
            field,
            value: raw.to_string(),
        })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<RunRecord> for RunSnapshot {
    type Error = ValidationError;

    fn try_from(record: RunRecord) -> Result<Self, Self::Error> {
        let id = record.id.ok_or(ValidationError::MissingId)?;
        let status: RunStatus = record
            .status
            .as_deref()
            .ok_or(ValidationError::MissingStatus(id))?
            .parse()?;

        let repository = RepositoryRef {
            name: non_empty(record.repository),
            id: record.repository_id,
        };
        if repository.name.is_none() && repository.id.is_none() {
            return Err(ValidationError::MissingRepository(id));
        }

        let created_raw = record.created_at.ok_or_else(|| ValidationError::BadTimestamp {
            id,
            field: "created_at",
            value: String::new(),
        })?;
        let created_at = parse_timestamp(id, "created_at", &created_raw)?;
        let updated_at = match record.updated_at.as_deref() {
            Some(raw) if !raw.is_empty() => parse_timestamp(id, "updated_at", raw)?,
            _ => created_at,
        };

        Ok(RunSnapshot {
            id,
            title: non_empty(record.title),
            status,
            repository,
            created_at,
            updated_at,
            created_by: non_empty(record.created_by),
            message: non_empty(record.message),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(alias = "username")]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRunRequest {
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Run counts per status bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: usize,
    pub initializing: usize,
    pub processing: usize,
    pub post_process: usize,
    pub done: usize,
    pub failed: usize,
}

impl StatusCounts {
    pub fn record(&mut self, status: RunStatus) {
        *self.slot(status) += 1;
    }

    pub fn get(&self, status: RunStatus) -> usize {
        match status {
            RunStatus::Queued => self.queued,
            RunStatus::Initializing => self.initializing,
            RunStatus::Processing => self.processing,
            RunStatus::PostProcess => self.post_process,
            RunStatus::Done => self.done,
            RunStatus::Failed => self.failed,
        }
    }

    fn slot(&mut self, status: RunStatus) -> &mut usize {
        match status {
            RunStatus::Queued => &mut self.queued,
            RunStatus::Initializing => &mut self.initializing,
            RunStatus::Processing => &mut self.processing,
            RunStatus::PostProcess => &mut self.post_process,
            RunStatus::Done => &mut self.done,
            RunStatus::Failed => &mut self.failed,
        }
    }

    pub fn active(&self) -> usize {
        self.queued + self.initializing + self.processing + self.post_process
    }

    pub fn terminal(&self) -> usize {
        self.done + self.failed
    }

    pub fn total(&self) -> usize {
        self.active() + self.terminal()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryOverview {
    pub name: String,
    #[serde(default)]
    pub id: Option<u64>,
    pub counts: StatusCounts,
    pub last_activity: Option<DateTime<Utc>>,
}

impl RepositoryOverview {
    pub fn reference(&self) -> RepositoryRef {
        RepositoryRef {
            name: Some(self.name.clone()),
            id: self.id,
        }
    }
}

/// Match a run's repository reference: by name when exactly one repository
/// carries it, otherwise by numeric id.
pub fn resolve_repository<'a>(
    repositories: &'a [Repository],
    reference: &RepositoryRef,
) -> Option<&'a Repository> {
    if let Some(name) = reference.name.as_deref() {
        let mut by_name = repositories.iter().filter(|r| r.name == name);
        if let (Some(found), None) = (by_name.next(), by_name.next()) {
            return Some(found);
        }
    }
    let id = reference.id?;
    repositories.iter().find(|r| r.id == id)
}

#[derive(Debug, Default)]
pub struct MergeResult {
    pub runs: Vec<RunSnapshot>,
    pub rejected: Vec<ValidationError>,
}

/// Validate wire records and attach each run to a known repository. The
/// repository reference of every accepted run is rewritten to the matched
/// repository's canonical name and id.
pub fn merge_runs(repositories: &[Repository], records: Vec<RunRecord>) -> MergeResult {
    let mut result = MergeResult::default();
    for record in records {
        let run = match RunSnapshot::try_from(record) {
            Ok(run) => run,
            Err(e) => {
                result.rejected.push(e);
                continue;
            }
        };
        match resolve_repository(repositories, &run.repository) {
            Some(repo) => {
                let mut run = run;
                run.repository = RepositoryRef {
                    name: Some(repo.name.clone()),
                    id: Some(repo.id),
                };
                result.runs.push(run);
            }
            None => result.rejected.push(ValidationError::UnmatchedRepository {
                id: run.id,
                reference: run.repository.to_string(),
            }),
        }
    }
    result
}

/// Recompute every repository's aggregate from scratch. Runs are attached
/// with [`resolve_repository`], so repositories sharing a name stay apart.
pub fn build_overviews(repositories: &[Repository], runs: &[RunSnapshot]) -> Vec<RepositoryOverview> {
    let mut by_id: HashMap<u64, RepositoryOverview> = repositories
        .iter()
        .map(|r| {
            (
                r.id,
                RepositoryOverview {
                    name: r.name.clone(),
                    id: Some(r.id),
                    counts: StatusCounts::default(),
                    last_activity: None,
                },
            )
        })
        .collect();

    for run in runs {
        let Some(entry) =
            resolve_repository(repositories, &run.repository).and_then(|r| by_id.get_mut(&r.id))
        else {
            continue;
        };
        entry.counts.record(run.status);
        entry.last_activity = Some(match entry.last_activity {
            Some(prev) => prev.max(run.updated_at),
            None => run.updated_at,
        });
    }

    let mut overviews: Vec<RepositoryOverview> = by_id.into_values().collect();
    overviews.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
    overviews
}

/// Runs belonging to `repository`, newest first.
pub fn runs_of<'a>(
    runs: impl IntoIterator<Item = &'a RunSnapshot>,
    repository: &RepositoryRef,
) -> Vec<RunSnapshot> {
    let mut selected: Vec<RunSnapshot> = runs
        .into_iter()
        .filter(|r| repository.matches(&r.repository))
        .cloned()
        .collect();
    selected.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    selected
}
