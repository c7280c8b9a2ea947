use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Id of a queued build request, known before a build number exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueueId(String);

impl QueueId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for QueueId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for QueueId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Build number within a job (kept as text, the way Jenkins paths use it).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuildNumber(String);

impl BuildNumber {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BuildNumber {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<u64> for BuildNumber {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for BuildNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// CSRF protection header; fetched fresh for every state-changing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrumbToken {
    /// Header name, usually `Jenkins-Crumb`
    pub field: String,
    pub value: String,
}

/// Status of a build, pipeline run or stage as reported by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Success,
    Failure,
    Aborted,
    InProgress,
    Unstable,
    NotExecuted,
    PausedPendingInput,
    /// Anything this client does not recognise yet
    #[default]
    #[serde(other)]
    Unknown,
}

impl RunStatus {
    /// A finished run that did not succeed; later stages will never pass.
    pub fn halts(self) -> bool {
        matches!(self, Self::Failure | Self::Aborted | Self::Unstable)
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
            Self::Aborted => "ABORTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Unstable => "UNSTABLE",
            Self::NotExecuted => "NOT_EXECUTED",
            Self::PausedPendingInput => "PAUSED_PENDING_INPUT",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// A build request waiting for an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueItem {
    pub id: QueueId,
    pub task_name: String,
    pub params: String,
    pub why: Option<String>,
    pub blocked: bool,
    pub stuck: bool,
    /// Milliseconds since the epoch
    pub in_queue_since: i64,
}

impl QueueItem {
    pub fn enqueued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.in_queue_since)
    }
}

/// One commit that went into a build.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet {
    pub commit_id: String,
    /// Milliseconds since the epoch
    pub timestamp: i64,
    pub author: String,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Build {
    pub queue_id: QueueId,
    pub number: BuildNumber,
    pub building: bool,
    /// `None` while the build is still running
    pub result: Option<RunStatus>,
    pub duration: Duration,
    pub display_name: String,
    /// Server order, flattened across change-set groups
    pub change_sets: Vec<ChangeSet>,
}

/// A stage of a pipeline run; identity is `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub start_time_millis: i64,
    #[serde(default)]
    pub duration_millis: i64,
    #[serde(default)]
    pub pause_duration_millis: i64,
}

impl Stage {
    pub fn duration(&self) -> Duration {
        Duration::from_millis(u64::try_from(self.duration_millis).unwrap_or(0))
    }
}

/// Live description of one pipeline build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRun {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: RunStatus,
    #[serde(default)]
    pub start_time_millis: i64,
    #[serde(default)]
    pub end_time_millis: i64,
    #[serde(default)]
    pub duration_millis: i64,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl PipelineRun {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.start_time_millis)
    }

    pub fn stage(&self, id: &str) -> Option<&Stage> {
        self.stages.iter().find(|stage| stage.id == id)
    }
}

/// Parameter options a job offers; every part is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobParameters {
    pub choice_name: Option<String>,
    pub choices: Vec<String>,
    pub branch_name: Option<String>,
    pub branches: Vec<String>,
}

/// A build currently occupying an executor.
#[derive(Debug, Clone, PartialEq)]
pub struct RunningBuild {
    pub job_name: String,
    pub build_number: BuildNumber,
}

/// One progressive-log response.
#[derive(Debug, Clone, PartialEq)]
pub struct LogChunk {
    pub text: String,
    pub more_data: bool,
    /// Offset to resume from; `None` when the server did not report a size
    pub next_offset: Option<u64>,
}
