//! Job record: one report tracked from submission to terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a job. Transitions are monotone:
/// created → started → processing → {completed, failed}, and the two
/// terminal states accept no further writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Created,
    Started,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Started => "started",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "created" => Some(Self::Created),
            "started" => Some(Self::Started),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Position in the lifecycle; both terminal states share the last rank.
    fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Started => 1,
            Self::Processing => 2,
            Self::Completed | Self::Failed => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether moving to `next` respects monotonicity. Re-applying the
    /// current status is allowed (retried stage invocations); terminal
    /// states accept nothing, including the other terminal state.
    pub fn can_advance_to(&self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Location of a blob in the object store: which store plus the key within it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputLocation {
    pub store_ref: String,
    pub key: String,
}

/// One unit of work tracking a single report.
///
/// Created by the intake side; the pipeline stages only issue guarded
/// updates (claim, progress, finalize) and never delete the record.
/// Institution/config/input are optional in the record because intake is an
/// external collaborator — their absence is detected at processing time and
/// surfaced as a contract violation, not hidden at deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub institution_id: Option<String>,
    pub config_id: Option<String>,
    pub input: Option<InputLocation>,
    pub status: JobStatus,
    pub execution_ref: Option<String>,
    pub result_ref: Option<String>,
    pub connection_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Build a fresh job record with a generated id and `created` status.
    pub fn new(name: &str, config_id: &str, institution_id: &str, input: InputLocation) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            institution_id: Some(institution_id.to_string()),
            config_id: Some(config_id.to_string()),
            input: Some(input),
            status: JobStatus::Created,
            execution_ref: None,
            result_ref: None,
            connection_ref: None,
            created_at: now,
            updated_at: now,
        }
    }
}
