//! Pipeline-level error taxonomy.
//!
//! The split the orchestrator cares about: business errors end the job with
//! an explanatory result and are never retried; system faults are eligible
//! for step-level retry; integrity violations mean an upstream contract was
//! broken and must surface without retry. Channel faults never appear here —
//! push is best-effort and handled where it happens.

use thiserror::Error;

use crate::inference::InferenceError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("job not found: {0}")]
    JobNotFound(String),

    #[error("job {job_id} is missing required field: {field}")]
    InvalidJobState { job_id: String, field: &'static str },

    #[error("config not found: {0}")]
    ConfigNotFound(String),

    #[error("integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("store fault: {0}")]
    Store(#[from] StoreError),

    #[error("inference fault: {0}")]
    Inference(#[from] InferenceError),
}

/// How the orchestrator should treat an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Visible to the client as an explanatory outcome; never retried.
    Business,
    /// Transient infrastructure trouble; eligible for step-level retry.
    SystemFault,
    /// Upstream contract breach; surfaced, never retried.
    IntegrityViolation,
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::JobNotFound(_) => ErrorKind::Business,
            // Missing required job fields means intake broke its contract
            Self::InvalidJobState { .. } => ErrorKind::IntegrityViolation,
            // Missing or malformed configuration is an environment problem,
            // not a property of the report being classified
            Self::ConfigNotFound(_) => ErrorKind::SystemFault,
            Self::IntegrityViolation(_) => ErrorKind::IntegrityViolation,
            Self::Store(_) => ErrorKind::SystemFault,
            Self::Inference(_) => ErrorKind::SystemFault,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::SystemFault
    }
}
