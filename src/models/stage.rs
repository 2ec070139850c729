//! Wire payloads exchanged with the external pipeline orchestrator.
//!
//! The orchestrator triggers the record-processing stage with a
//! `StageTrigger`, forwards the stage's `StageOutput` to the completion
//! stage, and receives a `CompletionAck` back. These three shapes are the
//! crate's entire outward surface; transport framing lives outside.

use serde::{Deserialize, Serialize};

use super::result::ClassificationResult;

/// Input to the record-processing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageTrigger {
    pub job_id: String,
    /// Orchestrator execution id, recorded on the job and used as the
    /// idempotency key for the started-transition claim.
    pub execution_id: String,
}

/// Output of the record-processing stage / input to the completion stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageOutput {
    pub status_code: u16,
    pub result: ClassificationResult,
    pub job_id: String,
}

/// Final output of the completion stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionAck {
    pub status_code: u16,
    pub message: String,
}
