//! Classification result: the single outcome of processing one report.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::job::JobStatus;

/// Exactly one variant is produced per job: a structured output conforming
/// to the institution template, or a human-readable reason the report could
/// not be classified. Serializes externally tagged — `{"output": {...}}` or
/// `{"error": "..."}` — which is the shape the stage payloads carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationResult {
    Output(Value),
    Error(String),
}

impl ClassificationResult {
    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    /// The terminal job status this result finalizes to.
    pub fn terminal_status(&self) -> JobStatus {
        match self {
            Self::Output(_) => JobStatus::Completed,
            Self::Error(_) => JobStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn output_serializes_with_output_key() {
        let result = ClassificationResult::Output(json!({"hearing_loss_severity": "moderate"}));
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["output"]["hearing_loss_severity"], "moderate");
        assert!(value.get("error").is_none());
    }

    #[test]
    fn error_serializes_with_error_key() {
        let result = ClassificationResult::Error("no template for institution".into());
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["error"], "no template for institution");
        assert!(value.get("output").is_none());
    }

    #[test]
    fn terminal_status_maps_variants() {
        assert_eq!(
            ClassificationResult::Output(json!({})).terminal_status(),
            JobStatus::Completed
        );
        assert_eq!(
            ClassificationResult::Error("x".into()).terminal_status(),
            JobStatus::Failed
        );
    }

    #[test]
    fn deserializes_from_payload_shape() {
        let result: ClassificationResult =
            serde_json::from_str(r#"{"output": {"a": 1}}"#).unwrap();
        assert!(result.is_output());
        let result: ClassificationResult = serde_json::from_str(r#"{"error": "bad"}"#).unwrap();
        assert!(result.is_error());
    }
}
