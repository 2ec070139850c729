//! Bounded self-correction of malformed model output.
//!
//! The one failure class handled locally: an otherwise-correct reply wrapped
//! in invalid JSON (trailing commas, commentary, unbalanced braces). The
//! model is re-prompted with its own invalid output plus the parser's error
//! and asked for a mechanical fix; everything else propagates unchanged.

use crate::inference::{DecodingParams, InferenceClient, InferenceError};
use crate::models::ClassificationResult;

use super::parser::{parse_model_output, ParseFailure};

/// Maximum corrective invocations per job.
pub const MAX_CORRECTION_ATTEMPTS: usize = 3;

/// Reserved token the model emits when no mechanical fix exists.
pub const CORRECTION_SENTINEL: &str = "UNRECOVERABLE_OUTPUT";

/// Result message when the model declares its output unfixable.
pub const UNCORRECTABLE_MESSAGE: &str = "output could not be corrected";

/// Result message after all corrective attempts fail to parse.
pub const EXHAUSTED_MESSAGE: &str = "did not recover from parsing error";

/// Build the repair prompt for one corrective attempt.
pub fn build_repair_prompt(invalid_text: &str, parse_error: &str) -> String {
    format!(
        r#"The following output was intended to be a single JSON document but
failed to parse.

PARSER ERROR:
{parse_error}

INVALID OUTPUT:
{invalid_text}

Emit ONLY the corrected JSON document — no prose, no code fences. Do not
change any values; fix only the JSON syntax. If the output cannot be
mechanically corrected into valid JSON, emit exactly the single token
{CORRECTION_SENTINEL} instead.
"#
    )
}

/// Runs the bounded repair loop against the inference endpoint.
pub struct SelfCorrector<'a> {
    client: &'a dyn InferenceClient,
    params: &'a DecodingParams,
}

impl<'a> SelfCorrector<'a> {
    pub fn new(client: &'a dyn InferenceClient, params: &'a DecodingParams) -> Self {
        Self { client, params }
    }

    /// Attempt to repair `raw_text`. Every parse outcome maps to a
    /// `ClassificationResult`; only endpoint invocation faults escape, and
    /// they stay faults for the orchestrator rather than becoming a
    /// business outcome.
    pub fn correct(
        &self,
        raw_text: &str,
        parse_error: &ParseFailure,
    ) -> Result<ClassificationResult, InferenceError> {
        let mut invalid = raw_text.to_string();
        let mut error = parse_error.message.clone();

        for attempt in 1..=MAX_CORRECTION_ATTEMPTS {
            let prompt = build_repair_prompt(&invalid, &error);
            let reply = self.client.invoke(&prompt, self.params)?;

            if reply.trim() == CORRECTION_SENTINEL {
                tracing::info!(attempt, "model reported output unrecoverable");
                return Ok(ClassificationResult::Error(UNCORRECTABLE_MESSAGE.into()));
            }

            match parse_model_output(&reply) {
                Ok(value) => {
                    tracing::info!(attempt, "corrected output parsed");
                    return Ok(ClassificationResult::Output(value));
                }
                Err(failure) => {
                    tracing::warn!(
                        attempt,
                        error = %failure,
                        "corrected output still unparseable"
                    );
                    invalid = reply;
                    error = failure.message;
                }
            }
        }

        Ok(ClassificationResult::Error(EXHAUSTED_MESSAGE.into()))
    }
}
