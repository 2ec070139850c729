//! Parsing of model output into the structured classification object.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

/// A model reply that could not be read as an object-typed JSON document.
/// The message is handed back to the model verbatim during self-correction,
/// so it preserves the parser's exact wording.
#[derive(Error, Debug, Clone)]
#[error("{message}")]
pub struct ParseFailure {
    pub message: String,
}

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[a-zA-Z]*").expect("static fence pattern compiles"));

/// Drop markdown code fences the model was instructed not to emit.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}

/// Parse model output as a single JSON object.
pub fn parse_model_output(text: &str) -> Result<Value, ParseFailure> {
    let cleaned = strip_code_fences(text);

    let value: Value = serde_json::from_str(&cleaned).map_err(|e| ParseFailure {
        message: e.to_string(),
    })?;

    if !value.is_object() {
        return Err(ParseFailure {
            message: format!("expected a JSON object, found {}", json_type_name(&value)),
        });
    }

    Ok(value)
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
