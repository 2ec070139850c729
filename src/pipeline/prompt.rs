//! Deterministic prompt construction for report classification.
//!
//! The prompt is assembled from fixed text plus the institution's template,
//! legal values, and guidelines, all serialized in stable order — replaying
//! the same report against the same config must produce the same prompt
//! byte-for-byte.

use crate::models::InstitutionProfile;

pub const CLASSIFIER_PERSONA: &str = r#"
You are a clinical report classification assistant for audiology and related
specialties. Your ONLY role is to classify the findings of one report into
the structured fields the institution requires, following the institution's
written guidelines exactly.

RULES — ABSOLUTE, NO EXCEPTIONS:
1. Classify ONLY from information explicitly stated in the report.
2. NEVER add diagnosis, advice, or clinical opinion beyond the requested fields.
3. Assign each field one of its legal values; never invent a value.
4. Justify every field with the guideline(s) that govern it.
"#;

/// Escape characters that downstream prompt assembly could misread as
/// placeholders. Template content is institution-authored and untrusted.
pub fn escape_placeholders(s: &str) -> String {
    s.replace('{', "{{").replace('}', "}}")
}

/// Build the classification prompt for one report against one institution
/// profile.
pub fn build_classification_prompt(report_text: &str, profile: &InstitutionProfile) -> String {
    let template_json = serde_json::to_string_pretty(&profile.template)
        .unwrap_or_else(|_| "{}".to_string());
    let template = escape_placeholders(&template_json);

    let mut valid_values = String::new();
    for (field, values) in &profile.valid_values {
        valid_values.push_str(&format!("- {field}: {}\n", values.join(" | ")));
    }

    let mut guidelines = String::new();
    for guideline in &profile.guidelines {
        guidelines.push_str(&format!("[{}] {}\n", guideline.citation, guideline.rule));
    }

    format!(
        r#"{persona}
<report>
{report_text}
</report>

Classify the above report. The institution requires these output fields
(field name to description):

{template}

LEGAL VALUES PER FIELD:
{valid_values}
CLASSIFICATION GUIDELINES (cite by index):
{guidelines}
OUTPUT REQUIREMENTS — ABSOLUTE, NO EXCEPTIONS:
1. Output exactly one JSON object and nothing else: no prose before or
   after it, no code fences.
2. Include every required field with one of its legal values.
3. Include a "reasoning" object giving a short justification per field.
4. Include a "citations" array of the guideline indices you relied on.
5. The JSON must be syntactically balanced and parseable.
"#,
        persona = CLASSIFIER_PERSONA.trim(),
        report_text = report_text.trim(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConfigDocument, Guideline};

    fn profile() -> InstitutionProfile {
        ConfigDocument::from_json(
            "cfg-1",
            r#"{
                "st-marys": {
                    "template": {"hearing_loss_severity": "Overall severity of hearing loss"},
                    "validValues": {"hearing_loss_severity": ["none", "mild", "moderate", "severe", "profound"]},
                    "guidelines": [
                        {"citation": 1, "rule": "Thresholds of 26-40 dB indicate mild loss"},
                        {"citation": 2, "rule": "Thresholds of 41-55 dB bilateral indicate moderate loss"}
                    ]
                }
            }"#,
        )
        .unwrap()
        .institution("st-marys")
        .unwrap()
        .clone()
    }

    #[test]
    fn prompt_contains_report_and_sections() {
        let prompt = build_classification_prompt("threshold 45dB bilateral", &profile());
        assert!(prompt.contains("<report>"));
        assert!(prompt.contains("threshold 45dB bilateral"));
        assert!(prompt.contains("none | mild | moderate | severe | profound"));
        assert!(prompt.contains("[2] Thresholds of 41-55 dB bilateral indicate moderate loss"));
        assert!(prompt.contains("no code fences"));
    }

    #[test]
    fn template_braces_are_escaped() {
        let prompt = build_classification_prompt("report", &profile());
        // The serialized template object appears with doubled braces only
        assert!(prompt.contains("{{\n  \"hearing_loss_severity\""));
    }

    #[test]
    fn escape_placeholders_doubles_braces() {
        assert_eq!(escape_placeholders("{x}"), "{{x}}");
        assert_eq!(escape_placeholders("plain"), "plain");
    }

    #[test]
    fn prompt_is_deterministic() {
        let p = profile();
        let a = build_classification_prompt("same report", &p);
        let b = build_classification_prompt("same report", &p);
        assert_eq!(a, b);
    }

    #[test]
    fn guideline_order_is_preserved() {
        let mut p = profile();
        p.guidelines = vec![
            Guideline {
                citation: 7,
                rule: "later rule".into(),
            },
            Guideline {
                citation: 3,
                rule: "earlier citation, listed second".into(),
            },
        ];
        let prompt = build_classification_prompt("r", &p);
        let seven = prompt.find("[7]").unwrap();
        let three = prompt.find("[3]").unwrap();
        assert!(seven < three);
    }
}
