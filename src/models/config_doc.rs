//! Institution-scoped extraction configuration.
//!
//! A config document maps institution ids to the template, legal values,
//! and classification guidelines driving extraction for that institution.
//! Documents are authored by the configuration-management side; here they
//! are parsed into a validated type at load time so malformed documents
//! are rejected before any report is processed against them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One classification rule with its stable citation index.
///
/// The index is what the model is asked to cite; it must survive guideline
/// reordering, so it is stored explicitly rather than derived from position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Guideline {
    pub citation: u32,
    pub rule: String,
}

/// Template, legal values, and guidelines for one institution.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstitutionProfile {
    /// Required output fields and their descriptions, as a JSON object.
    #[serde(default)]
    pub template: Map<String, Value>,
    /// Enumerated legal values per template field. BTreeMap keeps prompt
    /// serialization deterministic.
    #[serde(default)]
    pub valid_values: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub guidelines: Vec<Guideline>,
}

impl InstitutionProfile {
    pub fn has_template(&self) -> bool {
        !self.template.is_empty()
    }
}

/// A full config document: institution id → profile.
#[derive(Debug, Clone)]
pub struct ConfigDocument {
    pub config_id: String,
    pub institutions: BTreeMap<String, InstitutionProfile>,
}

impl ConfigDocument {
    /// Parse the stored JSON document body into a validated config.
    pub fn from_json(config_id: &str, data: &str) -> Result<Self, serde_json::Error> {
        let institutions: BTreeMap<String, InstitutionProfile> = serde_json::from_str(data)?;
        Ok(Self {
            config_id: config_id.to_string(),
            institutions,
        })
    }

    /// Serialize the institutions mapping back to the stored document body.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.institutions)
    }

    pub fn institution(&self, institution_id: &str) -> Option<&InstitutionProfile> {
        self.institutions.get(institution_id)
    }
}
