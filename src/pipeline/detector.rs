//! Artifact detection: which documents does a message ask for?
//!
//! The keyword detector matches each artifact's own trigger phrases against the
//! normalized body. It is deliberately precision-biased: vague requests are left
//! undetected and picked up by the escalation gate instead.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::catalog::ArtifactCatalog;
use crate::error::ConfigError;
use crate::pipeline::types::DetectionResult;

/// Given text, return the set of requested artifact ids.
///
/// Implementations must only return ids present in the catalog they were built
/// against.
pub trait ArtifactDetector: Send + Sync {
    /// Detector name for logging.
    fn name(&self) -> &str;

    fn detect(&self, text: &str) -> DetectionResult;
}

/// Lowercase and collapse all whitespace runs to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trigger phrases for one artifact.
#[derive(Debug, Clone)]
struct TriggerSet {
    artifact_id: String,
    phrases: Vec<String>,
}

/// Case-insensitive phrase-containment detector.
#[derive(Debug, Clone)]
pub struct KeywordDetector {
    /// Trigger sets in catalog order.
    triggers: Vec<TriggerSet>,
}

impl KeywordDetector {
    /// Build from a trigger table keyed by artifact id.
    ///
    /// Fails if the table names an artifact the catalog does not have, or if
    /// any phrase is blank.
    pub fn new(
        catalog: &ArtifactCatalog,
        table: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        if let Some(id) = table.keys().find(|id| !catalog.contains(id)) {
            return Err(ConfigError::UnknownArtifactReference { id: id.clone() });
        }

        let mut triggers = Vec::with_capacity(catalog.len());
        for spec in catalog.all_specs() {
            let Some(raw) = table.get(&spec.id) else {
                warn!(artifact = %spec.id, "Artifact has no triggers and can never be detected");
                continue;
            };

            let mut phrases = Vec::with_capacity(raw.len());
            for phrase in raw {
                let normalized = normalize_text(phrase);
                if normalized.is_empty() {
                    return Err(ConfigError::InvalidValue {
                        key: format!("triggers.{}", spec.id),
                        message: "trigger phrases must not be blank".into(),
                    });
                }
                if !phrases.contains(&normalized) {
                    phrases.push(normalized);
                }
            }

            triggers.push(TriggerSet {
                artifact_id: spec.id.clone(),
                phrases,
            });
        }

        Ok(Self { triggers })
    }

    /// Number of artifacts that have at least one trigger.
    pub fn artifact_count(&self) -> usize {
        self.triggers.len()
    }
}

impl ArtifactDetector for KeywordDetector {
    fn name(&self) -> &str {
        "keyword"
    }

    fn detect(&self, text: &str) -> DetectionResult {
        let body = normalize_text(text);
        let mut result = DetectionResult::new();
        if body.is_empty() {
            return result;
        }

        for set in &self.triggers {
            if let Some(phrase) = set.phrases.iter().find(|p| body.contains(p.as_str())) {
                debug!(
                    artifact = %set.artifact_id,
                    trigger = %phrase,
                    "Trigger matched"
                );
                result.insert(set.artifact_id.clone());
            }
        }

        result
    }
}
