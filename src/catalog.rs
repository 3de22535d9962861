//! Artifact catalog: the registry of shareable security documents.
//!
//! Built once from policy configuration and read-only afterwards. Order is the
//! order of the policy file, and every ordered output of the pipeline follows it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, ConfigError};

/// Coarse confidentiality classification of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensitivity {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for Sensitivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// How an approved artifact reaches the requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMethod {
    /// Attached directly to the reply.
    EmailAttachment,
    /// Shared through a secure download link.
    SecureLink,
    /// Shared through a secure link that expires after the configured period.
    ExpiringLink,
}

impl DeliveryMethod {
    /// Wire name, as used in decision records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmailAttachment => "email_attachment",
            Self::SecureLink => "secure_link",
            Self::ExpiringLink => "expiring_link",
        }
    }

    /// Whether links delivered this way are time-boxed.
    pub fn is_time_boxed(&self) -> bool {
        matches!(self, Self::ExpiringLink)
    }

    /// Phrase used in reply text.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::EmailAttachment => "attached to a follow-up email",
            Self::SecureLink => "via secure link",
            Self::ExpiringLink => "via expiring secure link",
        }
    }
}

impl std::fmt::Display for DeliveryMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactSpec {
    /// Unique short identifier (e.g. `soc2`).
    pub id: String,
    /// Human-readable name used in replies.
    pub display_name: String,
    pub sensitivity: Sensitivity,
    /// Whether an NDA must be on file before sharing.
    pub requires_nda: bool,
    pub description: String,
    pub delivery_method: DeliveryMethod,
    /// Never released automatically, even with an NDA on file.
    #[serde(default)]
    pub hold_for_review: bool,
}

/// Immutable, ordered artifact registry.
#[derive(Debug, Clone)]
pub struct ArtifactCatalog {
    specs: Vec<ArtifactSpec>,
    index: HashMap<String, usize>,
}

impl ArtifactCatalog {
    /// Build a catalog, rejecting duplicate ids and malformed entries.
    pub fn new(specs: Vec<ArtifactSpec>) -> Result<Self, ConfigError> {
        if specs.is_empty() {
            return Err(ConfigError::MissingRequired {
                key: "artifacts".into(),
                hint: "Define at least one [[artifacts]] entry in the policy file.".into(),
            });
        }

        let mut index = HashMap::with_capacity(specs.len());
        for (pos, spec) in specs.iter().enumerate() {
            if spec.id.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: format!("artifacts[{pos}].id"),
                    message: "artifact id must not be empty".into(),
                });
            }
            if spec.hold_for_review && !spec.requires_nda {
                return Err(ConfigError::InvalidValue {
                    key: format!("artifacts.{}.hold_for_review", spec.id),
                    message: "only NDA-gated artifacts can be held for review".into(),
                });
            }
            if index.insert(spec.id.clone(), pos).is_some() {
                return Err(ConfigError::DuplicateArtifact {
                    id: spec.id.clone(),
                });
            }
        }

        Ok(Self { specs, index })
    }

    /// Look up an artifact by id.
    pub fn lookup(&self, id: &str) -> Result<&ArtifactSpec, CatalogError> {
        self.index
            .get(id)
            .map(|&pos| &self.specs[pos])
            .ok_or_else(|| CatalogError::NotFound { id: id.to_string() })
    }

    /// All artifacts in catalog order.
    pub fn all_specs(&self) -> &[ArtifactSpec] {
        &self.specs
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Catalog position of an id, used for deterministic ordering.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
