//! Configuration types.
//!
//! Two layers: the policy file (catalog, triggers, trust registry, escalation
//! vocabulary, reply settings) is TOML data loaded at startup and on reload;
//! process settings (paths, port, webhook) come from environment variables.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::catalog::ArtifactSpec;
use crate::error::ConfigError;
use crate::pipeline::composer::DEFAULT_SIGNATURE;
use crate::pipeline::escalation::{
    DEFAULT_LEGAL_TERMS, DEFAULT_MAX_DENIED_WITHOUT_NDA, DEFAULT_SECURITY_TERMS,
};
use crate::pipeline::policy::DEFAULT_LINK_EXPIRATION_DAYS;

/// Policy shipped with the crate.
pub const DEFAULT_POLICY_TOML: &str = include_str!("../config/sales_desk.toml");

/// Default HTTP port.
const DEFAULT_PORT: u16 = 8080;

// ── Policy file ─────────────────────────────────────────────────────

/// Contents of a policy file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    #[serde(default)]
    pub settings: ReplySettings,
    /// Catalog entries, in catalog order.
    #[serde(default)]
    pub artifacts: Vec<ArtifactSpec>,
    /// Trigger phrases keyed by artifact id.
    pub triggers: Option<BTreeMap<String, Vec<String>>>,
    /// NDA-on-file records keyed by address or `*@domain`.
    pub trust: Option<BTreeMap<String, bool>>,
    #[serde(default)]
    pub escalation: EscalationSettings,
}

/// Reply template settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplySettings {
    pub signature: String,
    pub company_name: Option<String>,
    pub link_expiration_days: u32,
}

impl Default for ReplySettings {
    fn default() -> Self {
        Self {
            signature: DEFAULT_SIGNATURE.to_string(),
            company_name: None,
            link_expiration_days: DEFAULT_LINK_EXPIRATION_DAYS,
        }
    }
}

/// Escalation vocabulary and thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EscalationSettings {
    pub legal_terms: Vec<String>,
    pub security_terms: Vec<String>,
    /// Escalate when more NDA-gated artifacts than this are denied.
    pub max_denied_without_nda: usize,
    /// Set to false to disable the bulk-request trigger.
    pub bulk_review_enabled: bool,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            legal_terms: DEFAULT_LEGAL_TERMS.iter().map(|s| s.to_string()).collect(),
            security_terms: DEFAULT_SECURITY_TERMS.iter().map(|s| s.to_string()).collect(),
            max_denied_without_nda: DEFAULT_MAX_DENIED_WITHOUT_NDA,
            bulk_review_enabled: true,
        }
    }
}

impl EscalationSettings {
    pub fn bulk_threshold(&self) -> Option<usize> {
        self.bulk_review_enabled.then_some(self.max_denied_without_nda)
    }
}

impl PolicyConfig {
    /// Parse a policy from TOML text.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Load a policy file from disk.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?;
        tracing::info!(
            path = %path.display(),
            artifacts = config.artifacts.len(),
            "Loaded policy file"
        );
        Ok(config)
    }

    /// The policy shipped with the crate.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_toml_str(DEFAULT_POLICY_TOML)
    }

    /// Trigger table, or an error if the section is absent.
    pub fn trigger_table(&self) -> Result<&BTreeMap<String, Vec<String>>, ConfigError> {
        self.triggers.as_ref().ok_or_else(|| ConfigError::MissingRequired {
            key: "triggers".into(),
            hint: "Add a [triggers] table mapping artifact ids to phrases.".into(),
        })
    }

    /// Trust records, or an error if the section is absent.
    pub fn trust_table(&self) -> Result<&BTreeMap<String, bool>, ConfigError> {
        self.trust.as_ref().ok_or_else(|| ConfigError::MissingRequired {
            key: "trust".into(),
            hint: "Add a [trust] table (it may be empty).".into(),
        })
    }
}

// ── Process settings ────────────────────────────────────────────────

/// Process-level settings, built from environment variables.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    /// Policy file; the built-in policy is used when unset.
    pub policy_path: Option<PathBuf>,
    /// HTTP listen port.
    pub port: u16,
    /// Directory for daily-rolling log files; stderr only when unset.
    pub log_dir: Option<PathBuf>,
    /// Slack-compatible webhook for escalation notices.
    pub slack_webhook: Option<SecretString>,
}

impl DeskConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Self {
        let policy_path = std::env::var("SALES_DESK_POLICY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let port: u16 = std::env::var("SALES_DESK_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_PORT);

        let log_dir = std::env::var("SALES_DESK_LOG_DIR")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let slack_webhook = std::env::var("SALES_DESK_SLACK_WEBHOOK")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .map(SecretString::from);

        Self {
            policy_path,
            port,
            log_dir,
            slack_webhook,
        }
    }

    /// Load the configured policy, falling back to the built-in one.
    pub fn load_policy(&self) -> Result<PolicyConfig, ConfigError> {
        match &self.policy_path {
            Some(path) => PolicyConfig::load(path),
            None => PolicyConfig::builtin(),
        }
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            policy_path: None,
            port: DEFAULT_PORT,
            log_dir: None,
            slack_webhook: None,
        }
    }
}
