//! Error types for Sales Desk.

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Intake error: {0}")]
    Intake(#[from] IntakeError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Policy configuration errors. All of these are fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse policy file: {0}")]
    ParseError(String),

    #[error("Duplicate artifact id in catalog: {id}")]
    DuplicateArtifact { id: String },

    #[error("Trigger table references unknown artifact: {id}")]
    UnknownArtifactReference { id: String },

    #[error("Invalid trust registry key {key:?}: expected an email address or *@domain")]
    InvalidTrustKey { key: String },

    #[error("Trust registry key {key:?} is listed more than once (keys are case-insensitive)")]
    DuplicateTrustKey { key: String },

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Catalog lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("Artifact not found: {id}")]
    NotFound { id: String },
}

/// Errors while turning a raw message into an inbound request.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    #[error("Message could not be parsed as RFC 822")]
    Unparseable,

    #[error("Message has no sender address")]
    MissingSender,
}

/// Escalation notification errors.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Webhook request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Webhook returned status {status}")]
    Status { status: u16 },
}

/// Result type alias for Sales Desk.
pub type Result<T> = std::result::Result<T, Error>;
