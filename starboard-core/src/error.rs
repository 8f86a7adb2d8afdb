//! Error types for the relay

use thiserror::Error;

/// Relay-wide error type
#[derive(Error, Debug)]
pub enum StarboardError {
    /// A required setting is missing or unparsable. Fatal at startup.
    #[error("Configuration error in {field}: {reason}")]
    Configuration { field: String, reason: String },

    /// An external service rejected our credentials. Fatal at startup.
    #[error("Credential verification failed for {service}: {message}")]
    CredentialVerification { service: String, message: String },

    /// A qualifying event is missing a field extraction needs
    #[error("Malformed event: missing {field}")]
    MalformedEvent { field: String },

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl StarboardError {
    pub fn configuration(field: impl Into<String>, reason: impl Into<String>) -> Self {
        StarboardError::Configuration {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn credential_verification(service: impl Into<String>, message: impl Into<String>) -> Self {
        StarboardError::CredentialVerification {
            service: service.into(),
            message: message.into(),
        }
    }

    pub fn malformed(field: impl Into<String>) -> Self {
        StarboardError::MalformedEvent {
            field: field.into(),
        }
    }

    /// Whether the process should stop when this error surfaces
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            StarboardError::Configuration { .. } | StarboardError::CredentialVerification { .. }
        )
    }
}

/// Errors returned by a [`crate::StatusPublisher`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    /// The service refused the status because the text is over its limit
    #[error("Status text too long ({length} characters)")]
    ContentTooLong { length: usize },

    #[error("Publish rejected (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl PublishError {
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        PublishError::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn network(msg: impl Into<String>) -> Self {
        PublishError::Network(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        PublishError::Media(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        PublishError::Parse(msg.into())
    }
}

/// Result type alias for relay operations
pub type StarboardResult<T> = Result<T, StarboardError>;
