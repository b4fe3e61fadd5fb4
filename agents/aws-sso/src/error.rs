//! Broker error taxonomy
//!
//! Every operation ends in exactly one of these; nothing is retried
//! automatically.

use thiserror::Error;

use crate::provider::ParseError;

/// Errors that can occur during broker operations
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Requested profile is not in the registry
    #[error("Profile not found: {name} (available: {})", .available.join(", "))]
    ProfileNotFound { name: String, available: Vec<String> },

    /// Interactive SSO login did not complete
    #[error("Authentication failed for profile {profile}: {reason}")]
    AuthenticationFailed { profile: String, reason: String },

    /// Verification of a profile or credential set failed
    #[error(
        "Credentials for profile {profile} are expired or invalid: {reason} \
         (run `aws-sso login {profile}` to re-authenticate)"
    )]
    ExpiredOrInvalidCredentials { profile: String, reason: String },

    /// A credential set is missing a field and cannot be written
    #[error("Incomplete credentials for section [{section}]: {field} is empty")]
    IncompleteCredentials { section: String, field: &'static str },

    /// A section name or value would not survive a round trip through the file
    #[error("Cannot write credentials section [{section}]: {reason}")]
    InvalidSection { section: String, reason: String },

    /// Export requested with no profile selected
    #[error("No active profile (run `aws-sso switch <profile>` or `aws-sso login`)")]
    NoActiveProfile,

    /// The provider CLI could not be run at all
    #[error("Identity provider error: {0}")]
    Provider(String),

    /// The provider CLI ran but its output was unusable
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The legacy credentials file could not be parsed
    #[error("Malformed credentials file {path}: line {line}: {message}")]
    Store {
        path: String,
        line: usize,
        message: String,
    },

    /// Invalid profile registry configuration
    #[error("Invalid profile configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl BrokerError {
    /// Profile this error is about, if any
    pub fn profile(&self) -> Option<&str> {
        match self {
            BrokerError::ProfileNotFound { name, .. } => Some(name),
            BrokerError::AuthenticationFailed { profile, .. }
            | BrokerError::ExpiredOrInvalidCredentials { profile, .. } => Some(profile),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BrokerError>;
