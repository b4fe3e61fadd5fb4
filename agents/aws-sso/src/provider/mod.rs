//! Identity Provider seam
//!
//! The broker never talks to AWS directly. Everything goes through the
//! [`IdentityProvider`] trait, implemented for real by [`AwsCliProvider`]
//! which drives the `aws` CLI as a subprocess.

pub mod aws_cli;
pub mod parse;

#[cfg(test)]
pub(crate) mod fake;

pub use aws_cli::AwsCliProvider;
pub use parse::ParseError;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Short-lived credential triple issued for a profile
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub profile_name: String,
}

impl CredentialSet {
    pub fn new(
        profile_name: impl Into<String>,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        session_token: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
            session_token: session_token.into(),
            profile_name: profile_name.into(),
        }
    }

    /// First empty credential field, if any
    pub fn missing_field(&self) -> Option<&'static str> {
        if self.access_key_id.trim().is_empty() {
            Some("aws_access_key_id")
        } else if self.secret_access_key.trim().is_empty() {
            Some("aws_secret_access_key")
        } else if self.session_token.trim().is_empty() {
            Some("aws_session_token")
        } else {
            None
        }
    }
}

// Keep secrets out of logs and panic messages
impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("profile_name", &self.profile_name)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &"***")
            .finish()
    }
}

/// Result of a successful "who am I" call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallerIdentity {
    pub account_id: String,
    pub arn: String,
    pub user_id: String,
}

/// What to verify: a configured profile, or an explicit credential set
#[derive(Debug, Clone, Copy)]
pub enum VerifyTarget<'a> {
    Profile(&'a str),
    Credentials(&'a CredentialSet),
}

impl VerifyTarget<'_> {
    pub fn profile_name(&self) -> &str {
        match self {
            VerifyTarget::Profile(name) => name,
            VerifyTarget::Credentials(creds) => &creds.profile_name,
        }
    }
}

/// Operations the broker needs from the identity provider
///
/// A nonzero exit or unparsable output is always a failure.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Interactive SSO login for a profile
    async fn login(&self, profile: &str) -> Result<()>;

    /// Invalidate the provider's cached SSO session
    async fn logout(&self) -> Result<()>;

    /// Request a fresh credential set for a profile
    async fn export_credentials(&self, profile: &str) -> Result<CredentialSet>;

    /// Resolve the caller identity for a profile or explicit credentials
    async fn caller_identity(&self, target: VerifyTarget<'_>) -> Result<CallerIdentity>;

    /// Profiles known to the provider's own configuration
    async fn list_profiles(&self) -> Result<Vec<String>>;
}
