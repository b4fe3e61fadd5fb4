//! Credential broker
//!
//! Composes the registry, the identity provider and the credentials file
//! synchronizer into the operations exposed on the command line:
//!
//! - [`Broker::login`]: authentication controller
//! - [`Broker::status`] / [`Broker::verify`]: status reporter
//! - [`Broker::export_to_environment`] / [`Broker::export_to_file`]: exporter
//! - [`Broker::write_both_known_profiles`] / [`Broker::super_workflow`]:
//!   workflow orchestration
//!
//! All session state lives in an [`ActiveSession`](crate::session::ActiveSession)
//! passed in by the caller. Operations run strictly one after another and
//! nothing is retried.
//!
//! ## Example Usage
//!
//! ```ignore
//! use aws_sso::{ActiveSession, AwsCliProvider, Broker, LoginTarget, ProfileRegistry};
//!
//! let broker = Broker::new(ProfileRegistry::builtin(), AwsCliProvider::default(), path);
//! let mut session = ActiveSession::new();
//!
//! broker.login(&mut session, &LoginTarget::All).await?;
//! let exported = broker.export_to_environment(&mut session, None).await?;
//! ```

mod auth;
mod export;
mod status;
pub mod types;
mod workflow;

pub use types::{
    ExportOutcome, FileSyncOutcome, LoginOutcome, LoginReport, LoginTarget, ProfileListing,
    SectionWrite, StatusReport, Verification, WorkflowReport,
};

use std::path::PathBuf;
use std::time::Duration;

use crate::provider::IdentityProvider;
use crate::registry::ProfileRegistry;
use crate::store::CredentialFileSynchronizer;

/// Pause between a successful login and its verification
pub const DEFAULT_VERIFY_DELAY: Duration = Duration::from_secs(2);

/// Multi-profile SSO credential broker
pub struct Broker<P> {
    registry: ProfileRegistry,
    provider: P,
    store: CredentialFileSynchronizer,
    verify_delay: Duration,
}

impl<P: IdentityProvider> Broker<P> {
    pub fn new(registry: ProfileRegistry, provider: P, credentials_file: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            provider,
            store: CredentialFileSynchronizer::new(credentials_file),
            verify_delay: DEFAULT_VERIFY_DELAY,
        }
    }

    /// Override the post-login verification delay
    pub fn with_verify_delay(mut self, delay: Duration) -> Self {
        self.verify_delay = delay;
        self
    }

    pub fn registry(&self) -> &ProfileRegistry {
        &self.registry
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn store(&self) -> &CredentialFileSynchronizer {
        &self.store
    }
}
