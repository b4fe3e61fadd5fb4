//! AWS SSO Credential Broker Library
//!
//! Manages short-lived SSO credentials for several named profiles and keeps
//! two consumption channels consistent: the process environment and the
//! legacy `~/.aws/credentials` file for tools that cannot use SSO.

pub mod broker;
pub mod config;
pub mod error;
pub mod provider;
pub mod registry;
pub mod session;
pub mod store;

pub use broker::{Broker, LoginTarget};
pub use config::BrokerConfig;
pub use error::BrokerError;
pub use provider::{AwsCliProvider, CredentialSet, IdentityProvider};
pub use registry::{Profile, ProfileRegistry};
pub use session::{ActiveSession, EnvironmentProjection};
pub use store::CredentialFileSynchronizer;
