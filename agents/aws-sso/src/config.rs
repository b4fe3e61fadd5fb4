//! Broker configuration
//!
//! Resolved from command-line flags and their environment fallbacks.

use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

use crate::broker::{Broker, DEFAULT_VERIFY_DELAY};
use crate::error::{BrokerError, Result};
use crate::provider::AwsCliProvider;
use crate::registry::ProfileRegistry;

/// Where the broker finds its collaborators
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// JSON profile registry; the built-in table when unset
    pub profiles_file: Option<PathBuf>,
    /// Legacy credentials file; `~/.aws/credentials` when unset
    pub credentials_file: Option<PathBuf>,
    /// `aws` executable
    pub aws_bin: PathBuf,
    pub verify_delay: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            profiles_file: None,
            credentials_file: None,
            aws_bin: PathBuf::from("aws"),
            verify_delay: DEFAULT_VERIFY_DELAY,
        }
    }
}

impl BrokerConfig {
    pub fn load_registry(&self) -> Result<ProfileRegistry> {
        match &self.profiles_file {
            Some(path) => ProfileRegistry::from_file(path),
            None => Ok(ProfileRegistry::builtin()),
        }
    }

    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials_file {
            return Ok(path.clone());
        }
        default_credentials_path().ok_or_else(|| {
            BrokerError::Config(
                "cannot determine home directory; pass --credentials-file".to_string(),
            )
        })
    }

    /// Build a broker driving the real `aws` CLI
    pub fn build(&self) -> Result<Broker<AwsCliProvider>> {
        let registry = self.load_registry()?;
        let credentials = self.credentials_path()?;

        debug!(
            credentials = %credentials.display(),
            profiles = registry.profiles().len(),
            "Broker configured"
        );

        Ok(Broker::new(registry, AwsCliProvider::new(&self.aws_bin), credentials)
            .with_verify_delay(self.verify_delay))
    }
}

/// `~/.aws/credentials`
pub fn default_credentials_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".aws").join("credentials"))
}
