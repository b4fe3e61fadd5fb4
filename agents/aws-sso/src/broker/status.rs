//! Status reporter
//!
//! [`Broker::verify`] is the one place that decides whether credentials are
//! valid: the provider's "who am I" call has to succeed and resolve an
//! account id. Everything else in the broker goes through it.

use tracing::{debug, warn};

use super::types::StatusReport;
use super::Broker;
use crate::error::{BrokerError, Result};
use crate::provider::{CallerIdentity, IdentityProvider, VerifyTarget};
use crate::session::ActiveSession;

impl<P: IdentityProvider> Broker<P> {
    /// Verify a profile or an explicit credential set
    pub async fn verify(&self, target: VerifyTarget<'_>) -> Result<CallerIdentity> {
        let profile = target.profile_name().to_string();

        let identity = match self.provider.caller_identity(target).await {
            Ok(identity) => identity,
            Err(BrokerError::Parse(e)) => {
                return Err(BrokerError::ExpiredOrInvalidCredentials {
                    profile,
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        if let Ok(expected) = self.registry.lookup(&profile) {
            if expected.account_id != identity.account_id {
                warn!(
                    profile = %profile,
                    expected = %expected.account_id,
                    actual = %identity.account_id,
                    "Credentials resolve to a different account than registered"
                );
            }
        }

        debug!(profile = %profile, account_id = %identity.account_id, "Credentials verified");
        Ok(identity)
    }

    /// Verify a registered profile and return its account id
    pub async fn test_credentials(&self, profile: &str) -> Result<String> {
        self.registry.lookup(profile)?;
        let identity = self.verify(VerifyTarget::Profile(profile)).await?;
        Ok(identity.account_id)
    }

    /// Report the selected profile and, if it verifies, its identity
    ///
    /// Never fails and never touches the session: an unverifiable
    /// selection is reported as having no active credentials.
    pub async fn status(&self, session: &ActiveSession) -> StatusReport {
        let Some(selected) = session.selected_profile() else {
            return StatusReport {
                selected_profile: None,
                region: None,
                identity: None,
                reason: None,
            };
        };

        let region = self.registry.lookup(selected).ok().map(|p| p.region.clone());

        let (identity, reason) = match self.verify(VerifyTarget::Profile(selected)).await {
            Ok(identity) => (Some(identity), None),
            Err(e) => {
                debug!(profile = %selected, error = %e, "Selected profile does not verify");
                (None, Some(e.to_string()))
            }
        };

        StatusReport {
            selected_profile: Some(selected.to_string()),
            region,
            identity,
            reason,
        }
    }
}
