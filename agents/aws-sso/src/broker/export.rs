//! Credential exporter
//!
//! Credentials are requested fresh on every call and verified as the exact
//! set that is about to be exported. Nothing is projected unless that check
//! passes.

use tracing::info;

use super::types::{ExportOutcome, FileSyncOutcome, SectionWrite};
use super::Broker;
use crate::error::{BrokerError, Result};
use crate::provider::{CallerIdentity, CredentialSet, IdentityProvider, VerifyTarget};
use crate::session::{ActiveSession, EnvCredentials};

impl<P: IdentityProvider> Broker<P> {
    /// Fetch a credential set for `profile` and verify that exact set
    pub(crate) async fn fetch_verified(
        &self,
        profile: &str,
    ) -> Result<(CredentialSet, CallerIdentity)> {
        self.registry.lookup(profile)?;

        let creds = match self.provider.export_credentials(profile).await {
            Ok(creds) => creds,
            Err(BrokerError::Parse(e)) => {
                return Err(BrokerError::ExpiredOrInvalidCredentials {
                    profile: profile.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let identity = self.verify(VerifyTarget::Credentials(&creds)).await?;
        Ok((creds, identity))
    }

    /// Export credentials for `profile` (default: the selected profile)
    /// into the session's environment channel
    pub async fn export_to_environment(
        &self,
        session: &mut ActiveSession,
        profile: Option<&str>,
    ) -> Result<ExportOutcome> {
        let profile = match profile.or(session.selected_profile()) {
            Some(profile) => profile.to_string(),
            None => return Err(BrokerError::NoActiveProfile),
        };

        let (creds, identity) = self.fetch_verified(&profile).await?;
        let credentials = EnvCredentials::from(&creds);

        session.select(&profile);
        session.set_exported(credentials.clone());

        info!(
            profile = %profile,
            account_id = %identity.account_id,
            "Credentials exported to environment"
        );

        Ok(ExportOutcome {
            profile,
            account_id: identity.account_id,
            credentials,
        })
    }

    /// Write verified credentials for `source` into one section of the
    /// legacy credentials file (default section name: `source`)
    pub async fn export_to_file(
        &self,
        source: &str,
        section: Option<&str>,
    ) -> Result<FileSyncOutcome> {
        let section = section.unwrap_or(source).to_string();
        let (creds, identity) = self.fetch_verified(source).await?;

        let report = self.store.write_sections(&[(section.clone(), creds)])?;

        Ok(FileSyncOutcome::new(
            report,
            vec![SectionWrite {
                section,
                profile: source.to_string(),
                account_id: identity.account_id,
            }],
        ))
    }
}
