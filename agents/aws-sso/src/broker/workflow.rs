//! Workflow orchestration and session management

use tracing::{info, warn};

use super::types::{
    FileSyncOutcome, LoginTarget, ProfileListing, SectionWrite, WorkflowReport,
};
use super::Broker;
use crate::error::{BrokerError, Result};
use crate::provider::IdentityProvider;
use crate::registry::Profile;
use crate::session::ActiveSession;

impl<P: IdentityProvider> Broker<P> {
    /// Select a registered profile; does not contact the provider
    pub fn switch_profile(&self, session: &mut ActiveSession, name: &str) -> Result<Profile> {
        let profile = self.registry.lookup(name)?.clone();
        session.select(&profile.name);
        info!(profile = %profile.name, "Switched profile");
        Ok(profile)
    }

    /// Refresh every canonical legacy section together
    ///
    /// All credential sets are fetched and verified first; a single
    /// failure means the file is not written at all.
    pub async fn write_both_known_profiles(&self) -> Result<FileSyncOutcome> {
        let pairs = self.registry.legacy_sections();
        if pairs.is_empty() {
            return Err(BrokerError::Config(
                "no legacy credential sections configured".to_string(),
            ));
        }

        let mut sections = Vec::with_capacity(pairs.len());
        let mut writes = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let (creds, identity) = self.fetch_verified(&pair.profile).await?;
            sections.push((pair.section.clone(), creds));
            writes.push(SectionWrite {
                section: pair.section.clone(),
                profile: pair.profile.clone(),
                account_id: identity.account_id,
            });
        }

        let report = self.store.write_sections(&sections)?;
        Ok(FileSyncOutcome::new(report, writes))
    }

    /// Log in every profile, then sync the legacy file
    pub async fn super_workflow(&self, session: &mut ActiveSession) -> Result<WorkflowReport> {
        let login = self.login(session, &LoginTarget::All).await?;
        let sync = self.write_both_known_profiles().await?;

        info!(profile = %login.active_profile, "Setup complete");
        Ok(WorkflowReport { login, sync })
    }

    /// Forget the session and invalidate the provider's SSO cache
    ///
    /// The session is cleared even when the provider logout fails.
    pub async fn clear_all(&self, session: &mut ActiveSession) -> Result<()> {
        session.clear();
        info!("Session cleared");

        if let Err(e) = self.provider.logout().await {
            warn!(error = %e, "Provider logout failed");
            return Err(e);
        }
        Ok(())
    }

    /// Registry profiles, cross-checked against the provider's config
    pub async fn profiles(&self, session: &ActiveSession) -> Vec<ProfileListing> {
        let known = match self.provider.list_profiles().await {
            Ok(names) => Some(names),
            Err(e) => {
                warn!(error = %e, "Could not list provider profiles");
                None
            }
        };

        self.registry
            .profiles()
            .iter()
            .map(|profile| ProfileListing {
                profile: profile.clone(),
                selected: session.selected_profile() == Some(profile.name.as_str()),
                configured: known.as_ref().map(|names| names.contains(&profile.name)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::broker;
    use super::*;
    use crate::provider::fake::FakeProvider;
    use crate::provider::CredentialSet;
    use crate::session::EnvCredentials;
    use crate::store::KEY_ACCESS_KEY_ID;
    use std::fs;

    #[tokio::test]
    async fn test_switch_always_succeeds_for_registered_profiles() {
        let (broker, _dir) = broker(FakeProvider::new());
        let mut session = ActiveSession::new();

        for name in broker.registry().list() {
            broker.switch_profile(&mut session, &name).unwrap();
            let status = broker.status(&session).await;
            assert_eq!(status.selected_profile.as_deref(), Some(name.as_str()));
            assert!(status.identity.is_none());
        }

        let err = broker.switch_profile(&mut session, "staging").unwrap_err();
        assert!(matches!(err, BrokerError::ProfileNotFound { .. }));
        assert_eq!(session.selected_profile(), Some("production-sso"));
    }

    #[tokio::test]
    async fn test_write_both_known_profiles() {
        let (broker, dir) = broker(
            FakeProvider::new()
                .logged_in("default-sso")
                .logged_in("production-sso"),
        );

        let outcome = broker.write_both_known_profiles().await.unwrap();

        assert!(outcome.backup.is_none());
        let file = broker.store().load().unwrap();
        assert_eq!(file.section_names(), vec!["production", "default"]);
        assert_eq!(
            file.section("default").unwrap().get(KEY_ACCESS_KEY_ID),
            Some("AKIA-default-sso")
        );
        assert_eq!(
            file.section("production").unwrap().get(KEY_ACCESS_KEY_ID),
            Some("AKIA-production-sso")
        );
        assert!(dir.path().join("credentials").exists());
    }

    #[tokio::test]
    async fn test_write_both_is_all_or_nothing() {
        let (broker, dir) = broker(FakeProvider::new().logged_in("production-sso"));
        let path = dir.path().join("credentials");
        let previous = "[production]\naws_access_key_id = AKIAOLD\n\n[default]\naws_access_key_id = AKIAOLD2\n";
        fs::write(&path, previous).unwrap();

        let err = broker.write_both_known_profiles().await.unwrap_err();

        assert_eq!(err.profile(), Some("default-sso"));
        assert_eq!(fs::read_to_string(&path).unwrap(), previous);
        assert!(broker.store().backups().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_both_rejects_incomplete_credentials() {
        let (broker, dir) = broker(
            FakeProvider::new()
                .logged_in("default-sso")
                .logged_in("production-sso")
                .credentials(CredentialSet::new("default-sso", "AKIA2", "SECRET2", "")),
        );
        let path = dir.path().join("credentials");
        fs::write(&path, "[production]\naws_access_key_id = AKIAOLD\n").unwrap();

        let err = broker.write_both_known_profiles().await.unwrap_err();

        assert!(matches!(err, BrokerError::IncompleteCredentials { .. }));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[production]\naws_access_key_id = AKIAOLD\n"
        );
    }

    #[tokio::test]
    async fn test_super_workflow() {
        let (broker, _dir) = broker(FakeProvider::new());
        let mut session = ActiveSession::new();

        let report = broker.super_workflow(&mut session).await.unwrap();

        assert_eq!(report.login.active_profile, "default-sso");
        assert_eq!(report.sync.sections.len(), 2);
        assert_eq!(session.selected_profile(), Some("default-sso"));
        assert!(report.summary().contains("Active profile: default-sso"));
    }

    #[tokio::test]
    async fn test_super_workflow_stops_after_failed_login() {
        let (broker, _dir) = broker(FakeProvider::new().failing_login("production-sso"));
        let mut session = ActiveSession::new();

        let err = broker.super_workflow(&mut session).await.unwrap_err();

        assert!(matches!(err, BrokerError::AuthenticationFailed { .. }));
        assert!(!broker.store().path().exists());
        assert!(!broker
            .provider()
            .calls()
            .iter()
            .any(|call| call.starts_with("export:")));
    }

    #[tokio::test]
    async fn test_clear_all() {
        let (broker, _dir) = broker(FakeProvider::new().logged_in("default-sso"));
        let mut session = ActiveSession::new();
        session.select("default-sso");
        session.set_exported(EnvCredentials::from(&CredentialSet::new(
            "default-sso",
            "AKIA1",
            "SECRET1",
            "TOK1",
        )));

        broker.clear_all(&mut session).await.unwrap();

        assert_eq!(session, ActiveSession::new());
        assert!(!broker.provider().is_logged_in("default-sso"));
        let status = broker.status(&session).await;
        assert!(!status.is_active());
    }

    #[tokio::test]
    async fn test_clear_all_resets_session_even_if_logout_fails() {
        let (broker, _dir) = broker(FakeProvider::new().logout_fails());
        let mut session = ActiveSession::new();
        session.select("production-sso");

        assert!(broker.clear_all(&mut session).await.is_err());
        assert_eq!(session.selected_profile(), None);
    }

    #[tokio::test]
    async fn test_profiles_listing() {
        let (broker, _dir) = broker(FakeProvider::new());
        let mut session = ActiveSession::new();
        session.select("production-sso");

        let listing = broker.profiles(&session).await;

        assert_eq!(listing.len(), 2);
        assert!(!listing[0].selected);
        assert!(listing[1].selected);
        assert!(listing.iter().all(|l| l.configured == Some(true)));
    }
}
