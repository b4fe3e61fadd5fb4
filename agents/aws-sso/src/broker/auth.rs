//! Authentication controller

use tracing::{info, warn};

use super::types::{LoginOutcome, LoginReport, LoginTarget, Verification};
use super::Broker;
use crate::error::{BrokerError, Result};
use crate::provider::{IdentityProvider, VerifyTarget};
use crate::registry::{Profile, ProfileKind};
use crate::session::ActiveSession;

impl<P: IdentityProvider> Broker<P> {
    /// Log in one profile, the default profile, or every SSO profile
    ///
    /// `All` stops at the first failing profile. The session is only
    /// updated once the whole target has succeeded.
    pub async fn login(
        &self,
        session: &mut ActiveSession,
        target: &LoginTarget,
    ) -> Result<LoginReport> {
        let report = match target {
            LoginTarget::All => {
                let profiles: Vec<&Profile> = self.registry.sso_profiles().collect();
                info!(count = profiles.len(), "Logging in all SSO profiles");

                let mut outcomes = Vec::with_capacity(profiles.len());
                for profile in profiles {
                    match self.login_profile(profile).await {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(e) => {
                            warn!(profile = %profile.name, error = %e, "Aborting multi-profile login");
                            return Err(e);
                        }
                    }
                }

                LoginReport {
                    outcomes,
                    active_profile: self.registry.default_profile().to_string(),
                }
            }
            LoginTarget::Default => {
                let profile = self.registry.lookup(self.registry.default_profile())?;
                self.single_login(profile).await?
            }
            LoginTarget::Profile(name) => {
                let profile = self.registry.lookup(name)?;
                self.single_login(profile).await?
            }
        };

        session.select(&report.active_profile);
        info!(profile = %report.active_profile, "Active profile updated");
        Ok(report)
    }

    async fn single_login(&self, profile: &Profile) -> Result<LoginReport> {
        let outcome = self.login_profile(profile).await?;
        Ok(LoginReport {
            active_profile: outcome.profile.clone(),
            outcomes: vec![outcome],
        })
    }

    /// Login followed by exactly one delayed verification
    async fn login_profile(&self, profile: &Profile) -> Result<LoginOutcome> {
        match profile.kind {
            ProfileKind::Sso => {
                info!(profile = %profile.name, "Starting SSO login");
                self.provider.login(&profile.name).await?;
                tokio::time::sleep(self.verify_delay).await;

                let verification = match self.verify(VerifyTarget::Profile(&profile.name)).await {
                    Ok(identity) => Verification::Verified(identity),
                    Err(BrokerError::ExpiredOrInvalidCredentials { reason, .. }) => {
                        warn!(profile = %profile.name, "Login succeeded but credentials are not verified yet");
                        Verification::Unverified { reason }
                    }
                    Err(e) => return Err(e),
                };

                Ok(LoginOutcome {
                    profile: profile.name.clone(),
                    verification,
                })
            }
            ProfileKind::Static => {
                // nothing to log in to; the keys either work or they don't
                let identity = self.verify(VerifyTarget::Profile(&profile.name)).await?;
                Ok(LoginOutcome {
                    profile: profile.name.clone(),
                    verification: Verification::Verified(identity),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::broker;
    use super::*;
    use crate::provider::fake::FakeProvider;
    use crate::provider::CredentialSet;
    use crate::registry::ProfileRegistry;
    use crate::session::EnvCredentials;
    use std::time::Duration;

    #[tokio::test]
    async fn test_login_all_selects_default_profile() {
        let (broker, _dir) = broker(FakeProvider::new());
        let mut session = ActiveSession::new();

        let report = broker.login(&mut session, &LoginTarget::All).await.unwrap();

        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes.iter().all(|o| o.is_verified()));
        assert_eq!(session.selected_profile(), Some("default-sso"));

        let status = broker.status(&session).await;
        assert_eq!(status.identity.unwrap().account_id, "588736812464");
    }

    #[tokio::test]
    async fn test_login_all_is_fail_fast() {
        let (broker, _dir) = broker(FakeProvider::new().failing_login("default-sso"));
        let mut session = ActiveSession::new();

        let err = broker.login(&mut session, &LoginTarget::All).await.unwrap_err();

        assert_eq!(err.profile(), Some("default-sso"));
        assert!(matches!(err, BrokerError::AuthenticationFailed { .. }));
        // production-sso comes after default-sso and is never attempted
        assert_eq!(broker.provider().calls(), vec!["login:default-sso"]);
        assert_eq!(session.selected_profile(), None);
    }

    #[tokio::test]
    async fn test_failed_login_leaves_session_unchanged() {
        let (broker, _dir) = broker(FakeProvider::new().failing_login("production-sso"));
        let mut session = ActiveSession::new();
        session.select("default-sso");
        session.set_exported(EnvCredentials::from(&CredentialSet::new(
            "default-sso",
            "AKIA1",
            "SECRET1",
            "TOK1",
        )));
        let before = session.clone();
        let env_before = session.environment(broker.registry());

        let err = broker
            .login(&mut session, &LoginTarget::Profile("production-sso".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::AuthenticationFailed { .. }));
        assert_eq!(session, before);
        assert_eq!(session.environment(broker.registry()), env_before);
    }

    #[tokio::test]
    async fn test_login_unknown_profile() {
        let (broker, _dir) = broker(FakeProvider::new());
        let mut session = ActiveSession::new();

        let err = broker
            .login(&mut session, &LoginTarget::Profile("staging".to_string()))
            .await
            .unwrap_err();

        assert!(matches!(err, BrokerError::ProfileNotFound { .. }));
        assert!(broker.provider().calls().is_empty());
    }

    #[tokio::test]
    async fn test_login_default_target() {
        let (broker, _dir) = broker(FakeProvider::new());
        let mut session = ActiveSession::new();

        let report = broker.login(&mut session, &LoginTarget::Default).await.unwrap();

        assert_eq!(report.active_profile, "default-sso");
        assert_eq!(
            broker.provider().calls(),
            vec!["login:default-sso", "verify:default-sso"]
        );
    }

    #[tokio::test]
    async fn test_unverified_login_is_still_success() {
        let (broker, _dir) = broker(FakeProvider::new().unverifiable("production-sso"));
        let mut session = ActiveSession::new();

        let report = broker
            .login(&mut session, &LoginTarget::Profile("production-sso".to_string()))
            .await
            .unwrap();

        assert!(matches!(
            report.outcomes[0].verification,
            Verification::Unverified { .. }
        ));
        assert_eq!(session.selected_profile(), Some("production-sso"));
        // exactly one verification, no retry
        assert_eq!(
            broker.provider().calls(),
            vec!["login:production-sso", "verify:production-sso"]
        );
    }

    #[tokio::test]
    async fn test_static_profile_skips_interactive_login() {
        let mut ci = Profile::sso("ci", "111111111111", "Deployer", "eu-west-1");
        ci.kind = ProfileKind::Static;
        let registry = ProfileRegistry::new(vec![ci], "ci", vec![]).unwrap();
        let dir = tempfile::TempDir::new().unwrap();
        let provider = FakeProvider::new()
            .account("ci", "111111111111")
            .logged_in("ci");
        let broker = Broker::new(registry, provider, dir.path().join("credentials"))
            .with_verify_delay(Duration::ZERO);
        let mut session = ActiveSession::new();

        let report = broker
            .login(&mut session, &LoginTarget::Profile("ci".to_string()))
            .await
            .unwrap();

        assert!(report.outcomes[0].is_verified());
        assert_eq!(broker.provider().calls(), vec!["verify:ci"]);

        // `all` only covers SSO profiles
        let report = broker.login(&mut session, &LoginTarget::All).await.unwrap();
        assert!(report.outcomes.is_empty());
    }
}
