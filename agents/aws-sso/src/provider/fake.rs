//! Scripted in-memory provider for tests

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::{CallerIdentity, CredentialSet, IdentityProvider, VerifyTarget};
use crate::error::{BrokerError, Result};

#[derive(Default)]
struct FakeState {
    logged_in: HashSet<String>,
    calls: Vec<String>,
}

pub(crate) struct FakeProvider {
    accounts: Vec<(String, String)>,
    failing_logins: HashSet<String>,
    unverifiable: HashSet<String>,
    credentials: HashMap<String, CredentialSet>,
    logout_fails: bool,
    state: Mutex<FakeState>,
}

impl FakeProvider {
    /// Provider knowing the built-in registry accounts
    pub(crate) fn new() -> Self {
        Self {
            accounts: vec![
                ("default-sso".to_string(), "588736812464".to_string()),
                ("production-sso".to_string(), "384822754266".to_string()),
            ],
            failing_logins: HashSet::new(),
            unverifiable: HashSet::new(),
            credentials: HashMap::new(),
            logout_fails: false,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn account(mut self, profile: &str, account_id: &str) -> Self {
        self.accounts.push((profile.to_string(), account_id.to_string()));
        self
    }

    pub(crate) fn logged_in(self, profile: &str) -> Self {
        self.state.lock().unwrap().logged_in.insert(profile.to_string());
        self
    }

    pub(crate) fn failing_login(mut self, profile: &str) -> Self {
        self.failing_logins.insert(profile.to_string());
        self
    }

    /// Login succeeds but identity checks keep failing
    pub(crate) fn unverifiable(mut self, profile: &str) -> Self {
        self.unverifiable.insert(profile.to_string());
        self
    }

    pub(crate) fn credentials(mut self, creds: CredentialSet) -> Self {
        self.credentials.insert(creds.profile_name.clone(), creds);
        self
    }

    pub(crate) fn logout_fails(mut self) -> Self {
        self.logout_fails = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub(crate) fn is_logged_in(&self, profile: &str) -> bool {
        self.state.lock().unwrap().logged_in.contains(profile)
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn account_id(&self, profile: &str) -> Option<&str> {
        self.accounts
            .iter()
            .find(|(name, _)| name == profile)
            .map(|(_, account)| account.as_str())
    }

    fn valid(&self, profile: &str) -> bool {
        self.state.lock().unwrap().logged_in.contains(profile)
            && !self.unverifiable.contains(profile)
    }

    fn expired(profile: &str) -> BrokerError {
        BrokerError::ExpiredOrInvalidCredentials {
            profile: profile.to_string(),
            reason: "The SSO session associated with this profile has expired".to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn login(&self, profile: &str) -> Result<()> {
        self.record(format!("login:{}", profile));

        if self.failing_logins.contains(profile) {
            return Err(BrokerError::AuthenticationFailed {
                profile: profile.to_string(),
                reason: "login cancelled".to_string(),
            });
        }

        self.state.lock().unwrap().logged_in.insert(profile.to_string());
        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        self.record("logout".to_string());
        self.state.lock().unwrap().logged_in.clear();

        if self.logout_fails {
            return Err(BrokerError::Provider("sso logout failed".to_string()));
        }
        Ok(())
    }

    async fn export_credentials(&self, profile: &str) -> Result<CredentialSet> {
        self.record(format!("export:{}", profile));

        if !self.state.lock().unwrap().logged_in.contains(profile) {
            return Err(Self::expired(profile));
        }

        Ok(self.credentials.get(profile).cloned().unwrap_or_else(|| {
            CredentialSet::new(
                profile,
                format!("AKIA-{}", profile),
                format!("secret-{}", profile),
                format!("token-{}", profile),
            )
        }))
    }

    async fn caller_identity(&self, target: VerifyTarget<'_>) -> Result<CallerIdentity> {
        let profile = target.profile_name().to_string();
        self.record(format!("verify:{}", profile));

        if let VerifyTarget::Credentials(creds) = target {
            if creds.access_key_id.is_empty() {
                return Err(Self::expired(&profile));
            }
        }

        match self.account_id(&profile) {
            Some(account_id) if self.valid(&profile) => Ok(CallerIdentity {
                account_id: account_id.to_string(),
                arn: format!(
                    "arn:aws:sts::{}:assumed-role/AdministratorAccess/tester",
                    account_id
                ),
                user_id: "AROATESTER:tester".to_string(),
            }),
            _ => Err(Self::expired(&profile)),
        }
    }

    async fn list_profiles(&self) -> Result<Vec<String>> {
        self.record("list-profiles".to_string());
        Ok(self.accounts.iter().map(|(name, _)| name.clone()).collect())
    }
}
