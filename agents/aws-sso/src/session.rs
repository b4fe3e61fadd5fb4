//! Active session and its environment projection
//!
//! The session is an explicit value passed to every broker operation.
//! Nothing here touches the real process environment; callers apply the
//! [`EnvironmentProjection`] themselves (or hand it to a child process).

use serde::Serialize;
use tracing::warn;

use crate::provider::CredentialSet;
use crate::registry::ProfileRegistry;

pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_PROFILE: &str = "AWS_PROFILE";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_DEFAULT_REGION: &str = "AWS_DEFAULT_REGION";

/// The three credential variables, in the order they are projected
pub const CREDENTIAL_VARS: [&str; 3] = [ENV_ACCESS_KEY_ID, ENV_SECRET_ACCESS_KEY, ENV_SESSION_TOKEN];

/// Credentials exported into the environment channel
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct EnvCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
}

impl From<&CredentialSet> for EnvCredentials {
    fn from(creds: &CredentialSet) -> Self {
        Self {
            access_key_id: creds.access_key_id.clone(),
            secret_access_key: creds.secret_access_key.clone(),
            session_token: creds.session_token.clone(),
        }
    }
}

impl std::fmt::Debug for EnvCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("session_token", &"***")
            .finish()
    }
}

/// Process-local broker state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveSession {
    selected_profile: Option<String>,
    exported: Option<EnvCredentials>,
}

impl ActiveSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the selection from a profile variable inherited from the parent
    ///
    /// Names the registry does not know are dropped so the selection
    /// invariant holds from the start.
    pub fn from_inherited(profile: Option<&str>, registry: &ProfileRegistry) -> Self {
        let selected_profile = match profile.map(str::trim).filter(|p| !p.is_empty()) {
            Some(name) if registry.contains(name) => Some(name.to_string()),
            Some(name) => {
                warn!(profile = %name, "Ignoring inherited profile not present in registry");
                None
            }
            None => None,
        };

        Self {
            selected_profile,
            exported: None,
        }
    }

    pub fn selected_profile(&self) -> Option<&str> {
        self.selected_profile.as_deref()
    }

    pub fn exported_credentials(&self) -> Option<&EnvCredentials> {
        self.exported.as_ref()
    }

    /// Select a profile; credentials exported for another profile are dropped
    pub(crate) fn select(&mut self, profile: &str) {
        if self.selected_profile.as_deref() != Some(profile) {
            self.exported = None;
        }
        self.selected_profile = Some(profile.to_string());
    }

    pub(crate) fn set_exported(&mut self, credentials: EnvCredentials) {
        self.exported = Some(credentials);
    }

    pub(crate) fn clear(&mut self) {
        self.selected_profile = None;
        self.exported = None;
    }

    /// Environment variables this session implies
    pub fn environment(&self, registry: &ProfileRegistry) -> EnvironmentProjection {
        let region = self
            .selected_profile
            .as_deref()
            .and_then(|name| registry.lookup(name).ok())
            .map(|p| p.region.clone());

        let mut vars = vec![
            (ENV_PROFILE, self.selected_profile.clone()),
            (ENV_REGION, region.clone()),
            (ENV_DEFAULT_REGION, region),
        ];

        let exported = self.exported.as_ref();
        vars.push((ENV_ACCESS_KEY_ID, exported.map(|c| c.access_key_id.clone())));
        vars.push((
            ENV_SECRET_ACCESS_KEY,
            exported.map(|c| c.secret_access_key.clone()),
        ));
        vars.push((ENV_SESSION_TOKEN, exported.map(|c| c.session_token.clone())));

        EnvironmentProjection { vars }
    }
}

/// Set/unset instruction for each broker-owned environment variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentProjection {
    vars: Vec<(&'static str, Option<String>)>,
}

impl EnvironmentProjection {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(key, _)| *key == name)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> + '_ {
        self.vars.iter().map(|(key, value)| (*key, value.as_deref()))
    }

    /// Apply to a child process command
    pub fn apply_to(&self, command: &mut tokio::process::Command) {
        for (key, value) in self.iter() {
            match value {
                Some(value) => command.env(key, value),
                None => command.env_remove(key),
            };
        }
    }

    /// `KEY=value` lines for the variables that are set
    ///
    /// Unset variables have no dotenv form and are left out; use
    /// `to_shell` when stale values must be cleared.
    pub fn to_dotenv(&self) -> String {
        self.iter()
            .filter_map(|(key, value)| value.map(|v| format!("{}={}\n", key, v)))
            .collect()
    }

    /// POSIX shell lines for `eval`: `export` for set variables, `unset` for the rest
    pub fn to_shell(&self) -> String {
        self.iter()
            .map(|(key, value)| match value {
                Some(v) => format!("export {}='{}'\n", key, v.replace('\'', "'\\''")),
                None => format!("unset {}\n", key),
            })
            .collect()
    }
}
