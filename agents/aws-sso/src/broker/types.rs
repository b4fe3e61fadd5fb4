//! Broker operation targets and outcomes
//!
//! Every outcome can render a short human summary that re-states the
//! resulting profile and identity.

use serde::Serialize;

use crate::provider::CallerIdentity;
use crate::registry::Profile;
use crate::session::EnvCredentials;
use crate::store::WriteReport;

/// Sentinel selecting every SSO profile
pub const ALL_PROFILES: &str = "all";

/// What `login` should authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginTarget {
    /// The registry's default profile
    Default,
    /// Every SSO profile, in registry order
    All,
    Profile(String),
}

impl LoginTarget {
    pub fn parse(target: Option<&str>) -> Self {
        match target.map(str::trim) {
            None | Some("") => LoginTarget::Default,
            Some(ALL_PROFILES) => LoginTarget::All,
            Some(name) => LoginTarget::Profile(name.to_string()),
        }
    }
}

/// Result of the single post-login identity check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Verification {
    Verified(CallerIdentity),
    /// Login succeeded but the identity check could not confirm it yet
    Unverified { reason: String },
}

/// Login result for one profile
#[derive(Debug, Clone, Serialize)]
pub struct LoginOutcome {
    pub profile: String,
    pub verification: Verification,
}

impl LoginOutcome {
    pub fn is_verified(&self) -> bool {
        matches!(self.verification, Verification::Verified(_))
    }
}

/// Result of `login`, for one or all profiles
#[derive(Debug, Clone, Serialize)]
pub struct LoginReport {
    pub outcomes: Vec<LoginOutcome>,
    pub active_profile: String,
}

impl LoginReport {
    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .outcomes
            .iter()
            .map(|outcome| match &outcome.verification {
                Verification::Verified(identity) => format!(
                    "Logged in: {} (account {})",
                    outcome.profile, identity.account_id
                ),
                Verification::Unverified { reason } => format!(
                    "Logged in: {} (not yet verified: {})",
                    outcome.profile, reason
                ),
            })
            .collect();
        lines.push(format!("Active profile: {}", self.active_profile));
        lines.join("\n")
    }
}

/// Result of `export_to_environment`
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub profile: String,
    pub account_id: String,
    pub credentials: EnvCredentials,
}

impl ExportOutcome {
    pub fn summary(&self) -> String {
        format!(
            "Exported credentials for {} (account {}, access key {})",
            self.profile,
            self.account_id,
            mask(&self.credentials.access_key_id)
        )
    }
}

/// One section written to the legacy credentials file
#[derive(Debug, Clone, Serialize)]
pub struct SectionWrite {
    pub section: String,
    pub profile: String,
    pub account_id: String,
}

/// Result of `export_to_file` and `write_both_known_profiles`
#[derive(Debug, Clone, Serialize)]
pub struct FileSyncOutcome {
    pub path: String,
    pub backup: Option<String>,
    pub sections: Vec<SectionWrite>,
}

impl FileSyncOutcome {
    pub(crate) fn new(report: WriteReport, sections: Vec<SectionWrite>) -> Self {
        Self {
            path: report.path.display().to_string(),
            backup: report.backup.map(|p| p.display().to_string()),
            sections,
        }
    }

    pub fn summary(&self) -> String {
        let mut lines: Vec<String> = self
            .sections
            .iter()
            .map(|s| {
                format!(
                    "Wrote [{}] from {} (account {})",
                    s.section, s.profile, s.account_id
                )
            })
            .collect();
        lines.push(format!("Credentials file: {}", self.path));
        if let Some(backup) = &self.backup {
            lines.push(format!("Backup: {}", backup));
        }
        lines.join("\n")
    }
}

/// Read-only view of the active session
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub selected_profile: Option<String>,
    pub region: Option<String>,
    pub identity: Option<CallerIdentity>,
    /// Why the identity is missing, when a profile is selected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusReport {
    pub fn is_active(&self) -> bool {
        self.identity.is_some()
    }

    pub fn summary(&self) -> String {
        let profile = self.selected_profile.as_deref().unwrap_or("(none)");
        let region = self.region.as_deref().unwrap_or("(none)");
        let mut lines = vec![format!("Profile: {}", profile), format!("Region: {}", region)];

        match &self.identity {
            Some(identity) => {
                lines.push(format!("Account: {}", identity.account_id));
                lines.push(format!("Identity: {}", identity.arn));
            }
            None => {
                lines.push("No active credentials".to_string());
                if let Some(profile) = &self.selected_profile {
                    lines.push(format!("Run `aws-sso login {}` to re-authenticate", profile));
                }
            }
        }
        lines.join("\n")
    }
}

/// Registry entry as shown by `profiles`
#[derive(Debug, Clone, Serialize)]
pub struct ProfileListing {
    #[serde(flatten)]
    pub profile: Profile,
    pub selected: bool,
    /// Whether the provider's own config knows the profile; `None` if it
    /// could not be asked
    pub configured: Option<bool>,
}

/// Result of the login-then-sync workflow
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub login: LoginReport,
    pub sync: FileSyncOutcome,
}

impl WorkflowReport {
    pub fn summary(&self) -> String {
        format!("{}\n{}", self.login.summary(), self.sync.summary())
    }
}

/// Display-safe form of a credential value
pub fn mask(value: &str) -> String {
    let len = value.chars().count();
    if len <= 8 {
        return "*".repeat(len);
    }
    let head: String = value.chars().take(4).collect();
    let tail: String = value.chars().skip(len - 4).collect();
    format!("{}...{}", head, tail)
}
