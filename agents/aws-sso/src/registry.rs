//! Profile Registry
//!
//! Static catalog of named identity profiles. Loaded once, either from the
//! built-in table or from a JSON registry file, and read-only afterwards.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::error::{BrokerError, Result};
use crate::provider::parse::is_account_id;
use crate::store::invalid_section_name;

/// How a profile obtains credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    /// Browser-based SSO login
    #[default]
    Sso,
    /// Long-lived keys already configured for the provider
    Static,
}

impl std::fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileKind::Sso => write!(f, "sso"),
            ProfileKind::Static => write!(f, "static"),
        }
    }
}

/// A named identity configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub account_id: String,
    pub role_name: String,
    #[serde(default)]
    pub sso_start_url: String,
    #[serde(default)]
    pub sso_region: String,
    pub region: String,
    #[serde(default)]
    pub kind: ProfileKind,
}

impl Profile {
    /// Create a new SSO profile
    pub fn sso(name: &str, account_id: &str, role_name: &str, region: &str) -> Self {
        Self {
            name: name.to_string(),
            account_id: account_id.to_string(),
            role_name: role_name.to_string(),
            sso_start_url: DEFAULT_SSO_START_URL.to_string(),
            sso_region: region.to_string(),
            region: region.to_string(),
            kind: ProfileKind::Sso,
        }
    }

    pub fn is_sso(&self) -> bool {
        self.kind == ProfileKind::Sso
    }
}

/// Pairing of a legacy credentials file section with the profile feeding it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacySection {
    pub section: String,
    pub profile: String,
}

const DEFAULT_SSO_START_URL: &str = "https://my-sso-portal.awsapps.com/start";

/// On-disk registry layout
#[derive(Debug, Deserialize)]
struct RegistryFile {
    default_profile: String,
    profiles: Vec<Profile>,
    #[serde(default)]
    legacy_sections: Vec<LegacySection>,
}

/// Read-only catalog of profiles
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: Vec<Profile>,
    default_profile: String,
    legacy_sections: Vec<LegacySection>,
}

impl ProfileRegistry {
    /// Build a registry, validating names and cross references
    pub fn new(
        profiles: Vec<Profile>,
        default_profile: impl Into<String>,
        legacy_sections: Vec<LegacySection>,
    ) -> Result<Self> {
        let default_profile = default_profile.into();

        if profiles.is_empty() {
            return Err(BrokerError::Config("no profiles defined".to_string()));
        }

        let mut seen = HashSet::new();
        for profile in &profiles {
            if profile.name.trim().is_empty() {
                return Err(BrokerError::Config("profile with empty name".to_string()));
            }
            if !is_account_id(&profile.account_id) {
                return Err(BrokerError::Config(format!(
                    "profile {} has account id {:?}, expected 12 digits",
                    profile.name, profile.account_id
                )));
            }
            if !seen.insert(profile.name.as_str()) {
                return Err(BrokerError::Config(format!(
                    "duplicate profile: {}",
                    profile.name
                )));
            }
        }

        let registry = Self {
            profiles,
            default_profile,
            legacy_sections,
        };

        if !registry.contains(&registry.default_profile) {
            return Err(BrokerError::Config(format!(
                "default profile {} is not defined",
                registry.default_profile
            )));
        }
        for pair in &registry.legacy_sections {
            if let Some(reason) = invalid_section_name(&pair.section) {
                return Err(BrokerError::Config(format!(
                    "legacy section [{}]: {}",
                    pair.section, reason
                )));
            }
            if !registry.contains(&pair.profile) {
                return Err(BrokerError::Config(format!(
                    "legacy section [{}] refers to unknown profile {}",
                    pair.section, pair.profile
                )));
            }
        }

        Ok(registry)
    }

    /// The built-in two-account table
    pub fn builtin() -> Self {
        let profiles = vec![
            Profile::sso("default-sso", "588736812464", "AdministratorAccess", "us-east-1"),
            Profile::sso("production-sso", "384822754266", "AdministratorAccess", "us-east-1"),
        ];
        let legacy_sections = vec![
            LegacySection {
                section: "production".to_string(),
                profile: "production-sso".to_string(),
            },
            LegacySection {
                section: "default".to_string(),
                profile: "default-sso".to_string(),
            },
        ];

        Self {
            profiles,
            default_profile: "default-sso".to_string(),
            legacy_sections,
        }
    }

    /// Load a registry from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading profile registry from {}", path.display());

        let raw = std::fs::read_to_string(path)?;
        let file: RegistryFile = serde_json::from_str(&raw)
            .map_err(|e| BrokerError::Config(format!("{}: {}", path.display(), e)))?;

        Self::new(file.profiles, file.default_profile, file.legacy_sections)
    }

    /// Look up a profile by name
    pub fn lookup(&self, name: &str) -> Result<&Profile> {
        self.profiles
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| BrokerError::ProfileNotFound {
                name: name.to_string(),
                available: self.list(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.profiles.iter().any(|p| p.name == name)
    }

    /// Profile names in registry order
    pub fn list(&self) -> Vec<String> {
        self.profiles.iter().map(|p| p.name.clone()).collect()
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    /// SSO profiles in the fixed order used for `login all`
    pub fn sso_profiles(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter().filter(|p| p.is_sso())
    }

    pub fn default_profile(&self) -> &str {
        &self.default_profile
    }

    /// The canonical section/profile pairs kept together in the legacy file
    pub fn legacy_sections(&self) -> &[LegacySection] {
        &self.legacy_sections
    }
}
