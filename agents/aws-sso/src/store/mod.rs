//! Legacy credentials file
//!
//! Section-keyed `~/.aws/credentials` format for tools that cannot use SSO:
//!
//! ```text
//! [production]
//! aws_access_key_id = AKIA...
//! aws_secret_access_key = ...
//! aws_session_token = ...
//! ```
//!
//! Comment and blank lines are accepted on read but not preserved on write.

pub mod sync;

pub use sync::{CredentialFileSynchronizer, WriteReport};

use crate::error::{BrokerError, Result};
use crate::provider::CredentialSet;

pub const KEY_ACCESS_KEY_ID: &str = "aws_access_key_id";
pub const KEY_SECRET_ACCESS_KEY: &str = "aws_secret_access_key";
pub const KEY_SESSION_TOKEN: &str = "aws_session_token";

/// Why `name` cannot be written as a `[name]` header, if it cannot
pub fn invalid_section_name(name: &str) -> Option<&'static str> {
    if name.trim().is_empty() {
        Some("section name is empty")
    } else if name.contains(['\n', '\r']) {
        Some("section name contains a line break")
    } else if name.contains(['[', ']']) {
        Some("section name contains a bracket")
    } else if name.trim() != name {
        Some("section name has surrounding whitespace")
    } else {
        None
    }
}

/// First credential key whose value contains a line break
fn value_with_line_break(creds: &CredentialSet) -> Option<&'static str> {
    [
        (KEY_ACCESS_KEY_ID, &creds.access_key_id),
        (KEY_SECRET_ACCESS_KEY, &creds.secret_access_key),
        (KEY_SESSION_TOKEN, &creds.session_token),
    ]
    .into_iter()
    .find(|(_, value)| value.contains(['\n', '\r']))
    .map(|(key, _)| key)
}

/// Reject sections that would not parse back as written
pub fn check_writable(section: &str, creds: &CredentialSet) -> Result<()> {
    if let Some(reason) = invalid_section_name(section) {
        return Err(BrokerError::InvalidSection {
            section: section.to_string(),
            reason: reason.to_string(),
        });
    }
    if let Some(key) = value_with_line_break(creds) {
        return Err(BrokerError::InvalidSection {
            section: section.to_string(),
            reason: format!("{} contains a line break", key),
        });
    }
    Ok(())
}

/// One `[name]` block and its entries in file order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub name: String,
    entries: Vec<(String, String)>,
}

impl Section {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    fn set(&mut self, key: &str, value: &str) {
        match self.entries.iter_mut().find(|(k, _)| k == key) {
            Some(entry) => entry.1 = value.to_string(),
            None => self.entries.push((key.to_string(), value.to_string())),
        }
    }
}

/// Parsed credentials file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CredentialsFile {
    sections: Vec<Section>,
}

impl CredentialsFile {
    /// Parse file contents; `origin` is only used in error messages
    pub fn parse(origin: &str, contents: &str) -> Result<Self> {
        let mut sections: Vec<Section> = Vec::new();

        for (index, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let malformed = |message: &str| BrokerError::Store {
                path: origin.to_string(),
                line: index + 1,
                message: message.to_string(),
            };

            if let Some(header) = line.strip_prefix('[') {
                let name = header
                    .strip_suffix(']')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| malformed("invalid section header"))?;
                sections.push(Section::new(name));
                continue;
            }

            let (key, value) = line
                .split_once('=')
                .ok_or_else(|| malformed("expected `key = value`"))?;
            let section = sections
                .last_mut()
                .ok_or_else(|| malformed("entry outside of any section"))?;
            section
                .entries
                .push((key.trim().to_string(), value.trim().to_string()));
        }

        Ok(Self { sections })
    }

    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    pub fn section_names(&self) -> Vec<&str> {
        self.sections.iter().map(|s| s.name.as_str()).collect()
    }

    /// Replace the credential keys of `name`, appending the section if new
    ///
    /// Other keys of the section (e.g. `region`) and every other section
    /// are left as they are.
    pub fn upsert_credentials(&mut self, name: &str, creds: &CredentialSet) {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(index) => index,
            None => {
                self.sections.push(Section::new(name));
                self.sections.len() - 1
            }
        };

        let section = &mut self.sections[index];
        section.set(KEY_ACCESS_KEY_ID, &creds.access_key_id);
        section.set(KEY_SECRET_ACCESS_KEY, &creds.secret_access_key);
        section.set(KEY_SESSION_TOKEN, &creds.session_token);
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (i, section) in self.sections.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(&format!("[{}]\n", section.name));
            for (key, value) in &section.entries {
                out.push_str(&format!("{} = {}\n", key, value));
            }
        }
        out
    }
}
