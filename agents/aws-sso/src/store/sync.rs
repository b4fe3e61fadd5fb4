//! Credential File Synchronizer
//!
//! The only writer of the legacy credentials file. Every overwrite of an
//! existing file is preceded by a byte-identical backup, incomplete
//! credential sets abort before the destination is touched, and the new
//! content lands via write-to-temp-then-rename.

use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::{check_writable, CredentialsFile};
use crate::error::{BrokerError, Result};
use crate::provider::CredentialSet;

/// Outcome of a successful `write_sections`
#[derive(Debug, Clone)]
pub struct WriteReport {
    pub path: PathBuf,
    /// Snapshot of the previous file, if there was one
    pub backup: Option<PathBuf>,
    /// Sections written, in caller order
    pub sections: Vec<String>,
}

/// Writer for one credentials file path
#[derive(Debug, Clone)]
pub struct CredentialFileSynchronizer {
    path: PathBuf,
}

impl CredentialFileSynchronizer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current file contents, empty if the file does not exist yet
    pub fn load(&self) -> Result<CredentialsFile> {
        if !self.path.exists() {
            return Ok(CredentialsFile::default());
        }
        let contents = fs::read_to_string(&self.path)?;
        CredentialsFile::parse(&self.path.display().to_string(), &contents)
    }

    /// Update `sections` in the file, leaving all other sections in place
    pub fn write_sections(&self, sections: &[(String, CredentialSet)]) -> Result<WriteReport> {
        for (section, creds) in sections {
            check_writable(section, creds)?;
        }

        let backup = if self.path.exists() {
            Some(self.backup()?)
        } else {
            None
        };

        for (section, creds) in sections {
            if let Some(field) = creds.missing_field() {
                return Err(BrokerError::IncompleteCredentials {
                    section: section.clone(),
                    field,
                });
            }
        }

        let mut file = self.load()?;
        for (section, creds) in sections {
            file.upsert_credentials(section, creds);
        }

        write_atomic(&self.path, file.render().as_bytes())?;

        let names: Vec<String> = sections.iter().map(|(name, _)| name.clone()).collect();
        info!(
            path = %self.path.display(),
            sections = %names.join(", "),
            "Credentials file updated"
        );

        Ok(WriteReport {
            path: self.path.clone(),
            backup,
            sections: names,
        })
    }

    /// Backups taken so far, oldest first
    pub fn backups(&self) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}.bak.", self.file_name());
        let mut backups: Vec<PathBuf> = fs::read_dir(self.parent())?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .collect();
        backups.sort();
        Ok(backups)
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "credentials".to_string())
    }

    fn parent(&self) -> &Path {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        }
    }

    /// Copy the current file to `<name>.bak.<timestamp>` next to it
    fn backup(&self) -> Result<PathBuf> {
        let stamp = Utc::now().format("%Y%m%dT%H%M%S%.9fZ").to_string();
        let base = format!("{}.bak.{}", self.file_name(), stamp);

        let mut candidate = self.parent().join(&base);
        let mut n = 1;
        while candidate.exists() {
            candidate = self.parent().join(format!("{}-{}", base, n));
            n += 1;
        }

        fs::copy(&self.path, &candidate)?;
        debug!("Backed up {} to {}", self.path.display(), candidate.display());
        Ok(candidate)
    }
}

/// Write `contents` to a sibling temp file, then rename over `path`
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "credentials".to_string());
    let tmp = parent.join(format!(
        ".{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        Utc::now().timestamp_nanos_opt().unwrap_or_default()
    ));

    let written = (|| -> std::io::Result<()> {
        let mut file = open_owner_only(&tmp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    Ok(())
}

#[cfg(unix)]
fn open_owner_only(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;
    fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_owner_only(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new().write(true).create_new(true).open(path)
}
