//! `aws` CLI provider
//!
//! Drives the AWS CLI v2 as a subprocess. Login inherits the terminal so the
//! browser/device-code prompt reaches the user; every other call captures
//! stdout and parses it.

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;
use tracing::debug;

use super::parse::{parse_caller_identity, parse_process_credentials, parse_profile_list};
use super::{CallerIdentity, CredentialSet, IdentityProvider, VerifyTarget};
use crate::error::{BrokerError, Result};
use crate::session::{
    CREDENTIAL_VARS, ENV_ACCESS_KEY_ID, ENV_PROFILE, ENV_SECRET_ACCESS_KEY, ENV_SESSION_TOKEN,
};

/// Identity provider backed by the `aws` binary
#[derive(Debug, Clone)]
pub struct AwsCliProvider {
    bin: PathBuf,
}

impl Default for AwsCliProvider {
    fn default() -> Self {
        Self::new("aws")
    }
}

impl AwsCliProvider {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    /// Base command with inherited credential variables removed so that
    /// `--profile` is the only credential source
    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(&self.bin);
        cmd.args(args);
        for var in CREDENTIAL_VARS {
            cmd.env_remove(var);
        }
        cmd.kill_on_drop(true);
        cmd
    }

    async fn output(&self, mut cmd: Command, what: &str) -> Result<Output> {
        debug!("Running aws {}", what);

        cmd.output().await.map_err(|e| {
            BrokerError::Provider(format!("failed to run {} {}: {}", self.bin.display(), what, e))
        })
    }
}

fn stderr_reason(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("exited with {}", output.status)
    } else {
        stderr.to_string()
    }
}

#[async_trait]
impl IdentityProvider for AwsCliProvider {
    async fn login(&self, profile: &str) -> Result<()> {
        let status = self
            .command(&["sso", "login", "--profile", profile])
            .status()
            .await
            .map_err(|e| BrokerError::Provider(format!("failed to run aws sso login: {}", e)))?;

        if !status.success() {
            return Err(BrokerError::AuthenticationFailed {
                profile: profile.to_string(),
                reason: format!("aws sso login exited with {}", status),
            });
        }

        Ok(())
    }

    async fn logout(&self) -> Result<()> {
        let output = self
            .output(self.command(&["sso", "logout"]), "sso logout")
            .await?;

        if !output.status.success() {
            return Err(BrokerError::Provider(format!(
                "aws sso logout failed: {}",
                stderr_reason(&output)
            )));
        }

        Ok(())
    }

    async fn export_credentials(&self, profile: &str) -> Result<CredentialSet> {
        let cmd = self.command(&[
            "configure",
            "export-credentials",
            "--profile",
            profile,
            "--format",
            "process",
        ]);
        let output = self.output(cmd, "configure export-credentials").await?;

        if !output.status.success() {
            return Err(BrokerError::ExpiredOrInvalidCredentials {
                profile: profile.to_string(),
                reason: stderr_reason(&output),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_process_credentials(profile, &stdout)?)
    }

    async fn caller_identity(&self, target: VerifyTarget<'_>) -> Result<CallerIdentity> {
        let cmd = match target {
            VerifyTarget::Profile(profile) => self.command(&[
                "sts",
                "get-caller-identity",
                "--profile",
                profile,
                "--output",
                "json",
            ]),
            VerifyTarget::Credentials(creds) => {
                let mut cmd = self.command(&["sts", "get-caller-identity", "--output", "json"]);
                cmd.env_remove(ENV_PROFILE)
                    .env_remove("AWS_DEFAULT_PROFILE")
                    .env(ENV_ACCESS_KEY_ID, &creds.access_key_id)
                    .env(ENV_SECRET_ACCESS_KEY, &creds.secret_access_key);
                if !creds.session_token.is_empty() {
                    cmd.env(ENV_SESSION_TOKEN, &creds.session_token);
                }
                cmd
            }
        };

        let output = self.output(cmd, "sts get-caller-identity").await?;

        if !output.status.success() {
            return Err(BrokerError::ExpiredOrInvalidCredentials {
                profile: target.profile_name().to_string(),
                reason: stderr_reason(&output),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_caller_identity(&stdout)?)
    }

    async fn list_profiles(&self) -> Result<Vec<String>> {
        let output = self
            .output(self.command(&["configure", "list-profiles"]), "configure list-profiles")
            .await?;

        if !output.status.success() {
            return Err(BrokerError::Provider(format!(
                "aws configure list-profiles failed: {}",
                stderr_reason(&output)
            )));
        }

        Ok(parse_profile_list(&String::from_utf8_lossy(&output.stdout)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write a fake `aws` script that answers from canned output
    fn fake_aws(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("aws");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_export_credentials_parses_process_output() {
        let dir = TempDir::new().unwrap();
        let bin = fake_aws(
            &dir,
            r#"echo '{"Version":1,"AccessKeyId":"AKIA1","SecretAccessKey":"SECRET1","SessionToken":"TOK1"}'"#,
        );

        let provider = AwsCliProvider::new(bin);
        let creds = provider.export_credentials("production-sso").await.unwrap();

        assert_eq!(creds, CredentialSet::new("production-sso", "AKIA1", "SECRET1", "TOK1"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_is_invalid_credentials() {
        let dir = TempDir::new().unwrap();
        let bin = fake_aws(&dir, "echo 'Token has expired' >&2; exit 255");

        let provider = AwsCliProvider::new(bin);
        let err = provider
            .caller_identity(VerifyTarget::Profile("default-sso"))
            .await
            .unwrap_err();

        match err {
            BrokerError::ExpiredOrInvalidCredentials { profile, reason } => {
                assert_eq!(profile, "default-sso");
                assert_eq!(reason, "Token has expired");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_explicit_credentials_are_passed_through_env() {
        let dir = TempDir::new().unwrap();
        let bin = fake_aws(
            &dir,
            r#"[ -z "$AWS_PROFILE" ] && [ "$AWS_ACCESS_KEY_ID" = "AKIA1" ] || exit 1
echo '{"UserId":"u","Account":"384822754266","Arn":"arn:aws:sts::384822754266:assumed-role/Admin/u"}'"#,
        );

        let provider = AwsCliProvider::new(bin);
        let creds = CredentialSet::new("production-sso", "AKIA1", "SECRET1", "TOK1");
        let identity = provider
            .caller_identity(VerifyTarget::Credentials(&creds))
            .await
            .unwrap();

        assert_eq!(identity.account_id, "384822754266");
    }

    #[tokio::test]
    async fn test_missing_binary_is_provider_error() {
        let provider = AwsCliProvider::new("/nonexistent/aws");
        let err = provider.list_profiles().await.unwrap_err();
        assert!(matches!(err, BrokerError::Provider(_)));
    }
}
