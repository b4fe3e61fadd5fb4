//! Typed parsing of `aws` CLI output

use serde::Deserialize;
use thiserror::Error;

use super::{CallerIdentity, CredentialSet};

/// Provider output that could not be turned into a typed value
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Empty {0} output")]
    Empty(&'static str),

    #[error("Invalid {what} output: {source}")]
    Json {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unresolvable account id: {0:?}")]
    InvalidAccountId(String),
}

/// `aws configure export-credentials --format process`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ProcessCredentials {
    access_key_id: String,
    secret_access_key: String,
    #[serde(default)]
    session_token: Option<String>,
}

/// `aws sts get-caller-identity --output json`
#[derive(Debug, Deserialize)]
struct CallerIdentityResponse {
    #[serde(rename = "UserId", default)]
    user_id: String,
    #[serde(rename = "Account")]
    account: String,
    #[serde(rename = "Arn")]
    arn: String,
}

/// Parse credential-process JSON into a credential set for `profile`
pub fn parse_process_credentials(
    profile: &str,
    output: &str,
) -> Result<CredentialSet, ParseError> {
    let output = output.trim();
    if output.is_empty() {
        return Err(ParseError::Empty("export-credentials"));
    }

    let creds: ProcessCredentials =
        serde_json::from_str(output).map_err(|source| ParseError::Json {
            what: "export-credentials",
            source,
        })?;

    Ok(CredentialSet::new(
        profile,
        creds.access_key_id,
        creds.secret_access_key,
        creds.session_token.unwrap_or_default(),
    ))
}

/// Parse caller identity JSON, requiring a 12-digit account id
pub fn parse_caller_identity(output: &str) -> Result<CallerIdentity, ParseError> {
    let output = output.trim();
    if output.is_empty() {
        return Err(ParseError::Empty("get-caller-identity"));
    }

    let response: CallerIdentityResponse =
        serde_json::from_str(output).map_err(|source| ParseError::Json {
            what: "get-caller-identity",
            source,
        })?;

    if !is_account_id(&response.account) {
        return Err(ParseError::InvalidAccountId(response.account));
    }

    Ok(CallerIdentity {
        account_id: response.account,
        arn: response.arn,
        user_id: response.user_id,
    })
}

/// Parse `aws configure list-profiles` (one name per line)
pub fn parse_profile_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Twelve ASCII digits
pub(crate) fn is_account_id(value: &str) -> bool {
    value.len() == 12 && value.chars().all(|c| c.is_ascii_digit())
}
