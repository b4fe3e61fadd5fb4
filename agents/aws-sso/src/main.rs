//! AWS SSO Credential Broker
//!
//! Logs in SSO profiles, verifies them, and projects their short-lived
//! credentials into the environment or the legacy credentials file.
//!
//! # Usage
//! ```bash
//! # Log in every SSO profile, then refresh ~/.aws/credentials
//! aws-sso setup
//!
//! # Log in one profile and show who we are
//! aws-sso login production-sso
//! aws-sso status
//!
//! # Refresh the [production] section from production-sso
//! aws-sso export-file production-sso --section production
//!
//! # Run a tool that only understands static keys
//! aws-sso exec --profile production-sso -- terraform plan
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use aws_sso::broker::types::mask;
use aws_sso::session::ENV_PROFILE;
use aws_sso::{ActiveSession, AwsCliProvider, Broker, BrokerConfig, LoginTarget};

// ============================================================
// CLI Definition
// ============================================================

#[derive(Parser)]
#[command(name = "aws-sso")]
#[command(about = "Multi-account AWS SSO credential broker", long_about = None)]
#[command(version)]
struct Cli {
    /// JSON profile registry (defaults to the built-in profiles)
    #[arg(long, global = true, env = "AWS_SSO_PROFILES_FILE")]
    profiles_file: Option<PathBuf>,

    /// Legacy credentials file (defaults to ~/.aws/credentials)
    #[arg(long, global = true, env = "AWS_SHARED_CREDENTIALS_FILE")]
    credentials_file: Option<PathBuf>,

    /// aws CLI executable
    #[arg(long, global = true, env = "AWS_SSO_AWS_BIN", default_value = "aws")]
    aws_bin: PathBuf,

    /// Seconds to wait after login before verifying
    #[arg(long, global = true, env = "AWS_SSO_VERIFY_DELAY", default_value = "2")]
    verify_delay: u64,

    /// Output format
    #[arg(long, short, global = true, value_enum, default_value = "text")]
    output: OutputFormat,

    /// Log format
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable summary, secrets masked
    Text,
    /// JSON output
    Json,
    /// Shell `export`/`unset` lines for the resulting environment
    Env,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in a profile, "all" SSO profiles, or the default profile
    Login {
        /// Profile name or "all"
        target: Option<String>,
    },

    /// Select a profile without contacting AWS
    Switch {
        /// Profile name
        profile: String,
    },

    /// Export verified credentials for the environment
    Export {
        /// Profile (defaults to $AWS_PROFILE)
        #[arg(long)]
        profile: Option<String>,
    },

    /// Write verified credentials into one credentials file section
    ExportFile {
        /// Profile to take credentials from
        source: String,

        /// Section to write (defaults to the profile name)
        #[arg(long)]
        section: Option<String>,
    },

    /// Refresh the canonical credentials file sections together
    Sync,

    /// Show the selected profile and its identity
    Status,

    /// Forget the session and log out of SSO
    Clear,

    /// Log in all SSO profiles, then sync the credentials file
    Setup,

    /// List registered profiles
    Profiles,

    /// Run a command with exported credentials in its environment
    Exec {
        /// Profile (defaults to $AWS_PROFILE)
        #[arg(long)]
        profile: Option<String>,

        /// Command and arguments
        #[arg(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

// ============================================================
// Main Entry Point
// ============================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_format);

    let config = BrokerConfig {
        profiles_file: cli.profiles_file.clone(),
        credentials_file: cli.credentials_file.clone(),
        aws_bin: cli.aws_bin.clone(),
        verify_delay: Duration::from_secs(cli.verify_delay),
    };
    let broker = config.build().context("Failed to configure broker")?;

    let inherited = std::env::var(ENV_PROFILE).ok();
    let mut session = ActiveSession::from_inherited(inherited.as_deref(), broker.registry());
    debug!(profile = ?session.selected_profile(), "Session initialised");

    run(&broker, &mut session, cli.command, cli.output).await
}

async fn run(
    broker: &Broker<AwsCliProvider>,
    session: &mut ActiveSession,
    command: Commands,
    output: OutputFormat,
) -> Result<()> {
    match command {
        Commands::Login { target } => {
            let target = LoginTarget::parse(target.as_deref());
            let report = broker
                .login(session, &target)
                .await
                .context("Login failed")?;

            emit_with_env(broker, session, output, &report, || report.summary())?;
        }

        Commands::Switch { profile } => {
            let profile = broker.switch_profile(session, &profile)?;

            emit_with_env(broker, session, output, &profile, || {
                format!(
                    "Active profile: {} (account {}, region {})",
                    profile.name, profile.account_id, profile.region
                )
            })?;
        }

        Commands::Export { profile } => {
            let outcome = broker
                .export_to_environment(session, profile.as_deref())
                .await
                .context("Export failed")?;

            emit_with_env(broker, session, output, &outcome, || outcome.summary())?;
        }

        Commands::ExportFile { source, section } => {
            let outcome = broker
                .export_to_file(&source, section.as_deref())
                .await
                .context("Credentials file export failed")?;

            emit(output, &outcome, || outcome.summary())?;
        }

        Commands::Sync => {
            let outcome = broker
                .write_both_known_profiles()
                .await
                .context("Credentials file sync failed")?;

            emit(output, &outcome, || outcome.summary())?;
        }

        Commands::Status => {
            let report = broker.status(session).await;
            emit(output, &report, || report.summary())?;
        }

        Commands::Clear => {
            broker
                .clear_all(session)
                .await
                .context("Session cleared, but SSO logout failed")?;

            emit(output, &serde_json::json!({ "cleared": true }), || {
                "Session cleared and SSO logout complete".to_string()
            })?;
        }

        Commands::Setup => {
            let report = broker
                .super_workflow(session)
                .await
                .context("Setup did not complete")?;

            emit_with_env(broker, session, output, &report, || report.summary())?;
        }

        Commands::Profiles => {
            let listing = broker.profiles(session).await;

            emit(output, &listing, || {
                listing
                    .iter()
                    .map(|entry| {
                        let marker = if entry.selected { "*" } else { " " };
                        let configured = match entry.configured {
                            Some(false) => "  (missing from aws config)",
                            _ => "",
                        };
                        format!(
                            "{} {:<20} {:<14} {:<7} {:<12}{}",
                            marker,
                            entry.profile.name,
                            entry.profile.account_id,
                            entry.profile.kind.to_string(),
                            entry.profile.region,
                            configured
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            })?;
        }

        Commands::Exec { profile, command } => {
            let outcome = broker
                .export_to_environment(session, profile.as_deref())
                .await
                .context("Export failed")?;

            info!(
                profile = %outcome.profile,
                access_key = %mask(&outcome.credentials.access_key_id),
                "Running {}",
                command[0]
            );

            let mut child = tokio::process::Command::new(&command[0]);
            child.args(&command[1..]);
            session.environment(broker.registry()).apply_to(&mut child);

            let status = child
                .status()
                .await
                .with_context(|| format!("Failed to run {}", command[0]))?;

            if !status.success() {
                std::process::exit(status.code().unwrap_or(1));
            }
        }
    }

    Ok(())
}

// ============================================================
// Output
// ============================================================

fn emit<T: Serialize>(
    output: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("Failed to serialize output")?
            );
        }
        OutputFormat::Text | OutputFormat::Env => println!("{}", text()),
    }
    Ok(())
}

/// Like `emit`, but `--output env` prints the session environment for `eval`
fn emit_with_env<T: Serialize>(
    broker: &Broker<AwsCliProvider>,
    session: &ActiveSession,
    output: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<()> {
    match output {
        OutputFormat::Env => {
            print!("{}", session.environment(broker.registry()).to_shell());
            Ok(())
        }
        _ => emit(output, value, text),
    }
}

fn init_logging(verbose: bool, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "info" }));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
