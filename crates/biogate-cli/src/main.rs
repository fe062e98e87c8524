//! Biogate CLI - drive the biometric authentication gate from a shell
//!
//! The sensor is simulated; flags decide what it reports and how the next
//! challenge resolves. Settings and the login token persist in the data
//! directory, so lockouts carry over between invocations.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biogate_core::{
    platform::{
        simulated::ScriptedChallenge, CODE_AUTHENTICATION_FAILED, CODE_SYSTEM_CANCEL,
        CODE_USER_CANCEL, CODE_USER_FALLBACK,
    },
    BiometricAuthManager, BiometricCapabilities, BiometricSettings, ChallengeResponse,
    EncryptedFileVault, FileStore, LockoutStatus, PromptOptions, SimulatedPlatform,
    TracingFeedback,
};

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "biogate")]
#[command(about = "Biometric authentication gate with failure lockout", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to $BIOGATE_CONFIG or the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(flatten)]
    platform: PlatformArgs,
}

/// Simulated sensor behaviour
#[derive(Args)]
struct PlatformArgs {
    /// Report no biometric hardware
    #[arg(long, global = true)]
    no_hardware: bool,

    /// Report hardware without an enrolled biometric
    #[arg(long, global = true)]
    not_enrolled: bool,

    /// How the next challenge resolves
    #[arg(long, global = true, value_enum, default_value_t = Outcome::Success)]
    outcome: Outcome,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Outcome {
    Success,
    Failed,
    #[value(name = "user_cancel")]
    UserCancel,
    #[value(name = "system_cancel")]
    SystemCancel,
    #[value(name = "user_fallback")]
    UserFallback,
    /// The platform call itself errors
    Error,
}

impl Outcome {
    fn scripted(self) -> ScriptedChallenge {
        let failure = |code: &str| ScriptedChallenge::Respond(ChallengeResponse::failure(code));
        match self {
            Outcome::Success => ScriptedChallenge::Respond(ChallengeResponse::success()),
            Outcome::Failed => failure(CODE_AUTHENTICATION_FAILED),
            Outcome::UserCancel => failure(CODE_USER_CANCEL),
            Outcome::SystemCancel => failure(CODE_SYSTEM_CANCEL),
            Outcome::UserFallback => failure(CODE_USER_FALLBACK),
            Outcome::Error => ScriptedChallenge::Error("simulated sensor fault".to_string()),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show sensor capabilities
    Probe,

    /// Show settings and lockout state
    Status,

    /// Enable biometric login
    Enable,

    /// Disable biometric login and revoke the login token
    Disable,

    /// Run one authentication attempt
    Auth {
        /// Prompt shown to the user
        #[arg(short, long)]
        message: Option<String>,

        /// Do not offer the device passcode
        #[arg(long)]
        no_device_fallback: bool,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    capabilities: BiometricCapabilities,
    settings: BiometricSettings,
    lockout: LockoutStatus,
    description: String,
}

fn simulated_platform(args: &PlatformArgs) -> SimulatedPlatform {
    let platform = if args.no_hardware {
        SimulatedPlatform::no_hardware()
    } else if args.not_enrolled {
        SimulatedPlatform::not_enrolled()
    } else {
        SimulatedPlatform::available()
    };
    platform.set_default_reply(args.outcome.scripted());
    platform
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "biogate=info,biogate_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load config
    let config_path = cli.config.clone().or_else(CliConfig::default_path);
    let mut config = match &config_path {
        Some(path) => CliConfig::load(path),
        None => CliConfig::default(),
    };
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    debug!("Using data directory {:?}", config.data_dir);

    // Wire the manager
    let platform = Arc::new(simulated_platform(&cli.platform));
    let store = Arc::new(FileStore::new(config.settings_path()));
    let vault = Arc::new(EncryptedFileVault::new(config.vault_path()));
    let manager = BiometricAuthManager::new(platform, store, vault, config.manager_config())
        .with_feedback(Arc::new(TracingFeedback));

    match cli.command {
        Commands::Probe => {
            let capabilities = manager.initialize().await;
            print_json(&capabilities)?;
        }

        Commands::Status => {
            let capabilities = manager.initialize().await;
            let report = StatusReport {
                capabilities,
                settings: manager.get_settings().await,
                lockout: manager.get_lockout_status().await,
                description: manager.lockout_description().await,
            };
            print_json(&report)?;
        }

        Commands::Enable => {
            let result = manager.enable_biometric_auth().await;
            print_json(&result)?;
            if !result.success {
                std::process::exit(1);
            }
        }

        Commands::Disable => {
            manager.initialize().await;
            manager.disable_biometric_auth().await;
            info!("Biometric login disabled");
        }

        Commands::Auth {
            message,
            no_device_fallback,
        } => {
            let mut options = match message {
                Some(message) => PromptOptions::with_message(message),
                None => PromptOptions::default(),
            };
            options.disable_device_fallback = no_device_fallback;

            manager.initialize().await;
            let result = manager.authenticate(&options).await;
            print_json(&result)?;
            if !result.success {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
