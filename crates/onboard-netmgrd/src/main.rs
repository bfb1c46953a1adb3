//! onboardd - applies a network onboarding diff to an appliance

use anyhow::Context;
use clap::Parser;
use onboard_netmgrd::config_file::DEFAULT_CONFIG_PATH;
use onboard_netmgrd::{apply, OnboardConfig, RestStore};
use onboard_orch_common::{ApplyError, CurrentConfig, Diff};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Network onboarding apply engine
#[derive(Parser, Debug)]
#[command(name = "onboardd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Diff to apply (JSON with toUpdate and toDelete)
    #[arg(short = 'd', long)]
    diff: PathBuf,

    /// Current appliance configuration (JSON)
    #[arg(long)]
    current: PathBuf,

    /// Log level (trace, debug, info, warn, error), overrides the config file
    #[arg(short = 'l', long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match OnboardConfig::load_or_default(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("onboardd: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(args.log_level.as_deref().unwrap_or(&config.logging.level));

    info!("--- Starting onboardd ---");

    match run(&args, &config).await {
        Ok(output) => {
            println!("{}", output);
            info!("Onboarding complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Onboarding failed: {:#}", e);
            if e.downcast_ref::<ApplyError>().is_some_and(ApplyError::is_retryable) {
                warn!("The appliance reported a transient failure, a later run may succeed");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args, config: &OnboardConfig) -> anyhow::Result<String> {
    config.validate()?;

    let diff: Diff = read_json(&args.diff)?;
    let current: CurrentConfig = read_json(&args.current)?;
    let store = RestStore::new(config)?;

    let status = apply(&diff, &store, &current).await?;
    if status.reboot_required {
        info!("Appliance must be rebooted to complete provisioning");
    }
    Ok(serde_json::to_string_pretty(&status)?)
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_level(true)
        .init();
}
