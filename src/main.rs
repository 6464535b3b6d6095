use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use clap::Parser;
use color_eyre::Result;
use eyre::WrapErr;

use deploy_helper::config::AppConfig;
use deploy_helper::project::{self, Project};
use deploy_helper::{DeployHelper, DeployPlan};

#[derive(Parser, Debug)]
#[command(name = "deploy-helper")]
#[command(about = "Deploy, register and verify smart contracts from a deployment plan")]
#[command(version)]
struct Cli {
    /// Deployment plan (TOML)
    plan: PathBuf,

    /// Network to deploy to, as named in the config
    #[arg(short, long)]
    network: String,

    /// Path to the project directory
    #[arg(short, long, default_value = ".")]
    project: PathBuf,

    /// Skip project detection and force a specific project type
    #[arg(long, value_parser = ["foundry", "hardhat"])]
    project_type: Option<String>,

    /// Config file, instead of deploy.toml or the user config
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let project_path = cli.project.canonicalize().unwrap_or(cli.project);

    let project = match cli.project_type.as_deref() {
        Some("foundry") => Project::new_foundry(&project_path)?,
        Some("hardhat") => Project::new_hardhat(&project_path)?,
        _ => project::detect(&project_path)?,
    };

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(&project.root)?,
    };

    init_tracing(&project.root.join(&config.output.log_file))?;

    let plan = DeployPlan::load(&cli.plan)?;
    let mut helper = DeployHelper::connect(&config, &cli.network, &project)?;
    helper.init().await?;

    plan.run(&mut helper)
        .await
        .wrap_err_with(|| format!("Deployment plan {:?} failed", cli.plan))?;

    let report = helper.post_run().await?;
    tracing::info!(
        "Done: {} contracts, {} verified, {} failed verification, cost {} wei",
        report.contracts.len(),
        report.verification.passed,
        report.verification.failed,
        report.total_cost
    );

    Ok(())
}

/// Stdout plus an append-only progress log without ANSI colors
fn init_tracing(log_file: &Path) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .wrap_err_with(|| format!("Failed to open log file {:?}", log_file))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .init();

    Ok(())
}
