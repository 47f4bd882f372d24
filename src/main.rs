//! # Replica Sync Controller
//!
//! Binary entry point. `run` (the default) starts the controller;
//! `reschedule` executes a single Reschedule command against the cluster and
//! exits.

use anyhow::{Context, Result};
use clap::Parser;
use replica_sync_controller::cli::{Cli, Command, RescheduleArgs};
use replica_sync_controller::config::ControllerConfig;
use replica_sync_controller::controller::reschedule::RescheduleHandler;
use replica_sync_controller::runtime;
use replica_sync_controller::store::{DeadlineStore, KubeStore};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    runtime::install_crypto_provider();

    let cli = Cli::parse();
    let config = ControllerConfig::from_env();
    runtime::init_tracing(&config)?;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => {
            let init = runtime::initialize(config).await?;
            runtime::run_controller(init).await
        }
        Command::Reschedule(args) => reschedule(config, args).await,
    }
}

async fn reschedule(config: ControllerConfig, args: RescheduleArgs) -> Result<()> {
    let client = kube::Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;
    let store = DeadlineStore::new(
        KubeStore::new(client, config.field_manager.clone()),
        config.store_request_timeout(),
    );
    let handler = RescheduleHandler::new(Arc::new(store));

    let accepted = handler
        .create(args.into_command())
        .await
        .context("Reschedule failed")?;
    info!(
        reschedule = accepted.metadata.name.as_deref().unwrap_or_default(),
        "Reschedule accepted"
    );
    print!("{}", serde_yaml::to_string(&accepted)?);
    Ok(())
}
