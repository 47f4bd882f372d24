//! # Initialization
//!
//! Controller initialization: rustls setup, tracing, metrics, replica field
//! table, Kubernetes client and the deadline-bounded object store.

use crate::config::{ControllerConfig, LogFormat, ReplicaFieldTable};
use crate::observability;
use crate::store::{DeadlineStore, KubeStore, ObjectStore};
use anyhow::{Context, Result};
use kube::Client;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Everything the controller components need to run
pub struct InitializationResult {
    pub client: Client,
    pub config: ControllerConfig,
    pub store: Arc<dyn ObjectStore>,
    pub fields: Arc<ReplicaFieldTable>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("config", &self.config)
            .field("replica_fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

/// Install ring as the rustls crypto provider
///
/// Must run before the first TLS connection is made.
pub fn install_crypto_provider() {
    // Err means a provider is already installed for this process
    let _already_installed = rustls::crypto::ring::default_provider().install_default();
}

/// Set up the global tracing subscriber
///
/// `RUST_LOG` wins over the configured log level.
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .context("Failed to parse log filter")?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match config.log_format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Text => builder.try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}

/// Initialize the controller runtime
///
/// Tracing must already be set up.
pub async fn initialize(config: ControllerConfig) -> Result<InitializationResult> {
    info!("Starting Replica Sync Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    observability::metrics::register_metrics()?;

    let fields = ReplicaFieldTable::load(config.replica_fields_file.as_deref())
        .context("Failed to load replica field table")?;
    info!(entries = fields.len(), "Loaded replica field table");

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let store: Arc<dyn ObjectStore> = Arc::new(DeadlineStore::new(
        KubeStore::new(client.clone(), config.field_manager.clone()),
        config.store_request_timeout(),
    ));

    Ok(InitializationResult {
        client,
        config,
        store,
        fields: Arc::new(fields),
    })
}
