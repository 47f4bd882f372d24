//! # Runtime
//!
//! Process wiring of the controller.
//!
//! - `initialization.rs` - crypto provider, tracing, metrics, client and store setup
//! - `watch_loop.rs` - kube-runtime `Controller` driving the replicas syncer
//! - `error_policy.rs` - per-autoscaler Fibonacci requeue backoff
//! - `label_watch.rs` - autoscaler watch feeding the label worker pool

pub mod error_policy;
pub mod initialization;
pub mod label_watch;
pub mod watch_loop;

pub use error_policy::ReconcileContext;
pub use initialization::{init_tracing, initialize, install_crypto_provider, InitializationResult};

use crate::controller::replicas::ReplicasSyncer;
use crate::controller::scale_ref::{AsyncWorker, LabelEvent, ScaleRefLabeler};
use crate::controller::reschedule::RescheduleHandler;
use crate::server::{start_server, AppState};
use anyhow::Result;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::api::Api;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}

/// Run every controller component until shutdown
///
/// The HTTP server, the label watch and the label workers stop on the shared
/// cancellation token; the autoscaler controller stops on the signal itself.
pub async fn run_controller(init: InitializationResult) -> Result<()> {
    let token = CancellationToken::new();
    let shutdown_token = token.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
        shutdown_token.cancel();
    });

    let state = AppState::new(Arc::new(RescheduleHandler::new(Arc::clone(&init.store))));
    let server_state = state.clone();
    let server_token = token.clone();
    let port = init.config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(port, server_state, server_token).await {
            error!(error = %e, "HTTP server error");
        }
    });

    let worker = Arc::new(AsyncWorker::<LabelEvent>::new("scale-ref-labeler"));
    let worker_handles = worker.run(
        init.config.label_worker_count,
        Arc::new(ScaleRefLabeler::new(Arc::clone(&init.store))),
        token.clone(),
    );

    let autoscalers: Api<HorizontalPodAutoscaler> = Api::all(init.client.clone());
    let label_watch = tokio::spawn(label_watch::run_label_watch(
        autoscalers.clone(),
        Arc::clone(&worker),
        init.config.watch_restart_delay(),
        token.clone(),
    ));

    let ctx = Arc::new(ReconcileContext::new(
        ReplicasSyncer::new(Arc::clone(&init.store), Arc::clone(&init.fields)),
        init.config.error_backoff_min_secs,
        init.config.error_backoff_max_secs,
    ));

    state.set_ready(true);
    info!("Controller initialized, starting watch loop...");
    watch_loop::run_watch_loop(autoscalers, ctx).await;

    state.set_ready(false);
    token.cancel();
    if let Err(e) = label_watch.await {
        warn!(error = %e, "Label watch task failed");
    }
    for handle in worker_handles {
        if let Err(e) = handle.await {
            warn!(error = %e, "Label worker task failed");
        }
    }
    if let Err(e) = server_handle.await {
        warn!(error = %e, "HTTP server task failed");
    }

    info!("Controller stopped gracefully");
    Ok(())
}
