//! # Watch Loop
//!
//! Drives [`ReplicasSyncer`](crate::controller::replicas::ReplicasSyncer) from
//! a kube-runtime `Controller` over every autoscaler in the cluster. The
//! controller serializes reconciles per autoscaler key.

use crate::controller::replicas::SyncError;
use crate::observability;
use crate::runtime::error_policy::{handle_reconciliation_error, key_of, ReconcileContext};
use futures::StreamExt;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::api::Api;
use kube_runtime::{controller::Action, watcher, Controller};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Run the autoscaler controller until SIGINT/SIGTERM
pub async fn run_watch_loop(autoscalers: Api<HorizontalPodAutoscaler>, ctx: Arc<ReconcileContext>) {
    info!("Starting autoscaler watch loop...");
    Controller::new(autoscalers, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, handle_reconciliation_error, ctx)
        .for_each(|result| async move {
            match result {
                Ok((autoscaler, _action)) => debug!(autoscaler = %autoscaler, "watch.event.success"),
                Err(e) => warn!(error = %e, "Controller event failed"),
            }
        })
        .await;
    info!("Autoscaler watch loop stopped");
}

/// One reconcile of the autoscaler delivered by the controller
pub async fn reconcile(
    autoscaler: Arc<HorizontalPodAutoscaler>,
    ctx: Arc<ReconcileContext>,
) -> Result<Action, SyncError> {
    let key = key_of(&autoscaler);
    let span = tracing::info_span!(
        "controller.reconcile",
        autoscaler = %key,
        resource.version = autoscaler.metadata.resource_version.as_deref().unwrap_or("unknown")
    );

    observability::metrics::increment_reconciliations();
    let start = Instant::now();
    let result = ctx.syncer.reconcile(&key).instrument(span).await;
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = result?;
    ctx.reset_backoff(&key);
    debug!(autoscaler = %key, ?outcome, "Reconcile finished");
    Ok(Action::await_change())
}
