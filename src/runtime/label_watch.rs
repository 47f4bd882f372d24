//! # Label Watch
//!
//! Watches autoscalers and queues the label events derived from them. The
//! watch stream reconnects with backoff on errors; if it ends it is restarted
//! after a delay. Nothing here writes to the cluster.

use crate::controller::scale_ref::{AsyncWorker, LabelEvent, LabelEventSource};
use futures::StreamExt;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::api::Api;
use kube_runtime::{watcher, WatchStreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Label events for one watch event
///
/// Initial-list objects are treated like applies; the first listing of an
/// autoscaler labels its target, which is a no-op when already labelled.
/// Autoscalers known before a relist but absent from it get a delete.
pub fn route(
    source: &mut LabelEventSource,
    event: watcher::Event<HorizontalPodAutoscaler>,
) -> Vec<LabelEvent> {
    match event {
        watcher::Event::Apply(autoscaler) | watcher::Event::InitApply(autoscaler) => {
            source.on_apply(autoscaler)
        }
        watcher::Event::Delete(autoscaler) => source.on_delete(autoscaler),
        watcher::Event::Init => {
            source.on_relist_start();
            Vec::new()
        }
        watcher::Event::InitDone => source.on_relist_done(),
    }
}

/// Feed label events into `worker` until `token` is cancelled
pub async fn run_label_watch(
    autoscalers: Api<HorizontalPodAutoscaler>,
    worker: Arc<AsyncWorker<LabelEvent>>,
    restart_delay: Duration,
    token: CancellationToken,
) {
    info!("Starting autoscaler label watch...");
    let mut source = LabelEventSource::new();

    loop {
        let mut stream = watcher(autoscalers.clone(), watcher::Config::default())
            .default_backoff()
            .boxed();

        loop {
            let next = tokio::select! {
                () = token.cancelled() => {
                    info!("Shutdown requested, exiting label watch");
                    return;
                }
                next = stream.next() => next,
            };
            match next {
                Some(Ok(event)) => {
                    for label_event in route(&mut source, event) {
                        worker.add(label_event);
                    }
                }
                Some(Err(e)) => warn!(error = %e, "Autoscaler label watch error"),
                None => break,
            }
        }

        warn!(
            delay_secs = restart_delay.as_secs(),
            "Autoscaler label watch ended, restarting..."
        );
        tokio::select! {
            () = token.cancelled() => return,
            () = tokio::time::sleep(restart_delay) => {}
        }
    }
}
