//! # Error Policy
//!
//! Requeue policy for failed reconciles. Each autoscaler has its own
//! Fibonacci backoff, so one failing autoscaler never slows down another.
//! A successful reconcile resets the autoscaler's backoff.

use crate::controller::backoff::FibonacciBackoff;
use crate::controller::replicas::{ReplicasSyncer, SyncError};
use crate::observability;
use crate::store::ObjectKey;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{error, info};

/// Shared state of the reconcile and error policy functions
pub struct ReconcileContext {
    pub syncer: ReplicasSyncer,
    backoff_min_secs: u64,
    backoff_max_secs: u64,
    backoff_states: Mutex<HashMap<ObjectKey, FibonacciBackoff>>,
}

impl std::fmt::Debug for ReconcileContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconcileContext")
            .field("syncer", &self.syncer)
            .field("backoff_min_secs", &self.backoff_min_secs)
            .field("backoff_max_secs", &self.backoff_max_secs)
            .finish_non_exhaustive()
    }
}

impl ReconcileContext {
    pub fn new(syncer: ReplicasSyncer, backoff_min_secs: u64, backoff_max_secs: u64) -> Self {
        Self {
            syncer,
            backoff_min_secs,
            backoff_max_secs,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Next requeue delay for `key`, advancing its backoff
    pub fn next_backoff(&self, key: &ObjectKey) -> Duration {
        let (min, max) = (self.backoff_min_secs, self.backoff_max_secs);
        self.states()
            .entry(key.clone())
            .or_insert_with(|| FibonacciBackoff::new(min, max))
            .next_backoff()
    }

    /// Forget the backoff of `key` after a successful reconcile
    pub fn reset_backoff(&self, key: &ObjectKey) {
        self.states().remove(key);
    }

    fn states(&self) -> MutexGuard<'_, HashMap<ObjectKey, FibonacciBackoff>> {
        self.backoff_states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

pub(crate) fn key_of(autoscaler: &HorizontalPodAutoscaler) -> ObjectKey {
    ObjectKey {
        namespace: autoscaler.metadata.namespace.clone(),
        name: autoscaler.metadata.name.clone().unwrap_or_default(),
    }
}

/// Handle a reconcile error with Fibonacci backoff
pub fn handle_reconciliation_error(
    autoscaler: Arc<HorizontalPodAutoscaler>,
    error: &SyncError,
    ctx: Arc<ReconcileContext>,
) -> Action {
    let key = key_of(&autoscaler);
    error!(autoscaler = %key, error = %error, "Reconciliation error");
    observability::metrics::increment_reconciliation_errors();

    let delay = ctx.next_backoff(&key);
    info!(
        autoscaler = %key,
        backoff_secs = delay.as_secs(),
        "Retrying with Fibonacci backoff (trigger source: error-backoff)"
    );
    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplicaFieldTable;
    use crate::store::InMemoryStore;

    fn context() -> ReconcileContext {
        ReconcileContext::new(
            ReplicasSyncer::new(
                Arc::new(InMemoryStore::new()),
                Arc::new(ReplicaFieldTable::builtin()),
            ),
            5,
            300,
        )
    }

    #[test]
    fn test_backoff_is_tracked_per_autoscaler() {
        let ctx = context();
        let web = ObjectKey::namespaced("default", "web");
        let api = ObjectKey::namespaced("default", "api");

        assert_eq!(ctx.next_backoff(&web), Duration::from_secs(5));
        assert_eq!(ctx.next_backoff(&web), Duration::from_secs(5));
        assert_eq!(ctx.next_backoff(&web), Duration::from_secs(10));
        assert_eq!(ctx.next_backoff(&api), Duration::from_secs(5));
    }

    #[test]
    fn test_success_resets_backoff() {
        let ctx = context();
        let web = ObjectKey::namespaced("default", "web");
        for _ in 0..5 {
            ctx.next_backoff(&web);
        }
        ctx.reset_backoff(&web);
        assert_eq!(ctx.next_backoff(&web), Duration::from_secs(5));
    }
}
