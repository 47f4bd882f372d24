//! # Scale Reference Labels
//!
//! Marks every scale target with the name of the autoscaler controlling it.
//!
//! Label writes are bookkeeping and must not hold up reconciles, so watch
//! events are turned into [`LabelEvent`]s by the predicate
//! (`predicate.rs`) and queued to a small worker pool (`worker.rs`) that
//! applies them with [`ScaleRefLabeler`]. Every event is idempotent: replaying
//! it against a target already in the desired state sends no write.

mod predicate;
mod worker;

pub use predicate::LabelEventSource;
pub use worker::{AsyncWorker, WorkerHandler};

use crate::constants::SCALE_CONTROL_BY_HPA_LABEL;
use crate::controller::mutation::{patch_diff, MutationOutcome};
use crate::controller::replicas::{scale_target_of, SyncError};
use crate::observability::metrics;
use crate::store::{unstructured, ObjectStore};
use async_trait::async_trait;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use std::sync::Arc;
use tracing::{info, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelEventKind {
    Add,
    Delete,
}

impl LabelEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            LabelEventKind::Add => "add",
            LabelEventKind::Delete => "delete",
        }
    }
}

/// Set or remove the ownership label on the target of `autoscaler`
#[derive(Debug, Clone)]
pub struct LabelEvent {
    pub kind: LabelEventKind,
    pub autoscaler: Arc<HorizontalPodAutoscaler>,
}

impl LabelEvent {
    pub fn add(autoscaler: Arc<HorizontalPodAutoscaler>) -> Self {
        Self {
            kind: LabelEventKind::Add,
            autoscaler,
        }
    }

    pub fn delete(autoscaler: Arc<HorizontalPodAutoscaler>) -> Self {
        Self {
            kind: LabelEventKind::Delete,
            autoscaler,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOutcome {
    /// The target already carried the desired label state
    Unchanged,
    Patched,
    /// The target does not exist (anymore)
    TargetGone,
}

impl LabelOutcome {
    fn as_str(self) -> &'static str {
        match self {
            LabelOutcome::Unchanged => "unchanged",
            LabelOutcome::Patched => "patched",
            LabelOutcome::TargetGone => "target_gone",
        }
    }
}

/// Applies label events to scale targets
pub struct ScaleRefLabeler {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for ScaleRefLabeler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaleRefLabeler").finish_non_exhaustive()
    }
}

impl ScaleRefLabeler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    pub async fn handle(&self, event: &LabelEvent) -> Result<LabelOutcome, SyncError> {
        let (gvk, key) = scale_target_of(&event.autoscaler)?;
        let target = match self.store.get(&gvk, &key).await {
            Ok(target) => target,
            Err(e) if e.is_not_found() => {
                info!(kind = %gvk.kind, target = %key, "Scale target is not found, skip processing");
                return Ok(LabelOutcome::TargetGone);
            }
            Err(e) => return Err(e.into()),
        };

        let mut modified = target.clone();
        match event.kind {
            LabelEventKind::Add => {
                let name = event.autoscaler.metadata.name.as_deref().unwrap_or_default();
                unstructured::set_label(&mut modified, SCALE_CONTROL_BY_HPA_LABEL, name);
            }
            LabelEventKind::Delete => {
                unstructured::remove_label(&mut modified, SCALE_CONTROL_BY_HPA_LABEL);
            }
        }

        let outcome = match patch_diff(self.store.as_ref(), &gvk, &target, &modified).await? {
            MutationOutcome::Unchanged => LabelOutcome::Unchanged,
            MutationOutcome::Patched(_) => {
                info!(
                    event = event.kind.as_str(),
                    kind = %gvk.kind,
                    target = %key,
                    "Updated autoscaler label on scale target"
                );
                LabelOutcome::Patched
            }
            MutationOutcome::TargetGone => LabelOutcome::TargetGone,
        };
        Ok(outcome)
    }
}

#[async_trait]
impl WorkerHandler<LabelEvent> for ScaleRefLabeler {
    type Error = SyncError;

    async fn handle(&self, event: LabelEvent) -> Result<(), SyncError> {
        let autoscaler = format!(
            "{}/{}",
            event.autoscaler.metadata.namespace.as_deref().unwrap_or_default(),
            event.autoscaler.metadata.name.as_deref().unwrap_or_default()
        );
        let span = tracing::info_span!(
            "controller.scale_ref.label",
            event = event.kind.as_str(),
            autoscaler = %autoscaler
        );

        match ScaleRefLabeler::handle(self, &event).instrument(span).await {
            Ok(outcome) => {
                metrics::increment_label_events(event.kind.as_str(), outcome.as_str());
                Ok(())
            }
            Err(e) => {
                metrics::increment_label_events(event.kind.as_str(), "error");
                Err(e)
            }
        }
    }
}
