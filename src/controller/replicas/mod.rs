//! # Replicas Syncer
//!
//! Mirrors an autoscaler's observed replica count onto the replica field of
//! its scale target, but only when the policy claiming the target divides
//! replicas across clusters. Under duplicated scheduling every member
//! cluster's copy is authoritative and the field is never touched.
//!
//! One pass per autoscaler key:
//! 1. fetch the autoscaler (gone → done)
//! 2. fetch its scale target (gone → done)
//! 3. classify the scheduling type of the claiming policy
//! 4. patch the replica field if it differs from the observed count
//!
//! Every error other than not-found is returned to the dispatcher, which
//! requeues with backoff.

mod classifier;
mod patcher;

pub use classifier::{ClaimedPolicy, SchedulingClassifier};
pub use patcher::{PatchOutcome, ScaleTargetPatcher};

use crate::config::ReplicaFieldTable;
use crate::crd::ReplicaSchedulingType;
use crate::store::{get_typed, gvk_from_api_version_kind, ObjectKey, ObjectStore, StoreError};
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use kube::core::GroupVersionKind;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Errors of a reconcile pass or a label event
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("no claimed policy found for {kind} {key}")]
    NoClaimedPolicy { kind: String, key: String },

    #[error("get claimed {policy} failed: {source}")]
    ClaimedPolicy {
        policy: ClaimedPolicy,
        #[source]
        source: StoreError,
    },

    #[error("failed to get {path} from {kind} {key}")]
    ReplicaFieldMissing {
        path: String,
        kind: String,
        key: String,
    },

    #[error("failed to set replicas on {kind} {key}: {reason}")]
    InvalidTarget {
        kind: String,
        key: String,
        reason: String,
    },

    #[error("invalid autoscaler {0}")]
    InvalidAutoscaler(String),
}

/// How a reconcile pass ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The autoscaler no longer exists
    AutoscalerGone,
    /// The scale target no longer exists
    TargetGone,
    /// The autoscaler has not observed a replica count yet
    AwaitingStatus,
    /// The claiming policy duplicates replicas; nothing to do
    Duplicated,
    /// The patcher ran
    Synced(PatchOutcome),
}

/// Type and key of the object an autoscaler scales
pub(crate) fn scale_target_of(
    autoscaler: &HorizontalPodAutoscaler,
) -> Result<(GroupVersionKind, ObjectKey), SyncError> {
    let name = autoscaler.metadata.name.as_deref().unwrap_or_default();
    let namespace = autoscaler
        .metadata
        .namespace
        .as_deref()
        .ok_or_else(|| SyncError::InvalidAutoscaler(format!("{name} has no namespace")))?;
    let target = autoscaler
        .spec
        .as_ref()
        .map(|spec| &spec.scale_target_ref)
        .ok_or_else(|| SyncError::InvalidAutoscaler(format!("{namespace}/{name} has no spec")))?;

    let gvk = gvk_from_api_version_kind(
        target.api_version.as_deref().unwrap_or_default(),
        &target.kind,
    );
    Ok((gvk, ObjectKey::namespaced(namespace, &target.name)))
}

/// Reconciler of autoscalers
pub struct ReplicasSyncer {
    store: Arc<dyn ObjectStore>,
    fields: Arc<ReplicaFieldTable>,
}

impl std::fmt::Debug for ReplicasSyncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplicasSyncer")
            .field("replica_fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

impl ReplicasSyncer {
    pub fn new(store: Arc<dyn ObjectStore>, fields: Arc<ReplicaFieldTable>) -> Self {
        Self { store, fields }
    }

    /// One reconcile pass for the autoscaler at `key`
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<SyncOutcome, SyncError> {
        debug!(autoscaler = %key, "Reconciling autoscaler");

        let autoscaler = match get_typed::<HorizontalPodAutoscaler>(self.store.as_ref(), key).await {
            Ok(autoscaler) => autoscaler,
            Err(e) if e.is_not_found() => return Ok(SyncOutcome::AutoscalerGone),
            Err(e) => return Err(e.into()),
        };

        let (gvk, target_key) = scale_target_of(&autoscaler)?;
        let target = match self.store.get(&gvk, &target_key).await {
            Ok(target) => target,
            Err(e) if e.is_not_found() => {
                debug!(
                    kind = %gvk.kind,
                    target = %target_key,
                    "Scale target not found, the resource might have been removed, skip"
                );
                return Ok(SyncOutcome::TargetGone);
            }
            Err(e) => return Err(e.into()),
        };

        let classifier = SchedulingClassifier::new(self.store.as_ref());
        let scheduling = classifier.classify(&target).await?;
        if scheduling != ReplicaSchedulingType::Divided {
            debug!(
                kind = %gvk.kind,
                target = %target_key,
                scheduling = %scheduling,
                "Replicas are not divided, leaving scale target untouched"
            );
            return Ok(SyncOutcome::Duplicated);
        }

        let Some(observed) = autoscaler
            .status
            .as_ref()
            .and_then(|status| status.current_replicas)
        else {
            debug!(autoscaler = %key, "Autoscaler has not observed replicas yet");
            return Ok(SyncOutcome::AwaitingStatus);
        };

        let patcher = ScaleTargetPatcher::new(self.store.as_ref(), &self.fields);
        let outcome = patcher
            .patch_if_needed(&target, &gvk, i64::from(observed))
            .await?;
        if let PatchOutcome::Patched { from, to } = &outcome {
            info!(
                kind = %gvk.kind,
                target = %target_key,
                from,
                to,
                "Synced replicas from autoscaler to scale target"
            );
        }
        Ok(SyncOutcome::Synced(outcome))
    }
}
