//! # Scale-Target Patcher
//!
//! Writes the autoscaler's observed replica count into the scale target at the
//! type's configured field path. The write is a merge patch computed against
//! the object as read, and it carries the skip-reconcile marker so watchers of
//! resource templates do not react to it.

use super::SyncError;
use crate::config::ReplicaFieldTable;
use crate::constants::{FIELD_PATH_SEPARATOR, SKIP_RECONCILE_AT_ANNOTATION};
use crate::controller::mutation::{patch_diff, MutationOutcome};
use crate::observability::metrics;
use crate::store::{unstructured, ObjectKey, ObjectStore};
use chrono::{SecondsFormat, Utc};
use kube::core::{DynamicObject, GroupVersionKind};
use tracing::{error, info, warn};

/// How a patch attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// No replica field mapping for the target type
    Unsupported,
    /// The replica field already holds the desired value
    UpToDate,
    /// The computed patch was empty
    Unchanged,
    /// The replica field was rewritten
    Patched { from: i64, to: i64 },
    /// The target was deleted before the patch landed
    TargetGone,
}

pub struct ScaleTargetPatcher<'a> {
    store: &'a dyn ObjectStore,
    fields: &'a ReplicaFieldTable,
}

impl std::fmt::Debug for ScaleTargetPatcher<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScaleTargetPatcher")
            .field("fields", &self.fields.len())
            .finish_non_exhaustive()
    }
}

impl<'a> ScaleTargetPatcher<'a> {
    pub fn new(store: &'a dyn ObjectStore, fields: &'a ReplicaFieldTable) -> Self {
        Self { store, fields }
    }

    /// Patch the replica field of `target` to `desired` when it differs
    pub async fn patch_if_needed(
        &self,
        target: &DynamicObject,
        gvk: &GroupVersionKind,
        desired: i64,
    ) -> Result<PatchOutcome, SyncError> {
        let key = ObjectKey::of(target).map(|k| k.to_string()).unwrap_or_default();

        let Some(path) = self.fields.path_for(gvk) else {
            warn!(
                api_version = %crate::store::api_version_of(gvk),
                kind = %gvk.kind,
                target = %key,
                "Skip updating scale target: no replica field known for this type"
            );
            metrics::increment_unsupported_kinds();
            return Ok(PatchOutcome::Unsupported);
        };
        let dotted = path.join(FIELD_PATH_SEPARATOR.to_string().as_str());

        let Some(current) = unstructured::nested_i64(target, path) else {
            error!(
                field = %dotted,
                kind = %gvk.kind,
                target = %key,
                "Replica field missing from scale target"
            );
            return Err(SyncError::ReplicaFieldMissing {
                path: dotted,
                kind: gvk.kind.clone(),
                key,
            });
        };
        if current == desired {
            return Ok(PatchOutcome::UpToDate);
        }

        let mut modified = target.clone();
        unstructured::set_nested(&mut modified, path, serde_json::Value::from(desired)).map_err(
            |reason| SyncError::InvalidTarget {
                kind: gvk.kind.clone(),
                key: key.clone(),
                reason,
            },
        )?;
        unstructured::set_annotation(
            &mut modified,
            SKIP_RECONCILE_AT_ANNOTATION,
            &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );

        match patch_diff(self.store, gvk, target, &modified).await? {
            MutationOutcome::Unchanged => {
                info!(kind = %gvk.kind, target = %key, "No diff, skip patching scale target");
                Ok(PatchOutcome::Unchanged)
            }
            MutationOutcome::TargetGone => {
                info!(kind = %gvk.kind, target = %key, "Scale target is not found, skip processing");
                Ok(PatchOutcome::TargetGone)
            }
            MutationOutcome::Patched(_) => {
                metrics::increment_replica_patches();
                Ok(PatchOutcome::Patched {
                    from: current,
                    to: desired,
                })
            }
        }
    }
}
