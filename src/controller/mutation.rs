//! # Diff Patching
//!
//! Writers never replace a scale target. They copy the object they read,
//! change the copy, and send only the merge-patch difference, so concurrent
//! unrelated changes made after the read survive. An empty difference sends
//! nothing.

use crate::store::{merge_patch, ObjectKey, ObjectStore, StoreError};
use kube::core::{DynamicObject, GroupVersionKind};
use tracing::debug;

/// Result of a diff patch
#[derive(Debug, Clone)]
pub enum MutationOutcome {
    /// The copy equals the original; no request was sent
    Unchanged,
    /// The patch was applied; holds the object as returned by the store
    Patched(Box<DynamicObject>),
    /// The object was deleted between read and write
    TargetGone,
}

/// Patch `original` towards `modified`, sending only the difference
///
/// A not-found answer to the patch is absorbed as [`MutationOutcome::TargetGone`].
pub async fn patch_diff(
    store: &dyn ObjectStore,
    gvk: &GroupVersionKind,
    original: &DynamicObject,
    modified: &DynamicObject,
) -> Result<MutationOutcome, StoreError> {
    let before = serde_json::to_value(original)?;
    let after = serde_json::to_value(modified)?;
    let Some(patch) = merge_patch::diff(&before, &after) else {
        return Ok(MutationOutcome::Unchanged);
    };

    let key = ObjectKey::of(original)
        .ok_or_else(|| StoreError::InvalidObject(format!("{} without a name", gvk.kind)))?;
    debug!(kind = %gvk.kind, object = %key, patch = %patch, "Sending merge patch");

    match store.patch(gvk, &key, &patch).await {
        Ok(patched) => Ok(MutationOutcome::Patched(Box::new(patched))),
        Err(e) if e.is_not_found() => Ok(MutationOutcome::TargetGone),
        Err(e) => Err(e),
    }
}
