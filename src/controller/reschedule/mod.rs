//! # Reschedule Trigger Resolver
//!
//! Handles the create-style Reschedule command. The command selects bindings
//! through policies (every binding derived from the policy) and through
//! resources (the one binding of that resource, which must exist), and every
//! selected binding gets its `spec.rescheduleTriggeredAt` advanced.
//!
//! All selectors are resolved before the first write, so a selector that
//! fails to resolve aborts the command without touching any binding. Writes
//! are independent full updates; a failing update leaves earlier ones
//! committed and later ones unattempted.

mod validation;

pub use validation::{validate_reschedule, validate_reschedule_name};

use crate::constants::{
    CLUSTER_PROPAGATION_POLICY_LABEL, PROPAGATION_POLICY_NAMESPACE_LABEL,
    PROPAGATION_POLICY_NAME_LABEL,
};
use crate::crd::{
    cluster_resource_binding_gvk, generate_binding_name, resource_binding_gvk,
    stamp_reschedule_trigger, PolicySelector, Reschedule, ResourceSelector,
};
use crate::observability::metrics;
use crate::store::{ObjectKey, ObjectStore, StoreError};
use chrono::{DateTime, Utc};
use kube::core::{DynamicObject, GroupVersionKind};
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RescheduleError {
    #[error("Reschedule {name:?} is invalid: {}", errors.join("; "))]
    Invalid { name: String, errors: Vec<String> },

    #[error("failed to list bindings of {selector}: {source}")]
    ListBindings {
        selector: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to get binding {binding} of {selector}: {source}")]
    GetBinding {
        selector: String,
        binding: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to update binding {binding}: {source}")]
    UpdateBinding {
        binding: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to stamp binding {binding}: {reason}")]
    InvalidBinding { binding: String, reason: String },
}

impl RescheduleError {
    /// Whether the failure is a binding that does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            RescheduleError::ListBindings { source, .. }
            | RescheduleError::GetBinding { source, .. }
            | RescheduleError::UpdateBinding { source, .. } => source.is_not_found(),
            RescheduleError::Invalid { .. } | RescheduleError::InvalidBinding { .. } => false,
        }
    }
}

/// Bindings stamped by one command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RescheduleSummary {
    pub bindings: Vec<ObjectKey>,
    pub cluster_bindings: Vec<ObjectKey>,
    pub triggered_at: DateTime<Utc>,
}

impl RescheduleSummary {
    pub fn len(&self) -> usize {
        self.bindings.len() + self.cluster_bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Bindings selected so far, deduplicated by key
#[derive(Debug, Default)]
struct BindingSet {
    namespaced: BTreeMap<ObjectKey, DynamicObject>,
    cluster: BTreeMap<ObjectKey, DynamicObject>,
}

impl BindingSet {
    fn add(target: &mut BTreeMap<ObjectKey, DynamicObject>, items: Vec<DynamicObject>) {
        for item in items {
            if let Some(key) = ObjectKey::of(&item) {
                target.insert(key, item);
            }
        }
    }
}

pub struct RescheduleHandler {
    store: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for RescheduleHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RescheduleHandler").finish_non_exhaustive()
    }
}

impl RescheduleHandler {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Validate and execute a Reschedule, returning the accepted command
    pub async fn create(&self, command: Reschedule) -> Result<Reschedule, RescheduleError> {
        let name = command.metadata.name.clone().unwrap_or_default();
        info!(
            reschedule = %name,
            policies = command.spec.target_ref_policy.len(),
            resources = command.spec.target_ref_resource.len(),
            "Reschedule create called"
        );

        let errors = validate_reschedule(&command);
        if !errors.is_empty() {
            metrics::increment_reschedule_requests("invalid");
            warn!(reschedule = %name, ?errors, "Rejecting invalid Reschedule");
            return Err(RescheduleError::Invalid { name, errors });
        }

        match self
            .resolve(&command.spec.target_ref_policy, &command.spec.target_ref_resource)
            .await
        {
            Ok(summary) => {
                metrics::increment_reschedule_requests("success");
                info!(
                    reschedule = %name,
                    bindings = summary.bindings.len(),
                    cluster_bindings = summary.cluster_bindings.len(),
                    "Triggered rescheduling"
                );
                Ok(command)
            }
            Err(e) => {
                metrics::increment_reschedule_requests("error");
                warn!(reschedule = %name, error = %e, "Reschedule failed");
                Err(e)
            }
        }
    }

    /// Resolve the selectors to bindings and stamp each of them once
    pub async fn resolve(
        &self,
        policies: &[PolicySelector],
        resources: &[ResourceSelector],
    ) -> Result<RescheduleSummary, RescheduleError> {
        let rb_gvk = resource_binding_gvk();
        let crb_gvk = cluster_resource_binding_gvk();
        let mut selected = BindingSet::default();

        for policy in policies {
            match policy.namespace() {
                Some(namespace) => {
                    let selector = format!(
                        "{PROPAGATION_POLICY_NAMESPACE_LABEL}={namespace},{PROPAGATION_POLICY_NAME_LABEL}={}",
                        policy.name
                    );
                    let items = self.list(&rb_gvk, Some(namespace), &selector, policy).await?;
                    BindingSet::add(&mut selected.namespaced, items);
                }
                None => {
                    let selector = format!("{CLUSTER_PROPAGATION_POLICY_LABEL}={}", policy.name);
                    let items = self.list(&rb_gvk, None, &selector, policy).await?;
                    BindingSet::add(&mut selected.namespaced, items);
                    let items = self.list(&crb_gvk, None, &selector, policy).await?;
                    BindingSet::add(&mut selected.cluster, items);
                }
            }
        }

        for resource in resources {
            let binding_name = generate_binding_name(&resource.kind, &resource.name);
            let (gvk, key, target) = match resource.namespace() {
                Some(namespace) => (
                    &rb_gvk,
                    ObjectKey::namespaced(namespace, binding_name),
                    &mut selected.namespaced,
                ),
                None => (
                    &crb_gvk,
                    ObjectKey::cluster(binding_name),
                    &mut selected.cluster,
                ),
            };
            let binding = self.store.get(gvk, &key).await.map_err(|source| {
                RescheduleError::GetBinding {
                    selector: resource.to_string(),
                    binding: key.to_string(),
                    source,
                }
            })?;
            target.insert(key, binding);
        }

        let now = Utc::now();
        let bindings = self.stamp_all(&rb_gvk, selected.namespaced, now).await?;
        let cluster_bindings = self.stamp_all(&crb_gvk, selected.cluster, now).await?;
        metrics::increment_bindings_stamped(bindings.len() + cluster_bindings.len());

        Ok(RescheduleSummary {
            bindings,
            cluster_bindings,
            triggered_at: now,
        })
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: &str,
        policy: &PolicySelector,
    ) -> Result<Vec<DynamicObject>, RescheduleError> {
        let items = self
            .store
            .list(gvk, namespace, label_selector)
            .await
            .map_err(|source| RescheduleError::ListBindings {
                selector: policy.to_string(),
                source,
            })?;
        debug!(policy = %policy, kind = %gvk.kind, count = items.len(), "Listed derived bindings");
        Ok(items)
    }

    async fn stamp_all(
        &self,
        gvk: &GroupVersionKind,
        bindings: BTreeMap<ObjectKey, DynamicObject>,
        now: DateTime<Utc>,
    ) -> Result<Vec<ObjectKey>, RescheduleError> {
        let mut stamped = Vec::with_capacity(bindings.len());
        for (key, mut binding) in bindings {
            let triggered_at = stamp_reschedule_trigger(&mut binding, now).map_err(|reason| {
                RescheduleError::InvalidBinding {
                    binding: key.to_string(),
                    reason,
                }
            })?;
            self.store
                .update(gvk, &binding)
                .await
                .map_err(|source| RescheduleError::UpdateBinding {
                    binding: key.to_string(),
                    source,
                })?;
            debug!(kind = %gvk.kind, binding = %key, %triggered_at, "Stamped reschedule trigger");
            stamped.push(key);
        }
        Ok(stamped)
    }
}
