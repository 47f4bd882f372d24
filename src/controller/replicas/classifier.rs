//! # Scheduling-Type Classifier
//!
//! Resolves the policy claiming a workload from its ownership labels and
//! reports the policy's replica scheduling type.

use super::SyncError;
use crate::constants::{
    CLUSTER_PROPAGATION_POLICY_LABEL, PROPAGATION_POLICY_NAMESPACE_LABEL,
    PROPAGATION_POLICY_NAME_LABEL,
};
use crate::crd::{ClusterPropagationPolicy, PropagationPolicy, ReplicaSchedulingType};
use crate::store::{get_typed, unstructured, ObjectKey, ObjectStore};
use kube::core::DynamicObject;
use std::fmt;

/// Policy a workload's ownership labels point at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimedPolicy {
    Namespaced { namespace: String, name: String },
    Cluster { name: String },
}

impl ClaimedPolicy {
    /// Read the claim from a workload's labels
    ///
    /// A namespaced claim needs both its namespace and name labels non-empty
    /// and wins over a cluster claim. Anything less falls through to the
    /// cluster claim label.
    pub fn from_object(object: &DynamicObject) -> Option<Self> {
        let non_empty = |key: &str| unstructured::label(object, key).filter(|v| !v.is_empty());

        if let (Some(namespace), Some(name)) = (
            non_empty(PROPAGATION_POLICY_NAMESPACE_LABEL),
            non_empty(PROPAGATION_POLICY_NAME_LABEL),
        ) {
            return Some(ClaimedPolicy::Namespaced {
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }

        non_empty(CLUSTER_PROPAGATION_POLICY_LABEL).map(|name| ClaimedPolicy::Cluster {
            name: name.to_string(),
        })
    }
}

impl fmt::Display for ClaimedPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimedPolicy::Namespaced { namespace, name } => write!(f, "pp ({namespace}/{name})"),
            ClaimedPolicy::Cluster { name } => write!(f, "cpp ({name})"),
        }
    }
}

pub struct SchedulingClassifier<'a> {
    store: &'a dyn ObjectStore,
}

impl fmt::Debug for SchedulingClassifier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchedulingClassifier").finish_non_exhaustive()
    }
}

impl<'a> SchedulingClassifier<'a> {
    pub fn new(store: &'a dyn ObjectStore) -> Self {
        Self { store }
    }

    /// Scheduling type of the policy claiming `workload`
    ///
    /// A workload without a claim, or whose claimed policy cannot be fetched
    /// (not-found included), is an error.
    pub async fn classify(&self, workload: &DynamicObject) -> Result<ReplicaSchedulingType, SyncError> {
        let Some(claim) = ClaimedPolicy::from_object(workload) else {
            return Err(SyncError::NoClaimedPolicy {
                kind: workload
                    .types
                    .as_ref()
                    .map(|types| types.kind.clone())
                    .unwrap_or_default(),
                key: ObjectKey::of(workload)
                    .map(|key| key.to_string())
                    .unwrap_or_default(),
            });
        };

        let placement = match &claim {
            ClaimedPolicy::Namespaced { namespace, name } => {
                get_typed::<PropagationPolicy>(self.store, &ObjectKey::namespaced(namespace, name))
                    .await
                    .map(|policy| policy.spec.placement)
            }
            ClaimedPolicy::Cluster { name } => {
                get_typed::<ClusterPropagationPolicy>(self.store, &ObjectKey::cluster(name))
                    .await
                    .map(|policy| policy.spec.placement)
            }
        }
        .map_err(|source| SyncError::ClaimedPolicy {
            policy: claim.clone(),
            source,
        })?;

        Ok(placement.replica_scheduling_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn workload(labels: serde_json::Value) -> DynamicObject {
        serde_json::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "default", "labels": labels},
            "spec": {"replicas": 1}
        }))
        .unwrap()
    }

    #[test]
    fn test_namespaced_claim_wins_over_cluster_claim() {
        let object = workload(json!({
            PROPAGATION_POLICY_NAMESPACE_LABEL: "default",
            PROPAGATION_POLICY_NAME_LABEL: "web-pp",
            CLUSTER_PROPAGATION_POLICY_LABEL: "global"
        }));
        assert_eq!(
            ClaimedPolicy::from_object(&object),
            Some(ClaimedPolicy::Namespaced {
                namespace: "default".into(),
                name: "web-pp".into()
            })
        );
    }

    #[test]
    fn test_partial_namespaced_claim_falls_through_to_cluster_claim() {
        let object = workload(json!({
            PROPAGATION_POLICY_NAMESPACE_LABEL: "default",
            CLUSTER_PROPAGATION_POLICY_LABEL: "global"
        }));
        assert_eq!(
            ClaimedPolicy::from_object(&object),
            Some(ClaimedPolicy::Cluster {
                name: "global".into()
            })
        );

        let empty_name = workload(json!({
            PROPAGATION_POLICY_NAMESPACE_LABEL: "default",
            PROPAGATION_POLICY_NAME_LABEL: ""
        }));
        assert_eq!(ClaimedPolicy::from_object(&empty_name), None);
    }

    #[test]
    fn test_unlabelled_workload_has_no_claim() {
        assert_eq!(ClaimedPolicy::from_object(&workload(json!({"app": "web"}))), None);
    }

    #[test]
    fn test_helpers_are_debug_formatted() {
        use crate::config::ReplicaFieldTable;
        use crate::controller::replicas::ScaleTargetPatcher;
        use crate::store::InMemoryStore;

        let store = InMemoryStore::new();
        let fields = ReplicaFieldTable::builtin();
        let classifier = format!("{:?}", SchedulingClassifier::new(&store));
        let patcher = format!("{:?}", ScaleTargetPatcher::new(&store, &fields));
        assert!(classifier.starts_with("SchedulingClassifier"));
        assert!(patcher.starts_with("ScaleTargetPatcher"));
    }
}
