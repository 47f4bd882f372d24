//! Common fixtures for the integration tests
//!
//! Seeds an [`InMemoryStore`] with autoscalers, workloads, policies and
//! bindings shaped like the objects the control plane produces.

#![allow(dead_code, reason = "each test binary uses a subset of the fixtures")]

use replica_sync_controller::constants::{
    CLUSTER_PROPAGATION_POLICY_LABEL, PROPAGATION_POLICY_NAMESPACE_LABEL,
    PROPAGATION_POLICY_NAME_LABEL,
};
use replica_sync_controller::store::InMemoryStore;
use serde_json::{json, Value};

pub const NAMESPACE: &str = "default";

/// An autoscaler scaling `apiVersion/kind name`; `current` is the observed replica count
pub fn autoscaler(name: &str, api_version: &str, kind: &str, target: &str, current: Option<i32>) -> Value {
    let mut hpa = json!({
        "apiVersion": "autoscaling/v2",
        "kind": "HorizontalPodAutoscaler",
        "metadata": {"name": name, "namespace": NAMESPACE},
        "spec": {
            "scaleTargetRef": {"apiVersion": api_version, "kind": kind, "name": target},
            "minReplicas": 1,
            "maxReplicas": 10
        }
    });
    if let Some(current) = current {
        hpa["status"] = json!({"currentReplicas": current, "desiredReplicas": current});
    }
    hpa
}

/// Labels claiming a workload for the namespaced policy `name`
pub fn pp_claim(name: &str) -> Value {
    json!({
        PROPAGATION_POLICY_NAMESPACE_LABEL: NAMESPACE,
        PROPAGATION_POLICY_NAME_LABEL: name
    })
}

/// Labels claiming a workload for the cluster policy `name`
pub fn cpp_claim(name: &str) -> Value {
    json!({ CLUSTER_PROPAGATION_POLICY_LABEL: name })
}

pub fn deployment(name: &str, replicas: i64, labels: Value) -> Value {
    json!({
        "apiVersion": "apps/v1",
        "kind": "Deployment",
        "metadata": {"name": name, "namespace": NAMESPACE, "labels": labels},
        "spec": {"replicas": replicas, "template": {"spec": {"containers": [{"name": "app", "image": "nginx"}]}}}
    })
}

/// A namespaced policy; `scheduling` of `None` leaves out `replicaScheduling`
pub fn propagation_policy(name: &str, scheduling: Option<&str>) -> Value {
    json!({
        "apiVersion": "policy.karmada.io/v1alpha1",
        "kind": "PropagationPolicy",
        "metadata": {"name": name, "namespace": NAMESPACE},
        "spec": {"placement": placement(scheduling)}
    })
}

pub fn cluster_propagation_policy(name: &str, scheduling: Option<&str>) -> Value {
    json!({
        "apiVersion": "policy.karmada.io/v1alpha1",
        "kind": "ClusterPropagationPolicy",
        "metadata": {"name": name},
        "spec": {"placement": placement(scheduling)}
    })
}

fn placement(scheduling: Option<&str>) -> Value {
    match scheduling {
        Some(kind) => json!({"replicaScheduling": {"replicaSchedulingType": kind}}),
        None => json!({}),
    }
}

pub fn resource_binding(namespace: &str, name: &str, labels: Value) -> Value {
    json!({
        "apiVersion": "work.karmada.io/v1alpha2",
        "kind": "ResourceBinding",
        "metadata": {"name": name, "namespace": namespace, "labels": labels},
        "spec": {
            "resource": {"apiVersion": "apps/v1", "kind": "Deployment", "name": name, "namespace": namespace},
            "replicas": 2,
            "clusters": [{"name": "member1", "replicas": 1}, {"name": "member2", "replicas": 1}]
        }
    })
}

pub fn cluster_resource_binding(name: &str, labels: Value) -> Value {
    json!({
        "apiVersion": "work.karmada.io/v1alpha2",
        "kind": "ClusterResourceBinding",
        "metadata": {"name": name, "labels": labels},
        "spec": {
            "resource": {"apiVersion": "rbac.authorization.k8s.io/v1", "kind": "ClusterRole", "name": name},
            "clusters": [{"name": "member1"}]
        }
    })
}

/// Insert every object into a fresh store
pub fn store_with(objects: Vec<Value>) -> InMemoryStore {
    let store = InMemoryStore::new();
    for object in objects {
        store.insert(object).unwrap();
    }
    store
}
