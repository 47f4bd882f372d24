//! # Propagation Policies
//!
//! Only the placement part of a policy matters here: it decides whether a
//! claimed workload's replicas are divided across clusters or duplicated.

use serde::{Deserialize, Serialize};

/// PropagationPolicy Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: policy.karmada.io/v1alpha1
/// kind: PropagationPolicy
/// metadata:
///   name: web
///   namespace: default
/// spec:
///   placement:
///     replicaScheduling:
///       replicaSchedulingType: Divided
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "PropagationPolicy",
    group = "policy.karmada.io",
    version = "v1alpha1",
    namespaced,
    shortname = "pp"
)]
#[serde(rename_all = "camelCase")]
pub struct PropagationPolicySpec {
    #[serde(default)]
    pub placement: Placement,
}

/// ClusterPropagationPolicy Custom Resource Definition (cluster-scoped)
#[derive(kube::CustomResource, Debug, Clone, Default, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "ClusterPropagationPolicy",
    group = "policy.karmada.io",
    version = "v1alpha1",
    shortname = "cpp"
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterPropagationPolicySpec {
    #[serde(default)]
    pub placement: Placement,
}

/// Where and how a claimed workload is placed
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    /// Replica scheduling strategy; absent means duplicated
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replica_scheduling: Option<ReplicaSchedulingStrategy>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaSchedulingStrategy {
    /// Defaults to `Divided` when the strategy is present
    #[serde(default = "default_strategy_type")]
    pub replica_scheduling_type: ReplicaSchedulingType,
}

/// Whether total replicas are split across clusters or repeated per cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
pub enum ReplicaSchedulingType {
    #[default]
    Duplicated,
    Divided,
}

fn default_strategy_type() -> ReplicaSchedulingType {
    ReplicaSchedulingType::Divided
}

impl Placement {
    pub fn replica_scheduling_type(&self) -> ReplicaSchedulingType {
        self.replica_scheduling
            .as_ref()
            .map_or(ReplicaSchedulingType::Duplicated, |strategy| {
                strategy.replica_scheduling_type
            })
    }
}

impl std::fmt::Display for ReplicaSchedulingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicaSchedulingType::Duplicated => write!(f, "Duplicated"),
            ReplicaSchedulingType::Divided => write!(f, "Divided"),
        }
    }
}
