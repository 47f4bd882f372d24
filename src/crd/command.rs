//! # Reschedule Command
//!
//! A transient, cluster-scoped command that forces the scheduler to
//! re-evaluate the placement of the bindings it selects. It is never stored;
//! creating it stamps the selected bindings and returns it unchanged.

use serde::{Deserialize, Serialize};

/// Reschedule Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: command.karmada.io/v1alpha1
/// kind: Reschedule
/// metadata:
///   name: demo
/// spec:
///   targetRefPolicy:
///     - name: web
///       namespace: default
///   targetRefResource:
///     - apiVersion: apps/v1
///       kind: Deployment
///       name: nginx
///       namespace: default
/// ```
#[derive(kube::CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "Reschedule",
    group = "command.karmada.io",
    version = "v1alpha1",
    plural = "reschedules"
)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleSpec {
    /// Reschedule every binding derived from these policies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ref_policy: Vec<PolicySelector>,
    /// Reschedule the bindings of these resources; each must already exist
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target_ref_resource: Vec<ResourceSelector>,
}

/// Selects a policy; no namespace means a ClusterPropagationPolicy
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PolicySelector {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Selects a single resource; no namespace means a cluster-scoped resource
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSelector {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl PolicySelector {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

impl ResourceSelector {
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}

impl std::fmt::Display for PolicySelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "PropagationPolicy {}/{}", ns, self.name),
            None => write!(f, "ClusterPropagationPolicy {}", self.name),
        }
    }
}

impl std::fmt::Display for ResourceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "{} {} {}/{}", self.api_version, self.kind, ns, self.name),
            None => write!(f, "{} {} {}", self.api_version, self.kind, self.name),
        }
    }
}
