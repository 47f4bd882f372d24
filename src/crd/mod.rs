//! # Custom Resource Definitions
//!
//! Types of the multi-cluster control plane the controller reads and writes.
//!
//! ## Module Structure
//!
//! - `policy.rs` - PropagationPolicy / ClusterPropagationPolicy and their placement
//! - `binding.rs` - ResourceBinding / ClusterResourceBinding helpers (handled dynamically)
//! - `command.rs` - The Reschedule command

mod binding;
mod command;
mod policy;

pub use binding::{
    cluster_resource_binding_gvk, generate_binding_name, reschedule_triggered_at,
    resource_binding_gvk, stamp_reschedule_trigger, RESCHEDULE_TRIGGERED_AT_FIELD,
};
pub use command::{PolicySelector, Reschedule, RescheduleSpec, ResourceSelector};
pub use policy::{
    ClusterPropagationPolicy, ClusterPropagationPolicySpec, Placement, PropagationPolicy,
    PropagationPolicySpec, ReplicaSchedulingStrategy, ReplicaSchedulingType,
};
