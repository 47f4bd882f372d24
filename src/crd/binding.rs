//! # Bindings
//!
//! ResourceBinding and ClusterResourceBinding are derived by the control plane
//! for every placed workload. They are handled as dynamic objects so that a
//! full update round-trips every field this controller does not know about;
//! the only field written here is `spec.rescheduleTriggeredAt`.

use crate::store::unstructured;
use chrono::{DateTime, SecondsFormat, SubsecRound, TimeDelta, Utc};
use kube::core::{DynamicObject, GroupVersionKind};
use serde_json::Value;

/// Field of the binding spec that triggers a reschedule when advanced
pub const RESCHEDULE_TRIGGERED_AT_FIELD: &str = "rescheduleTriggeredAt";

const BINDING_GROUP: &str = "work.karmada.io";
const BINDING_VERSION: &str = "v1alpha2";

pub fn resource_binding_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(BINDING_GROUP, BINDING_VERSION, "ResourceBinding")
}

pub fn cluster_resource_binding_gvk() -> GroupVersionKind {
    GroupVersionKind::gvk(BINDING_GROUP, BINDING_VERSION, "ClusterResourceBinding")
}

/// Name of the binding derived for a workload
///
/// `:` is not allowed in object names (it shows up in RBAC kinds such as
/// `system:controller`) and is replaced by `.`.
pub fn generate_binding_name(kind: &str, name: &str) -> String {
    format!("{}-{}", name.replace(':', "."), kind).to_lowercase()
}

/// Current trigger timestamp, `None` when unset or unparseable
pub fn reschedule_triggered_at(binding: &DynamicObject) -> Option<DateTime<Utc>> {
    binding
        .data
        .get("spec")
        .and_then(|spec| spec.get(RESCHEDULE_TRIGGERED_AT_FIELD))
        .and_then(Value::as_str)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Advance the trigger timestamp to `now`; an existing later value is kept
///
/// `now` is written at microsecond precision, rounded up, so the stored
/// value is never earlier than `now`. Returns the value as written.
pub fn stamp_reschedule_trigger(
    binding: &mut DynamicObject,
    now: DateTime<Utc>,
) -> Result<String, String> {
    let now = ceil_micros(now);
    if let Some(existing) = reschedule_triggered_at(binding).filter(|existing| *existing >= now) {
        return Ok(existing.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    let stamped = now.to_rfc3339_opts(SecondsFormat::Micros, true);
    unstructured::set_nested(
        binding,
        &["spec".to_string(), RESCHEDULE_TRIGGERED_AT_FIELD.to_string()],
        Value::String(stamped.clone()),
    )?;
    Ok(stamped)
}

fn ceil_micros(at: DateTime<Utc>) -> DateTime<Utc> {
    let truncated = at.trunc_subsecs(6);
    if truncated < at {
        truncated + TimeDelta::microseconds(1)
    } else {
        truncated
    }
}
