//! # CLI
//!
//! Command-line interface of the controller binary.
//!
//! ## Usage
//!
//! ```bash
//! # Run the controller (default)
//! replica-sync-controller run
//!
//! # Reschedule every binding derived from a PropagationPolicy
//! replica-sync-controller reschedule --name rebalance --policy default/web
//!
//! # Reschedule the bindings of single resources
//! replica-sync-controller reschedule --name rebalance \
//!     --resource apps/v1/Deployment/default/nginx \
//!     --resource v1/ConfigMap/default/settings
//! ```

use crate::crd::{PolicySelector, Reschedule, RescheduleSpec, ResourceSelector};
use clap::{Args, Parser, Subcommand};

/// Replica Sync Controller
#[derive(Parser, Debug)]
#[command(name = "replica-sync-controller", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the controller
    Run,
    /// Trigger rescheduling of the selected bindings
    Reschedule(RescheduleArgs),
}

#[derive(Args, Debug)]
pub struct RescheduleArgs {
    /// Name of the Reschedule command (lowercase RFC 1123 label, at most 32 characters)
    #[arg(long)]
    pub name: String,

    /// Policy selector: `namespace/name` for a PropagationPolicy, `name` for a ClusterPropagationPolicy
    #[arg(long = "policy", value_name = "[NAMESPACE/]NAME", value_parser = parse_policy)]
    pub policies: Vec<PolicySelector>,

    /// Resource selector: `apiVersion/kind/[namespace/]name`
    #[arg(
        long = "resource",
        value_name = "APIVERSION/KIND/[NAMESPACE/]NAME",
        value_parser = parse_resource
    )]
    pub resources: Vec<ResourceSelector>,
}

impl RescheduleArgs {
    pub fn into_command(self) -> Reschedule {
        Reschedule::new(
            &self.name,
            RescheduleSpec {
                target_ref_policy: self.policies,
                target_ref_resource: self.resources,
            },
        )
    }
}

fn non_empty(segments: &[&str], raw: &str) -> Result<(), String> {
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(format!("empty segment in '{raw}'"));
    }
    Ok(())
}

/// Parse `namespace/name` or `name`
pub fn parse_policy(raw: &str) -> Result<PolicySelector, String> {
    let segments: Vec<&str> = raw.split('/').collect();
    non_empty(&segments, raw)?;
    match segments.as_slice() {
        [name] => Ok(PolicySelector {
            name: (*name).to_string(),
            namespace: None,
        }),
        [namespace, name] => Ok(PolicySelector {
            name: (*name).to_string(),
            namespace: Some((*namespace).to_string()),
        }),
        _ => Err(format!("expected [NAMESPACE/]NAME, got '{raw}'")),
    }
}

/// Parse `apiVersion/kind/[namespace/]name`
///
/// Core types have a single-segment apiVersion (`v1/ConfigMap/default/x`);
/// they are told apart by the kind starting with an uppercase letter.
pub fn parse_resource(raw: &str) -> Result<ResourceSelector, String> {
    let segments: Vec<&str> = raw.split('/').collect();
    non_empty(&segments, raw)?;

    let core = segments
        .get(1)
        .and_then(|segment| segment.chars().next())
        .is_some_and(char::is_uppercase);
    let (api_version, kind, rest) = match (core, segments.as_slice()) {
        (true, [version, kind, rest @ ..]) => ((*version).to_string(), *kind, rest),
        (false, [group, version, kind, rest @ ..]) => (format!("{group}/{version}"), *kind, rest),
        _ => return Err(format!("expected APIVERSION/KIND/[NAMESPACE/]NAME, got '{raw}'")),
    };

    let (namespace, name) = match rest {
        [name] => (None, *name),
        [namespace, name] => (Some((*namespace).to_string()), *name),
        _ => return Err(format!("expected APIVERSION/KIND/[NAMESPACE/]NAME, got '{raw}'")),
    };

    Ok(ResourceSelector {
        api_version,
        kind: kind.to_string(),
        name: name.to_string(),
        namespace,
    })
}
