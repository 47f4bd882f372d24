//! # Reschedule Validation
//!
//! Validates a Reschedule before any store access. Every violation is
//! reported, each prefixed with the field path it concerns.

use crate::constants::RESCHEDULE_NAME_MAX_LENGTH;
use crate::crd::Reschedule;
use regex::Regex;
use std::sync::LazyLock;

const DNS1123_LABEL_FMT: &str = "[a-z0-9]([-a-z0-9]*[a-z0-9])?";

static DNS1123_LABEL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^{DNS1123_LABEL_FMT}$"))
        .expect("Failed to compile DNS-1123 label regex - this should never happen")
});

/// Validate the name of a Reschedule
///
/// Rules:
/// - must not be empty
/// - at most 32 characters
/// - a lowercase RFC 1123 label: alphanumerics and '-', starting and ending
///   with an alphanumeric
pub fn validate_reschedule_name(name: &str) -> Vec<String> {
    if name.is_empty() {
        return vec!["must be not empty".to_string()];
    }
    if name.len() > RESCHEDULE_NAME_MAX_LENGTH {
        return vec![format!(
            "must be no more than {RESCHEDULE_NAME_MAX_LENGTH} characters"
        )];
    }

    if DNS1123_LABEL_REGEX.is_match(name) {
        Vec::new()
    } else {
        vec![format!(
            "a lowercase RFC 1123 label must consist of lower case alphanumeric characters or '-', \
             and must start and end with an alphanumeric character (e.g. 'my-name', or '123-abc', \
             regex used for validation is '{DNS1123_LABEL_FMT}')"
        )]
    }
}

/// Validate a Reschedule; an empty list means it is valid
pub fn validate_reschedule(command: &Reschedule) -> Vec<String> {
    let name = command.metadata.name.as_deref().unwrap_or_default();
    let mut errors: Vec<String> = validate_reschedule_name(name)
        .into_iter()
        .map(|msg| format!("metadata.name: Invalid value: {name:?}: {msg}"))
        .collect();

    if command
        .metadata
        .namespace
        .as_deref()
        .is_some_and(|ns| !ns.is_empty())
    {
        errors.push("metadata.namespace: Forbidden: not allowed on this type".to_string());
    }

    for (i, policy) in command.spec.target_ref_policy.iter().enumerate() {
        if policy.name.is_empty() {
            errors.push(format!("spec.targetRefPolicy[{i}].name: Required value"));
        }
    }

    for (i, resource) in command.spec.target_ref_resource.iter().enumerate() {
        for (field, value) in [
            ("apiVersion", &resource.api_version),
            ("kind", &resource.kind),
            ("name", &resource.name),
        ] {
            if value.is_empty() {
                errors.push(format!("spec.targetRefResource[{i}].{field}: Required value"));
            }
        }
    }

    errors
}
