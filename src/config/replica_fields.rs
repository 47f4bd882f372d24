//! # Replica Field Table
//!
//! Maps a workload type (apiVersion + kind) to the dotted path of its replica
//! count. Built once at startup and shared read-only; a type without an entry
//! is unsupported and skipped by the patcher.

use crate::constants::FIELD_PATH_SEPARATOR;
use crate::store::gvk_from_api_version_kind;
use anyhow::{Context, Result};
use kube::core::GroupVersionKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// One entry of the replica field table as written in the extension file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplicaFieldEntry {
    pub api_version: String,
    pub kind: String,
    /// Dotted path, e.g. `spec.replicas`
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TypeKey {
    group: String,
    version: String,
    kind: String,
}

impl From<&GroupVersionKind> for TypeKey {
    fn from(gvk: &GroupVersionKind) -> Self {
        Self {
            group: gvk.group.clone(),
            version: gvk.version.clone(),
            kind: gvk.kind.clone(),
        }
    }
}

/// Immutable (apiVersion, kind) → replica field path mapping
#[derive(Debug, Clone, Default)]
pub struct ReplicaFieldTable {
    fields: HashMap<TypeKey, Vec<String>>,
}

impl ReplicaFieldTable {
    /// An empty table; every type is unsupported
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in workload types
    #[must_use]
    pub fn builtin() -> Self {
        Self::empty()
            .with_entry("apps/v1", "Deployment", "spec.replicas")
            .with_entry("apps/v1", "StatefulSet", "spec.replicas")
            .with_entry("apps/v1", "ReplicaSet", "spec.replicas")
    }

    /// Built-in types extended (and overridden) by the entries of a YAML file
    pub fn load(extension: Option<&Path>) -> Result<Self> {
        let mut table = Self::builtin();
        if let Some(path) = extension {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read replica field file {}", path.display()))?;
            let entries: Vec<ReplicaFieldEntry> = serde_yaml::from_str(&raw)
                .with_context(|| format!("Failed to parse replica field file {}", path.display()))?;
            for entry in entries {
                anyhow::ensure!(
                    !entry.path.trim().is_empty(),
                    "Replica field path for {} {} must not be empty",
                    entry.api_version,
                    entry.kind
                );
                table = table.with_entry(&entry.api_version, &entry.kind, &entry.path);
            }
        }
        Ok(table)
    }

    /// Add or replace a mapping
    #[must_use]
    pub fn with_entry(mut self, api_version: &str, kind: &str, path: &str) -> Self {
        let gvk = gvk_from_api_version_kind(api_version, kind);
        let segments = path
            .split(FIELD_PATH_SEPARATOR)
            .map(str::to_string)
            .collect();
        self.fields.insert(TypeKey::from(&gvk), segments);
        self
    }

    /// Path segments of the replica field, `None` when the type is unsupported
    pub fn path_for(&self, gvk: &GroupVersionKind) -> Option<&[String]> {
        self.fields.get(&TypeKey::from(gvk)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
