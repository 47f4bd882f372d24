//! # Object Store
//!
//! Narrow capability interface over the cluster state store.
//!
//! Every object is addressed by its `GroupVersionKind`, an optional namespace
//! and a name, and travels as a [`DynamicObject`]. Typed access is layered on
//! top through serde (see [`get_typed`]).
//!
//! Implementations:
//! - `kube_store.rs` - API server backed store (discovery resolves the REST mapping)
//! - `memory.rs` - In-process store used by tests and dry runs
//! - `deadline.rs` - Decorator that bounds every request by a deadline
//!
//! `merge_patch.rs` holds the RFC 7386 diff/apply used for every patch and
//! `unstructured.rs` the field helpers for dynamic objects.

mod deadline;
mod kube_store;
pub mod memory;
pub mod merge_patch;
pub mod unstructured;

pub use self::deadline::DeadlineStore;
pub use self::kube_store::KubeStore;
pub use self::memory::InMemoryStore;

use kube::core::{DynamicObject, GroupVersionKind, Resource, TypeMeta};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Errors returned by an [`ObjectStore`]
///
/// `NotFound` is the distinguished, non-fatal outcome; everything else is
/// retryable from the caller's point of view.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {key} not found")]
    NotFound { kind: String, key: String },

    #[error("conflict writing {kind} {key}: {message}")]
    Conflict {
        kind: String,
        key: String,
        message: String,
    },

    #[error("unable to recognize resource type {0}")]
    UnknownType(String),

    #[error("store request exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("API request failed: {0}")]
    Api(#[source] kube::Error),

    #[error("failed to convert object: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid object: {0}")]
    InvalidObject(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub(crate) fn not_found(gvk: &GroupVersionKind, key: &ObjectKey) -> Self {
        StoreError::NotFound {
            kind: gvk.kind.clone(),
            key: key.to_string(),
        }
    }
}

/// Namespace and name of an object; cluster-scoped objects carry no namespace
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Some(namespace.into()),
            name: name.into(),
        }
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Self {
            namespace: None,
            name: name.into(),
        }
    }

    /// Key of an existing object, `None` when the object has no name
    pub fn of(object: &DynamicObject) -> Option<Self> {
        let name = object.metadata.name.clone()?;
        Some(Self {
            namespace: object.metadata.namespace.clone().filter(|ns| !ns.is_empty()),
            name,
        })
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}/{}", namespace, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Get/list/patch/update primitives of the cluster state store
///
/// Patches are JSON merge patches: only the listed fields change. `update`
/// replaces the whole object and is conditional on its `resourceVersion`.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey)
        -> Result<DynamicObject, StoreError>;

    /// List objects matching an equality-based label selector (`k=v,k2=v2`).
    /// `namespace: None` lists across all namespaces.
    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, StoreError>;

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<DynamicObject, StoreError>;

    async fn update(
        &self,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError>;
}

/// Split an `apiVersion` into group and version; the core group is empty
pub fn gvk_from_api_version_kind(api_version: &str, kind: &str) -> GroupVersionKind {
    match api_version.split_once('/') {
        Some((group, version)) => GroupVersionKind::gvk(group, version, kind),
        None => GroupVersionKind::gvk("", api_version, kind),
    }
}

/// `apiVersion` string of a type (`apps/v1`, or `v1` for the core group)
pub fn api_version_of(gvk: &GroupVersionKind) -> String {
    if gvk.group.is_empty() {
        gvk.version.clone()
    } else {
        format!("{}/{}", gvk.group, gvk.version)
    }
}

/// GroupVersionKind of a statically typed resource
pub fn gvk_of<K>() -> GroupVersionKind
where
    K: Resource<DynamicType = ()>,
{
    GroupVersionKind::gvk(&K::group(&()), &K::version(&()), &K::kind(&()))
}

/// Fetch an object and decode it into its static type
pub async fn get_typed<K>(store: &dyn ObjectStore, key: &ObjectKey) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    let object = store.get(&gvk_of::<K>(), key).await?;
    from_dynamic::<K>(object)
}

/// Decode a dynamic object into its static type
pub fn from_dynamic<K>(mut object: DynamicObject) -> Result<K, StoreError>
where
    K: Resource<DynamicType = ()> + DeserializeOwned,
{
    // Typed decoders insist on apiVersion/kind
    if object.types.is_none() {
        object.types = Some(TypeMeta {
            api_version: K::api_version(&()).into_owned(),
            kind: K::kind(&()).into_owned(),
        });
    }
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

/// Encode a typed object as a dynamic object
pub fn to_dynamic<K: Serialize>(object: &K) -> Result<DynamicObject, StoreError> {
    Ok(serde_json::from_value(serde_json::to_value(object)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_from_grouped_api_version() {
        let gvk = gvk_from_api_version_kind("apps/v1", "Deployment");
        assert_eq!(gvk.group, "apps");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.kind, "Deployment");
        assert_eq!(api_version_of(&gvk), "apps/v1");
    }

    #[test]
    fn test_gvk_from_core_api_version() {
        let gvk = gvk_from_api_version_kind("v1", "ConfigMap");
        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");
        assert_eq!(api_version_of(&gvk), "v1");
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(ObjectKey::namespaced("default", "web").to_string(), "default/web");
        assert_eq!(ObjectKey::cluster("global").to_string(), "global");
    }

    #[test]
    fn test_object_key_of_ignores_empty_namespace() {
        let object: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "team-a", "namespace": ""}
        }))
        .unwrap();
        assert_eq!(ObjectKey::of(&object), Some(ObjectKey::cluster("team-a")));
    }
}
