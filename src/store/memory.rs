//! # In-Memory Store
//!
//! [`ObjectStore`] kept entirely in process memory.
//!
//! Used by the test suites as the store double: every call is recorded so a
//! test can assert which reads and writes happened, failures can be injected
//! per operation, and an artificial latency exercises request deadlines.
//! Patches follow merge-patch semantics and updates are conditional on
//! `resourceVersion`, like the API server.

use super::{api_version_of, ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::core::{DynamicObject, GroupVersionKind};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Store operation, as recorded in the call log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    List,
    Patch,
    Update,
}

/// One recorded store call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreCall {
    pub op: StoreOp,
    pub kind: String,
    pub namespace: Option<String>,
    /// `None` for list calls
    pub name: Option<String>,
}

/// Failure returned instead of performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectedFailure {
    NotFound,
    Unavailable(String),
}

#[derive(Debug, Clone)]
struct FailureRule {
    op: StoreOp,
    /// `None` matches every object
    name: Option<String>,
    failure: InjectedFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct StoredKey {
    resource: String,
    namespace: Option<String>,
    name: String,
}

#[derive(Debug, Default)]
struct State {
    /// "apiVersion/kind" → namespaced
    kinds: HashMap<String, bool>,
    objects: BTreeMap<StoredKey, Value>,
    calls: Vec<StoreCall>,
    failures: Vec<FailureRule>,
    latency: Option<Duration>,
    resource_version: u64,
}

/// Object store held in memory
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

fn resource_id(gvk: &GroupVersionKind) -> String {
    format!("{}/{}", api_version_of(gvk), gvk.kind)
}

impl InMemoryStore {
    /// A store knowing the workload, autoscaler, policy and binding types
    #[must_use]
    pub fn new() -> Self {
        let store = Self::default();
        for (api_version, kind) in [
            ("autoscaling/v2", "HorizontalPodAutoscaler"),
            ("apps/v1", "Deployment"),
            ("apps/v1", "StatefulSet"),
            ("apps/v1", "ReplicaSet"),
            ("v1", "ConfigMap"),
            ("policy.karmada.io/v1alpha1", "PropagationPolicy"),
            ("work.karmada.io/v1alpha2", "ResourceBinding"),
        ] {
            store.register_kind(api_version, kind, true);
        }
        store.register_kind("policy.karmada.io/v1alpha1", "ClusterPropagationPolicy", false);
        store.register_kind("work.karmada.io/v1alpha2", "ClusterResourceBinding", false);
        store
    }

    /// Make a type known to the store; unknown types fail with `UnknownType`
    pub fn register_kind(&self, api_version: &str, kind: &str, namespaced: bool) {
        self.lock()
            .kinds
            .insert(format!("{api_version}/{kind}"), namespaced);
    }

    /// Seed an object; it is stored with a fresh `resourceVersion`
    pub fn insert(&self, mut object: Value) -> Result<DynamicObject, StoreError> {
        let dynamic: DynamicObject = serde_json::from_value(object.clone())?;
        let types = dynamic
            .types
            .as_ref()
            .ok_or_else(|| StoreError::InvalidObject("object without apiVersion/kind".into()))?;
        let gvk = super::gvk_from_api_version_kind(&types.api_version, &types.kind);
        let key = ObjectKey::of(&dynamic)
            .ok_or_else(|| StoreError::InvalidObject("object without a name".into()))?;

        let mut state = self.lock();
        let stored = state.stored_key(&gvk, &key)?;
        let version = state.bump_version();
        object["metadata"]["resourceVersion"] = Value::String(version);
        state.objects.insert(stored, object.clone());
        Ok(serde_json::from_value(object)?)
    }

    /// Current state of an object, without recording a call
    pub fn object(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Option<DynamicObject> {
        let state = self.lock();
        let stored = state.stored_key(gvk, key).ok()?;
        state
            .objects
            .get(&stored)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Remove an object, without recording a call
    pub fn remove(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> bool {
        let mut state = self.lock();
        match state.stored_key(gvk, key) {
            Ok(stored) => state.objects.remove(&stored).is_some(),
            Err(_) => false,
        }
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    /// Calls of one operation, in order
    pub fn calls_of(&self, op: StoreOp) -> Vec<StoreCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.op == op)
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Fail `op` on the named object (every object when `name` is `None`)
    pub fn fail_on(&self, op: StoreOp, name: Option<&str>, failure: InjectedFailure) {
        self.lock().failures.push(FailureRule {
            op,
            name: name.map(str::to_string),
            failure,
        });
    }

    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        self.lock().latency = latency;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the call and return the configured latency and injected failure
    fn enter(
        &self,
        op: StoreOp,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> (Option<Duration>, Option<StoreError>) {
        let mut state = self.lock();
        state.calls.push(StoreCall {
            op,
            kind: gvk.kind.clone(),
            namespace: namespace.map(str::to_string),
            name: name.map(str::to_string),
        });
        let failure = state
            .failures
            .iter()
            .find(|rule| rule.op == op && (rule.name.is_none() || rule.name.as_deref() == name))
            .map(|rule| match &rule.failure {
                InjectedFailure::NotFound => StoreError::NotFound {
                    kind: gvk.kind.clone(),
                    key: name.unwrap_or_default().to_string(),
                },
                InjectedFailure::Unavailable(message) => StoreError::Unavailable(message.clone()),
            });
        (state.latency, failure)
    }

    async fn begin(
        &self,
        op: StoreOp,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        name: Option<&str>,
    ) -> Result<(), StoreError> {
        let (latency, failure) = self.enter(op, gvk, namespace, name);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        failure.map_or(Ok(()), Err)
    }
}

impl State {
    fn namespaced(&self, gvk: &GroupVersionKind) -> Result<bool, StoreError> {
        let id = resource_id(gvk);
        self.kinds
            .get(&id)
            .copied()
            .ok_or(StoreError::UnknownType(id))
    }

    fn stored_key(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Result<StoredKey, StoreError> {
        let namespaced = self.namespaced(gvk)?;
        Ok(StoredKey {
            resource: resource_id(gvk),
            namespace: if namespaced { key.namespace.clone() } else { None },
            name: key.name.clone(),
        })
    }

    fn bump_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }
}

fn labels_match(object: &Value, selector: &str) -> bool {
    let labels = &object["metadata"]["labels"];
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            let (key, value) = match term.split_once("==").or_else(|| term.split_once('=')) {
                Some((key, value)) => (key.trim(), value.trim()),
                None => return !labels[term].is_null(),
            };
            labels[key].as_str() == Some(value)
        })
}

#[async_trait]
impl ObjectStore for InMemoryStore {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<DynamicObject, StoreError> {
        self.begin(StoreOp::Get, gvk, key.namespace.as_deref(), Some(&key.name))
            .await?;
        let state = self.lock();
        let stored = state.stored_key(gvk, key)?;
        let value = state
            .objects
            .get(&stored)
            .ok_or_else(|| StoreError::not_found(gvk, key))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        self.begin(StoreOp::List, gvk, namespace, None).await?;
        let state = self.lock();
        let namespaced = state.namespaced(gvk)?;
        let resource = resource_id(gvk);
        state
            .objects
            .iter()
            .filter(|(stored, _)| stored.resource == resource)
            .filter(|(stored, _)| {
                !namespaced || namespace.is_none() || stored.namespace.as_deref() == namespace
            })
            .filter(|(_, value)| labels_match(value, label_selector))
            .map(|(_, value)| serde_json::from_value(value.clone()).map_err(StoreError::from))
            .collect()
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &Value,
    ) -> Result<DynamicObject, StoreError> {
        self.begin(StoreOp::Patch, gvk, key.namespace.as_deref(), Some(&key.name))
            .await?;
        let mut state = self.lock();
        let stored = state.stored_key(gvk, key)?;
        let version = state.bump_version();
        let value = state
            .objects
            .get_mut(&stored)
            .ok_or_else(|| StoreError::not_found(gvk, key))?;
        json_patch::merge(value, patch);
        value["metadata"]["resourceVersion"] = Value::String(version);
        Ok(serde_json::from_value(value.clone())?)
    }

    async fn update(
        &self,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let key = ObjectKey::of(object)
            .ok_or_else(|| StoreError::InvalidObject(format!("{} without a name", gvk.kind)))?;
        self.begin(StoreOp::Update, gvk, key.namespace.as_deref(), Some(&key.name))
            .await?;
        let mut replacement = serde_json::to_value(object)?;
        let mut state = self.lock();
        let stored = state.stored_key(gvk, &key)?;
        let current_version = state
            .objects
            .get(&stored)
            .ok_or_else(|| StoreError::not_found(gvk, &key))?["metadata"]["resourceVersion"]
            .as_str()
            .map(str::to_string);
        if let Some(expected) = object.metadata.resource_version.as_deref() {
            if current_version.as_deref() != Some(expected) {
                return Err(StoreError::Conflict {
                    kind: gvk.kind.clone(),
                    key: key.to_string(),
                    message: format!(
                        "resourceVersion {expected} is stale (current {})",
                        current_version.unwrap_or_default()
                    ),
                });
            }
        }
        let version = state.bump_version();
        replacement["metadata"]["resourceVersion"] = Value::String(version);
        state.objects.insert(stored, replacement.clone());
        Ok(serde_json::from_value(replacement)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn deployment_gvk() -> GroupVersionKind {
        GroupVersionKind::gvk("apps", "v1", "Deployment")
    }

    fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert(json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "web", "namespace": "default", "labels": {"app": "web", "tier": "front"}},
                "spec": {"replicas": 3}
            }))
            .unwrap();
        store
            .insert(json!({
                "apiVersion": "apps/v1",
                "kind": "Deployment",
                "metadata": {"name": "api", "namespace": "other", "labels": {"app": "api"}},
                "spec": {"replicas": 1}
            }))
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_get_missing_object_is_not_found() {
        let store = seeded();
        let err = store
            .get(&deployment_gvk(), &ObjectKey::namespaced("default", "missing"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_unregistered_kind_is_unknown_type() {
        let store = InMemoryStore::new();
        let gvk = GroupVersionKind::gvk("apps.kruise.io", "v1alpha1", "CloneSet");
        let err = store
            .get(&gvk, &ObjectKey::namespaced("default", "web"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownType(_)));
    }

    #[tokio::test]
    async fn test_list_filters_namespace_and_labels() {
        let store = seeded();
        let all = store.list(&deployment_gvk(), None, "").await.unwrap();
        assert_eq!(all.len(), 2);

        let front = store
            .list(&deployment_gvk(), Some("default"), "app=web,tier=front")
            .await
            .unwrap();
        assert_eq!(front.len(), 1);

        let none = store
            .list(&deployment_gvk(), Some("other"), "app=web")
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_patch_merges_and_records_call() {
        let store = seeded();
        let key = ObjectKey::namespaced("default", "web");
        let patched = store
            .patch(&deployment_gvk(), &key, &json!({"spec": {"replicas": 5}}))
            .await
            .unwrap();
        assert_eq!(patched.data["spec"]["replicas"], json!(5));
        assert_eq!(
            patched.metadata.labels.unwrap().get("app").map(String::as_str),
            Some("web")
        );
        let patches = store.calls_of(StoreOp::Patch);
        assert_eq!(patches.len(), 1);
        assert_eq!(patches[0].name.as_deref(), Some("web"));
    }

    #[tokio::test]
    async fn test_update_with_stale_resource_version_conflicts() {
        let store = seeded();
        let key = ObjectKey::namespaced("default", "web");
        let stale = store.get(&deployment_gvk(), &key).await.unwrap();
        store
            .patch(&deployment_gvk(), &key, &json!({"spec": {"paused": true}}))
            .await
            .unwrap();

        let err = store.update(&deployment_gvk(), &stale).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));

        let fresh = store.get(&deployment_gvk(), &key).await.unwrap();
        store.update(&deployment_gvk(), &fresh).await.unwrap();
    }

    #[tokio::test]
    async fn test_injected_failure_applies_to_named_object() {
        let store = seeded();
        store.fail_on(
            StoreOp::Get,
            Some("web"),
            InjectedFailure::Unavailable("etcd leader changed".into()),
        );
        let err = store
            .get(&deployment_gvk(), &ObjectKey::namespaced("default", "web"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        store
            .get(&deployment_gvk(), &ObjectKey::namespaced("other", "api"))
            .await
            .unwrap();
    }
}
