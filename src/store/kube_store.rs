//! # API Server Store
//!
//! [`ObjectStore`] backed by the Kubernetes API server.
//!
//! Types are resolved to their REST mapping through discovery the first time
//! they are used; the mapping is cached for the lifetime of the store.

use super::{api_version_of, ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::core::{ApiResource, DynamicObject, GroupVersionKind};
use kube::discovery::{pinned_kind, Scope};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Object store talking to the API server
pub struct KubeStore {
    client: Client,
    field_manager: String,
    /// gvk → (REST mapping, namespaced)
    resources: Mutex<HashMap<String, (ApiResource, bool)>>,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
            resources: Mutex::new(HashMap::new()),
        }
    }

    async fn resolve(&self, gvk: &GroupVersionKind) -> Result<(ApiResource, bool), StoreError> {
        let cache_key = format!("{}/{}", api_version_of(gvk), gvk.kind);
        if let Some(cached) = self
            .resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&cache_key)
        {
            return Ok(cached.clone());
        }

        let (resource, capabilities) = pinned_kind(&self.client, gvk)
            .await
            .map_err(|e| StoreError::UnknownType(format!("{cache_key}: {e}")))?;
        let namespaced = matches!(capabilities.scope, Scope::Namespaced);
        debug!(
            resource = %cache_key,
            plural = %resource.plural,
            namespaced,
            "Resolved REST mapping"
        );

        self.resources
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cache_key, (resource.clone(), namespaced));
        Ok((resource, namespaced))
    }

    async fn api(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
    ) -> Result<Api<DynamicObject>, StoreError> {
        let (resource, namespaced) = self.resolve(gvk).await?;
        let api = match namespace {
            Some(ns) if namespaced => Api::namespaced_with(self.client.clone(), ns, &resource),
            _ => Api::all_with(self.client.clone(), &resource),
        };
        Ok(api)
    }

    fn patch_params(&self) -> PatchParams {
        PatchParams {
            field_manager: Some(self.field_manager.clone()),
            ..PatchParams::default()
        }
    }

    fn post_params(&self) -> PostParams {
        PostParams {
            dry_run: false,
            field_manager: Some(self.field_manager.clone()),
        }
    }
}

fn map_error(gvk: &GroupVersionKind, key: &ObjectKey, error: kube::Error) -> StoreError {
    match error {
        kube::Error::Api(e) if e.code == 404 => StoreError::not_found(gvk, key),
        kube::Error::Api(e) if e.code == 409 => StoreError::Conflict {
            kind: gvk.kind.clone(),
            key: key.to_string(),
            message: e.message.clone(),
        },
        other => StoreError::Api(other),
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<DynamicObject, StoreError> {
        let api = self.api(gvk, key.namespace.as_deref()).await?;
        api.get(&key.name)
            .await
            .map_err(|e| map_error(gvk, key, e))
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        let api = self.api(gvk, namespace).await?;
        let params = ListParams::default().labels(label_selector);
        let list = api.list(&params).await.map_err(StoreError::Api)?;
        Ok(list.items)
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<DynamicObject, StoreError> {
        let api = self.api(gvk, key.namespace.as_deref()).await?;
        api.patch(&key.name, &self.patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| map_error(gvk, key, e))
    }

    async fn update(
        &self,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        let key = ObjectKey::of(object)
            .ok_or_else(|| StoreError::InvalidObject(format!("{} without a name", gvk.kind)))?;
        let api = self.api(gvk, key.namespace.as_deref()).await?;
        api.replace(&key.name, &self.post_params(), object)
            .await
            .map_err(|e| map_error(gvk, &key, e))
    }
}
