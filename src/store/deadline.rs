//! # Deadline Decorator
//!
//! Bounds every request of an inner store by a fixed deadline. A request that
//! outlives it fails with [`StoreError::DeadlineExceeded`], which callers treat
//! as retryable.

use super::{ObjectKey, ObjectStore, StoreError};
use async_trait::async_trait;
use kube::core::{DynamicObject, GroupVersionKind};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Debug)]
pub struct DeadlineStore<S> {
    inner: S,
    deadline: Duration,
}

impl<S> DeadlineStore<S> {
    pub fn new(inner: S, deadline: Duration) -> Self {
        Self { inner, deadline }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    async fn bounded<T>(
        &self,
        operation: &str,
        request: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, StoreError> {
        match tokio::time::timeout(self.deadline, request).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(
                    operation,
                    deadline_secs = self.deadline.as_secs_f64(),
                    "Store request exceeded its deadline"
                );
                Err(StoreError::DeadlineExceeded(self.deadline))
            }
        }
    }
}

#[async_trait]
impl<S: ObjectStore> ObjectStore for DeadlineStore<S> {
    async fn get(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
    ) -> Result<DynamicObject, StoreError> {
        self.bounded("get", self.inner.get(gvk, key)).await
    }

    async fn list(
        &self,
        gvk: &GroupVersionKind,
        namespace: Option<&str>,
        label_selector: &str,
    ) -> Result<Vec<DynamicObject>, StoreError> {
        self.bounded("list", self.inner.list(gvk, namespace, label_selector))
            .await
    }

    async fn patch(
        &self,
        gvk: &GroupVersionKind,
        key: &ObjectKey,
        patch: &serde_json::Value,
    ) -> Result<DynamicObject, StoreError> {
        self.bounded("patch", self.inner.patch(gvk, key, patch)).await
    }

    async fn update(
        &self,
        gvk: &GroupVersionKind,
        object: &DynamicObject,
    ) -> Result<DynamicObject, StoreError> {
        self.bounded("update", self.inner.update(gvk, object)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use serde_json::json;

    fn store_with_config_map() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .insert(json!({
                "apiVersion": "v1",
                "kind": "ConfigMap",
                "metadata": {"name": "settings", "namespace": "default"},
                "data": {"mode": "fast"}
            }))
            .unwrap();
        store
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_request_fails_past_deadline() {
        let inner = store_with_config_map();
        inner.set_latency(Some(Duration::from_secs(10)));
        let store = DeadlineStore::new(inner, Duration::from_secs(1));

        let err = store
            .get(
                &GroupVersionKind::gvk("", "v1", "ConfigMap"),
                &ObjectKey::namespaced("default", "settings"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DeadlineExceeded(d) if d == Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_fast_request_passes_through() {
        let store = DeadlineStore::new(store_with_config_map(), Duration::from_secs(5));
        let object = store
            .get(
                &GroupVersionKind::gvk("", "v1", "ConfigMap"),
                &ObjectKey::namespaced("default", "settings"),
            )
            .await
            .unwrap();
        assert_eq!(object.data["data"]["mode"], json!("fast"));
    }
}
