//! # Reschedule Tests
//!
//! [`RescheduleHandler`] against the in-memory store.
//!
//! These tests verify:
//! - Policy selectors stamp exactly the bindings derived from the policy
//! - A binding reachable through several selectors is updated once
//! - A missing resource binding aborts the command before any update
//! - A failing update keeps earlier updates committed
//! - Invalid commands never reach the store

mod common;

use chrono::{DateTime, TimeZone, Utc};
use common::*;
use replica_sync_controller::constants::{
    PROPAGATION_POLICY_NAMESPACE_LABEL, PROPAGATION_POLICY_NAME_LABEL,
};
use replica_sync_controller::controller::reschedule::{RescheduleError, RescheduleHandler};
use replica_sync_controller::crd::{
    cluster_resource_binding_gvk, reschedule_triggered_at, resource_binding_gvk, PolicySelector,
    Reschedule, RescheduleSpec, ResourceSelector,
};
use replica_sync_controller::store::memory::{InjectedFailure, StoreOp};
use replica_sync_controller::store::{InMemoryStore, ObjectKey};
use serde_json::json;
use std::sync::Arc;

fn fixture() -> Arc<InMemoryStore> {
    Arc::new(store_with(vec![
        resource_binding(NAMESPACE, "web-deployment", pp_claim("web-pp")),
        resource_binding(NAMESPACE, "api-deployment", pp_claim("web-pp")),
        resource_binding(NAMESPACE, "other-deployment", pp_claim("other-pp")),
        resource_binding(
            "prod",
            "web-deployment",
            json!({
                PROPAGATION_POLICY_NAMESPACE_LABEL: "prod",
                PROPAGATION_POLICY_NAME_LABEL: "web-pp"
            }),
        ),
        resource_binding("kube-system", "coredns-deployment", cpp_claim("global")),
        cluster_resource_binding("admin-clusterrole", cpp_claim("global")),
        cluster_resource_binding("view-clusterrole", cpp_claim("other")),
    ]))
}

fn triggered(store: &InMemoryStore, namespace: &str, name: &str) -> Option<DateTime<Utc>> {
    let object = store.object(&resource_binding_gvk(), &ObjectKey::namespaced(namespace, name))?;
    reschedule_triggered_at(&object)
}

fn cluster_triggered(store: &InMemoryStore, name: &str) -> Option<DateTime<Utc>> {
    let object = store.object(&cluster_resource_binding_gvk(), &ObjectKey::cluster(name))?;
    reschedule_triggered_at(&object)
}

fn pp(name: &str) -> PolicySelector {
    PolicySelector {
        name: name.into(),
        namespace: Some(NAMESPACE.into()),
    }
}

fn cpp(name: &str) -> PolicySelector {
    PolicySelector {
        name: name.into(),
        namespace: None,
    }
}

fn deployment_selector(name: &str) -> ResourceSelector {
    ResourceSelector {
        api_version: "apps/v1".into(),
        kind: "Deployment".into(),
        name: name.into(),
        namespace: Some(NAMESPACE.into()),
    }
}

#[tokio::test]
async fn test_namespaced_policy_stamps_only_its_bindings() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());
    let issued = Utc::now();

    let summary = handler.resolve(&[pp("web-pp")], &[]).await.unwrap();

    assert_eq!(summary.len(), 2);
    assert_eq!(store.calls_of(StoreOp::Update).len(), 2);
    for name in ["web-deployment", "api-deployment"] {
        let at = triggered(&store, NAMESPACE, name).unwrap();
        assert!(at >= issued, "{name} stamped at {at}, issued at {issued}");
    }
    assert_eq!(triggered(&store, NAMESPACE, "other-deployment"), None);
    assert_eq!(triggered(&store, "prod", "web-deployment"), None);
    assert_eq!(triggered(&store, "kube-system", "coredns-deployment"), None);
    assert_eq!(cluster_triggered(&store, "admin-clusterrole"), None);
}

#[tokio::test]
async fn test_cluster_policy_stamps_namespaced_and_cluster_bindings() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());

    let summary = handler.resolve(&[cpp("global")], &[]).await.unwrap();

    assert_eq!(
        summary.bindings,
        vec![ObjectKey::namespaced("kube-system", "coredns-deployment")]
    );
    assert_eq!(
        summary.cluster_bindings,
        vec![ObjectKey::cluster("admin-clusterrole")]
    );
    assert!(triggered(&store, "kube-system", "coredns-deployment").is_some());
    assert!(cluster_triggered(&store, "admin-clusterrole").is_some());
    assert_eq!(cluster_triggered(&store, "view-clusterrole"), None);
}

#[tokio::test]
async fn test_binding_selected_twice_is_updated_once() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());

    let summary = handler
        .resolve(
            &[pp("web-pp"), pp("web-pp")],
            &[deployment_selector("web"), deployment_selector("web")],
        )
        .await
        .unwrap();

    assert_eq!(summary.len(), 2);
    let web_updates = store
        .calls_of(StoreOp::Update)
        .into_iter()
        .filter(|call| call.name.as_deref() == Some("web-deployment"))
        .count();
    assert_eq!(web_updates, 1);
}

#[tokio::test]
async fn test_cluster_scoped_resource_selector() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());
    let cluster_role = ResourceSelector {
        api_version: "rbac.authorization.k8s.io/v1".into(),
        kind: "ClusterRole".into(),
        name: "view".into(),
        namespace: None,
    };

    let summary = handler.resolve(&[], &[cluster_role]).await.unwrap();

    assert_eq!(summary.cluster_bindings, vec![ObjectKey::cluster("view-clusterrole")]);
    assert!(cluster_triggered(&store, "view-clusterrole").is_some());
}

#[tokio::test]
async fn test_missing_resource_binding_aborts_without_updates() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());

    let err = handler
        .resolve(&[pp("web-pp")], &[deployment_selector("missing")])
        .await
        .unwrap_err();

    assert!(err.is_not_found(), "{err}");
    assert!(matches!(err, RescheduleError::GetBinding { .. }));
    assert!(store.calls_of(StoreOp::Update).is_empty());
    assert_eq!(triggered(&store, NAMESPACE, "web-deployment"), None);
}

#[tokio::test]
async fn test_failed_update_keeps_earlier_updates() {
    let store = fixture();
    store.fail_on(
        StoreOp::Update,
        Some("web-deployment"),
        InjectedFailure::Unavailable("etcd leader changed".into()),
    );
    let handler = RescheduleHandler::new(store.clone());

    let err = handler.resolve(&[pp("web-pp")], &[]).await.unwrap_err();

    assert!(matches!(err, RescheduleError::UpdateBinding { .. }), "{err}");
    assert!(!err.is_not_found());
    // Bindings are updated in key order: api-deployment before web-deployment
    assert!(triggered(&store, NAMESPACE, "api-deployment").is_some());
    assert_eq!(triggered(&store, NAMESPACE, "web-deployment"), None);
}

#[tokio::test]
async fn test_back_to_back_commands_each_cover_their_issue_time() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());

    handler.resolve(&[pp("web-pp")], &[]).await.unwrap();
    let first = triggered(&store, NAMESPACE, "web-deployment").unwrap();

    let issued = Utc::now();
    handler.resolve(&[pp("web-pp")], &[]).await.unwrap();
    let second = triggered(&store, NAMESPACE, "web-deployment").unwrap();

    assert!(second >= first);
    assert!(second >= issued, "stamped at {second}, issued at {issued}");
}

#[tokio::test]
async fn test_trigger_is_never_rolled_back() {
    let future = "2099-01-01T00:00:00Z";
    let mut binding = resource_binding(NAMESPACE, "web-deployment", pp_claim("web-pp"));
    binding["spec"]["rescheduleTriggeredAt"] = json!(future);
    let store = Arc::new(store_with(vec![binding]));
    let handler = RescheduleHandler::new(store.clone());

    handler.resolve(&[pp("web-pp")], &[]).await.unwrap();

    assert_eq!(
        triggered(&store, NAMESPACE, "web-deployment"),
        Some(Utc.with_ymd_and_hms(2099, 1, 1, 0, 0, 0).unwrap())
    );
}

#[tokio::test]
async fn test_update_preserves_unknown_fields() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());

    handler.resolve(&[], &[deployment_selector("web")]).await.unwrap();

    let web = store
        .object(&resource_binding_gvk(), &ObjectKey::namespaced(NAMESPACE, "web-deployment"))
        .unwrap();
    assert_eq!(web.data["spec"]["replicas"], json!(2));
    assert_eq!(web.data["spec"]["clusters"][1]["name"], json!("member2"));
}

#[tokio::test]
async fn test_create_returns_accepted_command() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());
    let command = Reschedule::new(
        "rebalance",
        RescheduleSpec {
            target_ref_policy: vec![pp("web-pp")],
            target_ref_resource: vec![],
        },
    );

    let accepted = handler.create(command.clone()).await.unwrap();

    assert_eq!(accepted.spec, command.spec);
    assert_eq!(accepted.metadata.name.as_deref(), Some("rebalance"));
}

#[tokio::test]
async fn test_invalid_command_never_reaches_store() {
    let store = fixture();
    let handler = RescheduleHandler::new(store.clone());
    let command = Reschedule::new(
        "this-name-is-far-too-long-for-a-reschedule",
        RescheduleSpec {
            target_ref_policy: vec![pp("web-pp")],
            target_ref_resource: vec![],
        },
    );

    let err = handler.create(command).await.unwrap_err();

    match err {
        RescheduleError::Invalid { errors, .. } => {
            assert_eq!(errors.len(), 1);
            assert!(errors[0].contains("must be no more than 32 characters"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(store.calls().is_empty());
}
