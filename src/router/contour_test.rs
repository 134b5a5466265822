use super::*;
use crate::crd::canary::{
    Canary, CanaryAnalysis, CanaryService, CanarySpec, CrossVersionObjectReference,
    HttpMatchRequest, StringMatch,
};
use crate::router::store::MemoryProxyStore;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::Arc;

fn test_canary() -> Canary {
    Canary {
        metadata: ObjectMeta {
            name: Some("podinfo".to_string()),
            namespace: Some("test".to_string()),
            uid: Some("c5e41b11-9f0d-4b9a-8ff2-1c6a2e7f4d3b".to_string()),
            ..Default::default()
        },
        spec: CanarySpec {
            target_ref: CrossVersionObjectReference {
                api_version: Some("apps/v1".to_string()),
                kind: "Deployment".to_string(),
                name: "podinfo".to_string(),
            },
            service: CanaryService {
                port: 9898,
                matches: vec![],
                timeout: None,
                retries: None,
            },
            analysis: CanaryAnalysis::default(),
        },
        status: None,
    }
}

fn test_canary_with_match() -> Canary {
    let mut canary = test_canary();
    let mut headers = BTreeMap::new();
    headers.insert(
        "x-canary".to_string(),
        StringMatch {
            exact: Some("insider".to_string()),
            ..Default::default()
        },
    );
    canary.spec.analysis.matches.push(HttpMatchRequest {
        headers: Some(headers),
        uri: None,
    });
    canary
}

fn test_router() -> (ContourRouter, Arc<MemoryProxyStore>) {
    let store = Arc::new(MemoryProxyStore::new());
    (ContourRouter::new(store.clone()), store)
}

#[tokio::test]
async fn test_reconcile_creates_missing_proxy() {
    let (router, store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();

    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.update_calls(), 0);

    let proxy = store.stored("test", "podinfo").unwrap();
    assert_eq!(proxy.metadata.name.as_deref(), Some("podinfo"));

    // Freshly created proxies carry no canary traffic
    let services = &proxy.spec.routes[0].services;
    assert_eq!(services[0].weight, 100);
    assert_eq!(services[1].weight, 0);

    // Valid status marker and owner back-reference to the Canary
    assert_eq!(proxy.status.unwrap().current_status, "valid");
    let owner = &proxy.metadata.owner_references.unwrap()[0];
    assert_eq!(owner.kind, "Canary");
    assert_eq!(owner.name, "podinfo");
    assert_eq!(owner.controller, Some(true));
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let (router, store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();
    router.reconcile(&canary).await.unwrap();
    router.reconcile(&canary).await.unwrap();

    assert_eq!(store.create_calls(), 1);
    assert_eq!(store.update_calls(), 0);
}

#[tokio::test]
async fn test_reconcile_preserves_externally_shifted_weights() {
    let (router, store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();

    // The rollout loop shifts weights between reconciles
    store.mutate("test", "podinfo", |proxy| {
        proxy.spec.routes[0].services[0].weight = 60;
        proxy.spec.routes[0].services[1].weight = 40;
    });

    router.reconcile(&canary).await.unwrap();

    assert_eq!(store.update_calls(), 0);
    let proxy = store.stored("test", "podinfo").unwrap();
    assert_eq!(proxy.spec.routes[0].services[0].weight, 60);
    assert_eq!(proxy.spec.routes[0].services[1].weight, 40);
}

#[tokio::test]
async fn test_reconcile_updates_on_shape_change_and_resets_weights() {
    let (router, store) = test_router();
    let mut canary = test_canary();

    router.reconcile(&canary).await.unwrap();
    store.mutate("test", "podinfo", |proxy| {
        proxy.spec.routes[0].services[0].weight = 60;
        proxy.spec.routes[0].services[1].weight = 40;
    });

    // Non-weight configuration change
    canary.spec.service.timeout = Some("15s".to_string());
    router.reconcile(&canary).await.unwrap();

    assert_eq!(store.update_calls(), 1);
    let proxy = store.stored("test", "podinfo").unwrap();
    let route = &proxy.spec.routes[0];
    assert_eq!(route.timeout_policy.as_ref().unwrap().response, "15s");
    // A shape change rewrites the whole spec, weights included
    assert_eq!(route.services[0].weight, 100);
    assert_eq!(route.services[1].weight, 0);
}

#[tokio::test]
async fn test_reconcile_surfaces_query_errors_without_mutating() {
    let (router, store) = test_router();
    store.fail_reads();

    let err = router.reconcile(&test_canary()).await.unwrap_err();

    assert!(matches!(err, RouterError::Query { .. }));
    assert_eq!(store.create_calls(), 0);
    assert_eq!(store.update_calls(), 0);
}

#[tokio::test]
async fn test_reconcile_update_conflict_is_retryable() {
    let (router, store) = test_router();
    let mut canary = test_canary();

    router.reconcile(&canary).await.unwrap();

    canary.spec.service.timeout = Some("15s".to_string());
    store.conflict_on_update();

    let err = router.reconcile(&canary).await.unwrap_err();

    assert!(matches!(err, RouterError::Conflict { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_get_routes_reports_missing_proxy() {
    let (router, _store) = test_router();

    let err = router.get_routes(&test_canary()).await.unwrap_err();

    assert!(matches!(err, RouterError::NotFound { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_get_routes_rejects_malformed_proxy() {
    let (router, store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();
    // A hand-edited proxy with a single backend is not ours to interpret
    store.mutate("test", "podinfo", |proxy| {
        proxy.spec.routes[0].services.truncate(1);
    });

    let err = router.get_routes(&canary).await.unwrap_err();
    assert!(matches!(err, RouterError::ServicesNotFound { .. }));
}

#[tokio::test]
async fn test_get_routes_without_primary_entry_reports_zero_split() {
    let (router, store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();
    store.mutate("test", "podinfo", |proxy| {
        proxy.spec.routes[0].services[0].name = "renamed".to_string();
    });

    let (primary, canary_weight, mirrored) = router.get_routes(&canary).await.unwrap();
    assert_eq!((primary, canary_weight, mirrored), (0, 0, false));
}

#[tokio::test]
async fn test_set_routes_rejects_zero_weights_without_store_calls() {
    let (router, store) = test_router();

    let err = router
        .set_routes(&test_canary(), 0, 0, false)
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::NoValidWeights { .. }));
    assert_eq!(store.total_calls(), 0);
}

#[tokio::test]
async fn test_set_routes_then_get_routes_round_trips() {
    let (router, _store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();
    router.set_routes(&canary, 50, 50, false).await.unwrap();

    let (primary, canary_weight, mirrored) = router.get_routes(&canary).await.unwrap();
    assert_eq!((primary, canary_weight, mirrored), (50, 50, false));
}

#[tokio::test]
async fn test_set_routes_keeps_catch_all_pinned_with_match_rules() {
    let (router, store) = test_router();
    let canary = test_canary_with_match();

    router.reconcile(&canary).await.unwrap();
    router.set_routes(&canary, 60, 40, false).await.unwrap();

    let proxy = store.stored("test", "podinfo").unwrap();
    assert_eq!(proxy.spec.routes.len(), 2);

    let match_route = &proxy.spec.routes[0];
    assert_eq!(match_route.services[0].weight, 60);
    assert_eq!(match_route.services[1].weight, 40);

    let catch_all = &proxy.spec.routes[1];
    assert_eq!(catch_all.services[0].weight, 100);
    assert_eq!(catch_all.services[1].weight, 0);
}

#[tokio::test]
async fn test_set_routes_reports_missing_proxy() {
    let (router, _store) = test_router();

    let err = router
        .set_routes(&test_canary(), 50, 50, false)
        .await
        .unwrap_err();

    assert!(matches!(err, RouterError::NotFound { .. }));
}

#[tokio::test]
async fn test_set_routes_conflict_is_retryable() {
    let (router, store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();
    store.conflict_on_update();

    let err = router.set_routes(&canary, 50, 50, false).await.unwrap_err();

    assert!(matches!(err, RouterError::Conflict { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_set_routes_always_writes_even_without_weight_change() {
    let (router, store) = test_router();
    let canary = test_canary();

    router.reconcile(&canary).await.unwrap();
    router.set_routes(&canary, 100, 0, false).await.unwrap();
    router.set_routes(&canary, 100, 0, false).await.unwrap();

    assert_eq!(store.update_calls(), 2);
}

#[tokio::test]
async fn test_error_messages_identify_the_proxy() {
    let (router, _store) = test_router();

    let err = router.get_routes(&test_canary()).await.unwrap_err();
    assert_eq!(err.to_string(), "HTTPProxy podinfo.test not found");

    let err = router
        .set_routes(&test_canary(), 0, 0, false)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "HTTPProxy podinfo.test update failed: no valid weights"
    );
}
