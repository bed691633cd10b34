// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;
use crate::bundle_config::BundleRegistry;
use crate::common::{companion_config_map_key, HELM_RELEASE_NAME_ANNOTATION, MANAGED_BY_LABEL};
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::common::ObjectKey;
use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::step::*;
use crate::reconciler::{BundleReconciler, Reconciler};
use crate::unit_tests::{make_app, reconciler};
use crate::Error;
use k8s_openapi::api::core::v1::ConfigMap;
use std::collections::BTreeMap;
use std::sync::Arc;

fn key(name: &str) -> ObjectKey {
    ObjectKey::new("org-giantswarm", name)
}

fn with_version(mut app: App, rv: &str) -> App {
    app.metadata.resource_version = Some(rv.to_string());
    app
}

// Runs the reconciler from the initial state up to the GetApp response.
fn after_get_app(
    key: &ObjectKey,
    resp: Result<App, APIError>,
) -> (BundleReconcileState, Option<KubeAPIRequest>) {
    let reconciler = reconciler();
    let (state, req) = reconciler.reconcile_core(key, None, reconciler.reconcile_init_state());
    assert!(matches!(req, Some(KubeAPIRequest::GetApp(_))));
    reconciler.reconcile_core(key, Some(KubeAPIResponse::GetApp(resp)), state)
}

#[test]
pub fn test_init_skips_other_namespaces() {
    let reconciler = reconciler();
    let key = ObjectKey::new("default", "my-app");
    let (state, req) = reconciler.reconcile_core(&key, None, reconciler.reconcile_init_state());
    assert!(req.is_none());
    assert!(reconciler.reconcile_done(&state));
    assert!(state.report.skipped_namespace);
}

#[test]
pub fn test_init_gets_app() {
    let reconciler = reconciler();
    let key = key("my-app");
    let (state, req) = reconciler.reconcile_core(&key, None, reconciler.reconcile_init_state());
    assert_eq!(state.reconcile_step, BundleReconcileStep::AfterGetApp);
    match req {
        Some(KubeAPIRequest::GetApp(get_req)) => assert_eq!(get_req.key, key),
        req => panic!("unexpected request {:?}", req),
    }
}

#[test]
pub fn test_app_not_found_ends_reconcile() {
    let (state, req) = after_get_app(&key("my-app"), Err(APIError::ObjectNotFound));
    assert!(req.is_none());
    assert_eq!(state.reconcile_step, BundleReconcileStep::Done);
    assert!(state.report.app_not_found);
}

#[test]
pub fn test_get_app_error_is_surfaced() {
    let (state, req) = after_get_app(&key("my-app"), Err(APIError::Transport("connection reset".to_string())));
    assert!(req.is_none());
    assert_eq!(state.reconcile_step, BundleReconcileStep::Error);
    assert!(matches!(
        state.error,
        Some(Error::AppGetFailed(_, APIError::Transport(_)))
    ));
}

#[test]
pub fn test_managed_app_gets_companion_config_map() {
    let key = key("my-app");
    let app = make_app("org-giantswarm", "my-app", "my-app", "1.0.0");
    let (state, req) = after_get_app(&key, Ok(app));
    assert_eq!(state.report.classification, Some(Classification::Managed));
    assert_eq!(
        state.reconcile_step,
        BundleReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::CompanionConfigMap)
    );
    match req {
        Some(KubeAPIRequest::GetConfigMap(get_req)) => {
            assert_eq!(get_req.key, companion_config_map_key("my-app", "org-giantswarm"))
        }
        req => panic!("unexpected request {:?}", req),
    }
}

#[test]
pub fn test_unmanaged_app_is_left_alone() {
    let app = make_app("org-giantswarm", "cluster-aws", "cluster-aws", "1.0.0");
    let (state, req) = after_get_app(&key("cluster-aws"), Ok(app));
    assert!(req.is_none());
    assert_eq!(state.reconcile_step, BundleReconcileStep::Done);
    assert_eq!(state.report.classification, Some(Classification::Unmanaged));
    assert_eq!(state.report.config_map, None);
    assert_eq!(state.report.migration, Some(MigrationOutcome::Skipped));
}

#[test]
pub fn test_bundle_member_is_not_bundle_processed() {
    let mut app = make_app("org-giantswarm", "my-app", "my-app", "1.0.0");
    app.metadata.annotations = Some(BTreeMap::from([(
        HELM_RELEASE_NAME_ANNOTATION.to_string(),
        "other-bundle".to_string(),
    )]));
    app.metadata.labels = Some(BTreeMap::from([(MANAGED_BY_LABEL.to_string(), "other-bundle".to_string())]));
    let (state, req) = after_get_app(&key("my-app"), Ok(app));
    assert!(req.is_none());
    assert_eq!(state.report.classification, Some(Classification::BundleMember));
    assert_eq!(state.report.migration, Some(MigrationOutcome::Skipped));
}

#[test]
pub fn test_legacy_unmanaged_app_is_migrated() {
    let key = key("security-bundle");
    let app = with_version(make_app("org-giantswarm", "security-bundle", "security-bundle", "1.14.9"), "5");
    // No securityBundle entry: the registry in this test only has my-app.
    let registry = Arc::new(BundleRegistry::from_yaml("myApp:\n  bundles: {}\n").unwrap());
    let reconciler = BundleReconciler::new(registry, "org-giantswarm");
    let (state, _) = reconciler.reconcile_core(&key, None, reconciler.reconcile_init_state());
    let (state, req) = reconciler.reconcile_core(&key, Some(KubeAPIResponse::GetApp(Ok(app))), state);
    assert_eq!(state.report.classification, Some(Classification::Unmanaged));
    match req {
        Some(KubeAPIRequest::UpdateApp(update_req)) => {
            assert_eq!(update_req.obj.spec.version, "1.15.0");
            assert_eq!(update_req.obj.metadata.resource_version.as_deref(), Some("5"));
        }
        req => panic!("unexpected request {:?}", req),
    }
    let (state, req) = reconciler.reconcile_core(
        &key,
        Some(KubeAPIResponse::UpdateApp(Err(APIError::Conflict("stale".to_string())))),
        state,
    );
    assert!(req.is_none());
    assert!(reconciler.reconcile_error(&state));
    assert!(matches!(state.error, Some(Error::AppUpdateFailed(_, APIError::Conflict(_)))));
}

#[test]
pub fn test_config_map_get_error_is_surfaced() {
    let reconciler = reconciler();
    let key = key("my-app");
    let app = make_app("org-giantswarm", "my-app", "my-app", "1.0.0");
    let (state, _) = after_get_app(&key, Ok(app));
    let (state, req) = reconciler.reconcile_core(
        &key,
        Some(KubeAPIResponse::GetConfigMap(Err(APIError::Api {
            code: 403,
            reason: "Forbidden".to_string(),
            message: "configmaps is forbidden".to_string(),
        }))),
        state,
    );
    assert!(req.is_none());
    assert!(matches!(state.error, Some(Error::ConfigMapGetFailed(..))));
}

#[test]
pub fn test_missing_config_map_is_created() {
    let reconciler = reconciler();
    let key = key("my-app");
    let app = make_app("org-giantswarm", "my-app", "my-app", "1.0.0");
    let (state, _) = after_get_app(&key, Ok(app));
    let (state, req) = reconciler.reconcile_core(
        &key,
        Some(KubeAPIResponse::GetConfigMap(Err(APIError::ObjectNotFound))),
        state,
    );
    assert_eq!(
        state.reconcile_step,
        BundleReconcileStep::AfterKRequestStep(ActionKind::Create, SubResource::CompanionConfigMap)
    );
    let cm = match req {
        Some(KubeAPIRequest::CreateConfigMap(create_req)) => {
            assert_eq!(create_req.namespace, "org-giantswarm");
            create_req.obj
        }
        req => panic!("unexpected request {:?}", req),
    };
    assert!(cm.data.unwrap()["values"].contains("shared-values"));

    let (state, req) = reconciler.reconcile_core(&key, Some(KubeAPIResponse::CreateConfigMap(Ok(ConfigMap::default()))), state);
    assert_eq!(state.report.config_map, Some(SyncOutcome::Created));
    match req {
        Some(KubeAPIRequest::PatchApp(patch_req)) => {
            let extra_configs = &patch_req.patch["spec"]["extraConfigs"];
            assert_eq!(extra_configs[0]["name"], "my-app-bundle-operator-config");
            assert_eq!(extra_configs[0]["kind"], "configMap");
            assert_eq!(extra_configs[0]["priority"], 25);
        }
        req => panic!("unexpected request {:?}", req),
    }
}

#[test]
pub fn test_unexpected_response_is_an_error() {
    let reconciler = reconciler();
    let key = key("my-app");
    let (state, _) = reconciler.reconcile_core(&key, None, reconciler.reconcile_init_state());
    let (state, req) = reconciler.reconcile_core(
        &key,
        Some(KubeAPIResponse::GetConfigMap(Err(APIError::ObjectNotFound))),
        state,
    );
    assert!(req.is_none());
    assert!(matches!(
        state.error,
        Some(Error::UnexpectedResponse(BundleReconcileStep::AfterGetApp))
    ));
}
