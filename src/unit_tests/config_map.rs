// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::bundle_config::{BundleApp, BundleConfig, ExtraConfig};
use crate::common::{MANAGED_BY_LABEL, OPERATOR_NAME, VALUES_KEY};
use crate::kubernetes_api_objects::common::ObjectKey;
use crate::reconciler::config_map::*;
use crate::Error;
use serde_json::json;
use std::collections::BTreeMap;

fn bundle(apps: &[&str]) -> BundleConfig {
    BundleConfig {
        apps: apps
            .iter()
            .map(|app| {
                (
                    app.to_string(),
                    BundleApp {
                        enabled: true,
                        ..BundleApp::default()
                    },
                )
            })
            .collect(),
    }
}

fn stored(key: &ObjectKey, values: &str) -> k8s_openapi::api::core::v1::ConfigMap {
    let mut cm = make_config_map(key, values.to_string());
    cm.metadata.resource_version = Some("7".to_string());
    cm
}

#[test]
pub fn test_make_config_map() {
    let key = ObjectKey::new("org-giantswarm", "my-app-bundle-operator-config");
    let cm = make_config_map(&key, "apps: {}\n".to_string());
    assert_eq!(cm.metadata.name.as_deref(), Some("my-app-bundle-operator-config"));
    assert_eq!(cm.metadata.namespace.as_deref(), Some("org-giantswarm"));
    assert_eq!(
        cm.metadata.labels.unwrap().get(MANAGED_BY_LABEL).map(String::as_str),
        Some(OPERATOR_NAME)
    );
    assert_eq!(cm.data.unwrap()[VALUES_KEY], "apps: {}\n");
}

#[test]
pub fn test_plan_update_unchanged() {
    let key = ObjectKey::new("org-giantswarm", "cm");
    let desired = bundle(&["kyverno"]);
    let values = desired_values(&desired).unwrap();
    assert_eq!(
        plan_update(&key, &stored(&key, &values), &desired, &values).unwrap(),
        ConfigMapPlan::Unchanged
    );

    // Same document, different formatting.
    let reformatted = "apps: {kyverno: {enabled: true}}";
    assert_eq!(
        plan_update(&key, &stored(&key, reformatted), &desired, &values).unwrap(),
        ConfigMapPlan::Unchanged
    );
}

#[test]
pub fn test_plan_update_prunes_stale_apps() {
    let key = ObjectKey::new("org-giantswarm", "cm");
    let desired = bundle(&["kyverno"]);
    let values = desired_values(&desired).unwrap();
    let old = desired_values(&bundle(&["kyverno", "falco"])).unwrap();

    match plan_update(&key, &stored(&key, &old), &desired, &values).unwrap() {
        ConfigMapPlan::Patch { patch, pruned } => {
            assert_eq!(pruned, vec!["falco".to_string()]);
            assert_eq!(
                patch,
                json!({"data": {"values": values}, "metadata": {"resourceVersion": "7"}})
            );
        }
        plan => panic!("expected a patch, got {:?}", plan),
    }
}

#[test]
pub fn test_plan_update_foreign_shape_is_rewritten() {
    let key = ObjectKey::new("org-giantswarm", "cm");
    let desired = bundle(&["kyverno"]);
    let values = desired_values(&desired).unwrap();
    let foreign = "extraConfigs:\n- name: shared-values\n";

    match plan_update(&key, &stored(&key, foreign), &desired, &values).unwrap() {
        ConfigMapPlan::Patch { pruned, .. } => assert!(pruned.is_empty()),
        plan => panic!("expected a patch, got {:?}", plan),
    }
}

#[test]
pub fn test_plan_update_missing_values_key() {
    let key = ObjectKey::new("org-giantswarm", "cm");
    let desired = bundle(&["kyverno"]);
    let values = desired_values(&desired).unwrap();
    let mut cm = stored(&key, &values);
    cm.data = Some(BTreeMap::from([("other".to_string(), "x".to_string())]));

    match plan_update(&key, &cm, &desired, &values).unwrap() {
        ConfigMapPlan::Patch { patch, pruned } => {
            assert!(pruned.is_empty());
            assert_eq!(patch["data"], json!({"values": values}));
        }
        plan => panic!("expected a patch, got {:?}", plan),
    }
}

#[test]
pub fn test_plan_update_undecodable_values() {
    let key = ObjectKey::new("org-giantswarm", "cm");
    let desired = bundle(&["kyverno"]);
    let values = desired_values(&desired).unwrap();
    assert!(matches!(
        plan_update(&key, &stored(&key, "apps: [unclosed"), &desired, &values),
        Err(Error::DeserializeValuesFailed(..))
    ));
}

#[test]
pub fn test_plan_update_keeps_stored_app_fields() {
    let key = ObjectKey::new("org-giantswarm", "cm");
    let mut desired = bundle(&["kyverno", "falco"]);
    desired.apps.get_mut("kyverno").unwrap().extra_configs = vec![ExtraConfig {
        kind: "configMap".to_string(),
        name: "kyverno-defaults".to_string(),
        namespace: "org-giantswarm".to_string(),
        priority: 30,
    }];
    let values = desired_values(&desired).unwrap();
    let stored_doc = "apps:\n  kyverno:\n    namespace: security\n    version: 0.16.0\n    extraConfigs:\n    - kind: configMap\n      name: old-defaults\n      namespace: org-giantswarm\n";

    let patch = match plan_update(&key, &stored(&key, stored_doc), &desired, &values).unwrap() {
        ConfigMapPlan::Patch { patch, pruned } => {
            assert!(pruned.is_empty());
            patch
        }
        plan => panic!("expected a patch, got {:?}", plan),
    };
    let written: BundleConfig = serde_yaml::from_str(patch["data"]["values"].as_str().unwrap()).unwrap();
    let kyverno = &written.apps["kyverno"];
    assert_eq!(kyverno.namespace, "security");
    assert_eq!(kyverno.version, "0.16.0");
    assert!(!kyverno.enabled);
    assert_eq!(kyverno.extra_configs, desired.apps["kyverno"].extra_configs);
    assert_eq!(written.apps["falco"], desired.apps["falco"]);

    // Writing the merged document back is a fixed point.
    let rewritten = stored(&key, patch["data"]["values"].as_str().unwrap());
    assert_eq!(
        plan_update(&key, &rewritten, &desired, &values).unwrap(),
        ConfigMapPlan::Unchanged
    );
}

#[test]
pub fn test_merged_config() {
    let stored = BundleConfig {
        apps: BTreeMap::from([
            (
                "kyverno".to_string(),
                BundleApp {
                    version: "0.16.0".to_string(),
                    ..BundleApp::default()
                },
            ),
            ("trivy".to_string(), BundleApp::default()),
        ]),
    };
    let desired = bundle(&["kyverno"]);
    let merged = merged_config(&stored, &desired);
    assert_eq!(merged.apps.keys().collect::<Vec<_>>(), vec!["kyverno"]);
    assert_eq!(merged.apps["kyverno"].version, "0.16.0");
    assert!(!merged.apps["kyverno"].enabled);
}
