// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::bundle_config::{BundleApp, BundleConfig};
use crate::common::{MANAGED_BY_LABEL, OPERATOR_NAME, VALUES_KEY};
use crate::kubernetes_api_objects::common::ObjectKey;
use crate::kubernetes_api_objects::merge_patch::merge_from;
use crate::Error;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::ObjectMeta;
use serde_json::Value;
use std::collections::BTreeMap;

/// The outcome of comparing a stored companion ConfigMap with the registry.
#[derive(Debug, PartialEq)]
pub enum ConfigMapPlan {
    Unchanged,
    Patch {
        patch: Value,
        /// Apps listed in the stored document that the registry dropped.
        pruned: Vec<String>,
    },
}

/// Renders the `values` document for a bundle.
pub fn desired_values(bundle: &BundleConfig) -> Result<String, Error> {
    serde_yaml::to_string(bundle).map_err(Error::SerializeValuesFailed)
}

pub fn make_config_map(key: &ObjectKey, values: String) -> ConfigMap {
    ConfigMap {
        metadata: ObjectMeta {
            name: Some(key.name.clone()),
            namespace: Some(key.namespace.clone()),
            labels: Some(BTreeMap::from([(
                MANAGED_BY_LABEL.to_string(),
                OPERATOR_NAME.to_string(),
            )])),
            ..ObjectMeta::default()
        },
        data: Some(BTreeMap::from([(VALUES_KEY.to_string(), values)])),
        ..ConfigMap::default()
    }
}

/// Returns the document to store given the decoded `stored` one.
///
/// Apps the registry dropped are pruned and apps it added are inserted as
/// configured. Apps present on both sides take the registry's extraConfigs
/// and keep their other stored fields.
pub fn merged_config(stored: &BundleConfig, desired: &BundleConfig) -> BundleConfig {
    let apps = desired
        .apps
        .iter()
        .map(|(name, desired_app)| {
            let app = match stored.apps.get(name) {
                Some(stored_app) => BundleApp {
                    extra_configs: desired_app.extra_configs.clone(),
                    ..stored_app.clone()
                },
                None => desired_app.clone(),
            };
            (name.clone(), app)
        })
        .collect();
    BundleConfig { apps }
}

/// Decides whether `existing` needs to be rewritten to hold `desired`.
///
/// The stored string is compared verbatim first; when it differs, the stored
/// document is decoded, merged with `desired` and compared structurally, so a
/// document that only differs in formatting is left alone. The patch touches
/// `data.values` only and is pinned to the resource version that was read.
pub fn plan_update(
    key: &ObjectKey,
    existing: &ConfigMap,
    desired: &BundleConfig,
    desired_values: &str,
) -> Result<ConfigMapPlan, Error> {
    let stored = existing
        .data
        .as_ref()
        .and_then(|data| data.get(VALUES_KEY));

    let mut pruned = Vec::new();
    let mut values = desired_values.to_string();
    if let Some(stored) = stored {
        if stored == desired_values {
            return Ok(ConfigMapPlan::Unchanged);
        }
        let decoded: Option<BundleConfig> = serde_yaml::from_str(stored)
            .map_err(|e| Error::DeserializeValuesFailed(key.to_string(), e))?;
        let decoded = decoded.unwrap_or_default();
        let merged = merged_config(&decoded, desired);
        if merged == decoded {
            return Ok(ConfigMapPlan::Unchanged);
        }
        pruned = decoded
            .apps
            .keys()
            .filter(|app| !desired.apps.contains_key(*app))
            .cloned()
            .collect();
        values = serde_yaml::to_string(&merged).map_err(Error::SerializeValuesFailed)?;
    }

    let mut updated = existing.clone();
    updated
        .data
        .get_or_insert_with(BTreeMap::new)
        .insert(VALUES_KEY.to_string(), values);
    let patch = merge_from(
        existing,
        &updated,
        existing.metadata.resource_version.as_deref(),
    )
    .map_err(Error::MergePatchFailed)?;
    Ok(ConfigMapPlan::Patch { patch, pruned })
}
