// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod controller_runtime;
pub mod kube_store;

use crate::app_types::App;
use crate::kubernetes_api_objects::common::ObjectKey;
use crate::kubernetes_api_objects::error::APIError;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use serde_json::Value;

/// ObjectStore is the cluster object store as seen by the shim layer.
///
/// Patches are JSON merge patches. A patch or update carrying a resource
/// version must fail with [`APIError::Conflict`] if the stored object moved on.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_app(&self, key: &ObjectKey) -> Result<App, APIError>;

    async fn patch_app(&self, key: &ObjectKey, patch: &Value) -> Result<App, APIError>;

    async fn update_app(&self, key: &ObjectKey, app: &App) -> Result<App, APIError>;

    async fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, APIError>;

    async fn create_config_map(&self, namespace: &str, cm: &ConfigMap) -> Result<ConfigMap, APIError>;

    async fn patch_config_map(&self, key: &ObjectKey, patch: &Value) -> Result<ConfigMap, APIError>;
}
