// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;
use crate::common::OPERATOR_NAME;
use crate::kubernetes_api_objects::common::ObjectKey;
use crate::kubernetes_api_objects::error::APIError;
use crate::shim_layer::ObjectStore;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::Client;
use serde_json::Value;

/// KubeStore sends the reconciler's requests to the Kubernetes API.
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> KubeStore {
        KubeStore { client }
    }

    fn apps(&self, namespace: &str) -> Api<App> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn config_maps(&self, namespace: &str) -> Api<ConfigMap> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn patch_params() -> PatchParams {
    PatchParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..PatchParams::default()
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(OPERATOR_NAME.to_string()),
        ..PostParams::default()
    }
}

#[async_trait]
impl ObjectStore for KubeStore {
    async fn get_app(&self, key: &ObjectKey) -> Result<App, APIError> {
        self.apps(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| kube_error_to_api_error(&e))
    }

    async fn patch_app(&self, key: &ObjectKey, patch: &Value) -> Result<App, APIError> {
        self.apps(&key.namespace)
            .patch(&key.name, &patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| kube_error_to_api_error(&e))
    }

    async fn update_app(&self, key: &ObjectKey, app: &App) -> Result<App, APIError> {
        self.apps(&key.namespace)
            .replace(&key.name, &post_params(), app)
            .await
            .map_err(|e| kube_error_to_api_error(&e))
    }

    async fn get_config_map(&self, key: &ObjectKey) -> Result<ConfigMap, APIError> {
        self.config_maps(&key.namespace)
            .get(&key.name)
            .await
            .map_err(|e| kube_error_to_api_error(&e))
    }

    async fn create_config_map(&self, namespace: &str, cm: &ConfigMap) -> Result<ConfigMap, APIError> {
        self.config_maps(namespace)
            .create(&post_params(), cm)
            .await
            .map_err(|e| kube_error_to_api_error(&e))
    }

    async fn patch_config_map(&self, key: &ObjectKey, patch: &Value) -> Result<ConfigMap, APIError> {
        self.config_maps(&key.namespace)
            .patch(&key.name, &patch_params(), &Patch::Merge(patch))
            .await
            .map_err(|e| kube_error_to_api_error(&e))
    }
}

/// kube_error_to_api_error translates the error from kube-rs APIs to the form
/// the reconciler branches on.
pub fn kube_error_to_api_error(error: &kube::Error) -> APIError {
    match error {
        kube::Error::Api(error_resp) => match error_resp.reason.as_str() {
            "NotFound" => APIError::ObjectNotFound,
            "AlreadyExists" => APIError::ObjectAlreadyExists,
            "Conflict" => APIError::Conflict(error_resp.message.clone()),
            _ => APIError::Api {
                code: error_resp.code,
                reason: error_resp.reason.clone(),
                message: error_resp.message.clone(),
            },
        },
        other => APIError::Transport(other.to_string()),
    }
}
