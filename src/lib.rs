// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod app_types;
pub mod bundle_config;
pub mod common;
#[cfg(test)]
pub mod executable_model;
pub mod kubernetes_api_objects;
pub mod reconciler;
pub mod shim_layer;

use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::step::BundleReconcileStep;

/// Errors that end a reconciliation with a requeue.
///
/// Store failures are carried unmodified inside the variant naming the step
/// that issued the request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MissingObjectKey: {0}")]
    MissingObjectKey(&'static str),

    #[error("Failed to get App {0}: {1}")]
    AppGetFailed(String, #[source] APIError),

    #[error("Failed to get ConfigMap {0}: {1}")]
    ConfigMapGetFailed(String, #[source] APIError),

    #[error("Failed to create ConfigMap {0}: {1}")]
    ConfigMapCreateFailed(String, #[source] APIError),

    #[error("Failed to patch ConfigMap {0}: {1}")]
    ConfigMapPatchFailed(String, #[source] APIError),

    #[error("Failed to patch App {0} extraConfigs: {1}")]
    AppPatchFailed(String, #[source] APIError),

    #[error("Failed to update App {0} version: {1}")]
    AppUpdateFailed(String, #[source] APIError),

    #[error("Failed to serialize ConfigMap values: {0}")]
    SerializeValuesFailed(#[source] serde_yaml::Error),

    #[error("Failed to deserialize ConfigMap values of {0}: {1}")]
    DeserializeValuesFailed(String, #[source] serde_yaml::Error),

    #[error("Failed to build merge patch: {0}")]
    MergePatchFailed(#[source] serde_json::Error),

    #[error("ReconcileCoreError: unexpected response at step {0:?}")]
    UnexpectedResponse(BundleReconcileStep),
}
