// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;
use crate::kubernetes_api_objects::common::{Kind, KubeObjectRef, ObjectKey};
use crate::kubernetes_api_objects::error::APIError;
use k8s_openapi::api::core::v1::ConfigMap;
use serde_json::Value;

/// KubeAPIRequest represents the requests the reconciler sends to the object store.
///
/// There is one variant per object kind and verb the reconciler needs. Patches
/// carry a JSON merge patch body, and an update carries the whole object.
#[derive(Clone, Debug)]
pub enum KubeAPIRequest {
    GetApp(KubeGetRequest),
    GetConfigMap(KubeGetRequest),
    CreateConfigMap(KubeCreateRequest<ConfigMap>),
    PatchConfigMap(KubePatchRequest),
    PatchApp(KubePatchRequest),
    UpdateApp(KubeUpdateRequest<App>),
}

/// KubeGetRequest has the key to read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KubeGetRequest {
    pub key: ObjectKey,
}

/// KubeCreateRequest has the object to create in `namespace`.
#[derive(Clone, Debug)]
pub struct KubeCreateRequest<K> {
    pub namespace: String,
    pub obj: K,
}

/// KubePatchRequest has the key to patch and a JSON merge patch.
#[derive(Clone, Debug, PartialEq)]
pub struct KubePatchRequest {
    pub key: ObjectKey,
    pub patch: Value,
}

/// KubeUpdateRequest replaces the object stored under `key` with `obj`.
#[derive(Clone, Debug)]
pub struct KubeUpdateRequest<K> {
    pub key: ObjectKey,
    pub obj: K,
}

impl KubeAPIRequest {
    pub fn object_ref(&self) -> KubeObjectRef {
        let (kind, key) = match self {
            KubeAPIRequest::GetApp(req) => (Kind::AppKind, req.key.clone()),
            KubeAPIRequest::GetConfigMap(req) => (Kind::ConfigMapKind, req.key.clone()),
            KubeAPIRequest::CreateConfigMap(req) => (
                Kind::ConfigMapKind,
                ObjectKey::new(
                    req.namespace.clone(),
                    req.obj.metadata.name.clone().unwrap_or_default(),
                ),
            ),
            KubeAPIRequest::PatchConfigMap(req) => (Kind::ConfigMapKind, req.key.clone()),
            KubeAPIRequest::PatchApp(req) => (Kind::AppKind, req.key.clone()),
            KubeAPIRequest::UpdateApp(req) => (Kind::AppKind, req.key.clone()),
        };
        KubeObjectRef { kind, key }
    }

    pub fn verb(&self) -> &'static str {
        match self {
            KubeAPIRequest::GetApp(_) | KubeAPIRequest::GetConfigMap(_) => "Get",
            KubeAPIRequest::CreateConfigMap(_) => "Create",
            KubeAPIRequest::PatchConfigMap(_) | KubeAPIRequest::PatchApp(_) => "Patch",
            KubeAPIRequest::UpdateApp(_) => "Update",
        }
    }
}

/// KubeAPIResponse is the answer to a KubeAPIRequest of the same variant.
#[derive(Debug)]
pub enum KubeAPIResponse {
    GetApp(Result<App, APIError>),
    GetConfigMap(Result<ConfigMap, APIError>),
    CreateConfigMap(Result<ConfigMap, APIError>),
    PatchConfigMap(Result<ConfigMap, APIError>),
    PatchApp(Result<App, APIError>),
    UpdateApp(Result<App, APIError>),
}

impl KubeAPIResponse {
    pub fn err(&self) -> Option<&APIError> {
        match self {
            KubeAPIResponse::GetApp(res) | KubeAPIResponse::PatchApp(res) | KubeAPIResponse::UpdateApp(res) => {
                res.as_ref().err()
            }
            KubeAPIResponse::GetConfigMap(res)
            | KubeAPIResponse::CreateConfigMap(res)
            | KubeAPIResponse::PatchConfigMap(res) => res.as_ref().err(),
        }
    }
}
