// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The App custom resource of the Giant Swarm app platform.
///
/// Only the fields this operator reads or writes are modelled. Every other
/// spec field is kept in `other` so that a full update round-trips it.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[kube(group = "application.giantswarm.io", version = "v1alpha1", kind = "App")]
#[kube(namespaced, derive = "PartialEq")]
#[serde(rename_all = "camelCase")]
pub struct AppSpec {
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub catalog: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_configs: Vec<AppExtraConfig>,
    #[serde(flatten)]
    pub other: BTreeMap<String, serde_json::Value>,
}

/// AppExtraConfig points an App at an additional values source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
pub struct AppExtraConfig {
    #[serde(default)]
    pub kind: String,
    pub name: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i32,
}

fn is_zero(priority: &i32) -> bool {
    *priority == 0
}
