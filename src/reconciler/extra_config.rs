// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::{App, AppExtraConfig};
use crate::common::{EXTRA_CONFIG_KIND, EXTRA_CONFIG_PRIORITY};
use crate::kubernetes_api_objects::merge_patch::merge_from;
use crate::Error;
use serde_json::Value;

// References are matched by name only.
pub fn has_reference(app: &App, name: &str) -> bool {
    app.spec.extra_configs.iter().any(|extra_config| extra_config.name == name)
}

pub fn companion_reference(companion_name: &str, namespace: &str) -> AppExtraConfig {
    AppExtraConfig {
        kind: EXTRA_CONFIG_KIND.to_string(),
        name: companion_name.to_string(),
        namespace: namespace.to_string(),
        priority: EXTRA_CONFIG_PRIORITY,
    }
}

/// Returns the merge patch that appends the companion reference to the App,
/// or None when the App already references it.
pub fn reference_patch(app: &App, companion_name: &str, namespace: &str) -> Result<Option<Value>, Error> {
    if has_reference(app, companion_name) {
        return Ok(None);
    }
    let mut updated = app.clone();
    updated
        .spec
        .extra_configs
        .push(companion_reference(companion_name, namespace));
    let patch = merge_from(app, &updated, app.metadata.resource_version.as_deref())
        .map_err(Error::MergePatchFailed)?;
    Ok(Some(patch))
}
