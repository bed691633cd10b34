// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;
use crate::common::{is_legacy_security_bundle, LEGACY_TARGET_VERSION};

/// Returns the App to write back when it is a legacy security-bundle.
///
/// The version always snaps to exactly 1.15.0.
pub fn migrated_app(app: &App) -> Option<App> {
    if !is_legacy_security_bundle(app) {
        return None;
    }
    let mut updated = app.clone();
    updated.spec.version = LEGACY_TARGET_VERSION.to_string();
    Some(updated)
}
