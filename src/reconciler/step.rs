// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleReconcileStep {
    Init,
    AfterGetApp,
    AfterKRequestStep(ActionKind, SubResource),
    Done,
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Get,
    Create,
    Patch,
    Update,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubResource {
    CompanionConfigMap,
    AppExtraConfigs,
    AppVersion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Classification {
    Managed,
    /// The App's name has no bundle in the registry.
    Unmanaged,
    /// The App is deployed by another bundle's release.
    BundleMember,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchOutcome {
    Patched,
    Unchanged,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    Migrated,
    Skipped,
}

/// What a single reconciliation did, filled in as the steps complete.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub skipped_namespace: bool,
    pub app_not_found: bool,
    pub classification: Option<Classification>,
    pub config_map: Option<SyncOutcome>,
    pub extra_config: Option<PatchOutcome>,
    pub migration: Option<MigrationOutcome>,
}

#[derive(Debug)]
pub struct BundleReconcileState {
    pub reconcile_step: BundleReconcileStep,
    /// Latest copy of the App, replaced by each write response on it.
    pub app: Option<App>,
    pub report: ReconcileReport,
    pub error: Option<crate::Error>,
}
