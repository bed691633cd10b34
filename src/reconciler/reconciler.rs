// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;
use crate::bundle_config::BundleRegistry;
use crate::common::{companion_config_map_key, is_bundle_member};
use crate::kubernetes_api_objects::api_method::*;
use crate::kubernetes_api_objects::common::ObjectKey;
use crate::reconciler::step::*;
use crate::reconciler::{config_map, extra_config, legacy, Reconciler};
use crate::Error;
use std::sync::Arc;
use tracing::*;

/// BundleReconciler wires Apps in the allowed namespace to their bundle's
/// companion ConfigMap.
pub struct BundleReconciler {
    registry: Arc<BundleRegistry>,
    allowed_namespace: String,
}

impl BundleReconciler {
    pub fn new(registry: Arc<BundleRegistry>, allowed_namespace: impl Into<String>) -> BundleReconciler {
        BundleReconciler {
            registry,
            allowed_namespace: allowed_namespace.into(),
        }
    }

    pub fn registry(&self) -> &BundleRegistry {
        &self.registry
    }

    pub fn allowed_namespace(&self) -> &str {
        &self.allowed_namespace
    }

    pub fn classify(&self, app: &App) -> Classification {
        if !self.registry.contains(&app.spec.name) {
            Classification::Unmanaged
        } else if is_bundle_member(app) {
            Classification::BundleMember
        } else {
            Classification::Managed
        }
    }
}

impl Reconciler for BundleReconciler {
    type T = BundleReconcileState;

    fn reconcile_init_state(&self) -> BundleReconcileState {
        BundleReconcileState {
            reconcile_step: BundleReconcileStep::Init,
            app: None,
            report: ReconcileReport::default(),
            error: None,
        }
    }

    fn reconcile_core(
        &self,
        key: &ObjectKey,
        resp_o: Option<KubeAPIResponse>,
        state: BundleReconcileState,
    ) -> (BundleReconcileState, Option<KubeAPIRequest>) {
        let step = state.reconcile_step;
        match step {
            BundleReconcileStep::Init => {
                if key.namespace != self.allowed_namespace {
                    let mut state = state;
                    state.report.skipped_namespace = true;
                    return transition(state, BundleReconcileStep::Done, None);
                }
                let req = KubeAPIRequest::GetApp(KubeGetRequest { key: key.clone() });
                transition(state, BundleReconcileStep::AfterGetApp, Some(req))
            }
            BundleReconcileStep::AfterGetApp => match resp_o {
                Some(KubeAPIResponse::GetApp(Ok(app))) => self.after_get_app(key, app, state),
                Some(KubeAPIResponse::GetApp(Err(err))) if err.is_object_not_found() => {
                    info!("App {} not found, end reconcile", key);
                    let mut state = state;
                    state.report.app_not_found = true;
                    transition(state, BundleReconcileStep::Done, None)
                }
                Some(KubeAPIResponse::GetApp(Err(err))) => fail(state, Error::AppGetFailed(key.to_string(), err)),
                _ => unexpected(state),
            },
            BundleReconcileStep::AfterKRequestStep(action, resource) => match (action, resource) {
                (ActionKind::Get, SubResource::CompanionConfigMap) => self.after_get_config_map(key, resp_o, state),
                (ActionKind::Create, SubResource::CompanionConfigMap) => match resp_o {
                    Some(KubeAPIResponse::CreateConfigMap(Ok(_))) => {
                        info!("ConfigMap {} created", companion_key(key));
                        let mut state = state;
                        state.report.config_map = Some(SyncOutcome::Created);
                        self.ensure_reference(key, state)
                    }
                    Some(KubeAPIResponse::CreateConfigMap(Err(err))) => {
                        fail(state, Error::ConfigMapCreateFailed(companion_key(key).to_string(), err))
                    }
                    _ => unexpected(state),
                },
                (ActionKind::Patch, SubResource::CompanionConfigMap) => match resp_o {
                    Some(KubeAPIResponse::PatchConfigMap(Ok(_))) => {
                        info!("ConfigMap {} updated", companion_key(key));
                        let mut state = state;
                        state.report.config_map = Some(SyncOutcome::Updated);
                        self.ensure_reference(key, state)
                    }
                    Some(KubeAPIResponse::PatchConfigMap(Err(err))) => {
                        fail(state, Error::ConfigMapPatchFailed(companion_key(key).to_string(), err))
                    }
                    _ => unexpected(state),
                },
                (ActionKind::Patch, SubResource::AppExtraConfigs) => match resp_o {
                    Some(KubeAPIResponse::PatchApp(Ok(app))) => {
                        info!("App {} extraConfigs updated", key);
                        let mut state = state;
                        state.app = Some(app);
                        state.report.extra_config = Some(PatchOutcome::Patched);
                        self.legacy_check(key, state)
                    }
                    Some(KubeAPIResponse::PatchApp(Err(err))) => fail(state, Error::AppPatchFailed(key.to_string(), err)),
                    _ => unexpected(state),
                },
                (ActionKind::Update, SubResource::AppVersion) => match resp_o {
                    Some(KubeAPIResponse::UpdateApp(Ok(app))) => {
                        info!("App {} version updated to {}", key, app.spec.version);
                        let mut state = state;
                        state.app = Some(app);
                        state.report.migration = Some(MigrationOutcome::Migrated);
                        transition(state, BundleReconcileStep::Done, None)
                    }
                    Some(KubeAPIResponse::UpdateApp(Err(err))) => fail(state, Error::AppUpdateFailed(key.to_string(), err)),
                    _ => unexpected(state),
                },
                _ => unexpected(state),
            },
            BundleReconcileStep::Done | BundleReconcileStep::Error => (state, None),
        }
    }

    fn reconcile_done(&self, state: &BundleReconcileState) -> bool {
        matches!(state.reconcile_step, BundleReconcileStep::Done)
    }

    fn reconcile_error(&self, state: &BundleReconcileState) -> bool {
        matches!(state.reconcile_step, BundleReconcileStep::Error)
    }
}

impl BundleReconciler {
    fn after_get_app(
        &self,
        key: &ObjectKey,
        app: App,
        mut state: BundleReconcileState,
    ) -> (BundleReconcileState, Option<KubeAPIRequest>) {
        let classification = self.classify(&app);
        state.report.classification = Some(classification);
        state.app = Some(app);
        match classification {
            Classification::Managed => {
                info!("App {} found in config, processing", key);
                let req = KubeAPIRequest::GetConfigMap(KubeGetRequest { key: companion_key(key) });
                transition(
                    state,
                    BundleReconcileStep::AfterKRequestStep(ActionKind::Get, SubResource::CompanionConfigMap),
                    Some(req),
                )
            }
            Classification::BundleMember => {
                debug!("App {} is deployed by a bundle release, skipping bundle processing", key);
                self.legacy_check(key, state)
            }
            Classification::Unmanaged => self.legacy_check(key, state),
        }
    }

    fn after_get_config_map(
        &self,
        key: &ObjectKey,
        resp_o: Option<KubeAPIResponse>,
        state: BundleReconcileState,
    ) -> (BundleReconcileState, Option<KubeAPIRequest>) {
        let bundle = match state.app.as_ref().and_then(|app| self.registry.get(&app.spec.name)) {
            Some(bundle) => bundle,
            None => return unexpected(state),
        };
        let desired_values = match config_map::desired_values(bundle) {
            Ok(values) => values,
            Err(err) => return fail(state, err),
        };
        let cm_key = companion_key(key);

        match resp_o {
            Some(KubeAPIResponse::GetConfigMap(Err(err))) if err.is_object_not_found() => {
                info!("ConfigMap {} not found, proceeding to create it", cm_key);
                let req = KubeAPIRequest::CreateConfigMap(KubeCreateRequest {
                    namespace: cm_key.namespace.clone(),
                    obj: config_map::make_config_map(&cm_key, desired_values),
                });
                transition(
                    state,
                    BundleReconcileStep::AfterKRequestStep(ActionKind::Create, SubResource::CompanionConfigMap),
                    Some(req),
                )
            }
            Some(KubeAPIResponse::GetConfigMap(Err(err))) => {
                fail(state, Error::ConfigMapGetFailed(cm_key.to_string(), err))
            }
            Some(KubeAPIResponse::GetConfigMap(Ok(cm))) => {
                match config_map::plan_update(&cm_key, &cm, bundle, &desired_values) {
                    Ok(config_map::ConfigMapPlan::Unchanged) => {
                        let mut state = state;
                        state.report.config_map = Some(SyncOutcome::Unchanged);
                        self.ensure_reference(key, state)
                    }
                    Ok(config_map::ConfigMapPlan::Patch { patch, pruned }) => {
                        for app_name in pruned {
                            info!(
                                "App {} not found in operator config, removing it from ConfigMap {}",
                                app_name, cm_key
                            );
                        }
                        info!("ConfigMap {} is outdated, proceeding to update", cm_key);
                        let req = KubeAPIRequest::PatchConfigMap(KubePatchRequest { key: cm_key, patch });
                        transition(
                            state,
                            BundleReconcileStep::AfterKRequestStep(ActionKind::Patch, SubResource::CompanionConfigMap),
                            Some(req),
                        )
                    }
                    Err(err) => fail(state, err),
                }
            }
            _ => unexpected(state),
        }
    }

    fn ensure_reference(
        &self,
        key: &ObjectKey,
        mut state: BundleReconcileState,
    ) -> (BundleReconcileState, Option<KubeAPIRequest>) {
        let companion_name = companion_key(key).name;
        let patch = match state.app.as_ref() {
            Some(app) => extra_config::reference_patch(app, &companion_name, &key.namespace),
            None => return unexpected(state),
        };
        match patch {
            Ok(None) => {
                state.report.extra_config = Some(PatchOutcome::Unchanged);
                self.legacy_check(key, state)
            }
            Ok(Some(patch)) => {
                let req = KubeAPIRequest::PatchApp(KubePatchRequest { key: key.clone(), patch });
                transition(
                    state,
                    BundleReconcileStep::AfterKRequestStep(ActionKind::Patch, SubResource::AppExtraConfigs),
                    Some(req),
                )
            }
            Err(err) => fail(state, err),
        }
    }

    fn legacy_check(
        &self,
        key: &ObjectKey,
        mut state: BundleReconcileState,
    ) -> (BundleReconcileState, Option<KubeAPIRequest>) {
        match state.app.as_ref().and_then(legacy::migrated_app) {
            Some(updated) => {
                info!("App {} is a legacy security-bundle, processing migration", key);
                let req = KubeAPIRequest::UpdateApp(KubeUpdateRequest {
                    key: key.clone(),
                    obj: updated,
                });
                transition(
                    state,
                    BundleReconcileStep::AfterKRequestStep(ActionKind::Update, SubResource::AppVersion),
                    Some(req),
                )
            }
            None => {
                state.report.migration = Some(MigrationOutcome::Skipped);
                transition(state, BundleReconcileStep::Done, None)
            }
        }
    }
}

fn companion_key(key: &ObjectKey) -> ObjectKey {
    companion_config_map_key(&key.name, &key.namespace)
}

fn transition(
    mut state: BundleReconcileState,
    step: BundleReconcileStep,
    req_o: Option<KubeAPIRequest>,
) -> (BundleReconcileState, Option<KubeAPIRequest>) {
    state.reconcile_step = step;
    (state, req_o)
}

fn fail(mut state: BundleReconcileState, err: Error) -> (BundleReconcileState, Option<KubeAPIRequest>) {
    state.reconcile_step = BundleReconcileStep::Error;
    state.error = Some(err);
    (state, None)
}

fn unexpected(state: BundleReconcileState) -> (BundleReconcileState, Option<KubeAPIRequest>) {
    let step = state.reconcile_step;
    fail(state, Error::UnexpectedResponse(step))
}
