// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;
use crate::kubernetes_api_objects::api_method::{KubeAPIRequest, KubeAPIResponse};
use crate::kubernetes_api_objects::common::ObjectKey;
use crate::kubernetes_api_objects::error::APIError;
use crate::reconciler::step::ReconcileReport;
use crate::reconciler::{BundleReconciler, Reconciler};
use crate::shim_layer::ObjectStore;
use crate::Error;
use futures::{Future, StreamExt};
use kube::{
    api::Api,
    runtime::{
        controller::{Action, Controller},
        watcher,
    },
    Client,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::*;

pub const CONTROLLER_NAME: &str = "bundle-operator";

// Data is passed to reconcile and error_policy.
pub struct Data {
    pub store: Arc<dyn ObjectStore>,
    pub reconciler: BundleReconciler,
    pub cancellation: CancellationToken,
    pub requeue_after_error: Duration,
}

/// run_controller watches Apps in every namespace and reconciles them until
/// a shutdown signal arrives.
pub async fn run_controller(client: Client, data: Arc<Data>) {
    let apps = Api::<App>::all(client);

    info!(
        namespace = data.reconciler.allowed_namespace(),
        bundles = data.reconciler.registry().len(),
        "starting controller"
    );
    Controller::new(apps, watcher::Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, data)
        .for_each(|res| async move {
            match res {
                Ok((app, _)) => info!(controller.name = CONTROLLER_NAME, object = %app, "Reconciled App"),
                Err(err) => error!(
                    controller.name = CONTROLLER_NAME,
                    error = &err as &dyn std::error::Error,
                    "Failed to reconcile App"
                ),
            }
        })
        .await;
    info!("controller terminated");
}

/// reconcile is the function registered with kube-rs; it derives the key from
/// the cached App and drives the reconciler through reconcile_with.
pub async fn reconcile(app: Arc<App>, ctx: Arc<Data>) -> Result<Action, Error> {
    let name = app
        .metadata
        .name
        .as_ref()
        .ok_or(Error::MissingObjectKey(".metadata.name"))?;
    let namespace = app
        .metadata
        .namespace
        .as_ref()
        .ok_or(Error::MissingObjectKey(".metadata.namespace"))?;
    let key = ObjectKey::new(namespace.clone(), name.clone());

    let report = reconcile_with(&ctx.reconciler, ctx.store.as_ref(), &key, &ctx.cancellation).await?;
    debug!(app = %key, ?report, "Reconcile finished");
    Ok(Action::await_change())
}

/// reconcile_with invokes reconcile_core in a loop, starting from
/// reconcile_init_state and feeding back the store's response to each
/// request, until the reconciler reports done or error.
pub async fn reconcile_with(
    reconciler: &BundleReconciler,
    store: &dyn ObjectStore,
    key: &ObjectKey,
    cancellation: &CancellationToken,
) -> Result<ReconcileReport, Error> {
    let log_header = format!("Reconciling App {}:", key);
    let mut state = reconciler.reconcile_init_state();
    let mut resp_o: Option<KubeAPIResponse> = None;

    loop {
        if reconciler.reconcile_done(&state) {
            debug!("{} done", log_header);
            break;
        }
        if reconciler.reconcile_error(&state) {
            let step = state.reconcile_step;
            let err = state.error.take().unwrap_or(Error::UnexpectedResponse(step));
            error!("{} error: {}", log_header, err);
            return Err(err);
        }
        let (state_prime, req_o) = reconciler.reconcile_core(key, resp_o.take(), state);
        if let Some(req) = req_o {
            resp_o = Some(execute(store, req, cancellation, &log_header).await);
        }
        state = state_prime;
    }

    Ok(state.report)
}

async fn execute(
    store: &dyn ObjectStore,
    req: KubeAPIRequest,
    cancellation: &CancellationToken,
    log_header: &str,
) -> KubeAPIResponse {
    let obj_ref = req.object_ref();
    let verb = req.verb();
    let resp = match req {
        KubeAPIRequest::GetApp(get_req) => {
            KubeAPIResponse::GetApp(cancellable(cancellation, store.get_app(&get_req.key)).await)
        }
        KubeAPIRequest::GetConfigMap(get_req) => {
            KubeAPIResponse::GetConfigMap(cancellable(cancellation, store.get_config_map(&get_req.key)).await)
        }
        KubeAPIRequest::CreateConfigMap(create_req) => KubeAPIResponse::CreateConfigMap(
            cancellable(
                cancellation,
                store.create_config_map(&create_req.namespace, &create_req.obj),
            )
            .await,
        ),
        KubeAPIRequest::PatchConfigMap(patch_req) => KubeAPIResponse::PatchConfigMap(
            cancellable(cancellation, store.patch_config_map(&patch_req.key, &patch_req.patch)).await,
        ),
        KubeAPIRequest::PatchApp(patch_req) => {
            KubeAPIResponse::PatchApp(cancellable(cancellation, store.patch_app(&patch_req.key, &patch_req.patch)).await)
        }
        KubeAPIRequest::UpdateApp(update_req) => KubeAPIResponse::UpdateApp(
            cancellable(cancellation, store.update_app(&update_req.key, &update_req.obj)).await,
        ),
    };
    match resp.err() {
        Some(err) => debug!("{} {} {} failed with error: {}", log_header, verb, obj_ref, err),
        None => debug!("{} {} {} done", log_header, verb, obj_ref),
    }
    resp
}

async fn cancellable<T>(
    cancellation: &CancellationToken,
    fut: impl Future<Output = Result<T, APIError>>,
) -> Result<T, APIError> {
    tokio::select! {
        biased;
        _ = cancellation.cancelled() => Err(APIError::Cancelled),
        res = fut => res,
    }
}

// error_policy defines the controller's behavior when the reconcile ends with an error.
pub fn error_policy(_app: Arc<App>, error: &Error, ctx: Arc<Data>) -> Action {
    warn!("Reconcile failed due to error: {}", error);
    Action::requeue(ctx.requeue_after_error)
}
