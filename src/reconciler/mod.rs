// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
pub mod config_map;
pub mod extra_config;
pub mod legacy;
#[allow(clippy::module_inception)]
pub mod reconciler;
pub mod step;

use crate::kubernetes_api_objects::api_method::{KubeAPIRequest, KubeAPIResponse};
use crate::kubernetes_api_objects::common::ObjectKey;

/// Reconciler is the pure part of a controller.
///
/// The shim layer starts from `reconcile_init_state` and keeps feeding the
/// response of the last request back into `reconcile_core` until
/// `reconcile_done` or `reconcile_error` holds. `reconcile_core` performs no
/// I/O; every interaction with the cluster is a returned request.
pub trait Reconciler {
    type T;

    fn reconcile_init_state(&self) -> Self::T;
    fn reconcile_core(
        &self,
        key: &ObjectKey,
        resp_o: Option<KubeAPIResponse>,
        state: Self::T,
    ) -> (Self::T, Option<KubeAPIRequest>);
    fn reconcile_done(&self, state: &Self::T) -> bool;
    fn reconcile_error(&self, state: &Self::T) -> bool;
}

pub use self::reconciler::BundleReconciler;
