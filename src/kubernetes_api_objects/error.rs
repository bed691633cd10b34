// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT

/// APIError is the error returned by the object store to the reconciler.
///
/// The reconciler only branches on ObjectNotFound; every other variant is
/// surfaced to the controller runtime as it is.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum APIError {
    #[error("object not found")]
    ObjectNotFound,
    #[error("object already exists")]
    ObjectAlreadyExists,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("api error {code} ({reason}): {message}")]
    Api {
        code: u16,
        reason: String,
        message: String,
    },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request cancelled")]
    Cancelled,
}

impl APIError {
    pub fn is_object_not_found(&self) -> bool {
        matches!(self, APIError::ObjectNotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, APIError::Conflict(_))
    }
}
