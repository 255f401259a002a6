// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structured failure representation for coordination responses.
//!
//! The coordination core never lets an error escape as a panic or a process
//! exit; every failed call is rendered into a [`Failure`] at the transport
//! boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Category of a failed coordination call.
///
/// The kind tells the caller how to react; the code and message carry the
/// detail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The named execution, slave, or sequence does not exist. A normal
    /// negative response the caller recovers from.
    NotFound,
    /// The request collides with existing state (port already reserved,
    /// duplicate run id). Reported, never auto-retried.
    Conflict,
    /// A real resource gave out: OS bind failure, unreachable backing store,
    /// exhausted number space.
    ResourceExhausted,
    /// A lifecycle operation was attempted from a forbidden state. State is
    /// unchanged.
    InvalidTransition,
}

impl FailureKind {
    /// Stable lowercase name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::NotFound => "not_found",
            FailureKind::Conflict => "conflict",
            FailureKind::ResourceExhausted => "resource_exhausted",
            FailureKind::InvalidTransition => "invalid_transition",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed coordination call in structured form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    /// Broad category the caller dispatches on.
    pub kind: FailureKind,
    /// Stable machine-readable code, e.g. `SOCKET_IN_USE`.
    pub code: String,
    /// Human-readable detail.
    pub message: String,
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.code, self.kind, self.message)
    }
}

impl std::error::Error for Failure {}
