// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ferroflow Protocol - typed coordination messages
//!
//! This crate defines the request/response pairs exchanged with a ferroflow
//! slave server's coordination core. The transport layer (HTTP today) parses
//! inbound parameters into these types and renders the responses back out;
//! the coordination core in `ferroflow-cluster` only ever sees typed values.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Remote callers (master, peer slaves)           │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Transport (out of scope)                   │
//! │          parses parameters into ferroflow-protocol          │
//! └─────────────────────────────────────────────────────────────┘
//!                               │ typed calls
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │               ferroflow-cluster (handlers)                  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Operations
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `AllocatePort` | Reserve a data-streaming port for a cross-host link |
//! | `ListPorts` | Diagnostic snapshot of one host's port space |
//! | `DeallocatePorts` | Free every port owned by one run |
//! | `ReserveSocket` / `ReleaseSocket` | Claim/return a bound listening socket |
//! | `RegisterSlave` / `ListSlaves` | Peer discovery directory |
//! | `NextSequenceValue` | Reserve a contiguous id block |
//! | `AddExecution` .. `ListExecutions` | Execution registry surface |
//! | `PrepareExecution` .. `StopExecution` | Execution lifecycle surface |
//!
//! Every response is a plain serde struct so the transport can render it in
//! any structured representation. Failed calls are rendered from [`Failure`],
//! whose [`FailureKind`] tells the caller whether the condition is a normal
//! negative answer, a caller bug, an exhausted resource, or a lifecycle
//! violation.

#![deny(missing_docs)]

/// Structured failure representation for the coordination boundary.
pub mod failure;

/// Request/response pairs, one per coordination operation.
pub mod messages;

/// Shared value types carried inside requests and responses.
pub mod types;

pub use failure::{Failure, FailureKind};
pub use messages::*;
pub use types::{
    ExecutionConfig, ExecutionStatus, ExecutionSummary, LinkId, PortAllocationInfo,
    SlaveDetection, SlaveIdentity, SocketInfo,
};
