// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request/response pairs for the coordination boundary.
//!
//! One pair per operation. Requests carry exactly what the operation needs;
//! responses are plain data the transport renders into whatever structured
//! representation the caller asked for.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    ExecutionConfig, ExecutionStatus, ExecutionSummary, LinkId, PortAllocationInfo,
    SlaveDetection, SlaveIdentity, SocketInfo,
};

// ============================================================================
// Port allocation
// ============================================================================

/// Reserve a data-streaming port for a cross-host link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatePortRequest {
    /// Host whose private number space to allocate in.
    pub hostname: String,
    /// The link the port is for.
    pub link: LinkId,
    /// Run that will own the allocation.
    pub run_id: String,
    /// Lowest acceptable port number. `0` means use the server's configured
    /// range start.
    pub range_start: u16,
}

/// Response to [`AllocatePortRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatePortResponse {
    /// The allocated port. Stable across retries of the same request while
    /// the allocation is live.
    pub port: u16,
}

/// Diagnostic snapshot of one host's port space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPortsRequest {
    /// Host to report on.
    pub hostname: String,
    /// When true, freed audit records are omitted.
    pub only_allocated: bool,
}

/// Response to [`ListPortsRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPortsResponse {
    /// Allocation records for the host, lowest port first.
    pub allocations: Vec<PortAllocationInfo>,
}

/// Free every port owned by one run of a pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeallocatePortsRequest {
    /// Pipeline name the run belongs to.
    pub execution_name: String,
    /// The owning run.
    pub run_id: String,
}

/// Response to [`DeallocatePortsRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeallocatePortsResponse {
    /// How many allocations were marked free, across all hosts.
    pub released: u64,
}

// ============================================================================
// Socket repository
// ============================================================================

/// Claim the bound listening socket for a port, binding it on first use.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSocketRequest {
    /// Port to reserve.
    pub port: u16,
    /// Informational tag naming the consumer, surfaced by listings.
    pub owner_tag: String,
}

/// Response to [`ReserveSocketRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveSocketResponse {
    /// The reserved port.
    pub port: u16,
    /// Local address the socket is bound to.
    pub local_addr: String,
    /// True when an existing released socket was handed back instead of a
    /// fresh bind.
    pub reused: bool,
}

/// Return a socket to the repository without closing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSocketRequest {
    /// Port to release.
    pub port: u16,
}

/// Response to [`ReleaseSocketRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseSocketResponse {}

/// Diagnostic snapshot of the process's socket repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSocketsRequest {}

/// Response to [`ListSocketsRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSocketsResponse {
    /// Repository entries, lowest port first.
    pub sockets: Vec<SocketInfo>,
}

// ============================================================================
// Slave directory
// ============================================================================

/// Report a peer slave's presence and liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSlaveRequest {
    /// The reporting peer's identity.
    pub slave: SlaveIdentity,
    /// Whether the peer reports itself active.
    pub active: bool,
}

/// Response to [`RegisterSlaveRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSlaveResponse {
    /// The directory record after the merge.
    pub detection: SlaveDetection,
}

/// List the known peers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSlavesRequest {}

/// Response to [`ListSlavesRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSlavesResponse {
    /// Last known record per peer, in registration order.
    pub slaves: Vec<SlaveDetection>,
}

// ============================================================================
// Sequences
// ============================================================================

/// Reserve a contiguous id block from a named sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextSequenceValueRequest {
    /// Sequence name.
    pub name: String,
    /// How many ids the caller will consume locally.
    pub block_size: i64,
}

/// Response to [`NextSequenceValueRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NextSequenceValueResponse {
    /// First value of the reserved block. The caller owns
    /// `start_value .. start_value + block_size`.
    pub start_value: i64,
    /// Echo of the reserved block size.
    pub block_size: i64,
}

// ============================================================================
// Execution registry
// ============================================================================

/// Register a freshly constructed execution.
///
/// The engine-side handle itself does not travel in the message; the
/// transport constructs it from the submitted pipeline definition and passes
/// it to the handler alongside this request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddExecutionRequest {
    /// Pipeline name, repeatable across runs.
    pub name: String,
    /// Opaque run id, unique per submission.
    pub id: String,
    /// Configuration for the run.
    pub config: ExecutionConfig,
}

/// Response to [`AddExecutionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddExecutionResponse {
    /// Identity of the execution's buffered log stream.
    pub log_channel_id: Uuid,
}

/// Look up an execution by name and optionally id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindExecutionRequest {
    /// Pipeline name to match.
    pub name: String,
    /// Exact run id; when absent the oldest run with the name is returned.
    pub id: Option<String>,
}

/// Response to [`FindExecutionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FindExecutionResponse {
    /// The matching execution, if any. Absence is the normal negative
    /// answer, not a failure.
    pub execution: Option<ExecutionSummary>,
}

/// Remove a finished or stopped execution and free its resources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveExecutionRequest {
    /// Pipeline name.
    pub name: String,
    /// Run id.
    pub id: String,
}

/// Response to [`RemoveExecutionRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveExecutionResponse {}

/// List every registered execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListExecutionsRequest {}

/// Response to [`ListExecutionsRequest`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListExecutionsResponse {
    /// All registered executions ordered by (name, id).
    pub executions: Vec<ExecutionSummary>,
}

// ============================================================================
// Execution lifecycle
// ============================================================================

/// Run engine-side initialization for an execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrepareExecutionRequest {
    /// Pipeline name.
    pub name: String,
    /// Exact run id; when absent the oldest run with the name is used.
    pub id: Option<String>,
}

/// Start a prepared execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartExecutionRequest {
    /// Pipeline name.
    pub name: String,
    /// Exact run id; when absent the oldest run with the name is used.
    pub id: Option<String>,
}

/// Close the cooperative pause gate of a running execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseExecutionRequest {
    /// Pipeline name.
    pub name: String,
    /// Exact run id; when absent the oldest run with the name is used.
    pub id: Option<String>,
}

/// Reopen the pause gate of a paused execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeExecutionRequest {
    /// Pipeline name.
    pub name: String,
    /// Exact run id; when absent the oldest run with the name is used.
    pub id: Option<String>,
}

/// Request an abort of a live execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopExecutionRequest {
    /// Pipeline name.
    pub name: String,
    /// Exact run id; when absent the oldest run with the name is used.
    pub id: Option<String>,
}

/// Engine report that an execution completed on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportExecutionFinishedRequest {
    /// Pipeline name.
    pub name: String,
    /// Run id.
    pub id: String,
}

/// Response to every lifecycle operation: the execution's state after the
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStateResponse {
    /// Pipeline name.
    pub name: String,
    /// Run id the operation resolved to.
    pub id: String,
    /// State after the transition.
    pub status: ExecutionStatus,
}
