// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Value types shared by coordination requests and responses.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one directed data-streaming link between two step copies.
///
/// A link connects a step copy on a source slave to a step copy on a target
/// slave, possibly on different hosts. The link identity does not include the
/// run id: re-running the same pipeline produces the same link identities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkId {
    /// Name of the pipeline the link belongs to.
    pub execution_name: String,
    /// Name of the slave server hosting the sending step.
    pub source_slave: String,
    /// Name of the sending step.
    pub source_step: String,
    /// Copy number of the sending step.
    pub source_copy: u16,
    /// Name of the slave server hosting the receiving step.
    pub target_slave: String,
    /// Name of the receiving step.
    pub target_step: String,
    /// Copy number of the receiving step.
    pub target_copy: u16,
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}/{}.{} -> {}/{}.{}",
            self.execution_name,
            self.source_slave,
            self.source_step,
            self.source_copy,
            self.target_slave,
            self.target_step,
            self.target_copy
        )
    }
}

/// Snapshot of one port allocation record, as reported by listing queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortAllocationInfo {
    /// Host whose private number space the port lives in.
    pub hostname: String,
    /// The allocated port number.
    pub port: u16,
    /// The link the port was allocated for.
    pub link: LinkId,
    /// Run that owns (or last owned) the allocation.
    pub run_id: String,
    /// Whether the allocation is currently live. Freed records are retained
    /// for audit and report `false` here.
    pub allocated: bool,
    /// When the allocation was last requested.
    pub last_requested_at: DateTime<Utc>,
}

/// Snapshot of one repository socket, as reported by listing queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocketInfo {
    /// Port the socket is bound to.
    pub port: u16,
    /// Whether a consumer currently holds the socket.
    pub in_use: bool,
    /// Informational tag naming the current or last owner.
    pub owner_tag: String,
    /// Local address the socket is bound to.
    pub local_addr: String,
}

/// Network identity of a peer slave server.
///
/// Two identities refer to the same peer when hostname and port match; the
/// name is descriptive metadata and does not participate in identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlaveIdentity {
    /// Display name of the slave server.
    pub name: String,
    /// Hostname the slave serves on.
    pub hostname: String,
    /// Port the slave serves on.
    pub port: u16,
}

impl SlaveIdentity {
    /// Whether `other` refers to the same peer on the network.
    pub fn same_peer(&self, other: &SlaveIdentity) -> bool {
        self.hostname == other.hostname && self.port == other.port
    }
}

impl fmt::Display for SlaveIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}:{}]", self.name, self.hostname, self.port)
    }
}

/// Directory record of a peer slave's last reported liveness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlaveDetection {
    /// The peer's network identity.
    pub slave: SlaveIdentity,
    /// Whether the last message reported the peer as active.
    pub active: bool,
    /// When the peer last reported itself active.
    pub last_active_at: Option<DateTime<Utc>>,
    /// When the peer last reported itself inactive.
    pub last_inactive_at: Option<DateTime<Utc>>,
}

/// Lifecycle state of a registered execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Handle stored, not yet validated by the engine.
    Added,
    /// Engine-side initialization succeeded, ready to start.
    Prepared,
    /// Worker activity is active.
    Running,
    /// Cooperative gate is closed; workers idle at the gate.
    Paused,
    /// Abort requested; workers must cease but resources stay held.
    Stopped,
    /// Completed on its own.
    Finished,
}

impl ExecutionStatus {
    /// Whether the execution has reached a state from which cleanup is valid.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Stopped | ExecutionStatus::Finished)
    }

    /// Stable lowercase name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Added => "added",
            ExecutionStatus::Prepared => "prepared",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Paused => "paused",
            ExecutionStatus::Stopped => "stopped",
            ExecutionStatus::Finished => "finished",
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution configuration submitted alongside a new execution.
///
/// The engine interprets most of this; the coordination core stores it with
/// the handle and hands it back on request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Named parameter values for the run.
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Variable overrides for the run.
    #[serde(default)]
    pub variables: HashMap<String, String>,
    /// Run with engine-side row validation enabled.
    #[serde(default)]
    pub safe_mode_enabled: bool,
    /// Requested log level for the run's log channel.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Summary of one registered execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    /// Pipeline name, repeatable across runs.
    pub name: String,
    /// Opaque run id, unique per submission.
    pub id: String,
    /// Current lifecycle state.
    pub status: ExecutionStatus,
    /// Identity of the execution's buffered log stream.
    pub log_channel_id: Uuid,
}
