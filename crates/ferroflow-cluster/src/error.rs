// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for the coordination core.
//!
//! Provides a unified error type that maps onto the structured failure
//! responses of the coordination boundary.

use std::fmt;

use ferroflow_protocol::{ExecutionStatus, Failure, FailureKind};

/// Result type using ClusterError
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Coordination errors that can occur during request processing.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum ClusterError {
    /// No execution matched the requested name/id.
    ExecutionNotFound {
        /// Pipeline name that was looked up.
        name: String,
        /// Exact run id, when the lookup had one.
        id: Option<String>,
    },

    /// An execution with the same (name, id) is already registered.
    DuplicateExecution {
        /// Pipeline name.
        name: String,
        /// Run id that collided.
        id: String,
    },

    /// A lifecycle operation was attempted from a forbidden state.
    InvalidTransition {
        /// Pipeline name.
        name: String,
        /// Run id.
        id: String,
        /// The operation that was attempted.
        operation: String,
        /// The state the execution was actually in.
        current: ExecutionStatus,
    },

    /// The engine rejected a delegated lifecycle call.
    EngineFailure {
        /// Pipeline name.
        name: String,
        /// Run id.
        id: String,
        /// The delegated operation.
        operation: String,
        /// Engine-side detail.
        details: String,
    },

    /// The socket for a port is already held by another consumer.
    SocketInUse {
        /// The contested port.
        port: u16,
        /// Tag of the current holder.
        owner_tag: String,
    },

    /// No repository entry exists for the port.
    SocketNotReserved {
        /// The unknown port.
        port: u16,
    },

    /// The OS refused to bind a listening socket.
    BindFailed {
        /// The port the bind was attempted on.
        port: u16,
        /// OS-level detail.
        details: String,
    },

    /// A host's port number space has no free number at or above the hint.
    PortSpaceExhausted {
        /// The host whose space gave out.
        hostname: String,
        /// The requested floor.
        range_start: u16,
    },

    /// The sequence name is not configured and auto-creation is off.
    SequenceNotFound {
        /// The unknown sequence name.
        name: String,
    },

    /// The sequence backing store failed; no value was returned.
    SequenceStoreFailed {
        /// Sequence name.
        name: String,
        /// The statement that failed.
        operation: String,
        /// Store-side detail.
        details: String,
    },

    /// The sequence counter cannot advance without wrapping.
    SequenceOverflow {
        /// Sequence name.
        name: String,
    },

    /// A request argument was unusable.
    InvalidArgument {
        /// The offending field.
        field: String,
        /// What was wrong with it.
        message: String,
    },
}

impl ClusterError {
    /// Get the failure category for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::ExecutionNotFound { .. }
            | Self::SocketNotReserved { .. }
            | Self::SequenceNotFound { .. } => FailureKind::NotFound,
            Self::DuplicateExecution { .. }
            | Self::SocketInUse { .. }
            | Self::InvalidArgument { .. } => FailureKind::Conflict,
            Self::EngineFailure { .. }
            | Self::BindFailed { .. }
            | Self::PortSpaceExhausted { .. }
            | Self::SequenceStoreFailed { .. }
            | Self::SequenceOverflow { .. } => FailureKind::ResourceExhausted,
            Self::InvalidTransition { .. } => FailureKind::InvalidTransition,
        }
    }

    /// Get the stable error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ExecutionNotFound { .. } => "EXECUTION_NOT_FOUND",
            Self::DuplicateExecution { .. } => "DUPLICATE_EXECUTION",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::EngineFailure { .. } => "ENGINE_FAILURE",
            Self::SocketInUse { .. } => "SOCKET_IN_USE",
            Self::SocketNotReserved { .. } => "SOCKET_NOT_RESERVED",
            Self::BindFailed { .. } => "BIND_FAILED",
            Self::PortSpaceExhausted { .. } => "PORT_SPACE_EXHAUSTED",
            Self::SequenceNotFound { .. } => "SEQUENCE_NOT_FOUND",
            Self::SequenceStoreFailed { .. } => "SEQUENCE_STORE_FAILED",
            Self::SequenceOverflow { .. } => "SEQUENCE_OVERFLOW",
            Self::InvalidArgument { .. } => "INVALID_ARGUMENT",
        }
    }

    /// Convert this error into a structured failure response.
    pub fn to_failure(&self) -> Failure {
        Failure {
            kind: self.kind(),
            code: self.error_code().to_string(),
            message: self.to_string(),
        }
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ExecutionNotFound { name, id } => match id {
                Some(id) => write!(f, "Execution '{}' with id '{}' not found", name, id),
                None => write!(f, "No execution named '{}' found", name),
            },
            Self::DuplicateExecution { name, id } => {
                write!(f, "Execution '{}' with id '{}' already exists", name, id)
            }
            Self::InvalidTransition {
                name,
                id,
                operation,
                current,
            } => {
                write!(
                    f,
                    "Cannot {} execution '{}' (id '{}') while it is {}",
                    operation, name, id, current
                )
            }
            Self::EngineFailure {
                name,
                id,
                operation,
                details,
            } => {
                write!(
                    f,
                    "Engine failed to {} execution '{}' (id '{}'): {}",
                    operation, name, id, details
                )
            }
            Self::SocketInUse { port, owner_tag } => {
                write!(f, "Socket for port {} is in use by '{}'", port, owner_tag)
            }
            Self::SocketNotReserved { port } => {
                write!(f, "No socket has been reserved for port {}", port)
            }
            Self::BindFailed { port, details } => {
                write!(f, "Unable to bind a listening socket on port {}: {}", port, details)
            }
            Self::PortSpaceExhausted {
                hostname,
                range_start,
            } => {
                write!(
                    f,
                    "No free port on host '{}' at or above {}",
                    hostname, range_start
                )
            }
            Self::SequenceNotFound { name } => {
                write!(f, "Slave sequence '{}' is not defined", name)
            }
            Self::SequenceStoreFailed {
                name,
                operation,
                details,
            } => {
                write!(
                    f,
                    "Sequence store failed during '{}' for sequence '{}': {}",
                    operation, name, details
                )
            }
            Self::SequenceOverflow { name } => {
                write!(f, "Sequence '{}' has no room left for another block", name)
            }
            Self::InvalidArgument { field, message } => {
                write!(f, "Invalid value for '{}': {}", field, message)
            }
        }
    }
}

impl std::error::Error for ClusterError {}
