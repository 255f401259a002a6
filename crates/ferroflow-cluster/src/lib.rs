// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ferroflow Cluster - Slave-Server Coordination Core
//!
//! This crate is the coordination heart of a ferroflow slave server. It keeps
//! the registry of live remote pipeline executions, hands out the network
//! ports that let step copies on different hosts stream rows to each other,
//! owns this process's real listening sockets, reserves collision-free id
//! blocks from shared sequences, and remembers which peer slaves exist.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Remote callers (master, peer slaves)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Transport (external collaborator)                   │
//! │                 parses calls into ferroflow-protocol types              │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ typed calls
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           handlers (this crate)                         │
//! │                                   │                                     │
//! │            ┌──────────────────────┼──────────────────────┐              │
//! │            ▼                      ▼                      ▼              │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐       │
//! │  │ ExecutionRegistry│  │LinkAllocation-   │  │ SlaveDirectory   │       │
//! │  │ + Controller     │  │Registry/PortPool │  │                  │       │
//! │  └──────────────────┘  └──────────────────┘  └──────────────────┘       │
//! │            │                      │                                     │
//! │            ▼                      ▼                                     │
//! │  ┌──────────────────┐  ┌──────────────────┐  ┌──────────────────┐       │
//! │  │ ExecutionLog-    │  │ SocketRepository │  │ SequenceAllocator│       │
//! │  │ Buffer           │  │ (bound sockets)  │  │        │         │       │
//! │  └──────────────────┘  └──────────────────┘  └────────┼─────────┘       │
//! └────────────────────────────────────────────────────────┼────────────────┘
//!                                                          ▼
//!                                                ┌───────────────────┐
//!                                                │    PostgreSQL     │
//!                                                │ (one row per seq) │
//!                                                └───────────────────┘
//! ```
//!
//! # Execution State Machine
//!
//! ```text
//!  ┌───────┐ prepare ┌──────────┐  start  ┌─────────┐  pause   ┌────────┐
//!  │ Added │────────▶│ Prepared │────────▶│ Running │─────────▶│ Paused │
//!  └───┬───┘         └────┬─────┘         └──┬───┬──┘◀─────────└───┬────┘
//!      │                  │                  │   │      resume     │
//!      │ stop             │ stop      finish │   │ stop            │ stop
//!      │                  ▼                  ▼   ▼                 │
//!      │            ┌─────────┐        ┌──────────┐                │
//!      └───────────▶│ Stopped │        │ Finished │◀───────────────┘
//!                   └────┬────┘        └─────┬────┘      (finish)
//!                        │    cleanup        │
//!                        └───────┬───────────┘
//!                                ▼
//!                            removed
//! ```
//!
//! Invalid transitions return a descriptive failure and change nothing.
//! Cleanup discards the execution's buffered log lines, frees its ports and
//! sockets, removes the handle, and is safe to call twice.
//!
//! # Concurrency Model
//!
//! The transport runs one worker task per inbound call; every structure here
//! is safe under arbitrary concurrent mutation. Sharding follows the
//! coordination domain:
//!
//! | Structure | Granularity |
//! |-----------|-------------|
//! | [`link_registry::LinkAllocationRegistry`] | per hostname |
//! | [`sequence::SequenceAllocator`] | per sequence name |
//! | [`socket_repository::SocketRepository`] | per port |
//! | [`execution_registry::ExecutionRegistry`] | coarse (read-heavy) |
//! | [`slave_directory::SlaveDirectory`] | coarse (read-heavy) |
//!
//! No lock is held across network I/O, with one sanctioned exception: the
//! sequence allocator's per-name lock spans its backing-row round trip,
//! scoped to the single call.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `FERROFLOW_DATABASE_URL` | Yes | - | PostgreSQL connection string |
//! | `FERROFLOW_PORT_RANGE_START` | No | `40000` | Port allocation floor |
//! | `FERROFLOW_LOG_BUFFER_MAX_LINES` | No | `5000` | Log buffer capacity |
//! | `FERROFLOW_SEQUENCE_AUTO_CREATE` | No | `false` | Define unknown sequences on first use |
//! | `FERROFLOW_SEQUENCE_DEFAULT_START` | No | `0` | Start value for auto-created sequences |
//! | `FERROFLOW_SEQUENCE_SCHEMA` | No | unset | Schema of the sequence table |
//! | `FERROFLOW_SEQUENCE_TABLE` | No | `slave_sequences` | Sequence table name |
//! | `FERROFLOW_SEQUENCE_NAME_COLUMN` | No | `sequence_name` | Sequence name column |
//! | `FERROFLOW_SEQUENCE_VALUE_COLUMN` | No | `sequence_value` | Sequence value column |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`context`]: The process-wide context object and its builder
//! - [`error`]: Error types mapping onto structured failure responses
//! - [`execution_controller`]: Lifecycle driver over the registry
//! - [`execution_registry`]: Registry of live execution handles
//! - [`handlers`]: Typed-call handlers for the coordination boundary
//! - [`link_registry`]: Cluster-wide port allocation, sharded per host
//! - [`log_buffer`]: Bounded buffer of execution log lines
//! - [`port_pool`]: Pure single-host port allocation algebra
//! - [`sequence`]: Block-allocating sequence generator and its row store
//! - [`slave_directory`]: Peer discovery directory
//! - [`socket_repository`]: This process's bound server sockets

#![deny(missing_docs)]

/// Configuration loading from environment variables.
pub mod config;

/// Process-wide coordination context and builder.
pub mod context;

/// Error types for coordination operations with failure-response mapping.
pub mod error;

/// Lifecycle driver for registered executions.
pub mod execution_controller;

/// Registry of live execution handles keyed by (name, id).
pub mod execution_registry;

/// Typed-call handlers for the coordination boundary.
pub mod handlers;

/// Cluster-wide port allocation, sharded per host.
pub mod link_registry;

/// Bounded in-process buffer for execution log lines.
pub mod log_buffer;

/// Pure port allocation algebra for a single host.
pub mod port_pool;

/// Block-allocating distributed sequence generator.
pub mod sequence;

/// Directory of known peer slave servers.
pub mod slave_directory;

/// Per-process repository of bound listening sockets.
pub mod socket_repository;
