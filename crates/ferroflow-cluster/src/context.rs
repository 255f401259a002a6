// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Process-wide coordination context.
//!
//! One [`ClusterContext`] is constructed at process start and injected into
//! every handler; there is no global mutable state anywhere in this crate.
//! The builder mirrors how the rest of ferroflow assembles long-lived
//! runtimes: required collaborators are explicit, knobs carry defaults.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ferroflow_cluster::config::Config;
//! use ferroflow_cluster::context::ClusterContext;
//! use ferroflow_cluster::sequence::PgSequenceStore;
//!
//! let config = Config::from_env()?;
//! let pool = sqlx::PgPool::connect(&config.database_url).await?;
//! let context = ClusterContext::builder()
//!     .config(&config)
//!     .sequence_store(Arc::new(PgSequenceStore::new(pool)))
//!     .build()?;
//! ```

use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use crate::config::Config;
use crate::execution_controller::ExecutionController;
use crate::execution_registry::ExecutionRegistry;
use crate::link_registry::LinkAllocationRegistry;
use crate::log_buffer::ExecutionLogBuffer;
use crate::sequence::{
    RowLocator, SequenceAllocator, SequenceAutoCreate, SequenceDescriptor, SequenceStore,
};
use crate::slave_directory::SlaveDirectory;
use crate::socket_repository::SocketRepository;

/// Default floor for port allocation when neither the request nor the
/// builder says otherwise.
pub const DEFAULT_PORT_RANGE_START: u16 = 40000;

/// Default capacity of the execution log buffer, in lines.
pub const DEFAULT_LOG_BUFFER_MAX_LINES: usize = 5000;

/// Builder for a [`ClusterContext`].
pub struct ClusterContextBuilder {
    sequence_store: Option<Arc<dyn SequenceStore>>,
    sequence_descriptors: Vec<SequenceDescriptor>,
    sequence_auto_create: Option<SequenceAutoCreate>,
    port_range_start: u16,
    log_buffer_max_lines: usize,
}

impl std::fmt::Debug for ClusterContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterContextBuilder")
            .field("sequence_store", &self.sequence_store.as_ref().map(|_| "..."))
            .field("sequence_descriptors", &self.sequence_descriptors.len())
            .field("port_range_start", &self.port_range_start)
            .field("log_buffer_max_lines", &self.log_buffer_max_lines)
            .finish()
    }
}

impl Default for ClusterContextBuilder {
    fn default() -> Self {
        Self {
            sequence_store: None,
            sequence_descriptors: Vec::new(),
            sequence_auto_create: None,
            port_range_start: DEFAULT_PORT_RANGE_START,
            log_buffer_max_lines: DEFAULT_LOG_BUFFER_MAX_LINES,
        }
    }
}

impl ClusterContextBuilder {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adopt the scalar knobs from loaded configuration, including the
    /// auto-create sequence template when the config enables it.
    pub fn config(mut self, config: &Config) -> Self {
        self.port_range_start = config.port_range_start;
        self.log_buffer_max_lines = config.log_buffer_max_lines;
        if config.sequence_auto_create {
            self.sequence_auto_create = Some(SequenceAutoCreate {
                start_value: config.sequence_default_start,
                locator: RowLocator {
                    schema: config.sequence_schema.clone(),
                    table: config.sequence_table.clone(),
                    name_column: config.sequence_name_column.clone(),
                    value_column: config.sequence_value_column.clone(),
                },
            });
        }
        self
    }

    /// Set the sequence backing store (required).
    pub fn sequence_store(mut self, store: Arc<dyn SequenceStore>) -> Self {
        self.sequence_store = Some(store);
        self
    }

    /// Define a named sequence.
    pub fn sequence(mut self, descriptor: SequenceDescriptor) -> Self {
        self.sequence_descriptors.push(descriptor);
        self
    }

    /// Allow unknown sequence names, created on first use from `template`.
    pub fn sequence_auto_create(mut self, template: SequenceAutoCreate) -> Self {
        self.sequence_auto_create = Some(template);
        self
    }

    /// Set the default port allocation floor.
    ///
    /// Default: `40000`
    pub fn port_range_start(mut self, port_range_start: u16) -> Self {
        self.port_range_start = port_range_start;
        self
    }

    /// Set the log buffer capacity in lines.
    ///
    /// Default: `5000`
    pub fn log_buffer_max_lines(mut self, max_lines: usize) -> Self {
        self.log_buffer_max_lines = max_lines;
        self
    }

    /// Assemble the context.
    ///
    /// Returns an error if required collaborators are missing.
    pub fn build(self) -> Result<ClusterContext> {
        let sequence_store = self
            .sequence_store
            .ok_or_else(|| anyhow::anyhow!("sequence store is required"))?;

        let executions = Arc::new(ExecutionRegistry::new());
        let links = Arc::new(LinkAllocationRegistry::new());
        let sockets = Arc::new(SocketRepository::new());
        let logs = Arc::new(ExecutionLogBuffer::new(self.log_buffer_max_lines));
        let controller = ExecutionController::new(
            executions.clone(),
            links.clone(),
            sockets.clone(),
            logs.clone(),
        );
        let sequences = SequenceAllocator::new(
            sequence_store,
            self.sequence_descriptors,
            self.sequence_auto_create,
        );

        info!(
            port_range_start = self.port_range_start,
            log_buffer_max_lines = self.log_buffer_max_lines,
            "Cluster coordination context assembled"
        );

        Ok(ClusterContext {
            executions,
            controller,
            links,
            sockets,
            sequences,
            slaves: SlaveDirectory::new(),
            logs,
            port_range_start: self.port_range_start,
        })
    }
}

/// Shared state for every coordination handler.
///
/// Owns one instance of each coordination structure. Wrap it in an `Arc` and
/// hand clones to the transport's worker tasks.
#[derive(Debug)]
pub struct ClusterContext {
    /// Registry of live executions.
    pub executions: Arc<ExecutionRegistry>,
    /// Lifecycle driver over the registry.
    pub controller: ExecutionController,
    /// Cluster-wide port allocations.
    pub links: Arc<LinkAllocationRegistry>,
    /// This process's bound server sockets.
    pub sockets: Arc<SocketRepository>,
    /// Block allocator over named sequences.
    pub sequences: SequenceAllocator,
    /// Known peer slaves.
    pub slaves: SlaveDirectory,
    /// Buffered execution log lines.
    pub logs: Arc<ExecutionLogBuffer>,
    port_range_start: u16,
}

impl ClusterContext {
    /// Create a new builder for assembling a context.
    pub fn builder() -> ClusterContextBuilder {
        ClusterContextBuilder::new()
    }

    /// The port allocation floor used when a request brings none.
    pub fn port_range_start(&self) -> u16 {
        self.port_range_start
    }
}
