// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Registry of live executions on this slave server.
//!
//! The registry is the exclusive owner of every execution handle from add to
//! removal. Handles are kept in arrival order; listing sorts by key, while
//! name-only lookup walks arrival order so the oldest run wins.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use ferroflow_protocol::{ExecutionConfig, ExecutionStatus, ExecutionSummary};

use crate::error::{ClusterError, Result};

/// Composite identity of one execution.
///
/// The name repeats across runs of the same pipeline; the id is an opaque
/// token unique per submission. Ordered by name then id for stable listing.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExecutionKey {
    /// Pipeline name.
    pub name: String,
    /// Opaque run id.
    pub id: String,
}

impl ExecutionKey {
    /// Build a key from name and id.
    pub fn new(name: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
        }
    }
}

impl std::fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.name, self.id)
    }
}

/// Engine-side handle of a running execution.
///
/// The coordination core treats the execution object as opaque: it records
/// lifecycle state and delegates the actual work through this trait. Every
/// method is a request, not a guarantee - pause and stop are cooperative and
/// workers may take arbitrary time to comply.
#[async_trait]
pub trait PipelineExecution: Send + Sync {
    /// Run engine-side initialization; after this the execution can start.
    async fn prepare(&self) -> anyhow::Result<()>;
    /// Begin worker activity.
    async fn start(&self) -> anyhow::Result<()>;
    /// Close the cooperative pause gate.
    async fn pause(&self) -> anyhow::Result<()>;
    /// Reopen the pause gate.
    async fn resume(&self) -> anyhow::Result<()>;
    /// Demand that workers cease.
    async fn stop(&self) -> anyhow::Result<()>;
}

impl std::fmt::Debug for dyn PipelineExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PipelineExecution")
    }
}

/// One registered execution.
#[derive(Debug)]
struct ExecutionEntry {
    key: ExecutionKey,
    execution: Arc<dyn PipelineExecution>,
    config: ExecutionConfig,
    status: ExecutionStatus,
    log_channel_id: Uuid,
    added_at: DateTime<Utc>,
}

impl ExecutionEntry {
    fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            name: self.key.name.clone(),
            id: self.key.id.clone(),
            status: self.status,
            log_channel_id: self.log_channel_id,
        }
    }
}

/// Registry of execution handles, keyed by (name, id).
#[derive(Debug, Default)]
pub struct ExecutionRegistry {
    entries: RwLock<Vec<ExecutionEntry>>,
}

impl ExecutionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a new handle in the `Added` state.
    ///
    /// Returns the log channel id minted for the execution. Fails with a
    /// conflict when a handle with the same (name, id) already exists.
    pub async fn add(
        &self,
        key: ExecutionKey,
        execution: Arc<dyn PipelineExecution>,
        config: ExecutionConfig,
    ) -> Result<Uuid> {
        let mut entries = self.entries.write().await;
        if entries.iter().any(|e| e.key == key) {
            return Err(ClusterError::DuplicateExecution {
                name: key.name,
                id: key.id,
            });
        }
        let log_channel_id = Uuid::new_v4();
        info!(execution = %key, %log_channel_id, "Added execution");
        entries.push(ExecutionEntry {
            key,
            execution,
            config,
            status: ExecutionStatus::Added,
            log_channel_id,
            added_at: Utc::now(),
        });
        Ok(log_channel_id)
    }

    /// Look up an execution by name and optionally id.
    ///
    /// With an id the match is exact. Without one, the oldest handle with the
    /// name is returned - a compatibility affordance for callers from the
    /// single-instance days; with several live runs sharing a name the answer
    /// is stable but arbitrary.
    pub async fn find(&self, name: &str, id: Option<&str>) -> Option<ExecutionSummary> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.key.name == name && id.is_none_or(|id| e.key.id == id))
            .map(|e| e.summary())
    }

    /// Like [`find`](Self::find) but failing with not-found, for operations
    /// that need a concrete key.
    pub async fn resolve(&self, name: &str, id: Option<&str>) -> Result<ExecutionKey> {
        self.find(name, id)
            .await
            .map(|summary| ExecutionKey::new(summary.name, summary.id))
            .ok_or_else(|| ClusterError::ExecutionNotFound {
                name: name.to_string(),
                id: id.map(str::to_string),
            })
    }

    /// Current lifecycle state of an execution.
    pub async fn status(&self, key: &ExecutionKey) -> Result<ExecutionStatus> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.status)
            .ok_or_else(|| not_found(key))
    }

    /// The configuration stored with an execution.
    pub async fn config(&self, key: &ExecutionKey) -> Result<ExecutionConfig> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.config.clone())
            .ok_or_else(|| not_found(key))
    }

    /// The log channel id minted for an execution.
    pub async fn log_channel_id(&self, key: &ExecutionKey) -> Result<Uuid> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.log_channel_id)
            .ok_or_else(|| not_found(key))
    }

    /// Atomically move an execution from one of `allowed` states to `next`,
    /// handing back the engine handle for the follow-up call.
    ///
    /// A state outside `allowed` fails with a descriptive invalid-transition
    /// error and changes nothing.
    pub async fn transition(
        &self,
        key: &ExecutionKey,
        allowed: &[ExecutionStatus],
        next: ExecutionStatus,
        operation: &str,
    ) -> Result<Arc<dyn PipelineExecution>> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .iter_mut()
            .find(|e| e.key == *key)
            .ok_or_else(|| not_found(key))?;
        if !allowed.contains(&entry.status) {
            return Err(ClusterError::InvalidTransition {
                name: key.name.clone(),
                id: key.id.clone(),
                operation: operation.to_string(),
                current: entry.status,
            });
        }
        debug!(execution = %key, from = %entry.status, to = %next, "Execution state transition");
        entry.status = next;
        Ok(entry.execution.clone())
    }

    /// Put an execution back into `status` after a failed engine delegation.
    /// Quietly does nothing when the handle is gone.
    pub(crate) async fn revert(&self, key: &ExecutionKey, status: ExecutionStatus) {
        let mut entries = self.entries.write().await;
        if let Some(entry) = entries.iter_mut().find(|e| e.key == *key) {
            debug!(execution = %key, to = %status, "Reverting execution state");
            entry.status = status;
        }
    }

    /// Remove a handle, returning its log channel id, or `None` when it was
    /// already gone.
    pub async fn remove(&self, key: &ExecutionKey) -> Option<Uuid> {
        let mut entries = self.entries.write().await;
        let position = entries.iter().position(|e| e.key == *key)?;
        let entry = entries.remove(position);
        info!(execution = %key, "Removed execution");
        Some(entry.log_channel_id)
    }

    /// Every registered execution, ordered by (name, id).
    pub async fn list(&self) -> Vec<ExecutionSummary> {
        let entries = self.entries.read().await;
        let mut summaries: Vec<(ExecutionKey, ExecutionSummary)> = entries
            .iter()
            .map(|e| (e.key.clone(), e.summary()))
            .collect();
        summaries.sort_by(|(a, _), (b, _)| a.cmp(b));
        summaries.into_iter().map(|(_, summary)| summary).collect()
    }

    /// When the execution was added, for diagnostics.
    pub async fn added_at(&self, key: &ExecutionKey) -> Result<DateTime<Utc>> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.key == *key)
            .map(|e| e.added_at)
            .ok_or_else(|| not_found(key))
    }

    /// Number of registered executions.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether nothing is registered.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

fn not_found(key: &ExecutionKey) -> ClusterError {
    ClusterError::ExecutionNotFound {
        name: key.name.clone(),
        id: Some(key.id.clone()),
    }
}
