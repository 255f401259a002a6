// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Block-allocating distributed sequence generator.
//!
//! One coordination call reserves a contiguous id block; the caller consumes
//! it locally without further round trips. The counter's authority is the
//! backing row, read and written on every call - there is no in-memory cache
//! to drift.
//!
//! The read and the write are two separate statements, not one transaction.
//! With several coordinator processes pointed at the same row this is a
//! TOCTOU gap; it is tolerated because block allocation calls are rare
//! relative to the block size, and it is tracked as an open issue rather
//! than papered over here.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use sqlx::Row;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ClusterError, Result};

/// Location of the backing row for one sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLocator {
    /// Schema holding the table, when not the connection default.
    pub schema: Option<String>,
    /// Table holding one row per sequence.
    pub table: String,
    /// Column holding the sequence name.
    pub name_column: String,
    /// Column holding the current value.
    pub value_column: String,
}

impl RowLocator {
    /// The table reference with identifiers quoted, schema-qualified when a
    /// schema is set.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("\"{}\".\"{}\"", schema, self.table),
            None => format!("\"{}\"", self.table),
        }
    }
}

/// Definition of one named sequence.
#[derive(Debug, Clone)]
pub struct SequenceDescriptor {
    /// The sequence name callers allocate from.
    pub name: String,
    /// First value handed out when the backing row does not exist yet.
    pub start_value: i64,
    /// Where the backing row lives.
    pub locator: RowLocator,
}

/// Errors from a sequence backing store.
#[derive(Debug, Error)]
pub enum SequenceStoreError {
    /// The underlying database call failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The store is unusable for a non-database reason.
    #[error("{0}")]
    Backend(String),
}

/// Backing store holding one row per sequence.
///
/// The store is a dumb SQL executor; all sequencing logic lives in
/// [`SequenceAllocator`].
#[async_trait]
pub trait SequenceStore: Send + Sync {
    /// Read the stored value for `name`, if its row exists.
    async fn read_value(
        &self,
        locator: &RowLocator,
        name: &str,
    ) -> std::result::Result<Option<i64>, SequenceStoreError>;

    /// Insert a fresh row for `name` with `value`.
    async fn insert_value(
        &self,
        locator: &RowLocator,
        name: &str,
        value: i64,
    ) -> std::result::Result<(), SequenceStoreError>;

    /// Update the existing row for `name` to `value`.
    async fn update_value(
        &self,
        locator: &RowLocator,
        name: &str,
        value: i64,
    ) -> std::result::Result<(), SequenceStoreError>;
}

impl std::fmt::Debug for dyn SequenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SequenceStore")
    }
}

/// PostgreSQL-backed sequence store.
///
/// Identifiers come from the row locator (operator configuration) and are
/// interpolated quoted; the name and value always travel as bind parameters.
pub struct PgSequenceStore {
    pool: PgPool,
}

impl PgSequenceStore {
    /// Create a store on an existing connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SequenceStore for PgSequenceStore {
    async fn read_value(
        &self,
        locator: &RowLocator,
        name: &str,
    ) -> std::result::Result<Option<i64>, SequenceStoreError> {
        let sql = format!(
            "SELECT \"{}\" FROM {} WHERE \"{}\" = $1",
            locator.value_column,
            locator.qualified_table(),
            locator.name_column,
        );
        let row = sqlx::query(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(row.try_get::<i64, _>(0)?)),
            None => Ok(None),
        }
    }

    async fn insert_value(
        &self,
        locator: &RowLocator,
        name: &str,
        value: i64,
    ) -> std::result::Result<(), SequenceStoreError> {
        let sql = format!(
            "INSERT INTO {} (\"{}\", \"{}\") VALUES ($1, $2)",
            locator.qualified_table(),
            locator.name_column,
            locator.value_column,
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_value(
        &self,
        locator: &RowLocator,
        name: &str,
        value: i64,
    ) -> std::result::Result<(), SequenceStoreError> {
        let sql = format!(
            "UPDATE {} SET \"{}\" = $2 WHERE \"{}\" = $1",
            locator.qualified_table(),
            locator.value_column,
            locator.name_column,
        );
        sqlx::query(&sql)
            .bind(name)
            .bind(value)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

/// In-memory sequence store for embedding and tests.
#[derive(Debug, Default)]
pub struct MemorySequenceStore {
    rows: std::sync::Mutex<HashMap<String, i64>>,
}

impl MemorySequenceStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn key(locator: &RowLocator, name: &str) -> String {
        format!("{}::{}", locator.qualified_table(), name)
    }
}

#[async_trait]
impl SequenceStore for MemorySequenceStore {
    async fn read_value(
        &self,
        locator: &RowLocator,
        name: &str,
    ) -> std::result::Result<Option<i64>, SequenceStoreError> {
        let rows = self
            .rows
            .lock()
            .map_err(|_| SequenceStoreError::Backend("store mutex poisoned".to_string()))?;
        Ok(rows.get(&Self::key(locator, name)).copied())
    }

    async fn insert_value(
        &self,
        locator: &RowLocator,
        name: &str,
        value: i64,
    ) -> std::result::Result<(), SequenceStoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| SequenceStoreError::Backend("store mutex poisoned".to_string()))?;
        rows.insert(Self::key(locator, name), value);
        Ok(())
    }

    async fn update_value(
        &self,
        locator: &RowLocator,
        name: &str,
        value: i64,
    ) -> std::result::Result<(), SequenceStoreError> {
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| SequenceStoreError::Backend("store mutex poisoned".to_string()))?;
        rows.insert(Self::key(locator, name), value);
        Ok(())
    }
}

/// Template for sequences created on first use.
#[derive(Debug, Clone)]
pub struct SequenceAutoCreate {
    /// Start value for a sequence nobody defined explicitly.
    pub start_value: i64,
    /// Where auto-created rows live.
    pub locator: RowLocator,
}

/// Block allocator over named sequences.
///
/// Calls are serialized per sequence name; different names never block each
/// other. The backing-store round trip under the per-name lock is the one
/// place this crate holds a lock across I/O, scoped to the single call.
#[derive(Debug)]
pub struct SequenceAllocator {
    store: Arc<dyn SequenceStore>,
    descriptors: DashMap<String, SequenceDescriptor>,
    auto_create: Option<SequenceAutoCreate>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SequenceAllocator {
    /// Create an allocator over `store` with the given sequence definitions.
    ///
    /// With `auto_create` set, an unknown name is defined on first use from
    /// the template; without it, unknown names are a not-found failure.
    pub fn new(
        store: Arc<dyn SequenceStore>,
        descriptors: Vec<SequenceDescriptor>,
        auto_create: Option<SequenceAutoCreate>,
    ) -> Self {
        let map = DashMap::new();
        for descriptor in descriptors {
            map.insert(descriptor.name.clone(), descriptor);
        }
        Self {
            store,
            descriptors: map,
            auto_create,
            locks: DashMap::new(),
        }
    }

    /// Reserve the next block of `block_size` ids from sequence `name`,
    /// returning the block's first value.
    ///
    /// The stored value always equals the last-returned block start, so no
    /// value is ever handed out twice through this allocator. Any store
    /// error aborts the call; a guessed value is never returned.
    pub async fn next_block(&self, name: &str, block_size: i64) -> Result<i64> {
        if block_size < 1 {
            return Err(ClusterError::InvalidArgument {
                field: "block_size".to_string(),
                message: format!("must be at least 1, got {}", block_size),
            });
        }

        let descriptor = self.descriptor_for(name)?;

        let lock = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _serialized = lock.lock().await;

        let stored = self
            .store
            .read_value(&descriptor.locator, name)
            .await
            .map_err(|e| store_failed(name, "read", e))?;

        match stored {
            None => {
                let start = descriptor.start_value;
                self.store
                    .insert_value(&descriptor.locator, name, start)
                    .await
                    .map_err(|e| store_failed(name, "insert", e))?;
                info!(sequence = name, start, "Initialized slave sequence");
                Ok(start)
            }
            Some(value) => {
                let next = value
                    .checked_add(block_size)
                    .ok_or_else(|| ClusterError::SequenceOverflow {
                        name: name.to_string(),
                    })?;
                self.store
                    .update_value(&descriptor.locator, name, next)
                    .await
                    .map_err(|e| store_failed(name, "update", e))?;
                debug!(sequence = name, start = next, block_size, "Reserved id block");
                Ok(next)
            }
        }
    }

    /// Whether a sequence of this name is currently defined.
    pub fn is_defined(&self, name: &str) -> bool {
        self.descriptors.contains_key(name)
    }

    fn descriptor_for(&self, name: &str) -> Result<SequenceDescriptor> {
        if let Some(descriptor) = self.descriptors.get(name) {
            return Ok(descriptor.clone());
        }
        match &self.auto_create {
            Some(template) => {
                let descriptor = SequenceDescriptor {
                    name: name.to_string(),
                    start_value: template.start_value,
                    locator: template.locator.clone(),
                };
                // compute-if-absent: a racing caller may have defined it first
                let descriptor = self
                    .descriptors
                    .entry(name.to_string())
                    .or_insert(descriptor)
                    .clone();
                info!(sequence = name, "Auto-created slave sequence definition");
                Ok(descriptor)
            }
            None => Err(ClusterError::SequenceNotFound {
                name: name.to_string(),
            }),
        }
    }
}

fn store_failed(name: &str, operation: &str, error: SequenceStoreError) -> ClusterError {
    ClusterError::SequenceStoreFailed {
        name: name.to_string(),
        operation: operation.to_string(),
        details: error.to_string(),
    }
}
