// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for ferroflow-cluster integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use ferroflow_cluster::context::ClusterContext;
use ferroflow_cluster::execution_registry::PipelineExecution;
use ferroflow_cluster::sequence::{MemorySequenceStore, RowLocator, SequenceDescriptor};
use ferroflow_protocol::LinkId;

/// Install a subscriber so `RUST_LOG=debug cargo test` shows core tracing.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Standard sequence row locator used by the tests.
pub fn locator() -> RowLocator {
    RowLocator {
        schema: None,
        table: "slave_sequences".to_string(),
        name_column: "sequence_name".to_string(),
        value_column: "sequence_value".to_string(),
    }
}

/// A context over an in-memory sequence store with one sequence `ids`
/// starting at 0 and a 40000 port floor.
pub fn test_context() -> Arc<ClusterContext> {
    init_tracing();
    let context = ClusterContext::builder()
        .sequence_store(Arc::new(MemorySequenceStore::new()))
        .sequence(SequenceDescriptor {
            name: "ids".to_string(),
            start_value: 0,
            locator: locator(),
        })
        .build()
        .expect("context assembles");
    Arc::new(context)
}

/// Build a link identity in one line.
pub fn link(
    execution_name: &str,
    source: (&str, &str, u16),
    target: (&str, &str, u16),
) -> LinkId {
    LinkId {
        execution_name: execution_name.to_string(),
        source_slave: source.0.to_string(),
        source_step: source.1.to_string(),
        source_copy: source.2,
        target_slave: target.0.to_string(),
        target_step: target.1.to_string(),
        target_copy: target.2,
    }
}

/// Engine stub that records delegated calls and fails on demand.
#[derive(Default)]
pub struct MockPipeline {
    pub calls: Mutex<Vec<&'static str>>,
    pub fail_prepare: AtomicBool,
    pub fail_start: AtomicBool,
}

impl MockPipeline {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PipelineExecution for MockPipeline {
    async fn prepare(&self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("prepare");
        if self.fail_prepare.load(Ordering::SeqCst) {
            anyhow::bail!("initialization failed");
        }
        Ok(())
    }

    async fn start(&self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("start");
        if self.fail_start.load(Ordering::SeqCst) {
            anyhow::bail!("start refused");
        }
        Ok(())
    }

    async fn pause(&self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("pause");
        Ok(())
    }

    async fn resume(&self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("resume");
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("stop");
        Ok(())
    }
}
