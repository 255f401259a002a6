// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle driver for registered executions.
//!
//! The controller owns the state machine
//!
//! ```text
//! Added ──prepare──▶ Prepared ──start──▶ Running ◀─resume─┐
//!                                          │    │          │
//!                                          │  pause──▶ Paused
//!                                       finish
//!                                          ▼
//!   (any live state) ──stop──▶ Stopped   Finished
//!                                  │         │
//!                                  └──cleanup─┴──▶ removed
//! ```
//!
//! and calls the execution registry, the link allocation registry and the
//! socket repository at the right transitions. State changes are claimed
//! atomically in the registry before the engine is invoked; when the engine
//! refuses, the claim is rolled back so an invalid handle never reads as
//! further along than it is.

use std::sync::Arc;

use tracing::{info, warn};
use uuid::Uuid;

use ferroflow_protocol::{ExecutionConfig, ExecutionStatus};

use crate::error::{ClusterError, Result};
use crate::execution_registry::{ExecutionKey, ExecutionRegistry, PipelineExecution};
use crate::link_registry::LinkAllocationRegistry;
use crate::log_buffer::ExecutionLogBuffer;
use crate::socket_repository::SocketRepository;

/// Drives executions through their lifecycle.
#[derive(Debug)]
pub struct ExecutionController {
    registry: Arc<ExecutionRegistry>,
    links: Arc<LinkAllocationRegistry>,
    sockets: Arc<SocketRepository>,
    logs: Arc<ExecutionLogBuffer>,
}

impl ExecutionController {
    /// Wire a controller over the shared coordination structures.
    pub fn new(
        registry: Arc<ExecutionRegistry>,
        links: Arc<LinkAllocationRegistry>,
        sockets: Arc<SocketRepository>,
        logs: Arc<ExecutionLogBuffer>,
    ) -> Self {
        Self {
            registry,
            links,
            sockets,
            logs,
        }
    }

    /// Register a freshly constructed execution in the `Added` state.
    pub async fn add(
        &self,
        key: ExecutionKey,
        execution: Arc<dyn PipelineExecution>,
        config: ExecutionConfig,
    ) -> Result<Uuid> {
        self.registry.add(key, execution, config).await
    }

    /// Run engine-side initialization: `Added -> Prepared`.
    pub async fn prepare(&self, key: &ExecutionKey) -> Result<ExecutionStatus> {
        self.delegate(
            key,
            &[ExecutionStatus::Added],
            ExecutionStatus::Prepared,
            ExecutionStatus::Added,
            EngineOp::Prepare,
        )
        .await
    }

    /// Begin worker activity: `Prepared -> Running`.
    pub async fn start(&self, key: &ExecutionKey) -> Result<ExecutionStatus> {
        self.delegate(
            key,
            &[ExecutionStatus::Prepared],
            ExecutionStatus::Running,
            ExecutionStatus::Prepared,
            EngineOp::Start,
        )
        .await
    }

    /// Close the cooperative pause gate: `Running -> Paused`.
    pub async fn pause(&self, key: &ExecutionKey) -> Result<ExecutionStatus> {
        self.delegate(
            key,
            &[ExecutionStatus::Running],
            ExecutionStatus::Paused,
            ExecutionStatus::Running,
            EngineOp::Pause,
        )
        .await
    }

    /// Reopen the pause gate: `Paused -> Running`.
    pub async fn resume(&self, key: &ExecutionKey) -> Result<ExecutionStatus> {
        self.delegate(
            key,
            &[ExecutionStatus::Paused],
            ExecutionStatus::Running,
            ExecutionStatus::Paused,
            EngineOp::Resume,
        )
        .await
    }

    /// Demand an abort: any live state `-> Stopped`.
    ///
    /// The mark is immediate and stands even when the engine's stop hook
    /// complains; workers quiesce in their own time and the held ports and
    /// sockets stay allocated until cleanup.
    pub async fn stop(&self, key: &ExecutionKey) -> Result<ExecutionStatus> {
        let execution = self
            .registry
            .transition(
                key,
                &[
                    ExecutionStatus::Added,
                    ExecutionStatus::Prepared,
                    ExecutionStatus::Running,
                    ExecutionStatus::Paused,
                ],
                ExecutionStatus::Stopped,
                "stop",
            )
            .await?;
        if let Err(e) = execution.stop().await {
            warn!(execution = %key, error = %e, "Engine stop hook failed; stop mark stands");
        }
        info!(execution = %key, "Execution stop requested");
        Ok(ExecutionStatus::Stopped)
    }

    /// Record the engine's completion report: `Running|Paused -> Finished`.
    pub async fn mark_finished(&self, key: &ExecutionKey) -> Result<ExecutionStatus> {
        self.registry
            .transition(
                key,
                &[ExecutionStatus::Running, ExecutionStatus::Paused],
                ExecutionStatus::Finished,
                "finish",
            )
            .await?;
        info!(execution = %key, "Execution finished");
        Ok(ExecutionStatus::Finished)
    }

    /// Discard the execution's buffered log lines, free its ports and
    /// sockets, and remove the handle. Valid only from `Stopped` or
    /// `Finished`; idempotent, safe to call again while workers are still
    /// quiescing or after a racing cleanup already won.
    pub async fn cleanup(&self, key: &ExecutionKey) -> Result<()> {
        let status = match self.registry.status(key).await {
            Ok(status) => status,
            // Already cleaned up - the second call of a retry pair.
            Err(ClusterError::ExecutionNotFound { .. }) => return Ok(()),
            Err(e) => return Err(e),
        };
        if !status.is_terminal() {
            return Err(ClusterError::InvalidTransition {
                name: key.name.clone(),
                id: key.id.clone(),
                operation: "clean up".to_string(),
                current: status,
            });
        }

        // Whoever removes the handle owns the resource teardown; a racing
        // cleanup finds nothing and frees nothing twice.
        let Some(log_channel_id) = self.registry.remove(key).await else {
            return Ok(());
        };

        let discarded = self.logs.discard_channel(log_channel_id).await;
        let freed = self.links.deallocate(&key.name, &key.id);
        for (_, port) in &freed {
            // Only locally bound ports have a repository entry; the rest of
            // the cluster's ports miss quietly.
            if self.sockets.release(*port).is_ok() {
                info!(execution = %key, port, "Returned server socket on cleanup");
            }
        }

        info!(
            execution = %key,
            discarded_log_lines = discarded,
            freed_ports = freed.len(),
            "Cleaned up execution"
        );
        Ok(())
    }

    /// Claim `next` in the registry, delegate the operation to the engine,
    /// and roll the claim back to `rollback` when the engine refuses.
    async fn delegate(
        &self,
        key: &ExecutionKey,
        allowed: &[ExecutionStatus],
        next: ExecutionStatus,
        rollback: ExecutionStatus,
        op: EngineOp,
    ) -> Result<ExecutionStatus> {
        let execution = self
            .registry
            .transition(key, allowed, next, op.as_str())
            .await?;
        match op.call(&*execution).await {
            Ok(()) => {
                info!(execution = %key, status = %next, "Execution {} succeeded", op.as_str());
                Ok(next)
            }
            Err(e) => {
                self.registry.revert(key, rollback).await;
                Err(ClusterError::EngineFailure {
                    name: key.name.clone(),
                    id: key.id.clone(),
                    operation: op.as_str().to_string(),
                    details: e.to_string(),
                })
            }
        }
    }
}

/// Engine calls the controller delegates after claiming a transition.
#[derive(Debug, Clone, Copy)]
enum EngineOp {
    Prepare,
    Start,
    Pause,
    Resume,
}

impl EngineOp {
    fn as_str(&self) -> &'static str {
        match self {
            EngineOp::Prepare => "prepare",
            EngineOp::Start => "start",
            EngineOp::Pause => "pause",
            EngineOp::Resume => "resume",
        }
    }

    async fn call(&self, execution: &dyn PipelineExecution) -> anyhow::Result<()> {
        match self {
            EngineOp::Prepare => execution.prepare().await,
            EngineOp::Start => execution.start().await,
            EngineOp::Pause => execution.pause().await,
            EngineOp::Resume => execution.resume().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Recording engine stub with switchable failures.
    #[derive(Default)]
    struct MockPipeline {
        calls: Mutex<Vec<&'static str>>,
        fail_prepare: AtomicBool,
        fail_start: AtomicBool,
    }

    impl MockPipeline {
        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PipelineExecution for MockPipeline {
        async fn prepare(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("prepare");
            if self.fail_prepare.load(Ordering::SeqCst) {
                anyhow::bail!("step 'StepX' failed to initialize");
            }
            Ok(())
        }
        async fn start(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("start");
            if self.fail_start.load(Ordering::SeqCst) {
                anyhow::bail!("no worker threads available");
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

    fn controller() -> (ExecutionController, Arc<ExecutionRegistry>) {
        let registry = Arc::new(ExecutionRegistry::new());
        let controller = ExecutionController::new(
            registry.clone(),
            Arc::new(LinkAllocationRegistry::new()),
            Arc::new(SocketRepository::new()),
            Arc::new(ExecutionLogBuffer::new(100)),
        );
        (controller, registry)
    }

    async fn add(
        controller: &ExecutionController,
        name: &str,
        id: &str,
    ) -> (ExecutionKey, Arc<MockPipeline>) {
        let key = ExecutionKey::new(name, id);
        let pipeline = Arc::new(MockPipeline::default());
        controller
            .add(key.clone(), pipeline.clone(), ExecutionConfig::default())
            .await
            .unwrap();
        (key, pipeline)
    }

    #[tokio::test]
    async fn test_happy_path_lifecycle() {
        let (controller, registry) = controller();
        let (key, pipeline) = add(&controller, "ETL1", "R1").await;

        assert_eq!(controller.prepare(&key).await.unwrap(), ExecutionStatus::Prepared);
        assert_eq!(controller.start(&key).await.unwrap(), ExecutionStatus::Running);
        assert_eq!(controller.pause(&key).await.unwrap(), ExecutionStatus::Paused);
        assert_eq!(controller.resume(&key).await.unwrap(), ExecutionStatus::Running);
        assert_eq!(
            controller.mark_finished(&key).await.unwrap(),
            ExecutionStatus::Finished
        );
        controller.cleanup(&key).await.unwrap();

        assert_eq!(pipeline.calls(), vec!["prepare", "start", "pause", "resume"]);
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_start_before_prepare_is_invalid_and_does_not_touch_engine() {
        let (controller, registry) = controller();
        let (key, pipeline) = add(&controller, "ETL1", "R1").await;

        let err = controller.start(&key).await.unwrap_err();
        assert!(matches!(
            err,
            ClusterError::InvalidTransition {
                current: ExecutionStatus::Added,
                ..
            }
        ));
        assert!(pipeline.calls().is_empty());
        assert_eq!(registry.status(&key).await.unwrap(), ExecutionStatus::Added);
    }

    #[tokio::test]
    async fn test_failed_prepare_rolls_back_to_added() {
        let (controller, registry) = controller();
        let (key, pipeline) = add(&controller, "ETL1", "R1").await;
        pipeline.fail_prepare.store(true, Ordering::SeqCst);

        let err = controller.prepare(&key).await.unwrap_err();
        match err {
            ClusterError::EngineFailure { operation, details, .. } => {
                assert_eq!(operation, "prepare");
                assert!(details.contains("StepX"));
            }
            other => panic!("expected EngineFailure, got {:?}", other),
        }
        assert_eq!(registry.status(&key).await.unwrap(), ExecutionStatus::Added);

        // The handle is still usable once the engine recovers
        pipeline.fail_prepare.store(false, Ordering::SeqCst);
        controller.prepare(&key).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_start_rolls_back_to_prepared() {
        let (controller, registry) = controller();
        let (key, pipeline) = add(&controller, "ETL1", "R1").await;
        controller.prepare(&key).await.unwrap();
        pipeline.fail_start.store(true, Ordering::SeqCst);

        controller.start(&key).await.unwrap_err();
        assert_eq!(
            registry.status(&key).await.unwrap(),
            ExecutionStatus::Prepared
        );
    }

    #[tokio::test]
    async fn test_stop_is_valid_from_every_live_state() {
        let (controller, _) = controller();

        for advance in 0..4usize {
            let id = format!("R{}", advance);
            let (key, _) = add(&controller, "ETL1", &id).await;
            if advance >= 1 {
                controller.prepare(&key).await.unwrap();
            }
            if advance >= 2 {
                controller.start(&key).await.unwrap();
            }
            if advance >= 3 {
                controller.pause(&key).await.unwrap();
            }
            assert_eq!(controller.stop(&key).await.unwrap(), ExecutionStatus::Stopped);
        }
    }

    #[tokio::test]
    async fn test_double_stop_and_stop_after_finish_are_invalid() {
        let (controller, _) = controller();
        let (key, _) = add(&controller, "ETL1", "R1").await;
        controller.stop(&key).await.unwrap();
        assert!(matches!(
            controller.stop(&key).await.unwrap_err(),
            ClusterError::InvalidTransition { .. }
        ));

        let (finished, _) = add(&controller, "ETL1", "R2").await;
        controller.prepare(&finished).await.unwrap();
        controller.start(&finished).await.unwrap();
        controller.mark_finished(&finished).await.unwrap();
        assert!(matches!(
            controller.stop(&finished).await.unwrap_err(),
            ClusterError::InvalidTransition { .. }
        ));
    }

    #[tokio::test]
    async fn test_cleanup_requires_terminal_state() {
        let (controller, registry) = controller();
        let (key, _) = add(&controller, "ETL1", "R1").await;
        controller.prepare(&key).await.unwrap();
        controller.start(&key).await.unwrap();

        let err = controller.cleanup(&key).await.unwrap_err();
        assert!(matches!(
            err,
            ClusterError::InvalidTransition {
                current: ExecutionStatus::Running,
                ..
            }
        ));
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let (controller, registry) = controller();
        let (key, _) = add(&controller, "ETL1", "R1").await;
        controller.stop(&key).await.unwrap();

        controller.cleanup(&key).await.unwrap();
        controller.cleanup(&key).await.unwrap();
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_pause_from_paused_is_invalid() {
        let (controller, _) = controller();
        let (key, _) = add(&controller, "ETL1", "R1").await;
        controller.prepare(&key).await.unwrap();
        controller.start(&key).await.unwrap();
        controller.pause(&key).await.unwrap();
        assert!(matches!(
            controller.pause(&key).await.unwrap_err(),
            ClusterError::InvalidTransition { .. }
        ));
    }
}
