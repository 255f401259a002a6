// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Coordination boundary handlers.
//!
//! One handler per operation in `ferroflow-protocol`, each taking the shared
//! [`ClusterContext`] and a typed request. The transport layer calls these
//! from its worker tasks and renders `Err` values through
//! [`ClusterError::to_failure`] into structured failure responses; nothing in
//! here panics or terminates the process.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use ferroflow_protocol::{
    AddExecutionRequest, AddExecutionResponse, AllocatePortRequest, AllocatePortResponse,
    DeallocatePortsRequest, DeallocatePortsResponse, ExecutionStateResponse, FindExecutionRequest,
    FindExecutionResponse, ListExecutionsRequest, ListExecutionsResponse, ListPortsRequest,
    ListPortsResponse, ListSlavesRequest, ListSlavesResponse, ListSocketsRequest,
    ListSocketsResponse, NextSequenceValueRequest, NextSequenceValueResponse,
    PauseExecutionRequest, PrepareExecutionRequest, RegisterSlaveRequest, RegisterSlaveResponse,
    ReleaseSocketRequest, ReleaseSocketResponse, RemoveExecutionRequest, RemoveExecutionResponse,
    ReportExecutionFinishedRequest, ReserveSocketRequest, ReserveSocketResponse,
    ResumeExecutionRequest, StartExecutionRequest, StopExecutionRequest,
};

use crate::context::ClusterContext;
use crate::error::Result;
use crate::execution_registry::{ExecutionKey, PipelineExecution};

// ============================================================================
// Port allocation
// ============================================================================

/// Handle a port allocation request.
///
/// Idempotent while the allocation is live: a retry of the same request gets
/// the same port. A `range_start` of `0` falls back to the server's
/// configured floor.
#[instrument(skip(context, request), fields(hostname = %request.hostname, run_id = %request.run_id))]
pub async fn handle_allocate_port(
    context: &ClusterContext,
    request: AllocatePortRequest,
) -> Result<AllocatePortResponse> {
    let range_start = if request.range_start == 0 {
        context.port_range_start()
    } else {
        request.range_start
    };

    let port = context
        .links
        .allocate(&request.hostname, &request.link, &request.run_id, range_start)?;

    info!(port, link = %request.link, "Port allocated");
    Ok(AllocatePortResponse { port })
}

/// Handle a port listing request. Unknown hosts report an empty space.
#[instrument(skip(context, request), fields(hostname = %request.hostname))]
pub async fn handle_list_ports(
    context: &ClusterContext,
    request: ListPortsRequest,
) -> Result<ListPortsResponse> {
    let allocations = context
        .links
        .list(&request.hostname, request.only_allocated);
    debug!(count = allocations.len(), "Listed port allocations");
    Ok(ListPortsResponse { allocations })
}

/// Handle a bulk port deallocation request. Unknown names and runs free
/// nothing and still succeed.
#[instrument(skip(context, request), fields(execution_name = %request.execution_name, run_id = %request.run_id))]
pub async fn handle_deallocate_ports(
    context: &ClusterContext,
    request: DeallocatePortsRequest,
) -> Result<DeallocatePortsResponse> {
    let freed = context
        .links
        .deallocate(&request.execution_name, &request.run_id);
    Ok(DeallocatePortsResponse {
        released: freed.len() as u64,
    })
}

// ============================================================================
// Socket repository
// ============================================================================

/// Handle a socket reservation request, binding the listener on first use.
#[instrument(skip(context, request), fields(port = request.port))]
pub async fn handle_reserve_socket(
    context: &ClusterContext,
    request: ReserveSocketRequest,
) -> Result<ReserveSocketResponse> {
    let reserved = context.sockets.reserve(request.port, &request.owner_tag)?;
    Ok(ReserveSocketResponse {
        port: reserved.port,
        local_addr: reserved.local_addr(),
        reused: reserved.reused,
    })
}

/// Handle a socket release request. The socket stays bound for reuse.
#[instrument(skip(context, request), fields(port = request.port))]
pub async fn handle_release_socket(
    context: &ClusterContext,
    request: ReleaseSocketRequest,
) -> Result<ReleaseSocketResponse> {
    context.sockets.release(request.port)?;
    Ok(ReleaseSocketResponse {})
}

/// Handle a socket listing request.
#[instrument(skip(context, _request))]
pub async fn handle_list_sockets(
    context: &ClusterContext,
    _request: ListSocketsRequest,
) -> Result<ListSocketsResponse> {
    Ok(ListSocketsResponse {
        sockets: context.sockets.list(),
    })
}

// ============================================================================
// Slave directory
// ============================================================================

/// Handle a peer registration. Known peers merge, unknown peers insert.
#[instrument(skip(context, request), fields(slave = %request.slave))]
pub async fn handle_register_slave(
    context: &ClusterContext,
    request: RegisterSlaveRequest,
) -> Result<RegisterSlaveResponse> {
    let detection = context.slaves.register(request.slave, request.active).await;
    Ok(RegisterSlaveResponse { detection })
}

/// Handle a peer listing request.
#[instrument(skip(context, _request))]
pub async fn handle_list_slaves(
    context: &ClusterContext,
    _request: ListSlavesRequest,
) -> Result<ListSlavesResponse> {
    Ok(ListSlavesResponse {
        slaves: context.slaves.list().await,
    })
}

// ============================================================================
// Sequences
// ============================================================================

/// Handle an id block reservation.
#[instrument(skip(context, request), fields(sequence = %request.name, block_size = request.block_size))]
pub async fn handle_next_sequence_value(
    context: &ClusterContext,
    request: NextSequenceValueRequest,
) -> Result<NextSequenceValueResponse> {
    let start_value = context
        .sequences
        .next_block(&request.name, request.block_size)
        .await?;
    Ok(NextSequenceValueResponse {
        start_value,
        block_size: request.block_size,
    })
}

// ============================================================================
// Execution registry
// ============================================================================

/// Handle an execution registration.
///
/// The transport constructs the engine-side handle from the submitted
/// pipeline definition and passes it here alongside the typed request.
#[instrument(skip(context, request, execution), fields(name = %request.name, id = %request.id))]
pub async fn handle_add_execution(
    context: &ClusterContext,
    request: AddExecutionRequest,
    execution: Arc<dyn PipelineExecution>,
) -> Result<AddExecutionResponse> {
    let key = ExecutionKey::new(request.name, request.id);
    let log_channel_id = context
        .controller
        .add(key, execution, request.config)
        .await?;
    Ok(AddExecutionResponse { log_channel_id })
}

/// Handle an execution lookup. A miss is a normal negative answer carried in
/// the response, not a failure.
#[instrument(skip(context, request), fields(name = %request.name))]
pub async fn handle_find_execution(
    context: &ClusterContext,
    request: FindExecutionRequest,
) -> Result<FindExecutionResponse> {
    let execution = context
        .executions
        .find(&request.name, request.id.as_deref())
        .await;
    Ok(FindExecutionResponse { execution })
}

/// Handle an execution removal: discard its buffered logs, free its ports
/// and sockets, drop the handle. Idempotent.
#[instrument(skip(context, request), fields(name = %request.name, id = %request.id))]
pub async fn handle_remove_execution(
    context: &ClusterContext,
    request: RemoveExecutionRequest,
) -> Result<RemoveExecutionResponse> {
    let key = ExecutionKey::new(request.name, request.id);
    context.controller.cleanup(&key).await?;
    Ok(RemoveExecutionResponse {})
}

/// Handle an execution listing request.
#[instrument(skip(context, _request))]
pub async fn handle_list_executions(
    context: &ClusterContext,
    _request: ListExecutionsRequest,
) -> Result<ListExecutionsResponse> {
    Ok(ListExecutionsResponse {
        executions: context.executions.list().await,
    })
}

// ============================================================================
// Execution lifecycle
// ============================================================================

/// Handle a prepare request.
#[instrument(skip(context, request), fields(name = %request.name))]
pub async fn handle_prepare_execution(
    context: &ClusterContext,
    request: PrepareExecutionRequest,
) -> Result<ExecutionStateResponse> {
    let key = context
        .executions
        .resolve(&request.name, request.id.as_deref())
        .await?;
    let status = context.controller.prepare(&key).await?;
    Ok(state_response(key, status))
}

/// Handle a start request.
#[instrument(skip(context, request), fields(name = %request.name))]
pub async fn handle_start_execution(
    context: &ClusterContext,
    request: StartExecutionRequest,
) -> Result<ExecutionStateResponse> {
    let key = context
        .executions
        .resolve(&request.name, request.id.as_deref())
        .await?;
    let status = context.controller.start(&key).await?;
    Ok(state_response(key, status))
}

/// Handle a pause request.
#[instrument(skip(context, request), fields(name = %request.name))]
pub async fn handle_pause_execution(
    context: &ClusterContext,
    request: PauseExecutionRequest,
) -> Result<ExecutionStateResponse> {
    let key = context
        .executions
        .resolve(&request.name, request.id.as_deref())
        .await?;
    let status = context.controller.pause(&key).await?;
    Ok(state_response(key, status))
}

/// Handle a resume request.
#[instrument(skip(context, request), fields(name = %request.name))]
pub async fn handle_resume_execution(
    context: &ClusterContext,
    request: ResumeExecutionRequest,
) -> Result<ExecutionStateResponse> {
    let key = context
        .executions
        .resolve(&request.name, request.id.as_deref())
        .await?;
    let status = context.controller.resume(&key).await?;
    Ok(state_response(key, status))
}

/// Handle a stop request.
#[instrument(skip(context, request), fields(name = %request.name))]
pub async fn handle_stop_execution(
    context: &ClusterContext,
    request: StopExecutionRequest,
) -> Result<ExecutionStateResponse> {
    let key = context
        .executions
        .resolve(&request.name, request.id.as_deref())
        .await?;
    let status = context.controller.stop(&key).await?;
    Ok(state_response(key, status))
}

/// Handle the engine's completion report.
#[instrument(skip(context, request), fields(name = %request.name, id = %request.id))]
pub async fn handle_report_execution_finished(
    context: &ClusterContext,
    request: ReportExecutionFinishedRequest,
) -> Result<ExecutionStateResponse> {
    let key = ExecutionKey::new(request.name, request.id);
    let status = context.controller.mark_finished(&key).await?;
    Ok(state_response(key, status))
}

fn state_response(
    key: ExecutionKey,
    status: ferroflow_protocol::ExecutionStatus,
) -> ExecutionStateResponse {
    ExecutionStateResponse {
        name: key.name,
        id: key.id,
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ferroflow_protocol::{ExecutionConfig, ExecutionStatus, FailureKind, LinkId, SlaveIdentity};

    use crate::sequence::{MemorySequenceStore, RowLocator, SequenceDescriptor};

    struct StubPipeline;

    #[async_trait]
    impl PipelineExecution for StubPipeline {
        async fn prepare(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn start(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn pause(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn resume(&self) -> anyhow::Result<()> {
            Ok(())
        }
        async fn stop(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn context() -> ClusterContext {
        ClusterContext::builder()
            .sequence_store(Arc::new(MemorySequenceStore::new()))
            .sequence(SequenceDescriptor {
                name: "ids".to_string(),
                start_value: 0,
                locator: RowLocator {
                    schema: None,
                    table: "slave_sequences".to_string(),
                    name_column: "sequence_name".to_string(),
                    value_column: "sequence_value".to_string(),
                },
            })
            .port_range_start(42000)
            .build()
            .unwrap()
    }

    fn link(name: &str) -> LinkId {
        LinkId {
            execution_name: name.to_string(),
            source_slave: "nodeA".to_string(),
            source_step: "StepX".to_string(),
            source_copy: 0,
            target_slave: "nodeB".to_string(),
            target_step: "StepY".to_string(),
            target_copy: 0,
        }
    }

    #[tokio::test]
    async fn test_allocate_port_zero_hint_uses_configured_floor() {
        let context = context();
        let response = handle_allocate_port(
            &context,
            AllocatePortRequest {
                hostname: "node1".to_string(),
                link: link("ETL1"),
                run_id: "R1".to_string(),
                range_start: 0,
            },
        )
        .await
        .unwrap();
        assert_eq!(response.port, 42000);
    }

    #[tokio::test]
    async fn test_find_execution_miss_is_not_an_error() {
        let context = context();
        let response = handle_find_execution(
            &context,
            FindExecutionRequest {
                name: "ETL1".to_string(),
                id: None,
            },
        )
        .await
        .unwrap();
        assert!(response.execution.is_none());
    }

    #[tokio::test]
    async fn test_remove_execution_on_live_run_maps_to_invalid_transition() {
        let context = context();
        handle_add_execution(
            &context,
            AddExecutionRequest {
                name: "ETL1".to_string(),
                id: "R1".to_string(),
                config: ExecutionConfig::default(),
            },
            Arc::new(StubPipeline),
        )
        .await
        .unwrap();

        let err = handle_remove_execution(
            &context,
            RemoveExecutionRequest {
                name: "ETL1".to_string(),
                id: "R1".to_string(),
            },
        )
        .await
        .unwrap_err();

        let failure = err.to_failure();
        assert_eq!(failure.kind, FailureKind::InvalidTransition);
        assert_eq!(failure.code, "INVALID_TRANSITION");
    }

    #[tokio::test]
    async fn test_lifecycle_by_name_resolves_oldest_run() {
        let context = context();
        for id in ["R-old", "R-new"] {
            handle_add_execution(
                &context,
                AddExecutionRequest {
                    name: "ETL1".to_string(),
                    id: id.to_string(),
                    config: ExecutionConfig::default(),
                },
                Arc::new(StubPipeline),
            )
            .await
            .unwrap();
        }

        let response = handle_prepare_execution(
            &context,
            PrepareExecutionRequest {
                name: "ETL1".to_string(),
                id: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(response.id, "R-old");
        assert_eq!(response.status, ExecutionStatus::Prepared);
    }

    #[tokio::test]
    async fn test_register_slave_returns_merged_detection() {
        let context = context();
        let response = handle_register_slave(
            &context,
            RegisterSlaveRequest {
                slave: SlaveIdentity {
                    name: "slave-1".to_string(),
                    hostname: "10.0.0.5".to_string(),
                    port: 8081,
                },
                active: true,
            },
        )
        .await
        .unwrap();
        assert!(response.detection.active);
        assert!(response.detection.last_active_at.is_some());
    }

    #[tokio::test]
    async fn test_next_sequence_value_round_trip() {
        let context = context();
        let first = handle_next_sequence_value(
            &context,
            NextSequenceValueRequest {
                name: "ids".to_string(),
                block_size: 100,
            },
        )
        .await
        .unwrap();
        assert_eq!(first.start_value, 0);
        assert_eq!(first.block_size, 100);

        let second = handle_next_sequence_value(
            &context,
            NextSequenceValueRequest {
                name: "ids".to_string(),
                block_size: 100,
            },
        )
        .await
        .unwrap();
        assert_eq!(second.start_value, 100);
    }
}
