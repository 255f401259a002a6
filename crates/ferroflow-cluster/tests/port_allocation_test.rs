// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cross-host port allocation behavior through the coordination handlers.

mod common;

use common::{link, test_context};

use ferroflow_cluster::handlers::{
    handle_allocate_port, handle_deallocate_ports, handle_list_ports,
};
use ferroflow_protocol::{AllocatePortRequest, DeallocatePortsRequest, ListPortsRequest};

fn allocate_request(
    hostname: &str,
    execution_name: &str,
    source_step: &str,
    target_step: &str,
    run_id: &str,
    range_start: u16,
) -> AllocatePortRequest {
    AllocatePortRequest {
        hostname: hostname.to_string(),
        link: link(
            execution_name,
            ("nodeA", source_step, 0),
            ("nodeB", target_step, 0),
        ),
        run_id: run_id.to_string(),
        range_start,
    }
}

#[tokio::test]
async fn test_allocate_deallocate_reuse_scenario() {
    let context = test_context();

    // First link on node1 with hint 40000 gets exactly 40000.
    let first = handle_allocate_port(
        &context,
        allocate_request("node1", "ETL1", "StepX", "StepY", "R1", 40000),
    )
    .await
    .unwrap();
    assert_eq!(first.port, 40000);

    // A second distinct link with the same hint gets the next number.
    let second = handle_allocate_port(
        &context,
        allocate_request("node1", "ETL1", "StepY", "StepZ", "R1", 40000),
    )
    .await
    .unwrap();
    assert_eq!(second.port, 40001);

    // Free the run, then a new link starts over at the freed bottom.
    let released = handle_deallocate_ports(
        &context,
        DeallocatePortsRequest {
            execution_name: "ETL1".to_string(),
            run_id: "R1".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(released.released, 2);

    let reused = handle_allocate_port(
        &context,
        allocate_request("node1", "ETL2", "StepA", "StepB", "R2", 40000),
    )
    .await
    .unwrap();
    assert_eq!(reused.port, 40000);
}

#[tokio::test]
async fn test_repeated_allocate_is_idempotent_over_retries() {
    let context = test_context();
    let request = allocate_request("node1", "ETL1", "StepX", "StepY", "R1", 40000);

    let first = handle_allocate_port(&context, request.clone()).await.unwrap();
    // The caller's network timed out and it retries the identical request.
    for _ in 0..3 {
        let retry = handle_allocate_port(&context, request.clone()).await.unwrap();
        assert_eq!(retry.port, first.port);
    }

    let listed = handle_list_ports(
        &context,
        ListPortsRequest {
            hostname: "node1".to_string(),
            only_allocated: true,
        },
    )
    .await
    .unwrap();
    assert_eq!(listed.allocations.len(), 1);
}

#[tokio::test]
async fn test_deallocation_disappears_from_allocated_listing() {
    let context = test_context();
    handle_allocate_port(
        &context,
        allocate_request("node1", "ETL1", "StepX", "StepY", "R1", 40000),
    )
    .await
    .unwrap();

    handle_deallocate_ports(
        &context,
        DeallocatePortsRequest {
            execution_name: "ETL1".to_string(),
            run_id: "R1".to_string(),
        },
    )
    .await
    .unwrap();

    let allocated = handle_list_ports(
        &context,
        ListPortsRequest {
            hostname: "node1".to_string(),
            only_allocated: true,
        },
    )
    .await
    .unwrap();
    assert!(allocated.allocations.is_empty());

    // The audit record is still there in the full listing.
    let all = handle_list_ports(
        &context,
        ListPortsRequest {
            hostname: "node1".to_string(),
            only_allocated: false,
        },
    )
    .await
    .unwrap();
    assert_eq!(all.allocations.len(), 1);
    assert!(!all.allocations[0].allocated);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_hosts_allocate_concurrently_without_interference() {
    let context = test_context();

    let mut tasks = Vec::new();
    for host in 0..4 {
        let context = context.clone();
        tasks.push(tokio::spawn(async move {
            let hostname = format!("host-{}", host);
            let mut ports = Vec::new();
            for step in 0..25 {
                let source = format!("Step{}", step);
                let target = format!("Step{}", step + 1);
                let response = handle_allocate_port(
                    &context,
                    AllocatePortRequest {
                        hostname: hostname.clone(),
                        link: link("ETL1", ("nodeA", &source, 0), ("nodeB", &target, 0)),
                        run_id: "R1".to_string(),
                        range_start: 40000,
                    },
                )
                .await
                .unwrap();
                ports.push(response.port);
            }
            ports
        }));
    }

    for task in tasks {
        let mut ports = task.await.unwrap();
        ports.sort();
        ports.dedup();
        // Every host saw the full, unshared number space: 25 distinct ports
        // all within [40000, 40025).
        assert_eq!(ports.len(), 25);
        assert_eq!(*ports.first().unwrap(), 40000);
        assert!(*ports.last().unwrap() < 40025);
    }
}

#[tokio::test]
async fn test_deallocate_unknown_name_or_run_is_a_noop() {
    let context = test_context();
    let response = handle_deallocate_ports(
        &context,
        DeallocatePortsRequest {
            execution_name: "never-registered".to_string(),
            run_id: "R0".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(response.released, 0);
}
