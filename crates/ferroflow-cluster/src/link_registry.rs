// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Cluster-wide port allocation, sharded per host.
//!
//! Each hostname owns an independent [`PortPool`]; the striped locking of the
//! concurrent map is the per-host critical section, so allocation traffic for
//! one host never blocks another host's. Unknown hostnames lazily initialize
//! an empty number space.

use dashmap::DashMap;
use tracing::{debug, info};

use ferroflow_protocol::{LinkId, PortAllocationInfo};

use crate::error::{ClusterError, Result};
use crate::port_pool::PortPool;

/// Registry of data-streaming port allocations across the cluster's hosts.
#[derive(Debug, Default)]
pub struct LinkAllocationRegistry {
    hosts: DashMap<String, PortPool>,
}

impl LinkAllocationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a port for `link` in `hostname`'s number space.
    ///
    /// Re-requesting a live allocation returns the same port; see
    /// [`PortPool::allocate`] for the full contract.
    pub fn allocate(
        &self,
        hostname: &str,
        link: &LinkId,
        run_id: &str,
        range_start: u16,
    ) -> Result<u16> {
        let mut pool = self.hosts.entry(hostname.to_string()).or_default();
        let port = pool.allocate(link, run_id, range_start).ok_or_else(|| {
            ClusterError::PortSpaceExhausted {
                hostname: hostname.to_string(),
                range_start,
            }
        })?;
        debug!(%hostname, %port, run_id, link = %link, "Allocated data-streaming port");
        Ok(port)
    }

    /// Snapshot one host's number space for diagnostics.
    ///
    /// An unknown hostname reports an empty space rather than an error.
    pub fn list(&self, hostname: &str, only_allocated: bool) -> Vec<PortAllocationInfo> {
        match self.hosts.get(hostname) {
            Some(pool) => pool.snapshot(hostname, only_allocated),
            None => Vec::new(),
        }
    }

    /// Free every allocation owned by `run_id` of pipeline `execution_name`,
    /// on every host. Returns the freed (hostname, port) pairs; unknown
    /// names and runs free nothing.
    pub fn deallocate(&self, execution_name: &str, run_id: &str) -> Vec<(String, u16)> {
        let mut freed = Vec::new();
        for mut entry in self.hosts.iter_mut() {
            let hostname = entry.key().clone();
            for port in entry.value_mut().deallocate_run(execution_name, run_id) {
                freed.push((hostname.clone(), port));
            }
        }
        if !freed.is_empty() {
            info!(
                execution_name,
                run_id,
                count = freed.len(),
                "Deallocated data-streaming ports"
            );
        }
        freed
    }

    /// Free one port on one host. Returns whether it was live.
    pub fn deallocate_port(&self, hostname: &str, port: u16) -> bool {
        match self.hosts.get_mut(hostname) {
            Some(mut pool) => {
                let freed = pool.deallocate_port(port);
                if freed {
                    debug!(%hostname, %port, "Deallocated single port");
                }
                freed
            }
            None => false,
        }
    }

    /// Number of hosts with a (possibly empty) number space.
    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }
}
