// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Directory of known peer slave servers.
//!
//! Eventually consistent by construction: the directory reflects the last
//! message received per peer and probes nothing itself. A crashed peer is
//! only noticed when it stops refreshing; reaping stale entries by TTL is an
//! open policy decision, deliberately not implemented here.

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info};

use ferroflow_protocol::{SlaveDetection, SlaveIdentity};

/// Registry of peer slave servers and their last reported liveness.
#[derive(Debug, Default)]
pub struct SlaveDirectory {
    entries: RwLock<Vec<SlaveDetection>>,
}

impl SlaveDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a peer's presence report.
    ///
    /// Peers are identified by network identity (hostname, port) only. A
    /// report for a known peer merges: descriptive metadata is replaced and
    /// the matching liveness timestamp is stamped with the directory's clock.
    /// A report for an unknown peer inserts. Duplicates are never appended.
    pub async fn register(&self, slave: SlaveIdentity, active: bool) -> SlaveDetection {
        let now = Utc::now();
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.iter_mut().find(|e| e.slave.same_peer(&slave)) {
            existing.slave = slave;
            existing.active = active;
            if active {
                existing.last_active_at = Some(now);
            } else {
                existing.last_inactive_at = Some(now);
            }
            debug!(slave = %existing.slave, active, "Merged slave detection");
            return existing.clone();
        }

        let detection = SlaveDetection {
            slave,
            active,
            last_active_at: active.then_some(now),
            last_inactive_at: (!active).then_some(now),
        };
        info!(slave = %detection.slave, active, "Registered new slave");
        entries.push(detection.clone());
        detection
    }

    /// Snapshot of every known peer, in first-seen order.
    pub async fn list(&self) -> Vec<SlaveDetection> {
        self.entries.read().await.clone()
    }

    /// Number of known peers.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether no peer has registered yet.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
