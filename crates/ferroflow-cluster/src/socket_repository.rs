// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Per-process repository of bound listening sockets.
//!
//! Data-streaming readers reserve their allocated port here; the repository
//! binds the real listener lazily on first reservation and keeps it across
//! release/reserve cycles. A released ephemeral port is not guaranteed
//! re-bindable later, so sockets are closed only at explicit process
//! teardown, never when a consumer lets go of one.

use std::net::TcpListener;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, warn};

use ferroflow_protocol::SocketInfo;

use crate::error::{ClusterError, Result};

/// One repository entry: a bound listener plus usage tracking.
#[derive(Debug)]
struct SocketEntry {
    listener: Arc<TcpListener>,
    in_use: bool,
    owner_tag: String,
}

/// A successful reservation, handing the caller the live listener.
#[derive(Debug, Clone)]
pub struct ReservedSocket {
    /// The reserved port.
    pub port: u16,
    /// The bound listener. The repository keeps its own reference; dropping
    /// this one does not close the socket.
    pub listener: Arc<TcpListener>,
    /// True when an existing released socket was handed back.
    pub reused: bool,
}

impl ReservedSocket {
    /// Local address the listener is bound to, for diagnostics.
    pub fn local_addr(&self) -> String {
        self.listener
            .local_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string())
    }
}

/// Repository of this process's data-streaming server sockets, keyed by port.
#[derive(Debug, Default)]
pub struct SocketRepository {
    entries: DashMap<u16, SocketEntry>,
}

impl SocketRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the socket for `port`, binding it on first use.
    ///
    /// An existing entry that is not in use is handed back as-is; an entry
    /// that is in use fails with a conflict, because two concurrent consumers
    /// of one port is a caller bug. A refused OS bind is reported distinctly:
    /// that port is taken outside this process and the link is dead.
    pub fn reserve(&self, port: u16, owner_tag: &str) -> Result<ReservedSocket> {
        match self.entries.entry(port) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                if entry.in_use {
                    return Err(ClusterError::SocketInUse {
                        port,
                        owner_tag: entry.owner_tag.clone(),
                    });
                }
                entry.in_use = true;
                entry.owner_tag = owner_tag.to_string();
                debug!(%port, owner_tag, "Reusing released server socket");
                Ok(ReservedSocket {
                    port,
                    listener: entry.listener.clone(),
                    reused: true,
                })
            }
            Entry::Vacant(vacant) => {
                let listener =
                    TcpListener::bind(("0.0.0.0", port)).map_err(|e| ClusterError::BindFailed {
                        port,
                        details: e.to_string(),
                    })?;
                let listener = Arc::new(listener);
                vacant.insert(SocketEntry {
                    listener: listener.clone(),
                    in_use: true,
                    owner_tag: owner_tag.to_string(),
                });
                debug!(%port, owner_tag, "Bound new server socket");
                Ok(ReservedSocket {
                    port,
                    listener,
                    reused: false,
                })
            }
        }
    }

    /// Mark the socket for `port` as no longer in use, keeping it bound.
    ///
    /// Releasing an already-released socket is harmless; a port with no entry
    /// at all is the caller confusing ports and reports not-found.
    pub fn release(&self, port: u16) -> Result<()> {
        match self.entries.get_mut(&port) {
            Some(mut entry) => {
                entry.in_use = false;
                debug!(%port, "Released server socket");
                Ok(())
            }
            None => Err(ClusterError::SocketNotReserved { port }),
        }
    }

    /// Snapshot the repository for diagnostics, lowest port first.
    pub fn list(&self) -> Vec<SocketInfo> {
        let mut sockets: Vec<SocketInfo> = self
            .entries
            .iter()
            .map(|entry| SocketInfo {
                port: *entry.key(),
                in_use: entry.in_use,
                owner_tag: entry.owner_tag.clone(),
                local_addr: entry
                    .listener
                    .local_addr()
                    .map(|addr| addr.to_string())
                    .unwrap_or_else(|_| "unknown".to_string()),
            })
            .collect();
        sockets.sort_by_key(|socket| socket.port);
        sockets
    }

    /// Number of bound sockets the repository holds.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the repository holds no sockets.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close every socket. The one and only close path, for process teardown.
    pub fn teardown(&self) {
        let mut still_in_use = 0usize;
        let count = self.entries.len();
        for entry in self.entries.iter() {
            if entry.in_use {
                still_in_use += 1;
            }
        }
        self.entries.clear();
        if still_in_use > 0 {
            warn!(
                count,
                still_in_use, "Tore down socket repository with sockets still in use"
            );
        } else {
            info!(count, "Tore down socket repository");
        }
    }
}
