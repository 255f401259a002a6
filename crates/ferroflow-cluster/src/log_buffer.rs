// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Bounded in-process buffer for execution log lines.
//!
//! Every registered execution gets a log channel id; engine workers append
//! their lines here and status callers page through them by channel. The
//! buffer is a single FIFO capped at a configured line count - old lines from
//! any channel fall off the front. Cleanup of an execution discards its
//! channel's lines outright.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// One buffered log line, serializable for status responses.
#[derive(Debug, Clone, Serialize)]
pub struct BufferedLogLine {
    /// Monotonic line number across the whole buffer. Callers page with it.
    pub nr: u64,
    /// Log channel the line belongs to.
    pub channel_id: Uuid,
    /// Severity label, e.g. `info` or `error`.
    pub level: String,
    /// The line itself.
    pub message: String,
    /// When the line was appended.
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BufferInner {
    lines: VecDeque<BufferedLogLine>,
    next_nr: u64,
}

/// Bounded buffer of execution log lines, keyed by channel.
#[derive(Debug)]
pub struct ExecutionLogBuffer {
    inner: Mutex<BufferInner>,
    max_lines: usize,
}

impl ExecutionLogBuffer {
    /// Create a buffer that holds at most `max_lines` lines overall.
    pub fn new(max_lines: usize) -> Self {
        Self {
            inner: Mutex::new(BufferInner::default()),
            max_lines: max_lines.max(1),
        }
    }

    /// Append a line to `channel_id`'s stream, returning its line number.
    ///
    /// When the buffer is full the oldest line overall is dropped, whichever
    /// channel it belongs to.
    pub async fn append(&self, channel_id: Uuid, level: &str, message: &str) -> u64 {
        let mut inner = self.inner.lock().await;
        let nr = inner.next_nr;
        inner.next_nr += 1;
        while inner.lines.len() >= self.max_lines {
            inner.lines.pop_front();
        }
        inner.lines.push_back(BufferedLogLine {
            nr,
            channel_id,
            level: level.to_string(),
            message: message.to_string(),
            logged_at: Utc::now(),
        });
        nr
    }

    /// Lines for `channel_id` with a number at or above `from_nr`, oldest
    /// first. Pass `0` for everything still buffered.
    pub async fn lines_for(&self, channel_id: Uuid, from_nr: u64) -> Vec<BufferedLogLine> {
        self.inner
            .lock()
            .await
            .lines
            .iter()
            .filter(|line| line.channel_id == channel_id && line.nr >= from_nr)
            .cloned()
            .collect()
    }

    /// Discard every line belonging to `channel_id`, returning how many went.
    pub async fn discard_channel(&self, channel_id: Uuid) -> usize {
        let mut inner = self.inner.lock().await;
        let before = inner.lines.len();
        inner.lines.retain(|line| line.channel_id != channel_id);
        let discarded = before - inner.lines.len();
        if discarded > 0 {
            debug!(%channel_id, discarded, "Discarded buffered log lines");
        }
        discarded
    }

    /// Total number of buffered lines across all channels.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.lines.len()
    }

    /// Whether the buffer holds no lines.
    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_fetch_by_channel() {
        let buffer = ExecutionLogBuffer::new(100);
        let channel_a = Uuid::new_v4();
        let channel_b = Uuid::new_v4();

        buffer.append(channel_a, "info", "starting").await;
        buffer.append(channel_b, "info", "other pipeline").await;
        buffer.append(channel_a, "error", "row rejected").await;

        let lines = buffer.lines_for(channel_a, 0).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "starting");
        assert_eq!(lines[1].message, "row rejected");
        assert_eq!(lines[1].level, "error");
    }

    #[tokio::test]
    async fn test_paging_from_a_line_number() {
        let buffer = ExecutionLogBuffer::new(100);
        let channel = Uuid::new_v4();
        buffer.append(channel, "info", "one").await;
        let second = buffer.append(channel, "info", "two").await;
        buffer.append(channel, "info", "three").await;

        let lines = buffer.lines_for(channel, second).await;
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].message, "two");
    }

    #[tokio::test]
    async fn test_discard_channel_leaves_others_alone() {
        let buffer = ExecutionLogBuffer::new(100);
        let channel_a = Uuid::new_v4();
        let channel_b = Uuid::new_v4();
        buffer.append(channel_a, "info", "a1").await;
        buffer.append(channel_b, "info", "b1").await;
        buffer.append(channel_a, "info", "a2").await;

        assert_eq!(buffer.discard_channel(channel_a).await, 2);
        assert_eq!(buffer.discard_channel(channel_a).await, 0);
        assert_eq!(buffer.lines_for(channel_b, 0).await.len(), 1);
    }

    #[tokio::test]
    async fn test_fifo_trim_at_capacity() {
        let buffer = ExecutionLogBuffer::new(3);
        let channel = Uuid::new_v4();
        for i in 0..5 {
            buffer.append(channel, "info", &format!("line {}", i)).await;
        }
        let lines = buffer.lines_for(channel, 0).await;
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].message, "line 2");
        // Line numbers keep counting even when old lines fall off
        assert_eq!(lines[2].nr, 4);
    }
}
