// ReelGrab - Movie Source Browser and Download Core
// Copyright (C) 2025 ReelGrab contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Transfer progress tracking and reporting
//!
//! [`TransferTracker`] converts chunk-arrival events into progress snapshots.
//! Byte count and percentage update on every chunk; speed and ETA are only
//! recomputed when at least one second has elapsed since the previous sample,
//! which keeps small transport chunks from producing noisy instantaneous
//! readings. Timestamps are caller-supplied, so the arithmetic is a pure
//! function of its inputs.

use crate::error::TransferKind;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Minimum spacing between two speed samples
const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Lifecycle state of a transfer session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    /// Session created, stream not yet opened
    Idle,
    /// Currently consuming the byte stream
    Downloading,
    /// Consumption suspended by the user; connection stays open
    Paused,
    /// Stream fully consumed and file handed off
    Completed,
    /// Aborted by the user
    Cancelled,
    /// Terminated by a transfer error
    Failed,
}

impl TransferState {
    /// Completed, Cancelled and Failed are terminal: no transition leaves them.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed | TransferState::Cancelled | TransferState::Failed
        )
    }
}

/// Progress snapshot for a single transfer session
///
/// Published after every chunk and on every state change. This is the only
/// channel through which the core reports progress; it never touches global
/// or UI state itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Session identifier
    pub session_id: String,

    /// Display title of the media being downloaded
    pub title: String,

    /// Bytes received so far
    pub received_bytes: u64,

    /// Total bytes to receive (0 if unknown)
    pub total_bytes: u64,

    /// Percentage complete; `None` when the total size is unknown
    pub percent: Option<f64>,

    /// Rolling transfer speed in bytes per second
    pub speed_bytes_per_sec: f64,

    /// Estimated seconds remaining; `None` when total or speed is unknown
    pub eta_seconds: Option<u64>,

    /// Current lifecycle state
    pub state: TransferState,

    /// Failure classification, set only when state is Failed
    pub error_kind: Option<TransferKind>,

    /// Failure message, set only when state is Failed
    pub error_message: Option<String>,
}

impl ProgressSnapshot {
    /// Format the transfer speed as a human-readable string (e.g. "2.5 MB/s")
    pub fn speed_string(&self) -> String {
        format!("{:.2} MB/s", self.speed_bytes_per_sec / 1_048_576.0)
    }

    /// Format the ETA as a human-readable string (e.g. "5m 30s")
    pub fn eta_string(&self) -> String {
        let Some(eta) = self.eta_seconds else {
            return "--".to_string();
        };

        let hours = eta / 3600;
        let minutes = (eta % 3600) / 60;
        let seconds = eta % 60;

        if hours > 0 {
            format!("{}h {}m", hours, minutes)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Format a byte count as a human-readable string
    pub fn bytes_string(bytes: u64) -> String {
        if bytes >= 1_073_741_824 {
            format!("{:.2} GB", bytes as f64 / 1_073_741_824.0)
        } else if bytes >= 1_048_576 {
            format!("{:.1} MB", bytes as f64 / 1_048_576.0)
        } else {
            format!("{:.1} KB", bytes as f64 / 1024.0)
        }
    }

    /// One-line progress summary for logs and simple UIs
    pub fn display_string(&self) -> String {
        match self.state {
            TransferState::Idle => format!("{}: starting", self.title),
            TransferState::Downloading | TransferState::Paused => {
                let state = if self.state == TransferState::Paused {
                    " [paused]"
                } else {
                    ""
                };
                match self.percent {
                    Some(pct) => format!(
                        "{}: {:.1}% ({} / {}) - {} - {}{}",
                        self.title,
                        pct,
                        Self::bytes_string(self.received_bytes),
                        Self::bytes_string(self.total_bytes),
                        self.speed_string(),
                        self.eta_string(),
                        state,
                    ),
                    None => format!(
                        "{}: {} - {}{}",
                        self.title,
                        Self::bytes_string(self.received_bytes),
                        self.speed_string(),
                        state,
                    ),
                }
            }
            TransferState::Completed => format!("{}: completed", self.title),
            TransferState::Cancelled => format!("{}: cancelled", self.title),
            TransferState::Failed => format!(
                "{}: failed - {}",
                self.title,
                self.error_message.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Callback type for progress updates
pub type ProgressCallback = Arc<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// Converts chunk-arrival events into byte counts, speed and ETA.
#[derive(Debug)]
pub struct TransferTracker {
    received_bytes: u64,
    total_bytes: u64,
    speed_bytes_per_sec: f64,
    eta_seconds: Option<u64>,
    last_sample_at: Instant,
    last_sample_bytes: u64,
}

impl TransferTracker {
    /// Create a tracker for a transfer of `total_bytes` (0 = unknown),
    /// anchored at `started_at`.
    pub fn new(total_bytes: u64, started_at: Instant) -> Self {
        Self {
            received_bytes: 0,
            total_bytes,
            speed_bytes_per_sec: 0.0,
            eta_seconds: None,
            last_sample_at: started_at,
            last_sample_bytes: 0,
        }
    }

    /// Record the arrival of a chunk of `chunk_len` bytes at `now`.
    ///
    /// Returns `true` when a new speed sample was taken. Byte count always
    /// advances; speed and ETA only change on a sample.
    pub fn on_chunk(&mut self, chunk_len: usize, now: Instant) -> bool {
        self.received_bytes += chunk_len as u64;

        let elapsed = now.saturating_duration_since(self.last_sample_at);
        if elapsed < SAMPLE_INTERVAL {
            return false;
        }

        let secs = elapsed.as_secs_f64();
        self.speed_bytes_per_sec =
            (self.received_bytes - self.last_sample_bytes) as f64 / secs;

        self.eta_seconds = if self.total_bytes > 0 && self.speed_bytes_per_sec > 0.0 {
            let remaining = self.total_bytes.saturating_sub(self.received_bytes);
            Some((remaining as f64 / self.speed_bytes_per_sec) as u64)
        } else {
            None
        };

        self.last_sample_at = now;
        self.last_sample_bytes = self.received_bytes;
        true
    }

    pub fn received_bytes(&self) -> u64 {
        self.received_bytes
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn speed_bytes_per_sec(&self) -> f64 {
        self.speed_bytes_per_sec
    }

    pub fn eta_seconds(&self) -> Option<u64> {
        self.eta_seconds
    }

    /// Percentage complete, clamped to [0, 100]; `None` when total is unknown.
    pub fn percent(&self) -> Option<f64> {
        if self.total_bytes == 0 {
            return None;
        }
        Some((self.received_bytes as f64 / self.total_bytes as f64 * 100.0).min(100.0))
    }
}
