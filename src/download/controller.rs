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


//! Transfer controller
//!
//! Drives one session's pull loop through the state machine
//! `Idle → Downloading ⇄ Paused → {Completed | Cancelled | Failed}`.
//!
//! Suspension points are the pull itself and the pause-wait; both honor the
//! cancellation token, so cancellation takes effect within one pull cycle.
//! While paused the loop waits on a watch flag without consuming the stream;
//! the connection stays open and no polling happens. Buffered chunks are
//! owned exclusively by the session: handed off on completion, discarded on
//! cancellation or failure.

use crate::download::progress::{
    ProgressCallback, ProgressSnapshot, TransferState, TransferTracker,
};
use crate::download::saver::{assemble, DownloadedFile, FileSink};
use crate::download::stream::ChunkSource;
use crate::error::{ReelError, Result};
use bytes::Bytes;
use std::future::Future;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Per-session state machine and pull loop.
///
/// Constructed by the download manager; lives inside the session's task.
pub(crate) struct TransferController {
    session_id: String,
    title: String,
    file_name: String,
    state: TransferState,
    chunks: Vec<Bytes>,
    tracker: TransferTracker,
    token: CancellationToken,
    pause_rx: watch::Receiver<bool>,
    snapshot_tx: watch::Sender<ProgressSnapshot>,
    callback: Option<ProgressCallback>,
}

impl TransferController {
    /// Create a controller in the Idle state. Returns the controller and a
    /// receiver observing its latest progress snapshot.
    pub(crate) fn new(
        session_id: String,
        title: String,
        file_name: String,
        token: CancellationToken,
        pause_rx: watch::Receiver<bool>,
        callback: Option<ProgressCallback>,
    ) -> (Self, watch::Receiver<ProgressSnapshot>) {
        let initial = ProgressSnapshot {
            session_id: session_id.clone(),
            title: title.clone(),
            received_bytes: 0,
            total_bytes: 0,
            percent: None,
            speed_bytes_per_sec: 0.0,
            eta_seconds: None,
            state: TransferState::Idle,
            error_kind: None,
            error_message: None,
        };
        let (snapshot_tx, snapshot_rx) = watch::channel(initial);

        let controller = Self {
            session_id,
            title,
            file_name,
            state: TransferState::Idle,
            chunks: Vec::new(),
            tracker: TransferTracker::new(0, Instant::now()),
            token,
            pause_rx,
            snapshot_tx,
            callback,
        };
        (controller, snapshot_rx)
    }

    /// Open the source and drive the pull loop to a terminal state.
    ///
    /// `opener` resolves to the session's chunk source; resolving it inside
    /// the task means an open failure (404, no body, refused connection)
    /// still surfaces as a terminal Failed snapshot on this session instead
    /// of an error at the call site.
    pub(crate) async fn run<F>(mut self, opener: F, sink: &dyn FileSink)
    where
        F: Future<Output = Result<Box<dyn ChunkSource + Send>>>,
    {
        let mut source = match opener.await {
            Ok(source) => source,
            Err(e) => return self.finish_with(e),
        };

        self.tracker = TransferTracker::new(source.total_bytes(), Instant::now());
        self.set_state(TransferState::Downloading);
        debug!(
            session_id = %self.session_id,
            total_bytes = self.tracker.total_bytes(),
            "transfer started"
        );

        // Cleared if the pause handle disappears; a session without one can
        // never pause again and just streams to the end.
        let mut pause_alive = true;

        loop {
            // Pause gate: wait without pulling, still reacting to cancel.
            if pause_alive && *self.pause_rx.borrow_and_update() {
                if self.state != TransferState::Paused {
                    self.set_state(TransferState::Paused);
                }
                tokio::select! {
                    _ = self.token.cancelled() => return self.finish_with(ReelError::Cancelled),
                    changed = self.pause_rx.changed() => {
                        if changed.is_err() {
                            pause_alive = false;
                        }
                    }
                }
                continue;
            }
            if self.state == TransferState::Paused {
                self.set_state(TransferState::Downloading);
            }

            // Pull boundary. The token is honored here even when the source
            // itself doesn't check it, and a pause flip abandons the pull
            // before a chunk is consumed (next_chunk is cancel-safe).
            let pulled = if pause_alive {
                tokio::select! {
                    _ = self.token.cancelled() => Err(ReelError::Cancelled),
                    changed = self.pause_rx.changed() => {
                        if changed.is_err() {
                            pause_alive = false;
                        }
                        continue;
                    }
                    result = source.next_chunk() => result,
                }
            } else {
                tokio::select! {
                    _ = self.token.cancelled() => Err(ReelError::Cancelled),
                    result = source.next_chunk() => result,
                }
            };

            match pulled {
                Ok(Some(chunk)) => {
                    self.tracker.on_chunk(chunk.len(), Instant::now());
                    self.chunks.push(chunk);
                    self.publish();
                }
                Ok(None) => return self.complete(sink).await,
                Err(e) => return self.finish_with(e),
            }
        }
    }

    /// End-of-stream: assemble the buffer, hand it to the sink, release it.
    async fn complete(mut self, sink: &dyn FileSink) {
        let data = assemble(std::mem::take(&mut self.chunks));
        let file = DownloadedFile {
            file_name: self.file_name.clone(),
            data,
        };

        match sink.save(file).await {
            Ok(path) => {
                info!(
                    session_id = %self.session_id,
                    path = %path.display(),
                    received_bytes = self.tracker.received_bytes(),
                    "transfer completed"
                );
                self.set_state(TransferState::Completed);
            }
            Err(e) => self.finish_with(e),
        }
    }

    /// Terminal transition for cancellation and failure; both discard the
    /// buffered chunks. Cancellation is reported without an error payload.
    fn finish_with(&mut self, error: ReelError) {
        self.chunks = Vec::new();

        if error.is_cancellation() {
            debug!(session_id = %self.session_id, "transfer cancelled");
            self.set_state(TransferState::Cancelled);
        } else {
            warn!(session_id = %self.session_id, error = %error, "transfer failed");
            self.snapshot_tx.send_modify(|s| {
                s.error_kind = Some(error.transfer_kind());
                s.error_message = Some(error.to_string());
            });
            self.set_state(TransferState::Failed);
        }
    }

    fn set_state(&mut self, state: TransferState) {
        self.state = state;
        self.publish();
    }

    /// Publish the current snapshot to the watch channel and the callback.
    fn publish(&self) {
        let snapshot = {
            let previous = self.snapshot_tx.borrow();
            ProgressSnapshot {
                session_id: self.session_id.clone(),
                title: self.title.clone(),
                received_bytes: self.tracker.received_bytes(),
                total_bytes: self.tracker.total_bytes(),
                percent: self.tracker.percent(),
                speed_bytes_per_sec: self.tracker.speed_bytes_per_sec(),
                eta_seconds: self.tracker.eta_seconds(),
                state: self.state,
                error_kind: previous.error_kind,
                error_message: previous.error_message.clone(),
            }
        };

        self.snapshot_tx.send_replace(snapshot.clone());
        if let Some(callback) = &self.callback {
            callback(snapshot);
        }
    }
}
