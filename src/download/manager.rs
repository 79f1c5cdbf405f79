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


//! Download manager with per-session control
//!
//! [`DownloadManager`] runs any number of independent transfer sessions, each
//! in its own task with its own cancellation token, pause flag and chunk
//! buffer; a semaphore bounds how many consume the network at once.
//! [`ExclusiveDownloader`] is the single-active variant: starting a new
//! download aborts the previous one first.
//!
//! Sessions are ephemeral. A terminal session removes itself from the
//! registry and its buffered bytes are released; nothing is persisted.

use crate::api::models::{MediaType, SourceDescriptor};
use crate::download::controller::TransferController;
use crate::download::progress::{ProgressCallback, ProgressSnapshot};
use crate::download::saver::{media_file_name, DiskSink, FileSink};
use crate::download::stream::{ChunkSource, HttpByteStream};
use crate::error::{ReelError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Download configuration
#[derive(Debug, Clone)]
pub struct DownloadConfig {
    /// Directory finished downloads are written into
    pub output_directory: PathBuf,

    /// Maximum concurrent transfers; further sessions queue on the semaphore
    pub max_concurrent_downloads: usize,

    /// User agent sent with download requests
    pub user_agent: String,

    /// Connect timeout for download requests. There is deliberately no
    /// whole-request timeout: a movie transfer can legitimately run for
    /// hours, and mid-stream stalls are left to the transport.
    pub connect_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            max_concurrent_downloads: 3,
            user_agent: format!("reelgrab/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(30),
        }
    }
}

/// Control surface for one live session
struct SessionHandle {
    token: CancellationToken,
    pause_tx: watch::Sender<bool>,
    snapshot_rx: watch::Receiver<ProgressSnapshot>,
    created_at: DateTime<Utc>,
}

/// Summary of a live session for listing UIs
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub created_at: DateTime<Utc>,
    pub snapshot: ProgressSnapshot,
}

/// Multi-session download manager
pub struct DownloadManager {
    client: reqwest::Client,
    sink: Arc<dyn FileSink>,
    semaphore: Arc<Semaphore>,
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl DownloadManager {
    /// Create a manager that saves finished downloads into the configured
    /// output directory.
    pub fn new(config: DownloadConfig) -> Result<Self> {
        let sink = Arc::new(DiskSink::new(config.output_directory.clone())?);
        Self::with_sink(config, sink)
    }

    /// Create a manager with a custom sink for finished downloads.
    pub fn with_sink(config: DownloadConfig, sink: Arc<dyn FileSink>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .build()?;

        Ok(Self {
            client,
            sink,
            semaphore: Arc::new(Semaphore::new(config.max_concurrent_downloads)),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Start downloading a source. Returns the new session's identifier.
    ///
    /// Progress snapshots and the terminal state arrive through
    /// `on_progress`; open failures (bad status, no body) surface there as a
    /// Failed snapshot rather than as an error here.
    pub async fn start_download(
        &self,
        descriptor: &SourceDescriptor,
        title: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<String> {
        if descriptor.media_type != MediaType::Mp4 {
            return Err(ReelError::InvalidState(
                "only mp4 sources can be downloaded directly".to_string(),
            ));
        }

        let client = self.client.clone();
        let url = descriptor.url.clone();
        let headers = descriptor.headers.clone();
        let expected_size = descriptor.size_bytes;
        let file_name = media_file_name(title, descriptor.quality, descriptor.media_type);

        let token = CancellationToken::new();
        let opener_token = token.clone();
        let opener = async move {
            HttpByteStream::open(&client, &url, &headers, expected_size, opener_token)
                .await
                .map(|source| Box::new(source) as Box<dyn ChunkSource + Send>)
        };

        self.spawn_session(opener, token, file_name, title, on_progress)
            .await
    }

    /// Start a session over a caller-supplied chunk source.
    ///
    /// Useful for embedders with their own transport and for exercising the
    /// state machine without a network.
    pub async fn start_download_from(
        &self,
        source: Box<dyn ChunkSource + Send>,
        file_name: String,
        title: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<String> {
        let token = CancellationToken::new();
        self.spawn_session(
            std::future::ready(Ok(source)),
            token,
            file_name,
            title,
            on_progress,
        )
        .await
    }

    async fn spawn_session<F>(
        &self,
        opener: F,
        token: CancellationToken,
        file_name: String,
        title: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<String>
    where
        F: Future<Output = Result<Box<dyn ChunkSource + Send>>> + Send + 'static,
    {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (pause_tx, pause_rx) = watch::channel(false);

        let (controller, snapshot_rx) = TransferController::new(
            session_id.clone(),
            title.to_string(),
            file_name,
            token.clone(),
            pause_rx,
            on_progress,
        );

        let handle = SessionHandle {
            token,
            pause_tx,
            snapshot_rx,
            created_at: Utc::now(),
        };
        self.sessions.write().await.insert(session_id.clone(), handle);

        let sink = Arc::clone(&self.sink);
        let semaphore = Arc::clone(&self.semaphore);
        let sessions = Arc::clone(&self.sessions);
        let task_id = session_id.clone();

        tokio::spawn(async move {
            // A closed semaphore only happens on shutdown; the session just
            // never starts.
            if let Ok(_permit) = semaphore.acquire_owned().await {
                controller.run(opener, sink.as_ref()).await;
            }
            sessions.write().await.remove(&task_id);
        });

        debug!(session_id = %session_id, "session spawned");
        Ok(session_id)
    }

    /// Suspend a session's stream consumption. The connection stays open.
    ///
    /// Only legal while the session is downloading or already paused.
    pub async fn pause(&self, session_id: &str) -> Result<()> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(session_id)
            .ok_or_else(|| ReelError::SessionNotFound(session_id.to_string()))?;
        Self::ensure_pausable(handle)?;
        handle.pause_tx.send_replace(true);
        Ok(())
    }

    /// Resume a paused session from where the stream left off.
    pub async fn resume(&self, session_id: &str) -> Result<()> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(session_id)
            .ok_or_else(|| ReelError::SessionNotFound(session_id.to_string()))?;
        Self::ensure_pausable(handle)?;
        handle.pause_tx.send_replace(false);
        Ok(())
    }

    fn ensure_pausable(handle: &SessionHandle) -> Result<()> {
        let state = handle.snapshot_rx.borrow().state;
        if state.is_terminal() {
            return Err(ReelError::InvalidState(format!(
                "cannot pause or resume a session in state {state:?}"
            )));
        }
        Ok(())
    }

    /// Cancel a session, closing its connection and discarding its buffer.
    ///
    /// Idempotent: cancelling an already-cancelled or finished session is a
    /// no-op.
    pub async fn cancel(&self, session_id: &str) {
        let sessions = self.sessions.read().await;
        if let Some(handle) = sessions.get(session_id) {
            handle.token.cancel();
        }
    }

    /// Latest progress snapshot for a live session.
    pub async fn progress(&self, session_id: &str) -> Option<ProgressSnapshot> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|handle| handle.snapshot_rx.borrow().clone())
    }

    /// Watch a session's snapshots; the receiver keeps delivering after the
    /// session leaves the registry, ending on the terminal snapshot.
    pub async fn subscribe(&self, session_id: &str) -> Option<watch::Receiver<ProgressSnapshot>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .map(|handle| handle.snapshot_rx.clone())
    }

    /// Number of sessions currently in the registry.
    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Summaries of all live sessions, oldest first.
    pub async fn list_sessions(&self) -> Vec<SessionInfo> {
        let sessions = self.sessions.read().await;
        let mut infos: Vec<SessionInfo> = sessions
            .values()
            .map(|handle| SessionInfo {
                created_at: handle.created_at,
                snapshot: handle.snapshot_rx.borrow().clone(),
            })
            .collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }
}

/// Single-active-download variant: at most one live session, enforced by
/// aborting any prior session before starting a new one.
pub struct ExclusiveDownloader {
    manager: DownloadManager,
    current: tokio::sync::Mutex<Option<String>>,
}

impl ExclusiveDownloader {
    pub fn new(config: DownloadConfig) -> Result<Self> {
        Ok(Self {
            manager: DownloadManager::new(config)?,
            current: tokio::sync::Mutex::new(None),
        })
    }

    pub fn with_sink(config: DownloadConfig, sink: Arc<dyn FileSink>) -> Result<Self> {
        Ok(Self {
            manager: DownloadManager::with_sink(config, sink)?,
            current: tokio::sync::Mutex::new(None),
        })
    }

    /// The underlying manager, for progress subscription.
    pub fn manager(&self) -> &DownloadManager {
        &self.manager
    }

    /// Start a download, aborting the previous session if one is live.
    pub async fn start_download(
        &self,
        descriptor: &SourceDescriptor,
        title: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            self.manager.cancel(&previous).await;
        }

        let session_id = self
            .manager
            .start_download(descriptor, title, on_progress)
            .await?;
        *current = Some(session_id.clone());
        Ok(session_id)
    }

    /// Like [`DownloadManager::start_download_from`], aborting the previous
    /// session first.
    pub async fn start_download_from(
        &self,
        source: Box<dyn ChunkSource + Send>,
        file_name: String,
        title: &str,
        on_progress: Option<ProgressCallback>,
    ) -> Result<String> {
        let mut current = self.current.lock().await;
        if let Some(previous) = current.take() {
            self.manager.cancel(&previous).await;
        }

        let session_id = self
            .manager
            .start_download_from(source, file_name, title, on_progress)
            .await?;
        *current = Some(session_id.clone());
        Ok(session_id)
    }

    pub async fn pause(&self) -> Result<()> {
        let current = self.current.lock().await;
        match current.as_deref() {
            Some(id) => self.manager.pause(id).await,
            None => Err(ReelError::InvalidState("no active download".to_string())),
        }
    }

    pub async fn resume(&self) -> Result<()> {
        let current = self.current.lock().await;
        match current.as_deref() {
            Some(id) => self.manager.resume(id).await,
            None => Err(ReelError::InvalidState("no active download".to_string())),
        }
    }

    /// Cancel the active download, if any.
    pub async fn cancel(&self) {
        let mut current = self.current.lock().await;
        if let Some(id) = current.take() {
            self.manager.cancel(&id).await;
        }
    }

    /// Identifier of the active session, if one is live.
    pub async fn current_session(&self) -> Option<String> {
        self.current.lock().await.clone()
    }
}
