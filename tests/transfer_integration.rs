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


//! Integration tests for the transfer state machine
//!
//! The download manager is exercised through `start_download_from` with
//! scripted chunk sources, so every lifecycle path (complete, fail, cancel,
//! pause/resume, concurrent sessions) runs without a network. One live-URL
//! test at the bottom is `#[ignore]`d for manual runs.

use async_trait::async_trait;
use bytes::Bytes;
use reelgrab::download::{
    ChunkSource, DownloadConfig, DownloadManager, DownloadedFile, ExclusiveDownloader, FileSink,
    ProgressSnapshot, TransferState,
};
use reelgrab::error::{ReelError, Result, TransferKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

// ============================================================================
// Test doubles
// ============================================================================

/// Chunk source that replays a fixed script of chunks and errors.
struct ScriptedSource {
    steps: std::collections::VecDeque<Result<Option<Bytes>>>,
    total_bytes: u64,
}

impl ScriptedSource {
    fn new(steps: Vec<Result<Option<Bytes>>>, total_bytes: u64) -> Self {
        Self {
            steps: steps.into(),
            total_bytes,
        }
    }

    /// A source that delivers the given chunks then ends cleanly.
    fn completing(chunks: &[&'static [u8]]) -> Self {
        let total: u64 = chunks.iter().map(|c| c.len() as u64).sum();
        let steps = chunks
            .iter()
            .map(|c| Ok(Some(Bytes::from_static(c))))
            .collect();
        Self::new(steps, total)
    }
}

#[async_trait]
impl ChunkSource for ScriptedSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        self.steps.pop_front().unwrap_or(Ok(None))
    }

    fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// Chunk source fed through a channel, counting every chunk it delivers.
/// Dropping the sender ends the stream.
struct GatedSource {
    rx: mpsc::UnboundedReceiver<Bytes>,
    delivered: Arc<AtomicU64>,
    total_bytes: u64,
}

impl GatedSource {
    fn new(total_bytes: u64) -> (Self, mpsc::UnboundedSender<Bytes>, Arc<AtomicU64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let delivered = Arc::new(AtomicU64::new(0));
        (
            Self {
                rx,
                delivered: Arc::clone(&delivered),
                total_bytes,
            },
            tx,
            delivered,
        )
    }
}

#[async_trait]
impl ChunkSource for GatedSource {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        match self.rx.recv().await {
            Some(chunk) => {
                self.delivered.fetch_add(1, Ordering::SeqCst);
                Ok(Some(chunk))
            }
            None => Ok(None),
        }
    }

    fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}

/// Sink that keeps finished files in memory.
struct CollectSink {
    files: Arc<Mutex<Vec<DownloadedFile>>>,
}

#[async_trait]
impl FileSink for CollectSink {
    async fn save(&self, file: DownloadedFile) -> Result<PathBuf> {
        let path = PathBuf::from(&file.file_name);
        self.files.lock().unwrap().push(file);
        Ok(path)
    }
}

fn collect_manager(max_concurrent: usize) -> (DownloadManager, Arc<Mutex<Vec<DownloadedFile>>>) {
    let files = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(CollectSink {
        files: Arc::clone(&files),
    });
    let config = DownloadConfig {
        max_concurrent_downloads: max_concurrent,
        ..Default::default()
    };
    let manager = DownloadManager::with_sink(config, sink).unwrap();
    (manager, files)
}

/// Wait until a session snapshot satisfies the predicate.
async fn wait_for(
    rx: &mut watch::Receiver<ProgressSnapshot>,
    pred: impl Fn(&ProgressSnapshot) -> bool,
) -> ProgressSnapshot {
    let result = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if pred(&snapshot) {
                    return snapshot.clone();
                }
            }
            if rx.changed().await.is_err() {
                return rx.borrow().clone();
            }
        }
    })
    .await
    .expect("timed out waiting for snapshot condition");

    assert!(pred(&result), "watch closed before condition; last: {result:?}");
    result
}

async fn wait_until_empty(manager: &DownloadManager) {
    tokio::time::timeout(Duration::from_secs(10), async {
        while manager.active_count().await > 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("sessions never left the registry");
}

// ============================================================================
// Lifecycle tests
// ============================================================================

#[tokio::test]
async fn download_completes_and_counts_all_bytes() {
    let (manager, files) = collect_manager(3);
    let source = ScriptedSource::completing(&[b"aaaa", b"bbb", b"cc"]);

    let id = manager
        .start_download_from(Box::new(source), "movie-720P.mp4".into(), "Movie", None)
        .await
        .unwrap();
    let mut rx = manager.subscribe(&id).await.unwrap();

    let last = wait_for(&mut rx, |s| s.state.is_terminal()).await;
    assert_eq!(last.state, TransferState::Completed);
    assert_eq!(last.received_bytes, 9);
    assert_eq!(last.percent, Some(100.0));

    let files = files.lock().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "movie-720P.mp4");
    assert_eq!(files[0].data.as_ref(), b"aaaabbbcc");
}

#[tokio::test]
async fn session_leaves_registry_after_completion() {
    let (manager, _files) = collect_manager(3);
    let source = ScriptedSource::completing(&[b"data"]);

    let id = manager
        .start_download_from(Box::new(source), "m-480P.mp4".into(), "M", None)
        .await
        .unwrap();
    let mut rx = manager.subscribe(&id).await.unwrap();
    wait_for(&mut rx, |s| s.state.is_terminal()).await;

    wait_until_empty(&manager).await;
    assert!(manager.progress(&id).await.is_none());
}

#[tokio::test]
async fn mid_stream_network_error_fails_session() {
    let (manager, files) = collect_manager(3);
    let source = ScriptedSource::new(
        vec![
            Ok(Some(Bytes::from_static(b"partial"))),
            Err(ReelError::network("connection reset")),
        ],
        1000,
    );

    let id = manager
        .start_download_from(Box::new(source), "m-1080P.mp4".into(), "M", None)
        .await
        .unwrap();
    let mut rx = manager.subscribe(&id).await.unwrap();

    let last = wait_for(&mut rx, |s| s.state.is_terminal()).await;
    assert_eq!(last.state, TransferState::Failed);
    assert_eq!(last.error_kind, Some(TransferKind::Network));
    assert!(last.error_message.unwrap().contains("connection reset"));

    // Partial bytes are discarded, never saved
    assert!(files.lock().unwrap().is_empty());
}

#[tokio::test]
async fn http_404_fails_before_any_chunk() {
    let (manager, files) = collect_manager(3);
    let source = ScriptedSource::new(vec![Err(ReelError::HttpStatus { code: 404 })], 0);

    let id = manager
        .start_download_from(Box::new(source), "m-1080P.mp4".into(), "M", None)
        .await
        .unwrap();
    let mut rx = manager.subscribe(&id).await.unwrap();

    let last = wait_for(&mut rx, |s| s.state.is_terminal()).await;
    assert_eq!(last.state, TransferState::Failed);
    assert_eq!(last.error_kind, Some(TransferKind::HttpStatus));
    assert!(last.error_message.unwrap().contains("404"));
    assert_eq!(last.received_bytes, 0);
    assert!(files.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancel_discards_buffer_and_is_idempotent() {
    let (manager, files) = collect_manager(3);
    let (source, tx, delivered) = GatedSource::new(100);

    let id = manager
        .start_download_from(Box::new(source), "m-720P.mp4".into(), "M", None)
        .await
        .unwrap();
    let mut rx = manager.subscribe(&id).await.unwrap();

    tx.send(Bytes::from_static(b"12345")).unwrap();
    tx.send(Bytes::from_static(b"67")).unwrap();
    wait_for(&mut rx, |s| s.received_bytes >= 7).await;

    manager.cancel(&id).await;
    let last = wait_for(&mut rx, |s| s.state.is_terminal()).await;
    assert_eq!(last.state, TransferState::Cancelled);
    assert!(last.error_kind.is_none());
    assert!(last.error_message.is_none());

    // Second cancel is a no-op, whether or not the session is still registered
    manager.cancel(&id).await;

    // Chunks offered after cancellation are never consumed or counted
    let _ = tx.send(Bytes::from_static(b"late"));
    wait_until_empty(&manager).await;
    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    assert_eq!(rx.borrow().received_bytes, 7);
    assert_eq!(rx.borrow().state, TransferState::Cancelled);

    assert!(files.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pause_stops_consumption_and_resume_continues() {
    let (manager, files) = collect_manager(3);
    let (source, tx, delivered) = GatedSource::new(12);

    let id = manager
        .start_download_from(Box::new(source), "m-1080P.mp4".into(), "M", None)
        .await
        .unwrap();
    let mut rx = manager.subscribe(&id).await.unwrap();

    tx.send(Bytes::from_static(b"11111")).unwrap();
    tx.send(Bytes::from_static(b"2222")).unwrap();
    wait_for(&mut rx, |s| s.received_bytes >= 9).await;

    manager.pause(&id).await.unwrap();
    wait_for(&mut rx, |s| s.state == TransferState::Paused).await;

    // Bytes become available during the pause window but must not be consumed
    tx.send(Bytes::from_static(b"333")).unwrap();
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(delivered.load(Ordering::SeqCst), 2);
    {
        let snapshot = rx.borrow();
        assert_eq!(snapshot.state, TransferState::Paused);
        assert_eq!(snapshot.received_bytes, 9);
    }

    // Resume picks up the same stream: no bytes duplicated, none skipped
    manager.resume(&id).await.unwrap();
    wait_for(&mut rx, |s| s.received_bytes >= 12).await;

    drop(tx);
    let last = wait_for(&mut rx, |s| s.state.is_terminal()).await;
    assert_eq!(last.state, TransferState::Completed);
    assert_eq!(last.received_bytes, 12);

    let files = files.lock().unwrap();
    assert_eq!(files[0].data.as_ref(), b"111112222333");
}

#[tokio::test]
async fn concurrent_sessions_are_independent() {
    let (manager, files) = collect_manager(3);
    let (source_a, tx_a, _) = GatedSource::new(0);
    let (source_b, tx_b, _) = GatedSource::new(0);

    let id_a = manager
        .start_download_from(Box::new(source_a), "a-720P.mp4".into(), "A", None)
        .await
        .unwrap();
    let id_b = manager
        .start_download_from(Box::new(source_b), "b-720P.mp4".into(), "B", None)
        .await
        .unwrap();
    assert_eq!(manager.active_count().await, 2);

    let mut rx_a = manager.subscribe(&id_a).await.unwrap();
    let mut rx_b = manager.subscribe(&id_b).await.unwrap();

    tx_a.send(Bytes::from_static(b"aa")).unwrap();
    tx_b.send(Bytes::from_static(b"bbbb")).unwrap();
    wait_for(&mut rx_a, |s| s.received_bytes >= 2).await;
    wait_for(&mut rx_b, |s| s.received_bytes >= 4).await;

    // Cancelling A must not disturb B
    manager.cancel(&id_a).await;
    let last_a = wait_for(&mut rx_a, |s| s.state.is_terminal()).await;
    assert_eq!(last_a.state, TransferState::Cancelled);

    tx_b.send(Bytes::from_static(b"bb")).unwrap();
    drop(tx_b);
    let last_b = wait_for(&mut rx_b, |s| s.state.is_terminal()).await;
    assert_eq!(last_b.state, TransferState::Completed);
    assert_eq!(last_b.received_bytes, 6);

    let files = files.lock().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "b-720P.mp4");
}

#[tokio::test]
async fn exclusive_variant_aborts_prior_session() {
    let files = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::new(CollectSink {
        files: Arc::clone(&files),
    });
    let downloader = ExclusiveDownloader::with_sink(DownloadConfig::default(), sink).unwrap();

    let (source_one, tx_one, _) = GatedSource::new(0);
    let id_one = downloader
        .start_download_from(Box::new(source_one), "one-720P.mp4".into(), "One", None)
        .await
        .unwrap();
    let mut rx_one = downloader.manager().subscribe(&id_one).await.unwrap();

    tx_one.send(Bytes::from_static(b"x")).unwrap();
    wait_for(&mut rx_one, |s| s.received_bytes >= 1).await;

    // Starting a second download aborts the first
    let source_two = ScriptedSource::completing(&[b"done"]);
    let id_two = downloader
        .start_download_from(Box::new(source_two), "two-720P.mp4".into(), "Two", None)
        .await
        .unwrap();
    let mut rx_two = downloader.manager().subscribe(&id_two).await.unwrap();

    let last_one = wait_for(&mut rx_one, |s| s.state.is_terminal()).await;
    assert_eq!(last_one.state, TransferState::Cancelled);

    let last_two = wait_for(&mut rx_two, |s| s.state.is_terminal()).await;
    assert_eq!(last_two.state, TransferState::Completed);

    assert_eq!(downloader.current_session().await, Some(id_two));
    let files = files.lock().unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name, "two-720P.mp4");
}

#[tokio::test]
async fn snapshots_observe_ordered_monotone_progress() {
    let (manager, _files) = collect_manager(3);
    let source = ScriptedSource::completing(&[b"1111", b"222", b"33", b"4"]);

    let seen: Arc<Mutex<Vec<ProgressSnapshot>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_cb = Arc::clone(&seen);
    let callback: reelgrab::download::ProgressCallback = Arc::new(move |snapshot| {
        seen_cb.lock().unwrap().push(snapshot);
    });

    let id = manager
        .start_download_from(
            Box::new(source),
            "m-720P.mp4".into(),
            "M",
            Some(callback),
        )
        .await
        .unwrap();
    let mut rx = manager.subscribe(&id).await.unwrap();
    wait_for(&mut rx, |s| s.state.is_terminal()).await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.first().unwrap().state, TransferState::Downloading);
    assert_eq!(seen.last().unwrap().state, TransferState::Completed);

    // Byte counts and percent never move backwards, percent stays in bounds
    let mut last_bytes = 0;
    let mut last_percent = 0.0;
    for snapshot in seen.iter() {
        assert!(snapshot.received_bytes >= last_bytes);
        let percent = snapshot.percent.expect("total size is known");
        assert!(percent >= last_percent);
        assert!((0.0..=100.0).contains(&percent));
        last_bytes = snapshot.received_bytes;
        last_percent = percent;
    }
    assert_eq!(last_bytes, 10);
    assert_eq!(last_percent, 100.0);
}

// ============================================================================
// Live network test (manual)
// ============================================================================

/// Run with: cargo test --test transfer_integration -- --ignored --nocapture
#[tokio::test]
#[ignore]
async fn live_download_public_file() -> std::result::Result<(), Box<dyn std::error::Error>> {
    use reelgrab::api::models::{MediaType, SourceDescriptor};

    println!("\n=== Live download through the manager ===\n");

    let temp_dir = tempfile::tempdir()?;
    let manager = DownloadManager::new(DownloadConfig {
        output_directory: temp_dir.path().to_path_buf(),
        ..Default::default()
    })?;

    let descriptor = SourceDescriptor {
        media_type: MediaType::Mp4,
        url: "https://www.gutenberg.org/cache/epub/10/pg10.txt".to_string(),
        dub: "English".to_string(),
        quality: 480,
        size_bytes: 0,
        headers: Default::default(),
    };

    let id = manager.start_download(&descriptor, "Test File", None).await?;
    let mut rx = manager.subscribe(&id).await.unwrap();

    let last = wait_for(&mut rx, |s| s.state.is_terminal()).await;
    println!("final: {}", last.display_string());

    assert_eq!(last.state, TransferState::Completed);
    assert!(last.received_bytes > 0);

    let saved = std::fs::read_dir(temp_dir.path())?.count();
    assert_eq!(saved, 1);
    println!("\n=== Live download finished ===\n");
    Ok(())
}
