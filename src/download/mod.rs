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


//! Download management and streaming
//!
//! This module drives chunked HTTP downloads of movie sources: a cancellable
//! byte-stream reader, a progress tracker with rolling speed/ETA, a
//! per-session state machine with pause/resume, and completion handling that
//! assembles the received bytes into a finished file.

mod controller;

pub mod manager;
pub mod progress;
pub mod saver;
pub mod stream;

// Re-export commonly used types
pub use manager::{DownloadConfig, DownloadManager, ExclusiveDownloader, SessionInfo};
pub use progress::{ProgressCallback, ProgressSnapshot, TransferState};
pub use saver::{download_subtitle, DiskSink, DownloadedFile, FileSink};
pub use stream::ChunkSource;
