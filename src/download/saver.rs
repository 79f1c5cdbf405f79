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


//! Completion handling
//!
//! Assembles a completed session's ordered chunks into a single binary
//! object, derives a file name from title/quality/format, and hands the
//! result to a [`FileSink`]. The crate ships [`DiskSink`]; embedders supply
//! their own sink when the bytes should go somewhere else (share sheet,
//! media store, test buffer).
//!
//! Subtitles go through [`download_subtitle`], a one-shot variant with no
//! progress tracking; the files are small enough that chunked reporting
//! would be noise.

use crate::api::client::ProviderClient;
use crate::api::models::{MediaType, SubtitleDescriptor};
use crate::error::{ReelError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::path::{Path, PathBuf};
use tracing::info;

/// A finished download ready to be persisted
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    /// Derived file name, already sanitized
    pub file_name: String,

    /// The assembled file contents
    pub data: Bytes,
}

/// Destination for finished downloads
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Persist the file, returning where it ended up.
    async fn save(&self, file: DownloadedFile) -> Result<PathBuf>;
}

/// Sink that writes finished downloads into a directory
pub struct DiskSink {
    directory: PathBuf,
}

impl DiskSink {
    /// Create a sink writing into `directory`, which must already exist.
    pub fn new(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        if !directory.is_dir() {
            return Err(ReelError::InvalidPath(format!(
                "not a directory: {}",
                directory.display()
            )));
        }
        Ok(Self { directory })
    }

    /// Avoid filename collisions by appending (1), (2), etc.
    fn avoid_collision(path: PathBuf) -> PathBuf {
        if !path.exists() {
            return path;
        }

        let parent = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("download")
            .to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_string();

        for i in 1..1000 {
            let candidate = if extension.is_empty() {
                parent.join(format!("{} ({})", stem, i))
            } else {
                parent.join(format!("{} ({}).{}", stem, i, extension))
            };
            if !candidate.exists() {
                return candidate;
            }
        }

        path
    }
}

#[async_trait]
impl FileSink for DiskSink {
    async fn save(&self, file: DownloadedFile) -> Result<PathBuf> {
        let path = Self::avoid_collision(self.directory.join(&file.file_name));
        tokio::fs::write(&path, &file.data).await?;
        info!(path = %path.display(), bytes = file.data.len(), "saved download");
        Ok(path)
    }
}

/// Concatenate ordered chunks into a single buffer.
///
/// The single-chunk case hands the buffer through without copying.
pub fn assemble(chunks: Vec<Bytes>) -> Bytes {
    match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.into_iter().next().unwrap(),
        _ => {
            let total: usize = chunks.iter().map(Bytes::len).sum();
            let mut buf = BytesMut::with_capacity(total);
            for chunk in chunks {
                buf.extend_from_slice(&chunk);
            }
            buf.freeze()
        }
    }
}

/// Sanitize a file name by replacing characters invalid on common filesystems
pub fn sanitize_file_name(name: &str) -> String {
    const INVALID: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    name.chars()
        .map(|c| if INVALID.contains(&c) { '_' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Derive the file name for a finished media download: `{title}-{quality}P.{ext}`
pub fn media_file_name(title: &str, quality: u32, media_type: MediaType) -> String {
    format!(
        "{}-{}P.{}",
        sanitize_file_name(title),
        quality,
        media_type.extension()
    )
}

/// Derive the file name for a subtitle: `{title}-{label}.{ext}`
pub fn subtitle_file_name(title: &str, subtitle: &SubtitleDescriptor) -> String {
    format!(
        "{}-{}.{}",
        sanitize_file_name(title),
        sanitize_file_name(subtitle.label()),
        subtitle.format.extension()
    )
}

/// Download a subtitle in one shot and hand it to the sink.
pub async fn download_subtitle(
    client: &ProviderClient,
    subtitle: &SubtitleDescriptor,
    title: &str,
    sink: &dyn FileSink,
) -> Result<PathBuf> {
    let data = client.fetch_body(&subtitle.url).await?;
    let file = DownloadedFile {
        file_name: subtitle_file_name(title, subtitle),
        data,
    };
    sink.save(file).await
}
