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


//! Byte-stream reader
//!
//! Wraps a cancellable streamed HTTP GET behind the [`ChunkSource`] pull
//! interface: a lazy, finite, non-restartable sequence of byte chunks whose
//! sizes are decided by the transport. The cancellation token is honored at
//! every pull boundary, and dropping the source closes the connection.
//!
//! The controller only ever sees `ChunkSource`, so tests drive the state
//! machine with scripted sources instead of a live server.

use crate::error::{ReelError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::StatusCode;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Pull interface over an in-flight byte transfer.
///
/// Each pull either yields the next chunk, signals end-of-stream with
/// `Ok(None)`, or fails. A source is never restartable: after an error or
/// end-of-stream, further pulls are undefined.
///
/// `next_chunk` must be cancel-safe: the controller races each pull against
/// pause and cancellation, and dropping the in-flight future must not lose a
/// chunk.
#[async_trait]
pub trait ChunkSource: Send {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>>;

    /// Total size of the transfer in bytes, 0 when unknown.
    fn total_bytes(&self) -> u64;
}

/// Map a response status to the transfer error taxonomy.
pub(crate) fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(ReelError::HttpStatus {
            code: status.as_u16(),
        })
    }
}

/// Resolve the session's total byte count: prefer a server-declared content
/// length when present and positive, else fall back to the caller-supplied
/// expected size, else 0, meaning unknown (progress percentage becomes indeterminate).
pub(crate) fn resolve_total_bytes(content_length: Option<u64>, expected: u64) -> u64 {
    match content_length {
        Some(len) if len > 0 => len,
        _ => expected,
    }
}

/// Streamed HTTP GET implementing [`ChunkSource`]
pub struct HttpByteStream {
    stream: BoxStream<'static, reqwest::Result<Bytes>>,
    token: CancellationToken,
    total_bytes: u64,
}

impl HttpByteStream {
    /// Open a streamed GET against `url`, echoing `headers` into the request.
    ///
    /// Fails with `HttpStatus` on a non-success response, `NoBody` when the
    /// server declares a zero-length body, and `Cancelled` when the token is
    /// triggered while the request is in flight.
    pub async fn open(
        client: &reqwest::Client,
        url: &str,
        headers: &HashMap<String, String>,
        expected_size: u64,
        token: CancellationToken,
    ) -> Result<Self> {
        url::Url::parse(url).map_err(|e| ReelError::InvalidDownloadUrl(e.to_string()))?;

        let mut request = client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        let response = tokio::select! {
            _ = token.cancelled() => return Err(ReelError::Cancelled),
            result = request.send() => {
                result.map_err(|e| ReelError::network(e.to_string()))?
            }
        };

        check_status(response.status())?;

        let content_length = response.content_length();
        if content_length == Some(0) {
            return Err(ReelError::NoBody);
        }

        let total_bytes = resolve_total_bytes(content_length, expected_size);
        debug!(url, total_bytes, "opened byte stream");

        Ok(Self {
            stream: response.bytes_stream().boxed(),
            token,
            total_bytes,
        })
    }
}

#[async_trait]
impl ChunkSource for HttpByteStream {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>> {
        if self.token.is_cancelled() {
            return Err(ReelError::Cancelled);
        }

        tokio::select! {
            _ = self.token.cancelled() => Err(ReelError::Cancelled),
            item = self.stream.next() => match item {
                None => Ok(None),
                Some(Ok(chunk)) => Ok(Some(chunk)),
                Some(Err(e)) => Err(ReelError::network(e.to_string())),
            },
        }
    }

    fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
