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


//! ReelGrab core: browse a movie's downloadable sources and subtitles, then
//! download a chosen source with live progress, pause/resume and cancel.
//!
//! The [`api`] module talks to the source and subtitle providers; the
//! [`download`] module owns the transfer sessions. Progress reaches the
//! embedding UI exclusively as structured [`download::ProgressSnapshot`]
//! values; the core never touches UI state.

pub mod api;
pub mod download;
pub mod error;

pub use api::{ProviderClient, ProviderConfig, SourceDescriptor, SubtitleDescriptor};
pub use download::{DownloadConfig, DownloadManager, ExclusiveDownloader, ProgressSnapshot};
pub use error::{ReelError, Result, TransferKind};
