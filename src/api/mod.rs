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


//! Provider boundary
//!
//! Fetches the lists of downloadable sources and subtitles that the download
//! layer consumes. The providers themselves are external collaborators; this
//! module only speaks their JSON and keeps a bounded-time cache.

pub mod client;
pub mod models;

// Re-export commonly used types
pub use client::{ProviderClient, ProviderConfig};
pub use models::{MediaType, SourceDescriptor, SubtitleDescriptor, SubtitleFormat};
