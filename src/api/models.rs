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


//! Provider data model
//!
//! Descriptors for downloadable movie sources and subtitles, matching the
//! camelCase JSON the providers emit. Descriptors are immutable once fetched;
//! the download layer only ever reads them.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Container/transport of a source rendition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    /// HLS playlist; requires segment stitching, not directly downloadable
    Hls,
    /// Plain MP4 file served over HTTP
    Mp4,
}

impl MediaType {
    /// File extension used when naming the finished download
    pub fn extension(&self) -> &'static str {
        match self {
            MediaType::Hls => "m3u8",
            MediaType::Mp4 => "mp4",
        }
    }
}

/// Subtitle file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Vtt,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Vtt => "vtt",
        }
    }
}

/// One downloadable rendition of a movie
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Container/transport of this rendition
    #[serde(rename = "type")]
    pub media_type: MediaType,

    /// HTTP endpoint streaming the file's bytes
    pub url: String,

    /// Audio language label used for grouping ("English", "Hindi", ...)
    #[serde(default)]
    pub dub: String,

    /// Vertical resolution (720, 1080, ...)
    pub quality: u32,

    /// Expected file size in bytes; 0 if the provider doesn't know
    #[serde(default)]
    pub size_bytes: u64,

    /// Request headers the endpoint requires echoed back, if any
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Provider response wrapping the source list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceListResponse {
    pub tmdb_id: u64,
    #[serde(default)]
    pub provider_name: String,
    #[serde(default)]
    pub took_ms: u64,
    pub sources: Vec<SourceDescriptor>,
}

/// One subtitle file for a movie
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleDescriptor {
    /// HTTP endpoint serving the subtitle file
    pub url: String,

    /// Human-readable language name for display ("English", "Français")
    #[serde(default)]
    pub display: String,

    /// ISO language code ("en", "fr")
    #[serde(default)]
    pub language: String,

    /// File format of the subtitle
    pub format: SubtitleFormat,

    #[serde(default)]
    pub is_hearing_impaired: bool,
}

impl SubtitleDescriptor {
    /// Label to show the user: display name if present, else the language code
    pub fn label(&self) -> &str {
        if self.display.is_empty() {
            &self.language
        } else {
            &self.display
        }
    }
}

/// Keep only sources the download manager can handle directly.
///
/// HLS renditions need playlist parsing and segment stitching, which is out of
/// scope; only plain MP4 endpoints are downloadable.
pub fn downloadable_sources(sources: Vec<SourceDescriptor>) -> Vec<SourceDescriptor> {
    sources
        .into_iter()
        .filter(|s| s.media_type == MediaType::Mp4)
        .collect()
}

/// Group sources by their audio-language label, preserving provider order
/// within each group. Used by UI layers that render one section per dub.
pub fn group_by_dub(sources: &[SourceDescriptor]) -> Vec<(String, Vec<SourceDescriptor>)> {
    let mut groups: Vec<(String, Vec<SourceDescriptor>)> = Vec::new();
    for src in sources {
        match groups.iter_mut().find(|(dub, _)| *dub == src.dub) {
            Some((_, list)) => list.push(src.clone()),
            None => groups.push((src.dub.clone(), vec![src.clone()])),
        }
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_source(dub: &str, quality: u32, media_type: MediaType) -> SourceDescriptor {
        SourceDescriptor {
            media_type,
            url: format!("https://cdn.example/{}/{}", dub, quality),
            dub: dub.to_string(),
            quality,
            size_bytes: 1_000_000,
            headers: HashMap::new(),
        }
    }

    #[test]
    fn test_parse_provider_response() {
        let json = r#"{
            "type": "movie",
            "tmdbId": 603,
            "providerName": "moviebox",
            "tookMs": 412,
            "sources": [
                {
                    "type": "mp4",
                    "url": "https://cdn.example/matrix-1080.mp4",
                    "dub": "English",
                    "quality": 1080,
                    "sizeBytes": 2147483648,
                    "headers": { "Referer": "https://cdn.example/" }
                },
                {
                    "type": "hls",
                    "url": "https://cdn.example/matrix.m3u8",
                    "dub": "English",
                    "quality": 720
                }
            ]
        }"#;

        let response: SourceListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.tmdb_id, 603);
        assert_eq!(response.sources.len(), 2);

        let mp4 = &response.sources[0];
        assert_eq!(mp4.media_type, MediaType::Mp4);
        assert_eq!(mp4.quality, 1080);
        assert_eq!(mp4.size_bytes, 2_147_483_648);
        assert_eq!(mp4.headers.get("Referer").unwrap(), "https://cdn.example/");

        // Missing sizeBytes/headers default to empty
        let hls = &response.sources[1];
        assert_eq!(hls.media_type, MediaType::Hls);
        assert_eq!(hls.size_bytes, 0);
        assert!(hls.headers.is_empty());
    }

    #[test]
    fn test_parse_subtitle() {
        let json = r#"{
            "url": "https://subs.example/603-en.srt",
            "display": "English",
            "language": "en",
            "format": "srt",
            "isHearingImpaired": false
        }"#;

        let sub: SubtitleDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(sub.format, SubtitleFormat::Srt);
        assert_eq!(sub.label(), "English");
    }

    #[test]
    fn test_downloadable_sources_drops_hls() {
        let sources = vec![
            sample_source("English", 1080, MediaType::Mp4),
            sample_source("English", 720, MediaType::Hls),
            sample_source("Hindi", 480, MediaType::Mp4),
        ];

        let downloadable = downloadable_sources(sources);
        assert_eq!(downloadable.len(), 2);
        assert!(downloadable.iter().all(|s| s.media_type == MediaType::Mp4));
    }

    #[test]
    fn test_group_by_dub_preserves_order() {
        let sources = vec![
            sample_source("English", 1080, MediaType::Mp4),
            sample_source("Hindi", 1080, MediaType::Mp4),
            sample_source("English", 720, MediaType::Mp4),
        ];

        let groups = group_by_dub(&sources);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "English");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[0].1[1].quality, 720);
        assert_eq!(groups[1].0, "Hindi");
    }
}
