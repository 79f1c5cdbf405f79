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


//! HTTP client for the source and subtitle providers
//!
//! Thin wrapper over `reqwest` that fetches the list of downloadable sources
//! and the list of subtitles for a movie, identified by its TMDB id. Responses
//! are cached in memory for a bounded time so that re-rendering a page does
//! not hammer the providers; the cache holds lists only, never file bytes.

use crate::api::models::{SourceDescriptor, SourceListResponse, SubtitleDescriptor};
use crate::error::{ReelError, Result};
use bytes::Bytes;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Default time-to-live for cached provider responses (30 minutes)
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(1800);

/// Default request timeout for provider calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for [`ProviderClient`]
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Base URL of the sources provider, e.g. `https://sources.example`
    pub sources_base_url: String,
    /// Base URL of the subtitles provider
    pub subtitles_base_url: String,
    /// Request timeout for list fetches
    pub timeout: Duration,
    /// User agent sent with every provider request
    pub user_agent: String,
    /// How long fetched lists stay fresh
    pub cache_ttl: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            sources_base_url: String::new(),
            subtitles_base_url: String::new(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("reelgrab/{}", env!("CARGO_PKG_VERSION")),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// A cached provider response with its fetch timestamp
struct CacheEntry<T> {
    fetched_at: Instant,
    value: T,
}

impl<T: Clone> CacheEntry<T> {
    fn new(value: T, now: Instant) -> Self {
        Self {
            fetched_at: now,
            value,
        }
    }

    fn fresh_value(&self, ttl: Duration, now: Instant) -> Option<T> {
        if now.duration_since(self.fetched_at) < ttl {
            Some(self.value.clone())
        } else {
            None
        }
    }
}

/// Client for the source and subtitle providers
pub struct ProviderClient {
    http: reqwest::Client,
    config: ProviderConfig,
    sources_cache: Mutex<HashMap<u64, CacheEntry<Vec<SourceDescriptor>>>>,
    subtitles_cache: Mutex<HashMap<u64, CacheEntry<Vec<SubtitleDescriptor>>>>,
}

impl ProviderClient {
    /// Create a new provider client
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            config,
            sources_cache: Mutex::new(HashMap::new()),
            subtitles_cache: Mutex::new(HashMap::new()),
        })
    }

    /// Fetch the downloadable sources for a movie.
    ///
    /// Returns the provider's full list; callers filter with
    /// [`downloadable_sources`](crate::api::models::downloadable_sources)
    /// before offering a download.
    pub async fn movie_sources(&self, tmdb_id: u64) -> Result<Vec<SourceDescriptor>> {
        let now = Instant::now();
        {
            let cache = self.sources_cache.lock().await;
            if let Some(entry) = cache.get(&tmdb_id) {
                if let Some(sources) = entry.fresh_value(self.config.cache_ttl, now) {
                    debug!(tmdb_id, "source list served from cache");
                    return Ok(sources);
                }
            }
        }

        let endpoint = format!("{}/movie/{}", self.config.sources_base_url, tmdb_id);
        let response = self.get_checked(&endpoint).await?;
        let list: SourceListResponse = response
            .json()
            .await
            .map_err(|e| ReelError::InvalidProviderResponse(e.to_string()))?;

        debug!(
            tmdb_id,
            provider = %list.provider_name,
            count = list.sources.len(),
            "fetched source list"
        );

        let mut cache = self.sources_cache.lock().await;
        cache.insert(tmdb_id, CacheEntry::new(list.sources.clone(), now));
        Ok(list.sources)
    }

    /// Fetch the available subtitles for a movie.
    pub async fn movie_subtitles(&self, tmdb_id: u64) -> Result<Vec<SubtitleDescriptor>> {
        let now = Instant::now();
        {
            let cache = self.subtitles_cache.lock().await;
            if let Some(entry) = cache.get(&tmdb_id) {
                if let Some(subs) = entry.fresh_value(self.config.cache_ttl, now) {
                    debug!(tmdb_id, "subtitle list served from cache");
                    return Ok(subs);
                }
            }
        }

        let endpoint = format!("{}/search?id={}", self.config.subtitles_base_url, tmdb_id);
        let response = self.get_checked(&endpoint).await?;
        let subs: Vec<SubtitleDescriptor> = response
            .json()
            .await
            .map_err(|e| ReelError::InvalidProviderResponse(e.to_string()))?;

        let mut cache = self.subtitles_cache.lock().await;
        cache.insert(tmdb_id, CacheEntry::new(subs.clone(), now));
        Ok(subs)
    }

    /// Fetch an entire response body at once. Used for subtitle files, which
    /// are small enough that chunked progress tracking would be noise.
    pub async fn fetch_body(&self, url: &str) -> Result<Bytes> {
        let response = self.get_checked(url).await?;
        response
            .bytes()
            .await
            .map_err(|e| ReelError::network(e.to_string()))
    }

    /// GET a URL, turning non-success statuses into provider errors.
    async fn get_checked(&self, url: &str) -> Result<reqwest::Response> {
        let response = self.http.get(url).send().await.map_err(|e| {
            warn!(url, error = %e, "provider request failed");
            ReelError::provider_failed(e.to_string(), None, Some(url.to_string()))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ReelError::provider_failed(
                format!("unexpected status {}", status),
                Some(status.as_u16()),
                Some(url.to_string()),
            ));
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_entry_freshness() {
        let fetched = Instant::now();
        let entry = CacheEntry::new(vec![1u8, 2, 3], fetched);
        let ttl = Duration::from_secs(1800);

        // Within the TTL the value is served
        let just_after = fetched + Duration::from_secs(1799);
        assert_eq!(entry.fresh_value(ttl, just_after), Some(vec![1, 2, 3]));

        // At or past the TTL the entry is stale
        let expired = fetched + Duration::from_secs(1800);
        assert_eq!(entry.fresh_value(ttl, expired), None);
    }

    #[test]
    fn test_default_config() {
        let config = ProviderConfig::default();
        assert_eq!(config.cache_ttl, Duration::from_secs(1800));
        assert!(config.user_agent.starts_with("reelgrab/"));
    }
}
