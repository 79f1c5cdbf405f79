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


//! Error types for ReelGrab
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are categorized by domain (provider API, transfer, session registry,
//! file handling) for better error handling and reporting.
//!
//! Transfer errors carry a [`TransferKind`] so the UI layer can distinguish a
//! user-initiated cancellation (dismissed silently) from a genuine failure
//! (surfaced with an error indicator).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our ReelError type
pub type Result<T> = std::result::Result<T, ReelError>;

/// Coarse classification of a transfer failure, surfaced to the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    /// Connection, DNS or transport failure
    Network,
    /// Server answered with a non-success HTTP status
    HttpStatus,
    /// User-initiated cancellation; not an error for display purposes
    Cancelled,
    /// Server responded without a streamable body
    NoBody,
    /// Anything else
    Unknown,
}

/// Main error type for ReelGrab
#[derive(Error, Debug)]
pub enum ReelError {
    // ===== Provider API Errors =====

    /// Sources/subtitles provider request failed
    #[error("Provider request failed: {message}")]
    ProviderRequestFailed {
        message: String,
        /// HTTP status code if available
        status_code: Option<u16>,
        /// Endpoint that failed
        endpoint: Option<String>,
    },

    /// Provider returned a payload we could not interpret
    #[error("Invalid provider response: {0}")]
    InvalidProviderResponse(String),

    // ===== Transfer Errors =====
    // One variant per TransferKind; the controller converts all of these into
    // a terminal Failed (or Cancelled) snapshot.

    /// Network connectivity error during a transfer
    #[error("Network error: {message}")]
    Network { message: String },

    /// Server answered the download request with a non-success status
    #[error("Server responded with status code {code}")]
    HttpStatus { code: u16 },

    /// Transfer was cancelled by the user
    #[error("Transfer cancelled")]
    Cancelled,

    /// Server responded without a streamable body
    #[error("Response has no streamable body")]
    NoBody,

    /// Invalid download URL format or protocol
    #[error("Invalid download URL: {0}")]
    InvalidDownloadUrl(String),

    // ===== Session Errors =====

    /// No live session with the given identifier
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Operation is not legal in the session's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== File Errors =====

    /// Output directory doesn't exist or is not writable
    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    // ===== External Library Errors =====
    // Automatic conversions from external error types

    /// HTTP client error from reqwest (provider boundary only; the transfer
    /// path maps reqwest errors to Network explicitly)
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Internal error that should not normally occur
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ReelError {
    /// Create a Network error with a message
    pub fn network<S: Into<String>>(message: S) -> Self {
        ReelError::Network {
            message: message.into(),
        }
    }

    /// Create a ProviderRequestFailed error
    pub fn provider_failed<S: Into<String>>(
        message: S,
        status_code: Option<u16>,
        endpoint: Option<String>,
    ) -> Self {
        ReelError::ProviderRequestFailed {
            message: message.into(),
            status_code,
            endpoint,
        }
    }

    /// Classify this error for transfer reporting.
    ///
    /// Errors that can only occur outside a transfer map to `Unknown`.
    pub fn transfer_kind(&self) -> TransferKind {
        match self {
            ReelError::Network { .. } => TransferKind::Network,
            ReelError::HttpStatus { .. } => TransferKind::HttpStatus,
            ReelError::Cancelled => TransferKind::Cancelled,
            ReelError::NoBody => TransferKind::NoBody,
            _ => TransferKind::Unknown,
        }
    }

    /// Check whether this error is a user-initiated cancellation.
    ///
    /// Cancellations are deliberately not reported as failures to the user.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ReelError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_kind_classification() {
        assert_eq!(
            ReelError::network("boom").transfer_kind(),
            TransferKind::Network
        );
        assert_eq!(
            ReelError::HttpStatus { code: 404 }.transfer_kind(),
            TransferKind::HttpStatus
        );
        assert_eq!(ReelError::Cancelled.transfer_kind(), TransferKind::Cancelled);
        assert_eq!(ReelError::NoBody.transfer_kind(), TransferKind::NoBody);
        assert_eq!(
            ReelError::SessionNotFound("x".into()).transfer_kind(),
            TransferKind::Unknown
        );
    }

    #[test]
    fn test_cancellation_is_not_a_failure() {
        assert!(ReelError::Cancelled.is_cancellation());
        assert!(!ReelError::network("boom").is_cancellation());
    }
}
