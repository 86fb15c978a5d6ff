//! Error types for the cross-context messaging layer.
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`].
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Initialization | [`Error::NoTransport`] |
//! | Capability | [`Error::Unsupported`] |
//! | Delivery | [`Error::PayloadTooLarge`] |
//! | Correlation | [`Error::DuplicateCallback`] |
//! | Host | [`Error::Platform`] |
//! | External | [`Error::Json`], [`Error::Url`] |
//!
//! Two classes of failure deliberately never surface here: cross-origin
//! permission errors during surface inspection or teardown are swallowed at
//! the probe site, and parse failures on `session`/`result` fields degrade to
//! an absent value.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;

use crate::identifiers::CorrelationId;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Client configuration is invalid or incomplete.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Initialization Errors
    // ========================================================================
    /// No usable transport was found at initialization.
    ///
    /// The host exposes neither the native messaging primitives nor a
    /// bridging plugin that meets the minimum version. Fatal and not
    /// recoverable.
    #[error("No usable transport: native messaging and bridge both unavailable")]
    NoTransport,

    // ========================================================================
    // Capability Errors
    // ========================================================================
    /// The host signalled that a required capability does not exist.
    #[error("Host capability unavailable: {capability}")]
    Unsupported {
        /// The missing capability.
        capability: String,
    },

    // ========================================================================
    // Delivery Errors
    // ========================================================================
    /// Encoded request exceeds the limit of the length-restricted path.
    ///
    /// Reported synchronously, never silently truncated. The bridged path
    /// carries the body out of band and has no such limit, so the caller may
    /// retry there.
    #[error("Encoded payload of {len} bytes exceeds the {max} byte limit")]
    PayloadTooLarge {
        /// Encoded length of the rejected request.
        len: usize,
        /// Maximum allowed length.
        max: usize,
    },

    // ========================================================================
    // Correlation Errors
    // ========================================================================
    /// A callback is already registered under the given id.
    #[error("Duplicate callback registration: {id}")]
    DuplicateCallback {
        /// The contested id.
        id: CorrelationId,
    },

    // ========================================================================
    // Host Errors
    // ========================================================================
    /// The host failed to open a surface or issue a request.
    #[error("Platform error: {message}")]
    Platform {
        /// Description of the host failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a missing-capability error.
    #[inline]
    pub fn unsupported(capability: impl Into<String>) -> Self {
        Self::Unsupported {
            capability: capability.into(),
        }
    }

    /// Creates a payload-too-large error.
    #[inline]
    pub fn payload_too_large(len: usize, max: usize) -> Self {
        Self::PayloadTooLarge { len, max }
    }

    /// Creates a duplicate-callback error.
    #[inline]
    pub fn duplicate_callback(id: CorrelationId) -> Self {
        Self::DuplicateCallback { id }
    }

    /// Creates a platform error.
    #[inline]
    pub fn platform(message: impl Into<String>) -> Self {
        Self::Platform {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this error is fatal for the client.
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::NoTransport | Self::Config { .. })
    }

    /// Returns `true` if this is a missing-capability error.
    ///
    /// The generic call entry point falls back to the bridged path when the
    /// native path reports this.
    #[inline]
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Returns `true` if the request may succeed via the bridged path.
    #[inline]
    #[must_use]
    pub fn is_retryable_via_bridge(&self) -> bool {
        matches!(
            self,
            Self::PayloadTooLarge { .. } | Self::Unsupported { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
