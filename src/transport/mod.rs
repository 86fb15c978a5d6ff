//! Transport abstraction and one-time selection.
//!
//! Two interchangeable delivery mechanisms move opaque strings between
//! origins:
//!
//! ```text
//! ┌──────────────┐   handler URL navigation    ┌──────────────────┐
//! │  Host page   │────────────────────────────►│  Remote surface  │
//! │              │◄────────────────────────────│  (popup/iframe)  │
//! └──────────────┘   native message event      └──────────────────┘
//!        │                    or
//!        └◄──────────── bridging plugin ────────────┘
//! ```
//!
//! - **Native**: a host message event delivers the raw fragment string to a
//!   single page-level listener. There is no explicit send operation; sending
//!   happens by the remote surface navigating to a constructed URL.
//! - **Bridge**: a plugin relays messages and HTTP-style requests when the
//!   native primitives are unavailable. See [`bridge`].
//!
//! Selection happens once at initialization: native is preferred when the
//! host exposes both the event subscription and the send primitive; otherwise
//! the bridge must pass its minimum capability check, else initialization
//! fails with [`Error::NoTransport`].

// ============================================================================
// Imports
// ============================================================================

use tracing::debug;

use crate::error::{Error, Result};
use crate::platform::Platform;

// ============================================================================
// Submodules
// ============================================================================

/// Fallback bridging transport.
pub mod bridge;

// ============================================================================
// Re-exports
// ============================================================================

pub use bridge::{Bridge, BridgePayload, HttpMethod};

// ============================================================================
// TransportKind
// ============================================================================

/// The delivery mechanism selected at initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Native duplex messaging via the host's message events.
    PostMessage,
    /// Plugin-bridged fallback.
    Bridge,
}

impl TransportKind {
    /// Wire name carried in the `transport` URL parameter.
    ///
    /// Opaque to this layer; the remote side uses it to pick its matching
    /// half of the transport.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PostMessage => "postmessage",
            Self::Bridge => "bridge",
        }
    }
}

// ============================================================================
// Selection
// ============================================================================

/// Selects the transport for this page load.
///
/// # Errors
///
/// Returns [`Error::NoTransport`] when neither mechanism is usable. This is
/// fatal: a client cannot be built without a transport.
pub(crate) fn select(platform: &dyn Platform) -> Result<TransportKind> {
    if platform.supports_native_messaging() {
        debug!("selected native messaging transport");
        return Ok(TransportKind::PostMessage);
    }

    if let Some(bridge) = platform.bridge()
        && bridge.has_min_version()
    {
        debug!("native messaging unavailable, selected bridge transport");
        return Ok(TransportKind::Bridge);
    }

    Err(Error::NoTransport)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::testutil::FakePlatform;

    #[test]
    fn test_wire_names() {
        assert_eq!(TransportKind::PostMessage.as_str(), "postmessage");
        assert_eq!(TransportKind::Bridge.as_str(), "bridge");
    }

    #[test]
    fn test_prefers_native() {
        let platform = FakePlatform::native();
        assert_eq!(
            select(&platform).expect("transport"),
            TransportKind::PostMessage
        );
    }

    #[test]
    fn test_falls_back_to_bridge() {
        let platform = FakePlatform::bridged();
        assert_eq!(select(&platform).expect("transport"), TransportKind::Bridge);
    }

    #[test]
    fn test_no_transport_is_fatal() {
        let platform = FakePlatform::bare();
        let err = select(&platform).expect_err("no transport");
        assert!(matches!(err, Error::NoTransport));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_stale_bridge_version_rejected() {
        let platform = FakePlatform::bridged_stale();
        assert!(matches!(
            select(&platform).expect_err("no transport"),
            Error::NoTransport
        ));
    }
}
