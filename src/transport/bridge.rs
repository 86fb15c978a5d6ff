//! Fallback bridging transport.
//!
//! Used when the native messaging primitives are unavailable. A host-provided
//! bridging plugin relays messages and HTTP-style requests between origins.
//! The plugin is not usable until it reports ready; operations requested
//! before that are queued and flushed in FIFO order, each exactly once.
//!
//! The plugin's serialization layer is lossy for a handful of characters, so
//! inbound payloads carry custom escapes that are reversed here before the
//! payload is parsed as structured data. Payloads also sometimes arrive as a
//! single-element array-like wrapper instead of a plain string.

// ============================================================================
// Imports
// ============================================================================

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::CorrelationId;

// ============================================================================
// Constants
// ============================================================================

/// Maximum combined url+body length sent as a GET through the bridge.
///
/// Longer requests switch to POST with an out-of-band body; there is no
/// upper limit on that path.
pub(crate) const BRIDGE_GET_MAX: usize = 2000;

// ============================================================================
// HttpMethod
// ============================================================================

/// HTTP method used by bridged API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// Query carried in the URL.
    Get,
    /// Body carried out of band.
    Post,
}

impl HttpMethod {
    /// Wire name of the method.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

// ============================================================================
// Bridge
// ============================================================================

/// Host boundary for the bridging plugin.
///
/// Implemented by the embedder; the core only requires these operations.
/// Readiness and results are reported asynchronously through the host event
/// stream (`HostEvent::BridgeReady`, `HostEvent::BridgeMessage`,
/// `HostEvent::BridgeHttpResult`).
pub trait Bridge: Send + Sync {
    /// Returns `true` if the plugin meets the minimum version requirements.
    fn has_min_version(&self) -> bool;

    /// Mounts and boots the plugin. Called at most once per client.
    fn bootstrap(&self) -> Result<()>;

    /// Opens the local message channel under the page's origin token.
    fn open_channel(&self, origin: &str) -> Result<()>;

    /// Issues an HTTP-style request correlated by `id`.
    ///
    /// The plugin reports the result later as
    /// `HostEvent::BridgeHttpResult { id, .. }`.
    fn send_http(&self, id: &CorrelationId, method: HttpMethod, url: &str, body: &str)
    -> Result<()>;
}

// ============================================================================
// BridgePayload
// ============================================================================

/// Raw payload reported by the plugin for a bridged HTTP request.
///
/// The plugin sometimes hands back a single-element array-like wrapper
/// instead of a plain string; element 0 is the payload in that case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgePayload {
    /// Plain string payload.
    Text(String),
    /// Array-like wrapper; element 0 is the payload.
    Wrapped(Vec<String>),
}

impl BridgePayload {
    /// Unwraps to the payload string, if one is present.
    #[must_use]
    pub fn into_text(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Wrapped(mut items) => {
                if items.is_empty() {
                    None
                } else {
                    Some(items.swap_remove(0))
                }
            }
        }
    }
}

/// Unwraps and unescapes a bridged payload.
///
/// Reverses the custom escapes the plugin applies to characters its wire
/// serialization cannot carry, so the result can be parsed as structured
/// data. Returns `None` only when the wrapper held no payload at all.
#[must_use]
pub(crate) fn decode_payload(payload: BridgePayload) -> Option<String> {
    payload.into_text().map(|text| unescape(&text))
}

/// Reverses the plugin's custom character escapes.
fn unescape(data: &str) -> String {
    data.replace("&custom_lt;", "<")
        .replace("&custom_gt;", ">")
        .replace("&custom_backslash;", "\\")
        .replace("\\0", "\0")
}

// ============================================================================
// ReadyGate
// ============================================================================

/// A queued operation awaiting plugin readiness.
pub(crate) type QueuedOp = Box<dyn FnOnce() + Send>;

/// Gate state: queueing until ready, then pass-through.
enum GateState {
    /// Plugin not ready; operations queue in submission order.
    Waiting(Vec<QueuedOp>),
    /// Plugin ready; operations run immediately.
    Ready,
}

/// Queues operations until the plugin reports ready, then flushes them in
/// FIFO order. Each queued operation runs exactly once.
pub(crate) struct ReadyGate {
    state: Mutex<GateState>,
}

impl ReadyGate {
    /// Creates a gate in the waiting state.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(GateState::Waiting(Vec::new())),
        }
    }

    /// Runs `op` now if the plugin is ready, otherwise queues it.
    pub(crate) fn when_ready(&self, op: QueuedOp) {
        {
            let mut state = self.state.lock();
            if let GateState::Waiting(queue) = &mut *state {
                trace!(queued = queue.len() + 1, "bridge not ready, queueing");
                queue.push(op);
                return;
            }
        }
        op();
    }

    /// Marks the plugin ready and flushes queued operations in order.
    ///
    /// Safe to call more than once; later calls are no-ops. Operations run
    /// outside the lock so a flushed operation may queue further work.
    pub(crate) fn mark_ready(&self) {
        let queued = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, GateState::Ready) {
                GateState::Waiting(queue) => queue,
                GateState::Ready => Vec::new(),
            }
        };

        if !queued.is_empty() {
            debug!(count = queued.len(), "bridge ready, flushing queued ops");
        }
        for op in queued {
            op();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
