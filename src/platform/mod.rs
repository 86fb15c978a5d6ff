//! Host platform boundary.
//!
//! Everything environment-specific lives behind the [`Platform`] trait:
//! window geometry, popup opening, hidden-frame mounting, the native
//! messaging capability check, the scripted request path, and the inbound
//! host event stream. The registry and protocol logic stay free of
//! environment conditionals; an embedder supplies one concrete
//! implementation per host environment at initialization.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::error::Result;
use crate::identifiers::CorrelationId;
use crate::transport::bridge::{Bridge, BridgePayload};

// ============================================================================
// HostGeometry
// ============================================================================

/// Screen and viewport geometry as far as the host exposes it.
///
/// Any value the host cannot provide is `None`; popup centering substitutes
/// defaults per field rather than failing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostGeometry {
    /// Horizontal screen position of the host window.
    pub screen_x: Option<i32>,
    /// Vertical screen position of the host window.
    pub screen_y: Option<i32>,
    /// Outer width of the host window, chrome included.
    pub outer_width: Option<u32>,
    /// Outer height of the host window, chrome included.
    pub outer_height: Option<u32>,
    /// Viewport width.
    pub client_width: u32,
    /// Viewport height.
    pub client_height: u32,
}

// ============================================================================
// PopupFeatures
// ============================================================================

/// Placement computed for a popup surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupFeatures {
    /// Initial width.
    pub width: u32,
    /// Initial height.
    pub height: u32,
    /// Horizontal screen position.
    pub left: i32,
    /// Vertical screen position.
    pub top: i32,
}

// ============================================================================
// AttachOrder
// ============================================================================

/// When a hidden frame's location must be set relative to mounting.
///
/// One class of host needs the location set before the node is attached to
/// the document (otherwise the load is audible/visible); another needs it
/// set after attachment (otherwise a cached copy is served).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOrder {
    /// Set the location, then mount.
    SrcFirst,
    /// Mount, then set the location.
    MountFirst,
}

// ============================================================================
// HostEvent
// ============================================================================

/// Inbound notifications from the host environment.
///
/// Delivered on the stream returned by [`Platform::take_events`]; the client
/// runs a single event loop over it.
#[derive(Debug)]
pub enum HostEvent {
    /// A native message event: the raw fragment string sent by a surface.
    Message(String),
    /// The bridging plugin finished booting.
    BridgeReady,
    /// A message relayed by the plugin's local channel, still URI-encoded.
    BridgeMessage(String),
    /// The plugin reports the result of a bridged HTTP request.
    BridgeHttpResult {
        /// Correlation id the request was issued under.
        id: CorrelationId,
        /// Raw payload, possibly wrapped and escape-encoded.
        payload: BridgePayload,
    },
    /// The host reports the response to a scripted request.
    ScriptResult {
        /// Correlation id the request was issued under.
        id: CorrelationId,
        /// Decoded response body.
        payload: Value,
    },
}

// ============================================================================
// Surface Handles
// ============================================================================

/// Handle to an open popup window.
pub trait PopupHandle: Send + Sync {
    /// Probes whether the user has closed the window.
    ///
    /// May fail with a cross-origin permission error; callers swallow the
    /// error and retry on the next poll.
    fn is_closed(&self) -> Result<bool>;

    /// Closes the window if still open.
    fn close(&self) -> Result<()>;
}

/// Handle to a hidden embedded frame.
pub trait FrameHandle: Send + Sync {
    /// Points the frame at a URL.
    fn set_location(&self, url: &str) -> Result<()>;

    /// Attaches the frame to the document's hidden container.
    fn mount(&self) -> Result<()>;

    /// Detaches the frame from the document.
    fn remove(&self) -> Result<()>;
}

// ============================================================================
// Platform
// ============================================================================

/// Capability interface to the host environment.
pub trait Platform: Send + Sync {
    /// Scheme-and-host origin of the current page.
    fn page_origin(&self) -> String;

    /// Current window geometry, with unavailable values as `None`.
    fn geometry(&self) -> HostGeometry;

    /// Which attach order hidden frames need on this host.
    fn attach_order(&self) -> AttachOrder;

    /// Opens a popup window at the given placement.
    fn open_popup(&self, url: &str, features: PopupFeatures) -> Result<Arc<dyn PopupHandle>>;

    /// Creates a detached hidden frame.
    fn create_frame(&self) -> Result<Arc<dyn FrameHandle>>;

    /// Returns `true` when the host exposes both the message event
    /// subscription and the message send primitive.
    fn supports_native_messaging(&self) -> bool;

    /// Returns `true` when the host can issue scripted requests (the
    /// length-limited native API path).
    fn supports_scripted_requests(&self) -> bool;

    /// Issues a scripted request; the response arrives later as
    /// [`HostEvent::ScriptResult`] under `id`.
    ///
    /// # Errors
    ///
    /// [`Error::Unsupported`](crate::Error::Unsupported) when the host lacks
    /// the capability.
    fn scripted_request(&self, id: &CorrelationId, url: &str) -> Result<()>;

    /// The bridging plugin, when the host has one.
    fn bridge(&self) -> Option<Arc<dyn Bridge>>;

    /// Takes the host event stream. Yields `Some` exactly once; the client
    /// consumes it at initialization.
    fn take_events(&self) -> Option<UnboundedReceiver<HostEvent>>;
}
