//! Cross-context request/response messaging for embedded web surfaces.
//!
//! This library correlates one-shot callbacks with messages flowing between
//! a host page and the popup/iframe surfaces it opens, over whichever
//! transport the host supports.
//!
//! # Architecture
//!
//! The client sits between the embedder's host bindings and remote pages:
//!
//! - **Host side (embedder)**: implements [`Platform`], feeding inbound
//!   messages and transport events into the client's event stream
//! - **Remote side (surfaces)**: deliver their answer by navigating a proxy
//!   URL that carries the correlation identifiers back
//!
//! Key design principles:
//!
//! - Every exchange is keyed by a [`CorrelationId`]; callbacks fire exactly
//!   once and are removed before they run
//! - Transport is selected once at build time: native message events when
//!   the host has them, a bridging plugin otherwise
//! - Popups are liveness-polled so a user closing one still resolves its
//!   pending callback
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use xdlink::{Client, CorrelationId, Endpoints, Platform, Relation, Result};
//!
//! # fn demo(platform: Arc<dyn Platform>) -> Result<()> {
//! let client = Client::builder()
//!     .platform(platform)
//!     .api_key("abc123")
//!     .endpoints(Endpoints::new(
//!         "https://api.example.com/restserver",
//!         "https://static.example.com/",
//!     )?)
//!     .build()?;
//!
//! // Build a handler URL, hand it to a remote dialog, open it as a popup.
//! let id = CorrelationId::generate();
//! let handler = client.result_url(
//!     Box::new(|result| println!("dialog answered: {result:?}")),
//!     &id,
//!     Relation::Opener,
//!     None,
//! )?;
//! let dialog = format!("https://www.example.com/dialog?next={handler}");
//! client.open_popup(&dialog, 450, 415, &id)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`client`] | Client surface: builder, handler URLs, API calls |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Correlation identifier newtype |
//! | [`platform`] | Host capability boundary (internal bindings trait) |
//! | [`protocol`] | Message codec, request shaping, result extraction |
//! | [`registry`] | Correlation registry: callbacks + tracked surfaces |
//! | [`session`] | Session credentials |
//! | [`surface`] | Popup/iframe surface handles and placement |
//! | [`transport`] | Transport selection and the bridging fallback |

// ============================================================================
// Modules
// ============================================================================

/// Client surface tying the layers together.
///
/// Use [`Client::builder()`] to create a configured client instance.
pub mod client;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe correlation identifiers.
///
/// A newtype wrapper keys callbacks and surfaces without mixing them up
/// with ordinary strings.
pub mod identifiers;

/// Popup liveness monitoring.
///
/// Internal module polling tracked popups and synthesizing a close message
/// when one disappears.
mod monitor;

/// Host capability boundary.
///
/// The embedder implements [`Platform`] to bind the client to a concrete
/// host environment.
pub mod platform;

/// Wire protocol: query codec, request shaping, result extraction.
pub mod protocol;

/// Correlation registry for one-shot callbacks and tracked surfaces.
pub mod registry;

/// Session credentials granted by the remote service.
pub mod session;

/// Surface handles and popup placement.
pub mod surface;

/// Transport selection and the bridging fallback.
pub mod transport;

#[cfg(test)]
pub(crate) mod testutil;

// ============================================================================
// Re-exports
// ============================================================================

// Client types
pub use client::{
    ApiCallback, Client, ClientBuilder, Endpoints, MAX_SCRIPTED_LEN, MessageCallback,
    ResultCallback, SessionCallback,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::CorrelationId;

// Platform types
pub use platform::{
    AttachOrder, FrameHandle, HostEvent, HostGeometry, Platform, PopupFeatures, PopupHandle,
};

// Protocol types
pub use protocol::{Fields, Params, Payload, RESULT_SENTINEL, Relation};

// Registry types
pub use registry::{DispatchCallback, Registry};

// Session types
pub use session::Session;

// Surface types
pub use surface::{Surface, SurfaceKind};

// Transport types
pub use transport::{Bridge, BridgePayload, HttpMethod, TransportKind};
