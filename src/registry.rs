//! Correlation registry: pending callbacks and open surfaces.
//!
//! The single piece of shared mutable state. Callbacks are one-shot
//! (`FnOnce` consumed on dispatch), surfaces are keyed independently: a
//! frame id and a callback id may be aliased by the caller but the registry
//! never assumes they are equal.
//!
//! Dispatch order is load-bearing: surface teardown and entry removal happen
//! before the callback runs, so a callback that immediately issues a new
//! request under a reused id cannot observe stale state.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tokio::runtime::Handle;
use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::identifiers::CorrelationId;
use crate::protocol::message::Payload;
use crate::surface::Surface;

// ============================================================================
// Constants
// ============================================================================

/// Grace delay before a resolved iframe is detached from the document.
///
/// Removing the node synchronously from inside its own message turnaround
/// stalls rendering on one class of host; a short deferral avoids it.
const FRAME_TEARDOWN_GRACE: Duration = Duration::from_millis(500);

// ============================================================================
// Types
// ============================================================================

/// One-shot completion for a pending operation.
///
/// Ownership moves into the registry at registration and out again at
/// dispatch; the type makes firing twice impossible.
pub type DispatchCallback = Box<dyn FnOnce(Payload) + Send>;

// ============================================================================
// Registry
// ============================================================================

/// Maps correlation ids to pending callbacks and to open surfaces.
#[derive(Default)]
pub struct Registry {
    /// Pending one-shot callbacks.
    callbacks: Mutex<FxHashMap<CorrelationId, DispatchCallback>>,
    /// Open surfaces awaiting teardown.
    surfaces: Mutex<FxHashMap<CorrelationId, Surface>>,
}

impl Registry {
    /// Creates an empty registry.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a one-shot callback under `id`.
    ///
    /// # Errors
    ///
    /// [`Error::DuplicateCallback`] if a callback is already pending under
    /// `id`. Generated ids are practically unique, so a duplicate means a
    /// caller reused a custom id while its operation was still in flight.
    pub fn register(&self, id: CorrelationId, callback: DispatchCallback) -> Result<()> {
        let mut callbacks = self.callbacks.lock();
        if callbacks.contains_key(&id) {
            return Err(Error::duplicate_callback(id));
        }
        trace!(%id, "callback registered");
        callbacks.insert(id, callback);
        Ok(())
    }

    /// Registers a surface handle under `id`, independent of whether a
    /// callback is also registered there.
    pub fn register_surface(&self, id: CorrelationId, surface: Surface) {
        trace!(%id, kind = ?surface.kind(), "surface registered");
        self.surfaces.lock().insert(id, surface);
    }

    /// Returns `true` if a callback is pending under `id`.
    #[inline]
    #[must_use]
    pub fn has_callback(&self, id: &CorrelationId) -> bool {
        self.callbacks.lock().contains_key(id)
    }

    /// Returns the surface registered under `id`, if any.
    #[inline]
    #[must_use]
    pub fn surface(&self, id: &CorrelationId) -> Option<Surface> {
        self.surfaces.lock().get(id).cloned()
    }

    /// Number of pending callbacks.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Removes a pending callback without firing it and hands it back.
    ///
    /// Used to back out a registration when issuing the request fails; the
    /// caller decides whether to drop the callback or retry elsewhere.
    pub(crate) fn unregister(&self, id: &CorrelationId) -> Option<DispatchCallback> {
        self.callbacks.lock().remove(id)
    }

    /// Resolves the surface under `frame_id` and the callback under `cb_id`.
    ///
    /// Teardown first (errors swallowed), then both entries are removed,
    /// then the callback fires with `payload`. With no pending callback this
    /// is a no-op beyond surface cleanup.
    pub fn dispatch(&self, frame_id: &CorrelationId, cb_id: &CorrelationId, payload: Payload) {
        // Bind the removal first so the guard drops before teardown; holding
        // the lock across an embedder's `close()` invites deadlock.
        let surface = self.surfaces.lock().remove(frame_id);
        if let Some(surface) = surface {
            teardown(surface, frame_id);
        }

        let callback = self.callbacks.lock().remove(cb_id);
        match callback {
            Some(callback) => {
                debug!(frame = %frame_id, cb = %cb_id, "dispatching");
                callback(payload);
            }
            None => {
                trace!(cb = %cb_id, "dispatch for id with no pending callback");
            }
        }
    }
}

// ============================================================================
// Teardown
// ============================================================================

/// Tears a surface down, swallowing permission errors.
fn teardown(surface: Surface, id: &CorrelationId) {
    match surface {
        Surface::Popup(popup) => {
            if let Err(e) = popup.close() {
                trace!(%id, error = %e, "popup close failed, ignoring");
            }
        }
        Surface::Frame(frame) => match Handle::try_current() {
            Ok(handle) => {
                let id = id.clone();
                handle.spawn(async move {
                    tokio::time::sleep(FRAME_TEARDOWN_GRACE).await;
                    if let Err(e) = frame.remove() {
                        trace!(%id, error = %e, "frame removal failed, ignoring");
                    }
                });
            }
            // No timer available: remove immediately.
            Err(_) => {
                if let Err(e) = frame.remove() {
                    trace!(%id, error = %e, "frame removal failed, ignoring");
                }
            }
        },
    }
}

// ============================================================================
// Tests
// ============================================================================
