//! Liveness monitor for popup surfaces.
//!
//! A user can close a popup without the remote page ever sending a response.
//! The monitor polls the closed flag of enrolled popups and, when one is
//! found closed, drives the same dispatch routine a real message would with
//! a synthetic "closed" message, so the pending callback completes exactly
//! once with a "no result" payload.
//!
//! One shared polling loop serves all enrollments: started lazily on the
//! first, stopped when the enrollment set drains. Iframe surfaces are never
//! polled, as they have no user-driven closure.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashSet;
use tokio::runtime::Handle;
use tracing::{debug, trace, warn};

use crate::identifiers::CorrelationId;
use crate::protocol::message::{Fields, Payload};
use crate::registry::Registry;
use crate::surface::SurfaceKind;

// ============================================================================
// Constants
// ============================================================================

/// Default interval between liveness polls.
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

// ============================================================================
// Monitor
// ============================================================================

/// Internal state: the enrollment set and whether the loop is running.
struct MonitorState {
    /// Ids of popup surfaces under watch.
    enrolled: FxHashSet<CorrelationId>,
    /// Whether the polling task is alive.
    running: bool,
}

/// Shared polling loop that detects user-closed popups.
pub(crate) struct Monitor {
    state: Mutex<MonitorState>,
    interval: Duration,
}

impl Monitor {
    /// Creates a monitor with the given poll interval.
    #[must_use]
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                enrolled: FxHashSet::default(),
                running: false,
            }),
            interval,
        }
    }

    /// Number of currently enrolled surfaces.
    #[inline]
    #[must_use]
    pub(crate) fn enrolled_count(&self) -> usize {
        self.state.lock().enrolled.len()
    }

    /// Enrolls a popup id, starting the polling loop if it is not running.
    ///
    /// Only ids with a registered callback should be enrolled; polling only
    /// matters when an implicit resolution could occur.
    pub(crate) fn enroll(self: &Arc<Self>, id: CorrelationId, registry: &Arc<Registry>) {
        let mut state = self.state.lock();
        state.enrolled.insert(id);

        if !state.running {
            match Handle::try_current() {
                Ok(handle) => {
                    state.running = true;
                    let monitor = Arc::clone(self);
                    let registry = Arc::clone(registry);
                    drop(state);
                    handle.spawn(async move { monitor.run(registry).await });
                }
                Err(_) => {
                    warn!("liveness monitor needs an async runtime; popup closure undetected");
                }
            }
        }
    }

    /// Removes an id from the enrollment set.
    fn unenroll(&self, id: &CorrelationId) {
        self.state.lock().enrolled.remove(id);
    }

    /// The polling loop. Exits when the enrollment set drains.
    async fn run(self: Arc<Self>, registry: Arc<Registry>) {
        debug!(interval_ms = self.interval.as_millis() as u64, "monitor started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let ids: Vec<CorrelationId> = self.state.lock().enrolled.iter().cloned().collect();
            for id in ids {
                self.poll_one(&id, &registry);
            }

            let mut state = self.state.lock();
            if state.enrolled.is_empty() {
                state.running = false;
                debug!("monitor stopped, nothing enrolled");
                return;
            }
        }
    }

    /// Probes one enrolled id.
    fn poll_one(&self, id: &CorrelationId, registry: &Registry) {
        // Resolved by a real message in the meantime: nothing left to watch.
        if !registry.has_callback(id) {
            self.unenroll(id);
            return;
        }

        let Some(surface) = registry.surface(id) else {
            self.unenroll(id);
            return;
        };

        // Iframes are never polled.
        if surface.kind() != SurfaceKind::Popup {
            self.unenroll(id);
            return;
        }

        match surface.is_closed() {
            Ok(true) => {
                debug!(%id, "popup closed by user, synthesizing resolution");
                self.unenroll(id);
                registry.dispatch(id, id, Payload::Fields(Fields::synthetic_close(id)));
            }
            Ok(false) => {}
            // Cross-origin probe restriction: ignore this tick, retry next.
            Err(e) => trace!(%id, error = %e, "liveness probe failed"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
