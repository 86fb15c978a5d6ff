//! Surfaces: popup windows and hidden iframes hosting remote content.
//!
//! A [`Surface`] wraps the host handle for either kind and is keyed in the
//! registry by a correlation id. Popups expose a user-driven closed flag and
//! participate in liveness monitoring; iframes have no user-driven closure
//! and never do.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::platform::{FrameHandle, HostGeometry, PopupFeatures, PopupHandle};

// ============================================================================
// Constants
// ============================================================================

/// Height of window chrome assumed when the host cannot report outer height.
const POPUP_CHROME_HEIGHT: u32 = 22;

// ============================================================================
// SurfaceKind
// ============================================================================

/// The two kinds of surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Top-level popup window.
    Popup,
    /// Hidden embedded frame.
    Frame,
}

// ============================================================================
// Surface
// ============================================================================

/// Handle to an open surface.
#[derive(Clone)]
pub enum Surface {
    /// A popup window.
    Popup(Arc<dyn PopupHandle>),
    /// A hidden iframe.
    Frame(Arc<dyn FrameHandle>),
}

impl Surface {
    /// The kind of this surface.
    #[inline]
    #[must_use]
    pub fn kind(&self) -> SurfaceKind {
        match self {
            Self::Popup(_) => SurfaceKind::Popup,
            Self::Frame(_) => SurfaceKind::Frame,
        }
    }

    /// Probes the user-driven closed flag.
    ///
    /// Frames have no user-driven closure and always report open. Popup
    /// probes may fail with a cross-origin permission error; callers swallow
    /// it and retry.
    pub fn is_closed(&self) -> Result<bool> {
        match self {
            Self::Popup(popup) => popup.is_closed(),
            Self::Frame(_) => Ok(false),
        }
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Surface").field(&self.kind()).finish()
    }
}

// ============================================================================
// Placement
// ============================================================================

/// Computes a placement centered on the host window.
///
/// Each missing geometry value falls back independently: screen origin to 0,
/// outer width to the viewport width, outer height to the viewport height
/// less the assumed chrome. The vertical divisor biases the popup slightly
/// above true center.
#[must_use]
pub(crate) fn centered_features(
    geometry: &HostGeometry,
    width: u32,
    height: u32,
) -> PopupFeatures {
    let screen_x = geometry.screen_x.unwrap_or(0);
    let screen_y = geometry.screen_y.unwrap_or(0);
    let outer_width = geometry.outer_width.unwrap_or(geometry.client_width);
    let outer_height = geometry
        .outer_height
        .unwrap_or_else(|| geometry.client_height.saturating_sub(POPUP_CHROME_HEIGHT));

    let left = screen_x + (outer_width as i32 - width as i32) / 2;
    let top = screen_y + ((f64::from(outer_height) - f64::from(height)) / 2.5) as i32;

    PopupFeatures {
        width,
        height,
        left,
        top,
    }
}

// ============================================================================
// Tests
// ============================================================================
