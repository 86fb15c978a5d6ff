//! Type-safe correlation tokens.
//!
//! A [`CorrelationId`] links an outbound request (a surface being opened, an
//! API call being issued) to its eventual inbound resolution. Ids are opaque
//! strings: generated ones are practically unique, but callers may also
//! supply their own tokens when a frame id and a callback id are
//! intentionally aliased.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

// ============================================================================
// CorrelationId
// ============================================================================

/// Opaque token linking an outbound request to its inbound resolution.
///
/// Generated ids are unguessable enough to avoid accidental collision, but
/// they are not a security boundary by themselves; the origin token carried
/// in handler URLs covers that.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Creates an id from a caller-supplied token.
    #[inline]
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Generates a fresh, process-unique id.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("f{}", Uuid::new_v4().simple()))
    }

    /// Returns the token as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationId {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for CorrelationId {
    fn from(token: String) -> Self {
        Self(token)
    }
}

// ============================================================================
// Tests
// ============================================================================
