//! Session payload returned by the remote side.
//!
//! A [`Session`] is treated as opaque by the core: it is parsed from the
//! `session` field of an inbound message, stored on the client, and consumed
//! by request signing. Parse failures never propagate: a malformed session
//! degrades to `None`.

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};

// ============================================================================
// Session
// ============================================================================

/// Opaque session payload: a key identifying the session plus the secret
/// used to sign API calls made under it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Key merged into signed requests as `session_key`.
    pub session_key: String,

    /// Signing secret used when no explicit secret is supplied.
    pub secret: String,

    /// Remote user identifier, when the remote side provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,

    /// Expiry timestamp in seconds, when the remote side provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<u64>,
}

impl Session {
    /// Parses a session from raw structured data.
    ///
    /// Returns `None` on any parse failure; never an error.
    #[inline]
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_session() {
        let raw = r#"{"session_key":"sk1","secret":"s3cr3t","uid":"42","expires":1234567890}"#;
        let session = Session::parse(raw).expect("valid session");
        assert_eq!(session.session_key, "sk1");
        assert_eq!(session.secret, "s3cr3t");
        assert_eq!(session.uid.as_deref(), Some("42"));
        assert_eq!(session.expires, Some(1234567890));
    }

    #[test]
    fn test_parse_minimal_session() {
        let raw = r#"{"session_key":"sk1","secret":"s3cr3t"}"#;
        let session = Session::parse(raw).expect("valid session");
        assert_eq!(session.uid, None);
        assert_eq!(session.expires, None);
    }

    #[test]
    fn test_parse_failure_yields_none() {
        assert_eq!(Session::parse("not json"), None);
        assert_eq!(Session::parse(""), None);
        assert_eq!(Session::parse(r#"{"secret":"s"}"#), None);
    }

    #[test]
    fn test_unknown_fields_tolerated() {
        let raw = r#"{"session_key":"sk1","secret":"s3cr3t","sig":"abc"}"#;
        assert!(Session::parse(raw).is_some());
    }
}
