//! Return-value and session extraction for handler URLs.
//!
//! A handler URL, when loaded in a remote surface, causes the remote
//! environment to send back a message addressed by the `relation` hint. Two
//! specialized flavors sit on top: result URLs carry the reserved sentinel in
//! the return-value channel, and session URLs additionally deliver a session
//! payload. The URL construction itself lives on the client; this module
//! holds the sentinel, the relation hint, and the field extraction rules the
//! wrapped callbacks share.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde_json::Value;

use crate::session::Session;

use super::message::Fields;

// ============================================================================
// Constants
// ============================================================================

/// Reserved return-value sentinel meaning "no explicit result was produced".
///
/// Compared verbatim, never by falsiness: an empty string or `0` coming back
/// through the `result` channel is a meaningful value, the sentinel is not.
/// The quoted form is the wire form; it rides the URL percent-encoded.
pub const RESULT_SENTINEL: &str = "\"xxRESULTTOKENxx\"";

// ============================================================================
// Relation
// ============================================================================

/// How the remote surface addresses its response back to this page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// This page opened the surface as a popup.
    Opener,
    /// This page embeds the surface as an iframe.
    Parent,
}

impl Relation {
    /// Wire name carried in the `relation` parameter.
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opener => "opener",
            Self::Parent => "parent",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Field Extraction
// ============================================================================

/// Extracts the decoded return value from a message.
///
/// A missing `result` field or the verbatim sentinel both mean "no result".
/// Anything else is parsed as structured data; a parse failure also degrades
/// to "no result" rather than an error.
#[must_use]
pub fn extract_result(fields: &Fields) -> Option<Value> {
    match fields.result() {
        None => None,
        Some(raw) if raw == RESULT_SENTINEL => None,
        Some(raw) => serde_json::from_str(raw).ok(),
    }
}

/// Extracts the permissions-like string riding the return-value channel.
///
/// Sentinel or missing yields the empty string; otherwise the raw field is
/// returned as-is (it is a comma-separated list, not structured data).
#[must_use]
pub fn extract_perms(fields: &Fields) -> String {
    match fields.result() {
        None => String::new(),
        Some(raw) if raw == RESULT_SENTINEL => String::new(),
        Some(raw) => raw.to_string(),
    }
}

/// Extracts and parses the session payload from a message.
///
/// A missing or unparsable `session` field yields `None`, never an error.
#[must_use]
pub fn extract_session(fields: &Fields) -> Option<Session> {
    fields.session().and_then(Session::parse)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn message(pairs: &[(&str, &str)]) -> Fields {
        let mut fields = Fields::new();
        for &(k, v) in pairs {
            fields.insert(k, v);
        }
        fields
    }

    #[test]
    fn test_relation_wire_names() {
        assert_eq!(Relation::Opener.as_str(), "opener");
        assert_eq!(Relation::Parent.as_str(), "parent");
    }

    #[test]
    fn test_result_sentinel_means_no_result() {
        let fields = message(&[("result", RESULT_SENTINEL)]);
        assert_eq!(extract_result(&fields), None);
    }

    #[test]
    fn test_result_missing_means_no_result() {
        assert_eq!(extract_result(&Fields::new()), None);
    }

    #[test]
    fn test_result_decodes_structured_value() {
        let fields = message(&[("result", "42")]);
        assert_eq!(extract_result(&fields), Some(Value::from(42)));

        let fields = message(&[("result", r#"{"post_id":"7"}"#)]);
        let value = extract_result(&fields).expect("structured result");
        assert_eq!(value["post_id"], Value::from("7"));
    }

    #[test]
    fn test_result_distinguishes_falsy_values_from_sentinel() {
        // An explicit empty string or zero is a real result.
        let fields = message(&[("result", "\"\"")]);
        assert_eq!(extract_result(&fields), Some(Value::from("")));

        let fields = message(&[("result", "0")]);
        assert_eq!(extract_result(&fields), Some(Value::from(0)));
    }

    #[test]
    fn test_result_parse_failure_degrades_to_none() {
        let fields = message(&[("result", "not json")]);
        assert_eq!(extract_result(&fields), None);
    }

    #[test]
    fn test_perms_extraction() {
        assert_eq!(extract_perms(&Fields::new()), "");
        assert_eq!(extract_perms(&message(&[("result", RESULT_SENTINEL)])), "");
        assert_eq!(
            extract_perms(&message(&[("result", "read_stream,publish_stream")])),
            "read_stream,publish_stream"
        );
    }

    #[test]
    fn test_session_parse_failure_yields_none() {
        let fields = message(&[("session", "{broken")]);
        assert_eq!(extract_session(&fields), None);
        assert_eq!(extract_session(&Fields::new()), None);
    }

    #[test]
    fn test_session_extraction() {
        let fields = message(&[("session", r#"{"session_key":"sk","secret":"s"}"#)]);
        let session = extract_session(&fields).expect("session");
        assert_eq!(session.session_key, "sk");
    }
}
