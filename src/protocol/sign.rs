//! Request shaping and signatures for generic API calls.
//!
//! Both transports' request/response paths shape outbound calls the same
//! way: caller parameters are merged with the fixed protocol parameters, the
//! session key is attached unless an explicit signing secret was supplied,
//! and a signature over the canonical encoding is appended.

// ============================================================================
// Imports
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::session::Session;

use super::message::{Params, encode_query};

// ============================================================================
// Constants
// ============================================================================

/// Wire format marker merged into every shaped request.
const FORMAT: &str = "json";

/// Protocol version merged into every shaped request.
const VERSION: &str = "1.0";

// ============================================================================
// CallIdCounter
// ============================================================================

/// Produces strictly increasing call identifiers.
///
/// Each call takes the wall-clock milliseconds or the previous id plus one,
/// whichever is larger, so a burst of calls within the same millisecond
/// still receives distinct ids.
#[derive(Debug, Default)]
pub struct CallIdCounter {
    last: AtomicU64,
}

impl CallIdCounter {
    /// Creates a counter; the first id is no earlier than the current
    /// wall-clock time.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the next call identifier.
    pub fn next(&self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let prev = self
            .last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |prev| {
                Some(now.max(prev + 1))
            })
            .unwrap_or(0);

        now.max(prev + 1)
    }
}

// ============================================================================
// Signatures
// ============================================================================

/// Computes the signature for a parameter mapping.
///
/// The input is the canonical encoding: `key=value` pairs sorted by key and
/// joined without a separator, concatenated with the signing secret. Hash is
/// SHA-256, hex encoded.
#[must_use]
pub fn signature(params: &Params, secret: &str) -> String {
    let canonical = encode_query(params, "", false);
    let digest = Sha256::digest(format!("{canonical}{secret}").as_bytes());
    hex::encode(digest)
}

/// Shapes caller parameters into a signed API request, in place.
///
/// Fixed protocol parameters are merged without overwriting caller-supplied
/// values. When no explicit `secret` is given and a session exists, the
/// session key and the signed-via-session marker (`ss=1`) are merged and the
/// session secret signs the call. With neither secret nor session the
/// request is left unsigned.
pub fn shape_request(
    params: &mut Params,
    api_key: &str,
    call_id: u64,
    session: Option<&Session>,
    secret: Option<&str>,
) {
    merge_default(params, "api_key", api_key);
    merge_default(params, "call_id", &call_id.to_string());
    merge_default(params, "format", FORMAT);
    merge_default(params, "v", VERSION);

    if secret.is_none()
        && let Some(session) = session
    {
        merge_default(params, "session_key", &session.session_key);
        merge_default(params, "ss", "1");
    }

    let signing_secret = secret
        .map(str::to_owned)
        .or_else(|| session.map(|s| s.secret.clone()));

    if let Some(signing_secret) = signing_secret {
        let sig = signature(params, &signing_secret);
        params.insert("sig".to_string(), sig);
    }
}

/// Inserts a parameter only when the caller has not already set it.
fn merge_default(params: &mut Params, key: &str, value: &str) {
    params
        .entry(key.to_string())
        .or_insert_with(|| value.to_string());
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    fn session() -> Session {
        Session {
            session_key: "sk1".to_string(),
            secret: "s3cr3t".to_string(),
            uid: None,
            expires: None,
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|&(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_signature_deterministic() {
        let p = params(&[("method", "users.getInfo"), ("uids", "42")]);
        assert_eq!(signature(&p, "secret"), signature(&p, "secret"));
    }

    #[test]
    fn test_signature_changes_with_value() {
        let a = params(&[("method", "users.getInfo")]);
        let b = params(&[("method", "users.getLoggedInUser")]);
        assert_ne!(signature(&a, "secret"), signature(&b, "secret"));
    }

    #[test]
    fn test_signature_changes_with_secret() {
        let p = params(&[("method", "users.getInfo")]);
        assert_ne!(signature(&p, "one"), signature(&p, "two"));
    }

    #[test]
    fn test_shape_with_session() {
        let mut p = params(&[("method", "users.getInfo")]);
        shape_request(&mut p, "key", 7, Some(&session()), None);

        assert_eq!(p.get("api_key").map(String::as_str), Some("key"));
        assert_eq!(p.get("call_id").map(String::as_str), Some("7"));
        assert_eq!(p.get("format").map(String::as_str), Some("json"));
        assert_eq!(p.get("v").map(String::as_str), Some("1.0"));
        assert_eq!(p.get("session_key").map(String::as_str), Some("sk1"));
        assert_eq!(p.get("ss").map(String::as_str), Some("1"));
        assert!(p.contains_key("sig"));
    }

    #[test]
    fn test_shape_with_explicit_secret_skips_session_params() {
        let mut p = params(&[("method", "users.getInfo")]);
        shape_request(&mut p, "key", 7, Some(&session()), Some("explicit"));

        assert!(!p.contains_key("session_key"));
        assert!(!p.contains_key("ss"));

        // Signed with the explicit secret, not the session secret.
        let mut expected_input = p.clone();
        expected_input.remove("sig");
        assert_eq!(
            p.get("sig").map(String::as_str),
            Some(signature(&expected_input, "explicit").as_str())
        );
    }

    #[test]
    fn test_shape_unsigned_without_secret_or_session() {
        let mut p = params(&[("method", "users.getInfo")]);
        shape_request(&mut p, "key", 7, None, None);
        assert!(!p.contains_key("sig"));
        assert!(!p.contains_key("session_key"));
    }

    #[test]
    fn test_shape_does_not_overwrite_caller_values() {
        let mut p = params(&[("format", "xml")]);
        shape_request(&mut p, "key", 7, None, None);
        assert_eq!(p.get("format").map(String::as_str), Some("xml"));
    }

    #[test]
    fn test_call_ids_strictly_increase() {
        let counter = CallIdCounter::new();
        let a = counter.next();
        let b = counter.next();
        let c = counter.next();
        assert!(a < b && b < c);
    }

    proptest! {
        #[test]
        fn prop_signature_deterministic(
            entries in proptest::collection::hash_map("[a-z_]{1,8}", "[ -~]{0,16}", 0..6),
            secret in "[a-zA-Z0-9]{1,12}",
        ) {
            let p: Params = entries.into_iter().collect();
            prop_assert_eq!(signature(&p, &secret), signature(&p, &secret));
        }

        #[test]
        fn prop_signature_sensitive_to_values(
            key in "[a-z_]{1,8}",
            value in "[a-z0-9]{1,16}",
            secret in "[a-zA-Z0-9]{1,12}",
        ) {
            let mut a = Params::default();
            a.insert(key.clone(), value.clone());
            let mut b = Params::default();
            b.insert(key, format!("{value}x"));
            prop_assert_ne!(signature(&a, &secret), signature(&b, &secret));
        }
    }
}
