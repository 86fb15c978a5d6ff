//! Inbound message normalization and query-string codec.
//!
//! A message may arrive as a raw `key=value` fragment string or as an
//! already-structured mapping, depending on the transport. Both forms are
//! normalized into [`Fields`] at the transport boundary so the registry only
//! ever sees one shape.
//!
//! # Inbound shape
//!
//! Every routable message carries at least:
//!
//! | Field | Meaning |
//! |-------|---------|
//! | `frame` | surface id to tear down |
//! | `cb` | callback id to resolve |
//! | `result` | optional return-value channel |
//! | `session` | optional session payload |

// ============================================================================
// Imports
// ============================================================================

use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::identifiers::CorrelationId;

// ============================================================================
// Types
// ============================================================================

/// Parameter mapping used for outbound queries and API calls.
pub type Params = FxHashMap<String, String>;

// ============================================================================
// Query Codec
// ============================================================================

/// Encodes parameters into a query string.
///
/// Pairs are sorted by key so the output is canonical: the same mapping
/// always encodes to the same string. With `encode` false, keys and values
/// are emitted verbatim (used for signature input).
#[must_use]
pub fn encode_query(params: &Params, sep: &str, encode: bool) -> String {
    let mut entries: Vec<(&str, &str)> = params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    entries.sort_unstable_by_key(|&(k, _)| k);

    let pairs: Vec<String> = entries
        .into_iter()
        .map(|(k, v)| {
            if encode {
                format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))
            } else {
                format!("{k}={v}")
            }
        })
        .collect();

    pairs.join(sep)
}

/// Decodes a query string into a parameter mapping.
///
/// Undecodable percent-sequences are kept verbatim rather than rejected;
/// a pair without `=` decodes to an empty value.
#[must_use]
pub fn decode_query(raw: &str) -> Params {
    let mut params = Params::default();

    for part in raw.split('&') {
        if part.is_empty() {
            continue;
        }
        let (key, value) = part.split_once('=').unwrap_or((part, ""));
        params.insert(lenient_decode(key), lenient_decode(value));
    }

    params
}

/// Percent-decodes, falling back to the raw text on invalid UTF-8.
fn lenient_decode(raw: &str) -> String {
    urlencoding::decode(raw)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| raw.to_string())
}

// ============================================================================
// Fields
// ============================================================================

/// A normalized inbound message: a flat string-to-string mapping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Fields {
    map: Params,
}

impl Fields {
    /// Creates an empty message.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalizes a raw encoded fragment string.
    #[inline]
    #[must_use]
    pub fn from_query(raw: &str) -> Self {
        Self {
            map: decode_query(raw),
        }
    }

    /// Normalizes an already-structured mapping.
    #[inline]
    #[must_use]
    pub fn from_map(map: Params) -> Self {
        Self { map }
    }

    /// The synthetic message dispatched when a popup is closed by the user.
    ///
    /// Carries only the routing ids; the absent `result` field is what makes
    /// the completion a "no result" one.
    #[must_use]
    pub fn synthetic_close(id: &CorrelationId) -> Self {
        let mut map = Params::default();
        map.insert("frame".to_string(), id.to_string());
        map.insert("cb".to_string(), id.to_string());
        Self { map }
    }

    /// Gets a field value.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Sets a field value.
    #[inline]
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// The surface id this message resolves, if present.
    #[inline]
    #[must_use]
    pub fn frame(&self) -> Option<CorrelationId> {
        self.get("frame").map(CorrelationId::new)
    }

    /// The callback id this message resolves, if present.
    #[inline]
    #[must_use]
    pub fn callback(&self) -> Option<CorrelationId> {
        self.get("cb").map(CorrelationId::new)
    }

    /// The raw return-value channel, if present.
    #[inline]
    #[must_use]
    pub fn result(&self) -> Option<&str> {
        self.get("result")
    }

    /// The raw session payload, if present.
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.get("session")
    }
}

// ============================================================================
// Payload
// ============================================================================

/// What a pending callback is resolved with.
///
/// Cross-context messages resolve with [`Payload::Fields`]; generic API calls
/// resolve with the structured response as [`Payload::Json`].
#[derive(Debug, Clone)]
pub enum Payload {
    /// A normalized cross-context message.
    Fields(Fields),
    /// A structured API response, passed through opaquely.
    Json(Value),
}

impl Payload {
    /// Extracts the message form, if this is one.
    #[inline]
    #[must_use]
    pub fn into_fields(self) -> Option<Fields> {
        match self {
            Self::Fields(fields) => Some(fields),
            Self::Json(_) => None,
        }
    }

    /// Extracts the structured form, if this is one.
    #[inline]
    #[must_use]
    pub fn into_json(self) -> Option<Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Fields(_) => None,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
