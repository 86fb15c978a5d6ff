//! Cross-context request protocol types.
//!
//! This module defines the message normalization, URL-builder vocabulary,
//! and request-shaping rules shared by both transports.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `message` | Inbound message normalization and query codec |
//! | `url` | Relation hint, result sentinel, field extraction |
//! | `sign` | Request shaping and signatures |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound message normalization and query-string codec.
pub mod message;

/// Request shaping and signatures.
pub mod sign;

/// Handler URL vocabulary and field extraction.
pub mod url;

// ============================================================================
// Re-exports
// ============================================================================

pub use message::{Fields, Params, Payload, decode_query, encode_query};
pub use sign::{CallIdCounter, shape_request, signature};
pub use url::{RESULT_SENTINEL, Relation, extract_perms, extract_result, extract_session};
