//! Path-segment encoding for provider REST URLs.
//!
//! Tool arguments that name remote objects (order ids, model ids, knowledge
//! base ids) end up inside URL paths. Every byte outside the RFC 3986
//! unreserved set is percent-encoded, so `/`, `?`, `#` and `%` in an argument
//! can never add path segments or change which endpoint is called.

use crate::error::SegmentError;

/// Percent-encode a single path segment, keeping only `A-Z a-z 0-9 - _ . ~`.
///
/// Hex digits are uppercase, which is also the canonical form AWS SigV4
/// expects.
pub fn encode_segment(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

/// Encode a caller-supplied resource id as one path segment.
///
/// Empty ids and the dot segments `.` and `..` are rejected: URL parsers
/// resolve dot segments even in their percent-encoded form.
pub fn resource_segment(name: &'static str, value: &str) -> Result<String, SegmentError> {
    match value {
        "" | "." | ".." => Err(SegmentError {
            name,
            value: value.to_string(),
        }),
        _ => Ok(encode_segment(value)),
    }
}
