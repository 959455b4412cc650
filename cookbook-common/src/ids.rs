//! Record identifier utilities
//!
//! Identifiers are generated on the client before any network round trip, so
//! they must be globally unique without coordination. UUIDv4 in its simple
//! (hyphen-free) form is used.

use uuid::Uuid;

/// Generate a new globally-unique record identifier
pub fn generate() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Check that a string is usable as a record identifier
///
/// Identifiers are opaque, so anything non-empty without surrounding
/// whitespace is accepted; records created by older clients did not use UUIDs.
pub fn is_valid(id: &str) -> bool {
    !id.is_empty() && id.trim() == id
}
