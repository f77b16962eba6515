//! Feature identifiers.

use uuid::Uuid;

/// Length of generated feature ids.
pub const RANDOM_ID_LEN: usize = 16;

/// Creates a random feature id.
///
/// Generated ids are 16 lowercase hex characters taken from a v4 UUID.
#[must_use]
pub fn random_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(RANDOM_ID_LEN);
    id
}
