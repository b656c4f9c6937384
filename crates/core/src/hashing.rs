//! SHA-256 digests used for notification keys.
//!
//! Dedup keys themselves are plain text (see [`crate::log_entry`]); the
//! digest only gives presentation layers a short, fixed-width identifier.

use sha2::{Digest, Sha256};

/// Number of hex characters kept for a notification key.
const NOTIFICATION_KEY_LEN: usize = 16;

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// Short, stable notification key derived from a log entry's content hash.
pub fn notification_key(content_hash: &str) -> String {
    let mut digest = sha256_hex(content_hash.as_bytes());
    digest.truncate(NOTIFICATION_KEY_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn notification_key_is_short_and_stable() {
        let key = notification_key("19:2024-05-01T10:00:00|3:abc|3:rr|4:view");
        assert_eq!(key.len(), NOTIFICATION_KEY_LEN);
        assert_eq!(key, notification_key("19:2024-05-01T10:00:00|3:abc|3:rr|4:view"));
        assert_ne!(key, notification_key("19:2024-05-01T10:00:01|3:abc|3:rr|4:view"));
    }
}
