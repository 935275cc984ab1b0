//! Content fingerprinting for change detection.
//!
//! The digest covers the raw document content only — no metadata is mixed
//! in, so a title rename without a content edit never triggers re-ingestion.
//! Equality comparison is the sole consumer; this is not a security
//! boundary.

use sha2::{Digest, Sha256};

/// Compute the hex fingerprint of `content`. Deterministic and free of side
/// effects.
pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_content_identical_digest() {
        assert_eq!(fingerprint("This is test content"), fingerprint("This is test content"));
        assert_eq!(fingerprint(""), fingerprint(""));
    }

    #[test]
    fn different_content_different_digest() {
        assert_ne!(fingerprint("This is test content"), fingerprint("Different content"));
        assert_ne!(fingerprint("v1"), fingerprint("v2"));
        // A single-byte difference is enough.
        assert_ne!(fingerprint("plan a"), fingerprint("plan b"));
    }

    #[test]
    fn digest_is_hex_encoded_sha256() {
        let digest = fingerprint("anything");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
