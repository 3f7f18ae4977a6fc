use sha2::{Digest, Sha256};

/// Hashes a raw machine identifier (e.g. a MAC address) into the opaque
/// fingerprint stored in a [`UserIdentity`](crate::UserIdentity).
///
/// Returns lowercase hex SHA-256. The raw identifier is never kept.
pub fn hash_fingerprint(raw: &str) -> String {
    let digest = Sha256::digest(raw.trim().as_bytes());
    hex::encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_fingerprint_known_value() {
        assert_eq!(
            hash_fingerprint("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_hash_fingerprint_ignores_surrounding_whitespace() {
        assert_eq!(
            hash_fingerprint("  00:1a:2b:3c:4d:5e\n"),
            hash_fingerprint("00:1a:2b:3c:4d:5e")
        );
    }

    #[test]
    fn test_hash_fingerprint_never_returns_raw_input() {
        let raw = "00:1a:2b:3c:4d:5e";
        let hashed = hash_fingerprint(raw);
        assert_ne!(hashed, raw);
        assert_eq!(hashed.len(), 64);
    }
}
