//! Hashing utilities for zstore
//!
//! BLAKE3 is used to derive per-client bucket segments. It is a namespacing
//! aid, not a security boundary.

/// Number of hash bytes kept for a bucket segment
pub const BUCKET_HASH_BYTES: usize = 16;

/// Compute the bucket segment for raw client identity bytes.
///
/// Always `2 * BUCKET_HASH_BYTES` lowercase hex characters.
pub fn bucket_hash(data: &[u8]) -> String {
    let hash = blake3::hash(data);
    hex::encode(&hash.as_bytes()[..BUCKET_HASH_BYTES])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_hash_fixed_length() {
        for input in [&b""[..], b"127.0.0.1", b"2001:db8::1"] {
            let bucket = bucket_hash(input);
            assert_eq!(bucket.len(), 32);
            assert!(bucket.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        }
    }

    #[test]
    fn test_bucket_hash_deterministic() {
        assert_eq!(bucket_hash(b"10.0.0.1"), bucket_hash(b"10.0.0.1"));
        assert_ne!(bucket_hash(b"10.0.0.1"), bucket_hash(b"10.0.0.2"));
    }

    #[test]
    fn test_bucket_hash_is_blake3_prefix() {
        let full = blake3::hash(b"192.168.1.20").to_hex();
        assert!(full.as_str().starts_with(&bucket_hash(b"192.168.1.20")));
    }
}
