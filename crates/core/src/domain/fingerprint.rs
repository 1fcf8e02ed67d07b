// Content Fingerprint - the cache key

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// 256-bit content digest, lowercase hex-encoded (64 chars).
///
/// Computed over the raw submitted bytes; no normalization is applied, so
/// two submissions hash equal iff their bytes are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash raw file bytes. Deterministic and infallible.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wrap an already-computed hex digest (e.g. read back from storage).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_and_hex_encoded() {
        let a = Fingerprint::of_bytes(b"const x = 1;\n");
        let b = Fingerprint::of_bytes(b"const x = 1;\n");
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn distinct_content_distinct_digest() {
        let a = Fingerprint::of_bytes(b"let a = 1;");
        let b = Fingerprint::of_bytes(b"let a = 2;");
        assert_ne!(a, b);
    }

    #[test]
    fn raw_bytes_no_normalization() {
        // Trailing whitespace must change the digest.
        let a = Fingerprint::of_bytes(b"x = 1");
        let b = Fingerprint::of_bytes(b"x = 1 ");
        assert_ne!(a, b);
    }
}
