//! Content hashing for change detection.

use std::fmt;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash raw file contents.
    pub fn of(bytes: &[u8]) -> Self {
        Self(*blake3::hash(bytes).as_bytes())
    }

    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // First 16 hex chars are plenty for log lines
        write!(f, "{}", &self.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_content_addressed() {
        assert_eq!(ContentHash::of(b"figure"), ContentHash::of(b"figure"));
        assert_ne!(ContentHash::of(b"figure"), ContentHash::of(b"figurf"));
    }

    #[test]
    fn test_display_is_short_hex() {
        let hash = ContentHash::of(b"abc");
        let shown = hash.to_string();
        assert_eq!(shown.len(), 16);
        assert!(hash.to_hex().starts_with(&shown));
    }
}
