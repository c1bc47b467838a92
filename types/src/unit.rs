//! Source units (spec §3): immutable, content-hashed compilation inputs.

use sha2::{Digest, Sha256};

use crate::diagnostic::Diagnostic;
use crate::ids::UnitId;

/// A content hash, hex-encoded SHA-256 of the unit's source text. Used as
/// the artifact cache key component and as the stable identity of a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    #[must_use]
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }

    #[must_use]
    pub fn to_hex(self) -> String {
        self.0.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// One logical source input to the compiler (spec §3). Units are immutable
/// after load; recompiling the same path creates a new `SourceUnit`.
#[derive(Debug, Clone)]
pub struct SourceUnit {
    pub id: UnitId,
    pub path: String,
    pub source: String,
    pub content_hash: ContentHash,
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceUnit {
    #[must_use]
    pub fn new(id: UnitId, path: impl Into<String>, source: impl Into<String>) -> Self {
        let source = source.into();
        let content_hash = ContentHash::of(source.as_bytes());
        Self { id, path: path.into(), source, content_hash, diagnostics: Vec::new() }
    }

    /// 1-based line text, used by diagnostics presenters and the debug
    /// index to show source context. Returns `None` past end-of-file.
    #[must_use]
    pub fn line(&self, line: u32) -> Option<&str> {
        self.source.lines().nth(line.checked_sub(1)? as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_source_hashes_identically() {
        let a = ContentHash::of(b"x = 1;");
        let b = ContentHash::of(b"x = 1;");
        assert_eq!(a, b);
    }

    #[test]
    fn different_source_hashes_differently() {
        let a = ContentHash::of(b"x = 1;");
        let b = ContentHash::of(b"x = 2;");
        assert_ne!(a, b);
    }

    #[test]
    fn line_lookup_is_one_based() {
        let unit = SourceUnit::new(UnitId::new(0), "a.ml", "first\nsecond\nthird");
        assert_eq!(unit.line(1), Some("first"));
        assert_eq!(unit.line(3), Some("third"));
        assert_eq!(unit.line(0), None);
        assert_eq!(unit.line(4), None);
    }
}
