//! Glob-style resource patterns shared by the capability system and the
//! safe attribute registry, built on `globset` the same way sandbox
//! deny-patterns and credential env-var matching are elsewhere in this
//! codebase.

use globset::{Glob, GlobMatcher};

/// A single glob pattern plus its compiled matcher, kept alongside the
/// source text so tokens and diagnostics can display it without
/// recompiling.
#[derive(Debug, Clone)]
pub struct ResourcePattern {
    text: String,
    matcher: GlobMatcher,
}

impl ResourcePattern {
    pub fn compile(text: impl Into<String>) -> Result<Self, globset::Error> {
        let text = text.into();
        let matcher = Glob::new(&text)?.compile_matcher();
        Ok(Self { text, matcher })
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn matches(&self, resource: &str) -> bool {
        self.matcher.is_match(resource)
    }
}

impl PartialEq for ResourcePattern {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for ResourcePattern {}

impl serde::Serialize for ResourcePattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.text)
    }
}

impl<'de> serde::Deserialize<'de> for ResourcePattern {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::compile(text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_matches_nested_paths() {
        let pattern = ResourcePattern::compile("/data/**/*.txt").unwrap();
        assert!(pattern.matches("/data/a/b/c.txt"));
        assert!(!pattern.matches("/data/a/b/c.csv"));
    }

    #[test]
    fn rejects_malformed_pattern() {
        assert!(ResourcePattern::compile("[").is_err());
    }
}
