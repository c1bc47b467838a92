//! Source maps (spec §3, §4.8, §4.12, §6): bidirectional position mapping
//! between ML source and generated target text, plus the scope/symbol
//! indices the debugger needs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One generated-source <-> source position mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub generated_line: u32,
    pub generated_column: u32,
    pub source_line: u32,
    pub source_column: u32,
}

/// A lexical scope entry carried for debugger display (Source-Map v3
/// envelope extension per spec §6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub parent_index: Option<u32>,
}

/// Source-Map v3-compatible envelope plus the additional fields required by
/// spec §6 (`scopes`, `symbols`, `required_capabilities` live alongside it
/// on `Artifact`; this type owns the positional mapping and scope/symbol
/// indices proper).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceMap {
    pub source_name: String,
    mappings: Vec<Mapping>,
    pub scopes: Vec<ScopeEntry>,
    /// name -> index into `scopes`.
    pub symbols: BTreeMap<String, u32>,
}

impl SourceMap {
    #[must_use]
    pub fn new(source_name: impl Into<String>) -> Self {
        Self { source_name: source_name.into(), ..Self::default() }
    }

    /// Record a mapping. Called incrementally as the emitter produces each
    /// line (spec §4.8: "Source map is written incrementally").
    pub fn push_mapping(&mut self, mapping: Mapping) {
        self.mappings.push(mapping);
    }

    #[must_use]
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }

    /// Forward index: source line -> sorted, deduplicated generated lines.
    #[must_use]
    pub fn source_to_generated(&self, source_line: u32) -> Vec<u32> {
        let mut lines: Vec<u32> = self
            .mappings
            .iter()
            .filter(|m| m.source_line == source_line)
            .map(|m| m.generated_line)
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }

    /// Reverse index: generated line -> the first matching source position.
    #[must_use]
    pub fn generated_to_source(&self, generated_line: u32) -> Option<(u32, u32)> {
        self.mappings
            .iter()
            .find(|m| m.generated_line == generated_line)
            .map(|m| (m.source_line, m.source_column))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_in_both_directions() {
        let mut map = SourceMap::new("unit.ml");
        map.push_mapping(Mapping { generated_line: 12, generated_column: 4, source_line: 7, source_column: 2 });

        assert_eq!(map.source_to_generated(7), vec![12]);
        assert_eq!(map.generated_to_source(12), Some((7, 2)));
    }

    #[test]
    fn forward_index_is_sorted_and_deduped() {
        let mut map = SourceMap::new("unit.ml");
        map.push_mapping(Mapping { generated_line: 5, generated_column: 0, source_line: 1, source_column: 0 });
        map.push_mapping(Mapping { generated_line: 3, generated_column: 0, source_line: 1, source_column: 0 });
        map.push_mapping(Mapping { generated_line: 5, generated_column: 1, source_line: 1, source_column: 0 });

        assert_eq!(map.source_to_generated(1), vec![3, 5]);
    }
}
