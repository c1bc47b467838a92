//! C12: debug index.
//!
//! Wraps a unit's `SourceMap` with the two lookups a debugger actually
//! needs -- "which generated lines did this source line produce" for
//! breakpoint placement, and "what source position produced this generated
//! line" for frame symbolication -- plus a frame-variable filter that hides
//! names the emitter invented (`safe_attr`/`match` temporaries, the runtime
//! import alias) rather than names the program author wrote.

use mlpy_types::{ScopeId, SourceMap, SymbolTable};

/// Prefix/exact names the emitter introduces that never belong in a
/// frame's visible variable list (spec §4.12: "filtered by the symbol
/// table to hide emitter-internal names"). Kept in sync with the literal
/// names `mlpy-codegen`'s emitter writes.
const SYNTHETIC_PREFIX: &str = "__ml_match_";
const RUNTIME_ALIAS: &str = "_mlpy_runtime";

#[must_use]
pub fn is_synthetic_name(name: &str) -> bool {
    name.starts_with(SYNTHETIC_PREFIX) || name == RUNTIME_ALIAS
}

/// A unit's bidirectional position index, built once after the unit is
/// compiled and its source map registered.
pub struct DebugIndex {
    source_map: SourceMap,
}

impl DebugIndex {
    #[must_use]
    pub fn new(source_map: SourceMap) -> Self {
        Self { source_map }
    }

    #[must_use]
    pub fn source_name(&self) -> &str {
        &self.source_map.source_name
    }

    /// ML source line -> the generated lines it produced, sorted and
    /// deduplicated. Empty means the line never reached the emitter (a
    /// comment, blank line, or dead code the optimizer removed).
    #[must_use]
    pub fn source_to_generated(&self, source_line: u32) -> Vec<u32> {
        self.source_map.source_to_generated(source_line)
    }

    /// Generated line -> the source position that produced it, for
    /// symbolicating a paused frame's program counter.
    #[must_use]
    pub fn generated_to_source(&self, generated_line: u32) -> Option<(u32, u32)> {
        self.source_map.generated_to_source(generated_line)
    }

    #[must_use]
    pub fn source_map(&self) -> &SourceMap {
        &self.source_map
    }
}

/// Variable names visible in `scope` and every enclosing scope, with
/// emitter-internal names filtered out and duplicates (shadowed names)
/// collapsed to their innermost binding.
#[must_use]
pub fn visible_frame_variables(symbols: &SymbolTable, scope: ScopeId) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();
    let mut current = Some(scope);
    while let Some(id) = current {
        let s = symbols.scope(id);
        for binding in s.bindings() {
            if is_synthetic_name(&binding.name) {
                continue;
            }
            if seen.insert(binding.name.clone()) {
                names.push(binding.name.clone());
            }
        }
        current = s.parent;
    }
    names.sort();
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_types::Mapping;

    #[test]
    fn forwards_and_reverses_through_the_wrapped_source_map() {
        let mut map = SourceMap::new("unit.ml");
        map.push_mapping(Mapping { generated_line: 2, generated_column: 0, source_line: 1, source_column: 0 });
        let index = DebugIndex::new(map);
        assert_eq!(index.source_to_generated(1), vec![2]);
        assert_eq!(index.generated_to_source(2), Some((1, 0)));
        assert_eq!(index.source_name(), "unit.ml");
    }

    #[test]
    fn unmapped_source_line_resolves_to_nothing() {
        let map = SourceMap::new("unit.ml");
        let index = DebugIndex::new(map);
        assert!(index.source_to_generated(99).is_empty());
    }

    #[test]
    fn filters_synthetic_names_and_collapses_shadowing() {
        use mlpy_types::{Binding, BindingKind, InferredKind, Location, NodeId, Position, ScopeKind, Span, UnitId};

        let mut symbols = SymbolTable::new();
        let outer = symbols.create_scope(ScopeKind::Function, None, None);
        let inner = symbols.create_scope(ScopeKind::Block, Some(outer), None);
        let loc = Location::new(UnitId::new(0), Span::point(Position::new(1, 0)));

        symbols
            .bind(outer, Binding {
                name: "x".to_string(),
                first_bound: loc,
                kind: BindingKind::Local,
                mutable: true,
                captured_by: Vec::new(),
                inferred_kind: InferredKind::Number,
                is_nonlocal: false,
                declared_node: NodeId::new(0),
            })
            .unwrap();
        symbols
            .bind(outer, Binding {
                name: "_mlpy_runtime".to_string(),
                first_bound: loc,
                kind: BindingKind::Import,
                mutable: false,
                captured_by: Vec::new(),
                inferred_kind: InferredKind::Unknown,
                is_nonlocal: false,
                declared_node: NodeId::new(1),
            })
            .unwrap();
        symbols
            .bind(inner, Binding {
                name: "y".to_string(),
                first_bound: loc,
                kind: BindingKind::Local,
                mutable: true,
                captured_by: Vec::new(),
                inferred_kind: InferredKind::String,
                is_nonlocal: false,
                declared_node: NodeId::new(2),
            })
            .unwrap();
        symbols
            .bind(inner, Binding {
                name: "__ml_match_0".to_string(),
                first_bound: loc,
                kind: BindingKind::Local,
                mutable: true,
                captured_by: Vec::new(),
                inferred_kind: InferredKind::Unknown,
                is_nonlocal: false,
                declared_node: NodeId::new(3),
            })
            .unwrap();

        let visible = visible_frame_variables(&symbols, inner);
        assert_eq!(visible, vec!["x".to_string(), "y".to_string()]);
    }
}
