//! C12 / §4.14: breakpoint lifecycle.
//!
//! `created -> pending -> active -> (hit -> active)* -> removed`. A
//! breakpoint set against a source file that hasn't compiled yet starts
//! `Pending`; it becomes `Active` the moment that unit's source map is
//! registered, whether or not the requested line actually produced any
//! generated code (an empty resolution set just means the breakpoint can
//! never fire -- the same outcome a breakpoint on a blank line has in any
//! line-oriented debugger).

use std::collections::HashMap;

use crate::index::DebugIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BreakpointId(u32);

impl BreakpointId {
    const fn new(id: u32) -> Self {
        Self(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointState {
    Pending,
    Active,
    Removed,
}

struct BreakpointRecord {
    source_name: String,
    source_line: u32,
    state: BreakpointState,
    hit_count: u32,
}

/// Raised when an operation requires a breakpoint that no longer exists or
/// is not in a state that supports it.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum BreakpointError {
    #[error("no such breakpoint: {0:?}")]
    NotFound(BreakpointId),
    #[error("breakpoint {0:?} is not active (it is {1:?})")]
    NotActive(BreakpointId, BreakpointState),
}

/// Tracks every breakpoint across every source file the session knows
/// about, plus the debug index for each file whose unit has compiled.
#[derive(Default)]
pub struct BreakpointTable {
    breakpoints: HashMap<BreakpointId, BreakpointRecord>,
    indices: HashMap<String, DebugIndex>,
    next_id: u32,
}

impl BreakpointTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a breakpoint at `source_line` in `source_name`. Starts
    /// `Active` if that file's index is already registered, `Pending`
    /// otherwise.
    pub fn set(&mut self, source_name: impl Into<String>, source_line: u32) -> BreakpointId {
        let source_name = source_name.into();
        let id = BreakpointId::new(self.next_id);
        self.next_id += 1;
        let state = if self.indices.contains_key(&source_name) { BreakpointState::Active } else { BreakpointState::Pending };
        self.breakpoints.insert(id, BreakpointRecord { source_name, source_line, state, hit_count: 0 });
        id
    }

    pub fn remove(&mut self, id: BreakpointId) -> Result<(), BreakpointError> {
        let record = self.breakpoints.get_mut(&id).ok_or(BreakpointError::NotFound(id))?;
        record.state = BreakpointState::Removed;
        Ok(())
    }

    #[must_use]
    pub fn state(&self, id: BreakpointId) -> Option<BreakpointState> {
        self.breakpoints.get(&id).map(|r| r.state)
    }

    /// Register (or replace) the debug index for a compiled unit, and
    /// transition every pending breakpoint against that source file to
    /// `Active` (spec §4.14: "transition pending->active occurs when the
    /// owning unit is compiled and its source map registered").
    pub fn register_source_map(&mut self, index: DebugIndex) {
        let source_name = index.source_name().to_string();
        for record in self.breakpoints.values_mut() {
            if record.source_name == source_name && record.state == BreakpointState::Pending {
                record.state = BreakpointState::Active;
            }
        }
        self.indices.insert(source_name, index);
    }

    /// Generated lines this breakpoint currently resolves to, or an empty
    /// vec if it is not active or its file's index has no mapping for the
    /// requested source line.
    #[must_use]
    pub fn resolved_generated_lines(&self, id: BreakpointId) -> Vec<u32> {
        let Some(record) = self.breakpoints.get(&id) else { return Vec::new() };
        if record.state != BreakpointState::Active {
            return Vec::new();
        }
        self.indices.get(&record.source_name).map(|idx| idx.source_to_generated(record.source_line)).unwrap_or_default()
    }

    /// Record that execution paused at this breakpoint. Only valid while
    /// `Active`; the breakpoint stays `Active` afterward (the `hit` state
    /// in the lifecycle is transient, not stored).
    pub fn record_hit(&mut self, id: BreakpointId) -> Result<u32, BreakpointError> {
        let record = self.breakpoints.get_mut(&id).ok_or(BreakpointError::NotFound(id))?;
        if record.state != BreakpointState::Active {
            return Err(BreakpointError::NotActive(id, record.state));
        }
        record.hit_count += 1;
        tracing::debug!(source = %record.source_name, line = record.source_line, hit_count = record.hit_count, "breakpoint hit");
        Ok(record.hit_count)
    }

    #[must_use]
    pub fn hit_count(&self, id: BreakpointId) -> u32 {
        self.breakpoints.get(&id).map_or(0, |r| r.hit_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_types::{Mapping, SourceMap};

    fn index_with_line(source_name: &str, source_line: u32, generated_line: u32) -> DebugIndex {
        let mut map = SourceMap::new(source_name);
        map.push_mapping(Mapping { generated_line, generated_column: 0, source_line, source_column: 0 });
        DebugIndex::new(map)
    }

    #[test]
    fn starts_pending_before_the_file_compiles() {
        let mut table = BreakpointTable::new();
        let bp = table.set("unit.ml", 7);
        assert_eq!(table.state(bp), Some(BreakpointState::Pending));
        assert!(table.resolved_generated_lines(bp).is_empty());
    }

    #[test]
    fn activates_once_the_source_map_is_registered() {
        let mut table = BreakpointTable::new();
        let bp = table.set("unit.ml", 7);
        table.register_source_map(index_with_line("unit.ml", 7, 9));
        assert_eq!(table.state(bp), Some(BreakpointState::Active));
        assert_eq!(table.resolved_generated_lines(bp), vec![9]);
    }

    #[test]
    fn created_after_registration_starts_active() {
        let mut table = BreakpointTable::new();
        table.register_source_map(index_with_line("unit.ml", 7, 9));
        let bp = table.set("unit.ml", 7);
        assert_eq!(table.state(bp), Some(BreakpointState::Active));
    }

    #[test]
    fn activation_does_not_spill_across_files() {
        let mut table = BreakpointTable::new();
        let bp = table.set("other.ml", 1);
        table.register_source_map(index_with_line("unit.ml", 7, 9));
        assert_eq!(table.state(bp), Some(BreakpointState::Pending));
    }

    #[test]
    fn records_hits_only_while_active() {
        let mut table = BreakpointTable::new();
        let bp = table.set("unit.ml", 7);
        assert!(table.record_hit(bp).is_err());
        table.register_source_map(index_with_line("unit.ml", 7, 9));
        assert_eq!(table.record_hit(bp).unwrap(), 1);
        assert_eq!(table.record_hit(bp).unwrap(), 2);
        assert_eq!(table.hit_count(bp), 2);
    }

    #[test]
    fn removed_breakpoints_stop_resolving_and_stop_accepting_hits() {
        let mut table = BreakpointTable::new();
        let bp = table.set("unit.ml", 7);
        table.register_source_map(index_with_line("unit.ml", 7, 9));
        table.remove(bp).unwrap();
        assert_eq!(table.state(bp), Some(BreakpointState::Removed));
        assert!(table.resolved_generated_lines(bp).is_empty());
        assert!(table.record_hit(bp).is_err());
    }

    #[test]
    fn double_remove_is_idempotent() {
        let mut table = BreakpointTable::new();
        let bp = table.set("unit.ml", 1);
        table.remove(bp).unwrap();
        assert!(table.remove(bp).is_ok());
        assert_eq!(table.state(bp), Some(BreakpointState::Removed));
    }

    #[test]
    fn removing_an_unknown_breakpoint_is_an_error() {
        let mut table = BreakpointTable::new();
        let never_created = table.set("unit.ml", 1);
        table.remove(never_created).unwrap();
        let unknown = BreakpointId::new(9999);
        assert_eq!(table.remove(unknown), Err(BreakpointError::NotFound(unknown)));
    }
}
