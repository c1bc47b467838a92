//! Source locations and spans.

use serde::{Deserialize, Serialize};

use crate::ids::UnitId;

/// A single point in a unit's source text (1-based line, 0-based column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    #[must_use]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

/// A contiguous region of a unit's source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    #[must_use]
    pub const fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn point(pos: Position) -> Self {
        Self { start: pos, end: pos }
    }

    /// True iff `other` lies entirely inside `self`, the invariant required
    /// of every parent->child span in the AST (spec §3).
    #[must_use]
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }
}

/// A location within a specific compilation unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub unit: UnitId,
    pub span: Span,
}

impl Location {
    #[must_use]
    pub const fn new(unit: UnitId, span: Span) -> Self {
        Self { unit, span }
    }

    #[must_use]
    pub const fn line(&self) -> u32 {
        self.span.start.line
    }

    #[must_use]
    pub const fn column(&self) -> u32 {
        self.span.start.column
    }
}
