//! Core domain types for the mlpy compilation and security core.
//!
//! This crate performs no I/O and contains no async code: it defines the
//! data model of spec §3 (units, AST, symbol table, diagnostics, artifacts,
//! sandbox results, source maps) so that every other crate in the
//! workspace can share one vocabulary.

pub mod artifact;
pub mod confusables;
pub mod diagnostic;
pub mod host_surface;
pub mod ids;
pub mod location;
pub mod node;
pub mod pattern;
pub mod sandbox_result;
pub mod source_map;
pub mod symbol;
pub mod text;
pub mod unit;

pub use artifact::{Artifact, RequiredCapability};
pub use confusables::{detect_mixed_script, find_zero_width_chars, HomoglyphWarning};
pub use diagnostic::{
    compile_succeeds, has_critical, normalize_diagnostics, render_report, Diagnostic, Severity,
    Stage, SuggestedFix,
};
pub use host_surface::HostSurface;
pub use ids::{ContextId, NodeId, ScopeId, TokenId, UnitId};
pub use location::{Location, Position, Span};
pub use node::{Ast, LiteralValue, Node, NodeKind, NodePayload};
pub use pattern::ResourcePattern;
pub use sandbox_result::{ExitReason, SandboxResult};
pub use source_map::{Mapping, ScopeEntry, SourceMap};
pub use symbol::{Binding, BindingKind, DuplicateBindingError, InferredKind, Scope, ScopeKind, SymbolTable};
pub use text::{truncate_to_fit, truncate_with_ellipsis};
pub use unit::{ContentHash, SourceUnit};
