//! Symbol table: a tree of scopes, one binding per name per scope (spec §3).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ids::{NodeId, ScopeId};
use crate::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeKind {
    Program,
    Function,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingKind {
    Parameter,
    Local,
    Free,
    Import,
    Capability,
}

/// A coarse, flow-insensitive inferred kind for a binding (spec §4.4).
/// Assignment narrows; joining at merge points falls back to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InferredKind {
    Number,
    String,
    Boolean,
    Array,
    Object,
    Function,
    Unknown,
}

impl InferredKind {
    /// Join at a control-flow merge point: agreement keeps the kind, any
    /// disagreement falls back to `Unknown` (spec §4.4).
    #[must_use]
    pub fn join(self, other: Self) -> Self {
        if self == other { self } else { Self::Unknown }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Binding {
    pub name: String,
    pub first_bound: Location,
    pub kind: BindingKind,
    pub mutable: bool,
    pub captured_by: Vec<ScopeId>,
    pub inferred_kind: InferredKind,
    /// Set when a `nonlocal name;` statement resolves this binding to the
    /// nearest enclosing function scope rather than the local one.
    pub is_nonlocal: bool,
    /// The AST node (parameter, identifier target, or import) that
    /// introduced this binding, so that identifier uses can record a
    /// `resolved_binding` pointing at the declaration site.
    pub declared_node: NodeId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scope {
    pub id: ScopeId,
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub owner_node: Option<NodeId>,
    bindings: HashMap<String, Binding>,
}

impl Scope {
    #[must_use]
    pub fn binding(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    pub fn binding_mut(&mut self, name: &str) -> Option<&mut Binding> {
        self.bindings.get_mut(name)
    }

    pub fn bindings(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.values()
    }
}

/// Error returned when a scope already has a binding for a name: shadowing
/// must introduce a new scope, not overwrite an existing binding in place
/// (spec §3: "A scope has exactly one binding per name").
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("name `{0}` is already bound in this scope")]
pub struct DuplicateBindingError(pub String);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_scope(
        &mut self,
        kind: ScopeKind,
        parent: Option<ScopeId>,
        owner_node: Option<NodeId>,
    ) -> ScopeId {
        let id = ScopeId::new(u32::try_from(self.scopes.len()).expect("too many scopes"));
        self.scopes.push(Scope { id, kind, parent, owner_node, bindings: HashMap::new() });
        id
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn bind(&mut self, scope: ScopeId, binding: Binding) -> Result<(), DuplicateBindingError> {
        let scope = self.scope_mut(scope);
        if scope.bindings.contains_key(&binding.name) {
            return Err(DuplicateBindingError(binding.name));
        }
        scope.bindings.insert(binding.name.clone(), binding);
        Ok(())
    }

    /// Walk the parent chain starting at `scope` looking for `name`,
    /// returning the scope that owns the binding.
    #[must_use]
    pub fn resolve(&self, scope: ScopeId, name: &str) -> Option<(ScopeId, &Binding)> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(binding) = s.binding(name) {
                return Some((id, binding));
            }
            current = s.parent;
        }
        None
    }

    /// Nearest enclosing function scope starting at (and including) `scope`,
    /// used to resolve `nonlocal` (spec §3, §4.1).
    #[must_use]
    pub fn nearest_function_scope(&self, scope: ScopeId) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if matches!(s.kind, ScopeKind::Function) {
                return Some(id);
            }
            current = s.parent;
        }
        None
    }

    /// Record that `free_scope` captures the binding for `name` resolved
    /// from `owner_scope`, used by the emitter (C8) to decide one shared
    /// cell per captured binding.
    pub fn record_capture(&mut self, owner_scope: ScopeId, name: &str, free_scope: ScopeId) {
        if let Some(binding) = self.scope_mut(owner_scope).bindings.get_mut(name) {
            if !binding.captured_by.contains(&free_scope) {
                binding.captured_by.push(free_scope);
            }
        }
    }

    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter()
    }
}
