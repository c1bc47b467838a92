//! The AST: a closed set of node kinds stored in a flat arena (spec §3).

use serde::{Deserialize, Serialize};

use crate::ids::NodeId;
use crate::location::Location;

/// The closed set of AST node kinds named in spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Program,
    FunctionDef,
    Assignment,
    If,
    Elif,
    While,
    For,
    Try,
    Except,
    Break,
    Continue,
    Return,
    Throw,
    Nonlocal,
    Import,
    CapabilityDecl,
    ResourcePattern,
    PermissionGrant,
    Block,
    ExprStmt,
    Literal,
    Identifier,
    Binary,
    Unary,
    Ternary,
    ArrayAccess,
    Slice,
    MemberAccess,
    FunctionCall,
    ArrayLiteral,
    ObjectLiteral,
    ArrowFn,
    Match,
    Case,
    Pipeline,
    Destructuring,
    Spread,
    Parameter,
}

/// A literal value payload carried by `NodeKind::Literal` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Null,
}

/// The optional typed payload a node may carry, keyed to its `kind`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodePayload {
    pub literal: Option<LiteralValue>,
    pub operator: Option<String>,
    pub name: Option<String>,
    /// For `Identifier` nodes that have been resolved by the information
    /// collector (C4): the binding site they refer to.
    pub resolved_binding: Option<NodeId>,
}

/// A single AST node. `children` are ids into the same `Ast` arena, never
/// owning pointers, so the tree is copy-free and carries no reference
/// cycles even with back-references like `resolved_binding`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub children: Vec<NodeId>,
    pub location: Location,
    pub payload: NodePayload,
}

/// The AST arena for one compilation unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ast {
    nodes: Vec<Node>,
    pub root: Option<NodeId>,
}

impl Ast {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(
        &mut self,
        kind: NodeKind,
        children: Vec<NodeId>,
        location: Location,
        payload: NodePayload,
    ) -> NodeId {
        let id = NodeId::new(u32::try_from(self.nodes.len()).expect("AST exceeds 2^32 nodes"));
        self.nodes.push(Node { id, kind, children, location, payload });
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Validates the §3 invariant that parent spans monotonically contain
    /// every child span. Returns the ids of children that violate it.
    #[must_use]
    pub fn find_span_violations(&self) -> Vec<NodeId> {
        let mut violations = Vec::new();
        for node in &self.nodes {
            for &child_id in &node.children {
                let child = self.get(child_id);
                if node.location.unit != child.location.unit
                    || !node.location.span.contains(&child.location.span)
                {
                    violations.push(child_id);
                }
            }
        }
        violations
    }

    /// Depth-first pre-order walk starting at `root`, parent before child.
    pub fn walk_preorder(&self, root: NodeId, mut visit: impl FnMut(&Node)) {
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let node = self.get(id);
            visit(node);
            for &child in node.children.iter().rev() {
                stack.push(child);
            }
        }
    }
}
