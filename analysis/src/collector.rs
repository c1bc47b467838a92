//! C4: information collector.
//!
//! Builds the scope graph and symbol table, resolves every identifier use
//! to a declaration site, and infers a coarse, flow-insensitive kind for
//! each binding. This pass never raises: a name that fails to resolve is
//! simply left unresolved for the security analyzer and emitter to react to
//! (spec §4.4 "always produces partial results").

use std::collections::{HashMap, HashSet};

use mlpy_types::{
    Ast, Binding, BindingKind, InferredKind, Location, Node, NodeId, NodeKind, ScopeId, ScopeKind,
    SymbolTable,
};

pub struct CollectorOutput {
    pub symbols: SymbolTable,
}

#[must_use]
pub fn collect(ast: &mut Ast) -> CollectorOutput {
    tracing::debug!(stage = "collect", nodes = ast.len(), "building scope graph and symbol table");
    let Some(root) = ast.root else {
        return CollectorOutput { symbols: SymbolTable::new() };
    };

    let resolutions = {
        let mut collector = Collector {
            ast,
            symbols: SymbolTable::new(),
            nonlocal_names: HashMap::new(),
            resolutions: Vec::new(),
        };
        let program_scope = collector.symbols.create_scope(ScopeKind::Program, None, Some(root));
        collector.walk_block(root, program_scope);
        (collector.symbols, collector.resolutions)
    };

    let (symbols, resolutions) = resolutions;
    for (use_id, declared_node) in resolutions {
        ast.get_mut(use_id).payload.resolved_binding = Some(declared_node);
    }

    CollectorOutput { symbols }
}

struct Collector<'a> {
    ast: &'a Ast,
    symbols: SymbolTable,
    /// Names declared `nonlocal` within a given function scope.
    nonlocal_names: HashMap<ScopeId, HashSet<String>>,
    /// `(identifier-use node, binding-declaration node)` pairs applied to
    /// the AST after the walk completes.
    resolutions: Vec<(NodeId, NodeId)>,
}

impl<'a> Collector<'a> {
    fn node(&self, id: NodeId) -> &'a Node {
        self.ast.get(id)
    }

    fn enter_block(&mut self, parent: ScopeId, owner: NodeId) -> ScopeId {
        self.symbols.create_scope(ScopeKind::Block, Some(parent), Some(owner))
    }

    fn bind(&mut self, scope: ScopeId, name: String, kind: BindingKind, location: Location, declared_node: NodeId, inferred: InferredKind) {
        // A duplicate declaration in the same scope (e.g. two `function f` at
        // the same level) simply keeps the first binding; the validator is
        // the place that would flag redeclaration, not the collector.
        let _ = self.symbols.bind(
            scope,
            Binding {
                name,
                first_bound: location,
                kind,
                mutable: !matches!(kind, BindingKind::Capability | BindingKind::Import),
                captured_by: Vec::new(),
                inferred_kind: inferred,
                is_nonlocal: false,
                declared_node,
            },
        );
    }

    fn walk_block(&mut self, block_id: NodeId, scope: ScopeId) {
        for &child in &self.node(block_id).children {
            self.walk_stmt(child, scope);
        }
    }

    fn walk_stmt(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        match node.kind {
            NodeKind::Program | NodeKind::Block => {
                let child_scope = self.enter_block(scope, id);
                self.walk_block(id, child_scope);
            }
            NodeKind::FunctionDef => self.walk_function(id, scope),
            NodeKind::Assignment => self.walk_assignment(id, scope),
            NodeKind::ExprStmt => self.walk_expr(node.children[0], scope),
            NodeKind::If => self.walk_if(id, scope),
            NodeKind::While => {
                self.walk_expr(node.children[0], scope);
                let body_scope = self.enter_block(scope, id);
                self.walk_block(node.children[1], body_scope);
            }
            NodeKind::For => self.walk_for(id, scope),
            NodeKind::Try => self.walk_try(id, scope),
            NodeKind::Throw => self.walk_expr(node.children[0], scope),
            NodeKind::Return => {
                if let Some(&expr) = node.children.first() {
                    self.walk_expr(expr, scope);
                }
            }
            NodeKind::Nonlocal => {
                if let Some(name) = node.payload.name.clone() {
                    let fn_scope = self.symbols.nearest_function_scope(scope).unwrap_or(scope);
                    self.nonlocal_names.entry(fn_scope).or_default().insert(name);
                }
            }
            NodeKind::Import => {
                let name = node.payload.name.clone().unwrap_or_default();
                let bound_name = node.payload.operator.clone().unwrap_or(name);
                self.bind(scope, bound_name, BindingKind::Import, node.location, id, InferredKind::Unknown);
            }
            NodeKind::CapabilityDecl => {
                if let Some(name) = node.payload.name.clone() {
                    self.bind(scope, name, BindingKind::Capability, node.location, id, InferredKind::Unknown);
                }
            }
            NodeKind::Break | NodeKind::Continue => {}
            _ => self.walk_expr(id, scope),
        }
    }

    fn walk_function(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        let fn_scope = self.symbols.create_scope(ScopeKind::Function, Some(scope), Some(id));
        let (params, body) = node.children.split_at(node.children.len() - 1);
        for &param_id in params {
            let param = self.node(param_id);
            if let Some(name) = param.payload.name.clone() {
                self.bind(fn_scope, name, BindingKind::Parameter, param.location, param_id, InferredKind::Unknown);
            }
        }
        if let Some(&body_id) = body.first() {
            self.walk_block(body_id, fn_scope);
        }
    }

    fn walk_if(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        self.walk_expr(node.children[0], scope);
        let then_scope = self.enter_block(scope, id);
        self.walk_block(node.children[1], then_scope);
        if let Some(&tail) = node.children.get(2) {
            if self.node(tail).kind == NodeKind::If {
                self.walk_if(tail, scope);
            } else {
                let else_scope = self.enter_block(scope, id);
                self.walk_block(tail, else_scope);
            }
        }
    }

    fn walk_for(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        let var_id = node.children[0];
        let iterable = node.children[1];
        let body = node.children[2];
        self.walk_expr(iterable, scope);
        let body_scope = self.enter_block(scope, id);
        let var_name = self.node(var_id).payload.name.clone().unwrap_or_default();
        self.bind(body_scope, var_name, BindingKind::Local, self.node(var_id).location, var_id, InferredKind::Unknown);
        self.walk_block(body, body_scope);
    }

    fn walk_try(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        let try_scope = self.enter_block(scope, id);
        self.walk_block(node.children[0], try_scope);

        if let Some(&except_id) = node.children.get(1) {
            let except_node = self.node(except_id);
            let except_scope = self.enter_block(scope, except_id);
            if let Some(name) = except_node.payload.name.clone() {
                self.bind(except_scope, name, BindingKind::Local, except_node.location, except_id, InferredKind::Unknown);
            }
            self.walk_block(except_node.children[0], except_scope);
        }

        if let Some(&finally_id) = node.children.get(2) {
            let finally_scope = self.enter_block(scope, id);
            self.walk_block(finally_id, finally_scope);
        }
    }

    fn walk_assignment(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        let lhs_id = node.children[0];
        let rhs_id = node.children[1];
        self.walk_expr(rhs_id, scope);
        let inferred = self.infer_kind(rhs_id);

        let lhs = self.node(lhs_id);
        if lhs.kind != NodeKind::Identifier {
            // Member/index assignment targets: resolve the base expression
            // as a use, nothing new is bound.
            self.walk_expr(lhs_id, scope);
            return;
        }
        let Some(name) = lhs.payload.name.clone() else { return };
        let location = lhs.location;

        let fn_scope = self.symbols.nearest_function_scope(scope).unwrap_or(scope);
        let is_nonlocal = self.nonlocal_names.get(&fn_scope).is_some_and(|names| names.contains(&name));

        if is_nonlocal {
            let search_start = self.symbols.scope(fn_scope).parent;
            if let Some(outer_scope) = search_start {
                if let Some((owner_scope, binding)) = self.symbols.resolve(outer_scope, &name) {
                    let declared_node = binding.declared_node;
                    let joined = binding.inferred_kind.join(inferred);
                    if let Some(b) = self.symbols.scope_mut(owner_scope).binding_mut(&name) {
                        b.inferred_kind = joined;
                        b.is_nonlocal = true;
                    }
                    self.symbols.record_capture(owner_scope, &name, fn_scope);
                    self.resolutions.push((lhs_id, declared_node));
                    return;
                }
            }
        }

        if let Some(binding) = self.symbols.scope(scope).binding(&name) {
            let declared_node = binding.declared_node;
            let joined = binding.inferred_kind.join(inferred);
            if let Some(b) = self.symbols.scope_mut(scope).binding_mut(&name) {
                b.inferred_kind = joined;
            }
            self.resolutions.push((lhs_id, declared_node));
        } else {
            self.bind(scope, name, BindingKind::Local, location, lhs_id, inferred);
            self.resolutions.push((lhs_id, lhs_id));
        }
    }

    fn walk_expr(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        match node.kind {
            NodeKind::Identifier => {
                if let Some(name) = &node.payload.name {
                    if let Some((owner_scope, binding)) = self.symbols.resolve(scope, name) {
                        self.resolutions.push((id, binding.declared_node));
                        let fn_scope = self.symbols.nearest_function_scope(scope).unwrap_or(scope);
                        if owner_scope != fn_scope && self.symbols.scope(owner_scope).kind == ScopeKind::Function {
                            self.symbols.record_capture(owner_scope, name, fn_scope);
                        }
                    }
                }
            }
            NodeKind::ArrowFn => self.walk_arrow_fn(id, scope),
            _ => {
                for &child in &node.children {
                    self.walk_expr(child, scope);
                }
            }
        }
    }

    fn walk_arrow_fn(&mut self, id: NodeId, scope: ScopeId) {
        let node = self.node(id);
        let fn_scope = self.symbols.create_scope(ScopeKind::Function, Some(scope), Some(id));
        let (params, body) = node.children.split_at(node.children.len() - 1);
        for &param_id in params {
            let param = self.node(param_id);
            if let Some(name) = param.payload.name.clone() {
                self.bind(fn_scope, name, BindingKind::Parameter, param.location, param_id, InferredKind::Unknown);
            }
        }
        if let Some(&body_id) = body.first() {
            self.walk_expr(body_id, fn_scope);
        }
    }

    fn infer_kind(&self, id: NodeId) -> InferredKind {
        let node = self.node(id);
        match node.kind {
            NodeKind::Literal => match &node.payload.literal {
                Some(mlpy_types::LiteralValue::Number(_)) => InferredKind::Number,
                Some(mlpy_types::LiteralValue::String(_)) => InferredKind::String,
                Some(mlpy_types::LiteralValue::Boolean(_)) => InferredKind::Boolean,
                Some(mlpy_types::LiteralValue::Null) | None => InferredKind::Unknown,
            },
            NodeKind::ArrayLiteral => InferredKind::Array,
            NodeKind::ObjectLiteral => InferredKind::Object,
            NodeKind::ArrowFn => InferredKind::Function,
            NodeKind::Ternary => {
                let then_kind = self.infer_kind(node.children[1]);
                let else_kind = self.infer_kind(node.children[2]);
                then_kind.join(else_kind)
            }
            _ => InferredKind::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_lexer::parse;
    use mlpy_types::UnitId;

    fn collect_source(src: &str) -> (Ast, SymbolTable) {
        let out = parse(UnitId::new(0), src);
        let mut ast = out.ast;
        let result = collect(&mut ast);
        (ast, result.symbols)
    }

    #[test]
    fn resolves_simple_local_assignment_and_use() {
        let (ast, _symbols) = collect_source("x = 1; y = x + 1;");
        let root = ast.get(ast.root.unwrap());
        let second = ast.get(root.children[1]);
        let rhs = ast.get(second.children[1]); // x + 1
        let x_use = ast.get(rhs.children[0]);
        assert!(x_use.payload.resolved_binding.is_some());
    }

    #[test]
    fn binds_function_parameters() {
        let (_ast, symbols) = collect_source("function add(a, b) { return a + b; }");
        let fn_scope = symbols.scopes().find(|s| s.kind == ScopeKind::Function).unwrap();
        assert!(fn_scope.binding("a").is_some());
        assert!(fn_scope.binding("b").is_some());
    }

    #[test]
    fn nonlocal_links_back_to_enclosing_function_binding() {
        let (ast, symbols) = collect_source(
            "function outer() { counter = 0; function inner() { nonlocal counter; counter = counter + 1; } return counter; }",
        );
        let outer_scope = symbols.scopes().find(|s| s.kind == ScopeKind::Function && s.binding("counter").is_some()).unwrap();
        let counter = outer_scope.binding("counter").unwrap();
        assert!(counter.is_nonlocal);
        let _ = ast;
    }

    #[test]
    fn assignment_without_nonlocal_shadows_outer_binding() {
        let (_ast, symbols) = collect_source("x = 1; function f() { x = 2; return x; }");
        let program_scope = symbols.scopes().find(|s| s.kind == ScopeKind::Program).unwrap();
        let fn_scope = symbols.scopes().find(|s| s.kind == ScopeKind::Function).unwrap();
        assert!(program_scope.binding("x").is_some());
        assert!(fn_scope.binding("x").is_some());
        assert!(!program_scope.binding("x").unwrap().is_nonlocal);
    }
}
