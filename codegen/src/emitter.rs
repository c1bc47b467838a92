//! C8: code emitter.
//!
//! Walks the optimized AST and produces Python target source plus an
//! incrementally-built source map (spec §4.8). Like the analyzer passes,
//! emission never panics on an unsupported construct: it records an
//! `EmissionError`-class diagnostic and keeps going, so a single bad
//! statement doesn't hide every other problem in the unit (§9 "exceptions
//! for control flow ... replaced with result-bearing returns").

use std::collections::HashMap;

use mlpy_types::{
    Ast, Diagnostic, HostSurface, InferredKind, Location, LiteralValue, Mapping, Node, NodeId,
    NodeKind, Position, Severity, SourceMap, Span, Stage, SymbolTable, UnitId,
};

pub struct EmitOutput {
    pub target_source: String,
    pub source_map: SourceMap,
    pub diagnostics: Vec<Diagnostic>,
}

/// Emit target source and a source map for `ast`, resolving member/call
/// sites against `symbols` (for inferred kinds) and `host` (for the
/// import/call whitelist).
#[must_use]
pub fn emit(ast: &Ast, symbols: &SymbolTable, unit: UnitId, source_name: &str, host: &HostSurface) -> EmitOutput {
    tracing::debug!(source_name, node_count = ast.len(), "emitting target source");
    let declared_kinds = declared_kinds_by_node(symbols);
    let mut writer = Writer::new(source_name);
    let mut emitter = Emitter { ast, host, declared_kinds, diagnostics: Vec::new(), temp_counter: 0 };

    let preamble_loc = Location::new(unit, Span::point(Position::new(1, 0)));
    writer.emit_line("import mlpy_runtime as _mlpy_runtime", preamble_loc);

    let root = ast.root.expect("an emitted unit always has a parsed root");
    let program = ast.get(root);
    emitter.emit_stmts(&program.children, &mut writer);

    if !emitter.diagnostics.is_empty() {
        tracing::warn!(count = emitter.diagnostics.len(), "emission produced diagnostics");
    }
    EmitOutput { target_source: writer.buf, source_map: writer.source_map, diagnostics: emitter.diagnostics }
}

/// Index every binding's inferred kind by the AST node that declared it, so
/// the emitter can classify member accesses without re-walking scopes.
fn declared_kinds_by_node(symbols: &SymbolTable) -> HashMap<NodeId, InferredKind> {
    let mut out = HashMap::new();
    for scope in symbols.scopes() {
        for binding in scope.bindings() {
            out.insert(binding.declared_node, binding.inferred_kind);
        }
    }
    out
}

struct Writer {
    source_map: SourceMap,
    buf: String,
    generated_line: u32,
    indent: usize,
}

impl Writer {
    fn new(source_name: &str) -> Self {
        Self { source_map: SourceMap::new(source_name), buf: String::new(), generated_line: 1, indent: 0 }
    }

    /// Write one line at the current indent, recording the mapping back to
    /// `loc` before the text is appended (spec §4.8: "written incrementally
    /// as the emitter produces each line").
    fn emit_line(&mut self, text: &str, loc: Location) {
        self.source_map.push_mapping(Mapping {
            generated_line: self.generated_line,
            generated_column: u32::try_from(self.indent * 4).unwrap_or(u32::MAX),
            source_line: loc.line(),
            source_column: loc.column(),
        });
        for _ in 0..self.indent {
            self.buf.push_str("    ");
        }
        self.buf.push_str(text);
        self.buf.push('\n');
        self.generated_line += 1;
    }
}

struct Emitter<'a> {
    ast: &'a Ast,
    host: &'a HostSurface,
    declared_kinds: HashMap<NodeId, InferredKind>,
    diagnostics: Vec<Diagnostic>,
    temp_counter: u32,
}

impl<'a> Emitter<'a> {
    fn node(&self, id: NodeId) -> &'a Node {
        self.ast.get(id)
    }

    fn fresh_temp(&mut self) -> String {
        let n = self.temp_counter;
        self.temp_counter += 1;
        format!("__ml_match_{n}")
    }

    fn bug(&mut self, loc: Location, code: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(Severity::Error, Stage::Emitter, code, message, loc));
    }

    // -- statements -----------------------------------------------------

    fn emit_stmts(&mut self, children: &[NodeId], writer: &mut Writer) {
        for &id in children {
            self.emit_stmt(id, writer);
        }
    }

    fn emit_block_body(&mut self, block_id: NodeId, writer: &mut Writer) {
        let block = self.node(block_id);
        let loc = block.location;
        writer.indent += 1;
        if block.children.is_empty() {
            writer.emit_line("pass", loc);
        } else {
            let children = block.children.clone();
            self.emit_stmts(&children, writer);
        }
        writer.indent -= 1;
    }

    fn emit_stmt(&mut self, id: NodeId, writer: &mut Writer) {
        let node = self.node(id);
        let loc = node.location;
        match node.kind {
            NodeKind::Import => self.emit_import(node, writer),
            NodeKind::CapabilityDecl => {
                // Declarative metadata consumed by the security analyzer
                // and folded into the artifact's capability manifest; it
                // has no runtime representation of its own.
            }
            NodeKind::FunctionDef => self.emit_function_def(id, writer),
            NodeKind::Assignment => {
                let (target, value) = (node.children[0], node.children[1]);
                self.emit_assignment(target, value, loc, writer);
            }
            NodeKind::ExprStmt => {
                let expr_id = node.children[0];
                if self.node(expr_id).kind == NodeKind::Match {
                    self.emit_match_stmt(expr_id, writer);
                } else {
                    let text = self.emit_expr(expr_id);
                    writer.emit_line(&text, loc);
                }
            }
            NodeKind::If => self.emit_if(id, writer, true),
            NodeKind::While => {
                let (cond, body) = (node.children[0], node.children[1]);
                let header = format!("while {}:", self.emit_expr(cond));
                writer.emit_line(&header, loc);
                self.emit_block_body(body, writer);
            }
            NodeKind::For => {
                let (var, iterable, body) = (node.children[0], node.children[1], node.children[2]);
                let var_name = self.node(var).payload.name.clone().unwrap_or_default();
                let header = format!("for {var_name} in {}:", self.emit_expr(iterable));
                writer.emit_line(&header, loc);
                self.emit_block_body(body, writer);
            }
            NodeKind::Try => self.emit_try(node, writer),
            NodeKind::Break => writer.emit_line("break", loc),
            NodeKind::Continue => writer.emit_line("continue", loc),
            NodeKind::Return => {
                if let Some(&value) = node.children.first() {
                    let text = format!("return {}", self.emit_expr(value));
                    writer.emit_line(&text, loc);
                } else {
                    writer.emit_line("return", loc);
                }
            }
            NodeKind::Throw => {
                let value = node.children[0];
                let text = format!("raise _mlpy_runtime.MlThrow({})", self.emit_expr(value));
                writer.emit_line(&text, loc);
            }
            NodeKind::Nonlocal => {
                let name = node.payload.name.clone().unwrap_or_default();
                writer.emit_line(&format!("nonlocal {name}"), loc);
            }
            NodeKind::Block => {
                // A bare `{ ... }` statement block. Python has no anonymous
                // block statement, so wrap it in a no-op conditional to
                // keep its own nested suite.
                writer.emit_line("if True:", loc);
                self.emit_block_body(id, writer);
            }
            other => {
                self.bug(loc, "unsupported_statement", format!("{other:?} cannot appear as a statement after transformation"));
                writer.emit_line("pass", loc);
            }
        }
    }

    fn emit_import(&mut self, node: &Node, writer: &mut Writer) {
        let name = node.payload.name.clone().unwrap_or_default();
        let alias = node.payload.operator.clone();
        let loc = node.location;
        let Some(target_path) = self.host.modules.get(&name).cloned() else {
            self.bug(loc, "unregistered_import", format!("`{name}` is not a registered host module"));
            return;
        };
        let text = match alias {
            Some(alias) => format!("import {target_path} as {alias}"),
            None => format!("import {target_path} as {name}"),
        };
        writer.emit_line(&text, loc);
    }

    fn emit_function_def(&mut self, id: NodeId, writer: &mut Writer) {
        let node = self.node(id);
        let loc = node.location;
        let name = node.payload.name.clone().unwrap_or_default();
        let (params, body) = node.children.split_at(node.children.len() - 1);
        let body = body[0];
        let param_names: Vec<String> =
            params.iter().map(|&p| self.node(p).payload.name.clone().unwrap_or_default()).collect();
        let header = format!("def {name}({}):", param_names.join(", "));
        writer.emit_line(&header, loc);
        self.emit_block_body(body, writer);
    }

    /// Nested `If` nodes from C3's elif-chain canonicalization emit as a
    /// flat `if/elif/.../else` rather than deepening Python indentation
    /// once per arm.
    fn emit_if(&mut self, id: NodeId, writer: &mut Writer, is_first: bool) {
        let node = self.node(id);
        let loc = node.location;
        let cond = node.children[0];
        let then_block = node.children[1];
        let keyword = if is_first { "if" } else { "elif" };
        let header = format!("{keyword} {}:", self.emit_expr(cond));
        writer.emit_line(&header, loc);
        self.emit_block_body(then_block, writer);

        if let Some(&tail) = node.children.get(2) {
            if self.node(tail).kind == NodeKind::If {
                self.emit_if(tail, writer, false);
            } else {
                writer.emit_line("else:", self.node(tail).location);
                self.emit_block_body(tail, writer);
            }
        }
    }

    fn emit_try(&mut self, node: &Node, writer: &mut Writer) {
        let loc = node.location;
        let try_block = node.children[0];
        writer.emit_line("try:", loc);
        self.emit_block_body(try_block, writer);

        let except_node = self.node(node.children[1]);
        let except_loc = except_node.location;
        let header = match &except_node.payload.name {
            Some(binding) => format!("except Exception as {binding}:"),
            None => "except Exception:".to_string(),
        };
        writer.emit_line(&header, except_loc);
        self.emit_block_body(except_node.children[0], writer);

        if let Some(&finally_block) = node.children.get(2) {
            writer.emit_line("finally:", self.node(finally_block).location);
            self.emit_block_body(finally_block, writer);
        }
    }

    fn emit_assignment(&mut self, target: NodeId, value: NodeId, loc: Location, writer: &mut Writer) {
        let value_text = if self.node(value).kind == NodeKind::Match {
            self.bug(loc, "match_in_value_position", "`match` produces statement blocks and cannot appear as an assignment value");
            "None".to_string()
        } else {
            self.emit_expr(value)
        };

        let target_node = self.node(target);
        if target_node.kind == NodeKind::MemberAccess {
            let base = target_node.children[0];
            let attr = target_node.payload.name.clone().unwrap_or_default();
            let base_text = self.emit_expr(base);
            let text = if self.base_inferred_kind(base) == InferredKind::Object {
                format!("{base_text}[{}] = {value_text}", python_string_literal(&attr))
            } else {
                format!("_mlpy_runtime.safe_attr_set({base_text}, {}, {value_text})", python_string_literal(&attr))
            };
            writer.emit_line(&text, loc);
        } else {
            let target_text = self.emit_expr(target);
            writer.emit_line(&format!("{target_text} = {value_text}"), loc);
        }
    }

    fn emit_match_stmt(&mut self, match_id: NodeId, writer: &mut Writer) {
        let node = self.node(match_id);
        let loc = node.location;
        let subject_id = node.children[0];
        let case_ids = node.children[1..].to_vec();

        let subject_text = self.emit_expr(subject_id);
        let tmp = self.fresh_temp();
        writer.emit_line(&format!("{tmp} = {subject_text}"), loc);
        writer.emit_line(&format!("match {tmp}:"), loc);
        writer.indent += 1;
        for case_id in case_ids {
            let case_node = self.node(case_id);
            let case_loc = case_node.location;
            let (pattern_id, body_id) = (case_node.children[0], case_node.children[1]);
            let header = self.match_case_header(pattern_id, &tmp);
            writer.emit_line(&header, case_loc);
            self.emit_block_body(body_id, writer);
        }
        writer.indent -= 1;
    }

    fn match_case_header(&mut self, pattern_id: NodeId, subject_tmp: &str) -> String {
        let pattern = self.node(pattern_id);
        match pattern.kind {
            NodeKind::Literal => format!("case {}:", self.literal_text(pattern)),
            NodeKind::Identifier if pattern.payload.name.as_deref() == Some("_") => "case _:".to_string(),
            NodeKind::Identifier => {
                let name = pattern.payload.name.clone().unwrap_or_default();
                format!("case {name}:")
            }
            _ => {
                let expr = self.emit_expr(pattern_id);
                format!("case _ if ({expr}) == {subject_tmp}:")
            }
        }
    }

    // -- expressions ------------------------------------------------------

    fn emit_expr(&mut self, id: NodeId) -> String {
        let node = self.node(id).clone();
        match node.kind {
            NodeKind::Literal => self.literal_text(&node),
            NodeKind::Identifier => node.payload.name.clone().unwrap_or_default(),
            NodeKind::Binary => self.emit_binary(&node),
            NodeKind::Unary => self.emit_unary(&node),
            NodeKind::Ternary => {
                let (cond, then_b, else_b) = (node.children[0], node.children[1], node.children[2]);
                format!("({} if {} else {})", self.emit_expr(then_b), self.emit_expr(cond), self.emit_expr(else_b))
            }
            NodeKind::ArrayAccess => {
                let (base, index) = (node.children[0], node.children[1]);
                format!("{}[{}]", self.emit_expr(base), self.emit_expr(index))
            }
            NodeKind::Slice => self.emit_slice(&node),
            NodeKind::MemberAccess => self.emit_member_access(&node),
            NodeKind::FunctionCall => self.emit_call(&node),
            NodeKind::ArrayLiteral => {
                let elements = self.emit_sequence_items(&node.children);
                format!("[{elements}]")
            }
            NodeKind::ObjectLiteral => self.emit_object_literal(&node),
            NodeKind::ArrowFn => self.emit_arrow_fn(&node),
            NodeKind::Pipeline => self.emit_pipeline(&node),
            NodeKind::Match => {
                self.bug(node.location, "match_in_expression_position", "`match` is only supported as a standalone statement");
                "None".to_string()
            }
            other => {
                self.bug(node.location, "unsupported_expression", format!("{other:?} cannot appear in expression position"));
                "None".to_string()
            }
        }
    }

    fn literal_text(&self, node: &Node) -> String {
        match &node.payload.literal {
            Some(LiteralValue::Number(n)) => format_number(*n),
            Some(LiteralValue::String(s)) => python_string_literal(s),
            Some(LiteralValue::Boolean(b)) => (if *b { "True" } else { "False" }).to_string(),
            Some(LiteralValue::Null) | None => "None".to_string(),
        }
    }

    fn emit_binary(&mut self, node: &Node) -> String {
        let (lhs, rhs) = (node.children[0], node.children[1]);
        let op = node.payload.operator.as_deref().unwrap_or("+");
        let py_op = match op {
            "&&" => "and",
            "||" => "or",
            other => other,
        };
        format!("({} {py_op} {})", self.emit_expr(lhs), self.emit_expr(rhs))
    }

    fn emit_unary(&mut self, node: &Node) -> String {
        let operand = node.children[0];
        let op = node.payload.operator.as_deref().unwrap_or("-");
        let operand_text = self.emit_expr(operand);
        match op {
            "!" => format!("(not {operand_text})"),
            _ => format!("(-{operand_text})"),
        }
    }

    fn emit_slice(&mut self, node: &Node) -> String {
        match node.children.as_slice() {
            [base, end] => format!("{}[:{}]", self.emit_expr(*base), self.emit_expr(*end)),
            [base, start, end] => format!("{}[{}:{}]", self.emit_expr(*base), self.emit_expr(*start), self.emit_expr(*end)),
            _ => {
                self.bug(node.location, "malformed_slice", "slice node has an unexpected arity");
                "None".to_string()
            }
        }
    }

    fn base_inferred_kind(&self, base_id: NodeId) -> InferredKind {
        let base = self.node(base_id);
        match base.kind {
            NodeKind::ObjectLiteral => InferredKind::Object,
            NodeKind::Identifier => base
                .payload
                .resolved_binding
                .and_then(|decl| self.declared_kinds.get(&decl))
                .copied()
                .unwrap_or(InferredKind::Unknown),
            _ => InferredKind::Unknown,
        }
    }

    fn emit_member_access(&mut self, node: &Node) -> String {
        let base = node.children[0];
        let attr = node.payload.name.clone().unwrap_or_default();
        let base_text = self.emit_expr(base);
        if self.base_inferred_kind(base) == InferredKind::Object {
            format!("{base_text}[{}]", python_string_literal(&attr))
        } else {
            format!("_mlpy_runtime.safe_attr({base_text}, {})", python_string_literal(&attr))
        }
    }

    fn emit_call(&mut self, node: &Node) -> String {
        let callee = node.children[0];
        let args = &node.children[1..];
        let callee_node = self.node(callee);

        match callee_node.kind {
            NodeKind::Identifier => self.emit_identifier_call(callee_node.clone(), args),
            NodeKind::MemberAccess => self.emit_member_call(callee_node.clone(), args),
            _ => {
                let callee_text = self.emit_expr(callee);
                let args_text = self.emit_sequence_items(args);
                format!("({callee_text})({args_text})")
            }
        }
    }

    /// The three-way call classification from spec §4.8: a name resolved
    /// by the collector is a local call; an unresolved name registered by
    /// a host module goes through `safe_call`; anything else is a bug the
    /// validator and analyzer should have already caught upstream of here.
    fn emit_identifier_call(&mut self, callee: Node, args: &[NodeId]) -> String {
        let name = callee.payload.name.clone().unwrap_or_default();

        if callee.payload.resolved_binding.is_some() {
            let args_text = self.emit_sequence_items(args);
            return format!("{name}({args_text})");
        }

        if self.host.functions.contains(&name) {
            let args_list = self.emit_sequence_items(args);
            return format!("_mlpy_runtime.safe_call({}, [{args_list}], {{}})", python_string_literal(&name));
        }

        let suggestions = self.suggest_host_functions(&name);
        self.bug(
            callee.location,
            "unknown_callee",
            format!("`{name}` is neither a local function nor a registered host function; did you mean: {}?", suggestions.join(", ")),
        );
        format!("_mlpy_runtime.undefined_call({})", python_string_literal(&name))
    }

    fn emit_member_call(&mut self, callee: Node, args: &[NodeId]) -> String {
        let base = callee.children[0];
        let attr = callee.payload.name.clone().unwrap_or_default();
        let base_text = self.emit_expr(base);
        let args_list = self.emit_sequence_items(args);
        if self.base_inferred_kind(base) == InferredKind::Object {
            format!("{base_text}[{}]({args_list})", python_string_literal(&attr))
        } else {
            format!("_mlpy_runtime.safe_call_attr({base_text}, {}, [{args_list}], {{}})", python_string_literal(&attr))
        }
    }

    fn suggest_host_functions(&self, name: &str) -> Vec<String> {
        let mut candidates: Vec<&String> = self
            .host
            .functions
            .iter()
            .filter(|f| f.starts_with(name.chars().next().unwrap_or('\0')))
            .collect();
        if candidates.is_empty() {
            candidates = self.host.functions.iter().collect();
        }
        candidates.sort();
        candidates.into_iter().take(3).cloned().collect()
    }

    fn emit_sequence_items(&mut self, items: &[NodeId]) -> String {
        items
            .iter()
            .map(|&id| {
                let node = self.node(id);
                if node.kind == NodeKind::Spread {
                    let inner = node.children[0];
                    format!("*{}", self.emit_expr(inner))
                } else {
                    self.emit_expr(id)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn emit_object_literal(&mut self, node: &Node) -> String {
        let mut parts = Vec::with_capacity(node.children.len());
        for &entry_id in &node.children {
            let entry = self.node(entry_id);
            if entry.kind == NodeKind::Spread {
                let inner = entry.children[0];
                parts.push(format!("**{}", self.emit_expr(inner)));
            } else {
                let key = entry.payload.name.clone().unwrap_or_default();
                let value = self.emit_expr(entry.children[0]);
                parts.push(format!("{}: {value}", python_string_literal(&key)));
            }
        }
        format!("{{{}}}", parts.join(", "))
    }

    fn emit_arrow_fn(&mut self, node: &Node) -> String {
        let (params, body) = node.children.split_at(node.children.len() - 1);
        let body = body[0];
        if self.node(body).kind == NodeKind::Block {
            self.bug(node.location, "unsupported_arrow_body", "arrow function with a statement body has no target-language lambda equivalent");
            return "(lambda *a, **k: None)".to_string();
        }
        let param_names: Vec<String> =
            params.iter().map(|&p| self.node(p).payload.name.clone().unwrap_or_default()).collect();
        format!("(lambda {}: {})", param_names.join(", "), self.emit_expr(body))
    }

    /// `x |> f` applies `f` to `x`; `x |> f(y)` inserts `x` as `f`'s first
    /// argument (spec §4.1 grammar; pipeline semantics are call-rewriting).
    fn emit_pipeline(&mut self, node: &Node) -> String {
        let (lhs, rhs) = (node.children[0], node.children[1]);
        let lhs_text = self.emit_expr(lhs);
        let rhs_node = self.node(rhs).clone();
        if rhs_node.kind == NodeKind::FunctionCall {
            let callee = rhs_node.children[0];
            let mut args = vec![lhs_text];
            args.extend(rhs_node.children[1..].iter().map(|&a| self.emit_expr(a)));
            let callee_text = self.emit_expr(callee);
            format!("({callee_text})({})", args.join(", "))
        } else {
            let rhs_text = self.emit_expr(rhs);
            format!("({rhs_text})({lhs_text})")
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

fn python_string_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_analysis::{collect, optimize, transform, validate};

    fn compile_to_python(src: &str, host: &HostSurface) -> EmitOutput {
        let parsed = mlpy_lexer::parse(UnitId::new(0), src);
        let mut ast = parsed.ast;
        assert!(validate(&ast).is_empty(), "unexpected validation diagnostics");
        transform(&mut ast);
        let collected = collect(&mut ast);
        optimize(&mut ast);
        emit(&ast, &collected.symbols, UnitId::new(0), "unit.ml", host)
    }

    #[test]
    fn emits_arithmetic_assignment_and_return() {
        let out = compile_to_python("x = 2 + 3 * 4; return x;", &HostSurface::new());
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        // The optimizer has already folded this to a literal 14.
        assert!(out.target_source.contains("x = 14"));
        assert!(out.target_source.contains("return x"));
    }

    #[test]
    fn emits_if_elif_else_as_flat_chain() {
        let out = compile_to_python("if (a) { return 1; } elif (b) { return 2; } else { return 3; }", &HostSurface::new());
        assert!(out.target_source.contains("if a:"));
        assert!(out.target_source.contains("elif b:"));
        assert!(out.target_source.contains("else:"));
    }

    #[test]
    fn routes_unresolved_call_through_safe_call() {
        let mut host = HostSurface::new();
        host.register_function("read_file");
        let out = compile_to_python("read_file(\"a.txt\");", &host);
        assert!(out.diagnostics.is_empty());
        assert!(out.target_source.contains("_mlpy_runtime.safe_call(\"read_file\""));
    }

    #[test]
    fn flags_unknown_callee_with_suggestions() {
        let mut host = HostSurface::new();
        host.register_function("read_file");
        let out = compile_to_python("read_fil();", &host);
        assert!(out.diagnostics.iter().any(|d| d.code == "unknown_callee"));
    }

    #[test]
    fn rejects_unregistered_import() {
        let out = compile_to_python("import os;", &HostSurface::new());
        assert!(out.diagnostics.iter().any(|d| d.code == "unregistered_import"));
    }

    #[test]
    fn translates_registered_import() {
        let mut host = HostSurface::new();
        host.register_module("file", "mlpy_stdlib.file");
        let out = compile_to_python("import file;", &host);
        assert!(out.diagnostics.is_empty());
        assert!(out.target_source.contains("import mlpy_stdlib.file as file"));
    }

    #[test]
    fn emits_match_as_a_statement() {
        let out = compile_to_python("match (x) { case 1: { return 1; } case 2: { return 2; } }", &HostSurface::new());
        assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);
        assert!(out.target_source.contains("match __ml_match_0:"));
        assert!(out.target_source.contains("case 1:"));
    }

    #[test]
    fn records_a_source_map_mapping_per_generated_line() {
        let out = compile_to_python("x = 1;", &HostSurface::new());
        assert!(!out.source_map.mappings().is_empty());
        // the assignment is the second emitted line, after the runtime import preamble.
        assert_eq!(out.source_map.generated_to_source(2).map(|(line, _)| line), Some(1));
    }

    #[test]
    fn arrow_function_emits_as_lambda() {
        let out = compile_to_python("f = fn(x) => x + 1;", &HostSurface::new());
        assert!(out.target_source.contains("lambda x: (x + 1)"));
    }

    #[test]
    fn member_access_on_object_literal_is_a_direct_lookup() {
        let out = compile_to_python("x = { a: 1 }; y = x.a;", &HostSurface::new());
        assert!(out.target_source.contains("x[\"a\"]"));
    }
}
