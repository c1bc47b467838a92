//! C3: AST transformer.
//!
//! Desugars surface syntax into a smaller canonical form before collection
//! and analysis: `elif` chains become nested `if`/`else`, destructuring
//! assignments become sequential index assignments, and a function body
//! whose last statement is a bare expression gets an explicit `return`. Each
//! rewrite is logged as an info-severity diagnostic so `--explain` tooling
//! can show what changed (spec §4.3 "transformation log").

use mlpy_types::{Ast, Diagnostic, LiteralValue, NodeId, NodeKind, NodePayload, Severity, Stage};

#[must_use]
pub fn transform(ast: &mut Ast) -> Vec<Diagnostic> {
    tracing::debug!(stage = "transform", nodes = ast.len(), "desugaring AST");
    let mut diagnostics = Vec::new();
    desugar_destructuring(ast, &mut diagnostics);
    canonicalize_elif_chains(ast, &mut diagnostics);
    materialize_implicit_returns(ast, &mut diagnostics);
    diagnostics
}

fn nodes_of_kind(ast: &Ast, kind: NodeKind) -> Vec<NodeId> {
    ast.iter()
        .enumerate()
        .filter(|(_, node)| node.kind == kind)
        .map(|(i, _)| NodeId::new(u32::try_from(i).expect("AST exceeds 2^32 nodes")))
        .collect()
}

/// `[a, b] = value;` desugars to `a = value[0]; b = value[1];` wrapped in a
/// block at the destructuring statement's original position.
fn desugar_destructuring(ast: &mut Ast, diagnostics: &mut Vec<Diagnostic>) {
    for id in nodes_of_kind(ast, NodeKind::Destructuring) {
        let node = ast.get(id).clone();
        let [pattern_id, value_id] = [node.children[0], node.children[1]];
        let pattern = ast.get(pattern_id).clone();

        let mut assignments = Vec::with_capacity(pattern.children.len());
        for (index, &element_id) in pattern.children.iter().enumerate() {
            let element = ast.get(element_id).clone();
            let index_literal = ast.push(
                NodeKind::Literal,
                vec![],
                element.location,
                NodePayload { literal: Some(LiteralValue::Number(index as f64)), ..Default::default() },
            );
            let access = ast.push(NodeKind::ArrayAccess, vec![value_id, index_literal], element.location, NodePayload::default());
            let assignment = ast.push(NodeKind::Assignment, vec![element_id, access], element.location, NodePayload::default());
            assignments.push(assignment);
        }

        let replaced = ast.get_mut(id);
        replaced.kind = NodeKind::Block;
        replaced.children = assignments;

        diagnostics.push(Diagnostic::new(
            Severity::Info,
            Stage::Transformer,
            "destructuring_desugared",
            format!("expanded destructuring pattern into {} sequential assignments", pattern.children.len()),
            node.location,
        ));
    }
}

/// An `if`/`elif*`/`else?` chain parses as one `If` node whose tail children
/// are `Elif` nodes followed by an optional trailing `else` block. This
/// rewrites that into nested `If` nodes so later passes only ever see plain
/// binary if/else.
fn canonicalize_elif_chains(ast: &mut Ast, diagnostics: &mut Vec<Diagnostic>) {
    for id in nodes_of_kind(ast, NodeKind::If) {
        let node = ast.get(id).clone();
        if node.children.len() <= 2 {
            continue; // plain if/else or bare if, nothing to canonicalize
        }

        let cond = node.children[0];
        let then_block = node.children[1];
        let mut elifs = Vec::new();
        let mut else_block = None;
        for &child in &node.children[2..] {
            if ast.get(child).kind == NodeKind::Elif {
                elifs.push(child);
            } else {
                else_block = Some(child);
            }
        }
        if elifs.is_empty() {
            continue; // a plain if/else, no elif arms to flatten
        }

        let mut nested_else = else_block;
        for &elif_id in elifs.iter().rev() {
            let elif_node = ast.get(elif_id).clone();
            let elif_cond = elif_node.children[0];
            let elif_block = elif_node.children[1];
            let mut children = vec![elif_cond, elif_block];
            if let Some(tail) = nested_else {
                children.push(tail);
            }
            nested_else = Some(ast.push(NodeKind::If, children, elif_node.location, NodePayload::default()));
        }

        let mut children = vec![cond, then_block];
        if let Some(tail) = nested_else {
            children.push(tail);
        }
        ast.get_mut(id).children = children;

        diagnostics.push(Diagnostic::new(
            Severity::Info,
            Stage::Transformer,
            "elif_chain_canonicalized",
            format!("rewrote {} elif arm(s) into nested if/else", elifs.len()),
            node.location,
        ));
    }
}

/// A function body whose last statement is a bare expression implicitly
/// returns that expression's value; materialize it as an explicit `Return`
/// so the emitter never needs to special-case trailing expressions.
fn materialize_implicit_returns(ast: &mut Ast, diagnostics: &mut Vec<Diagnostic>) {
    for id in nodes_of_kind(ast, NodeKind::FunctionDef) {
        let node = ast.get(id).clone();
        let Some(&body_id) = node.children.last() else { continue };
        if ast.get(body_id).kind != NodeKind::Block {
            continue;
        }
        let block = ast.get(body_id).clone();
        let Some(&last_stmt) = block.children.last() else { continue };
        let last = ast.get(last_stmt);
        if last.kind == NodeKind::ExprStmt {
            let location = last.location;
            ast.get_mut(last_stmt).kind = NodeKind::Return;
            diagnostics.push(Diagnostic::new(
                Severity::Info,
                Stage::Transformer,
                "implicit_return_materialized",
                "trailing expression statement rewritten as an explicit return",
                location,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_lexer::parse;
    use mlpy_types::UnitId;

    fn transform_source(src: &str) -> (Ast, Vec<Diagnostic>) {
        let out = parse(UnitId::new(0), src);
        let mut ast = out.ast;
        let diags = transform(&mut ast);
        (ast, diags)
    }

    #[test]
    fn canonicalizes_elif_chain_into_nested_if() {
        let (ast, diags) = transform_source("if (a) { return 1; } elif (b) { return 2; } else { return 3; }");
        assert!(diags.iter().any(|d| d.code == "elif_chain_canonicalized"));
        let root = ast.get(ast.root.unwrap());
        let outer_if = ast.get(root.children[0]);
        assert_eq!(outer_if.children.len(), 3);
        let nested_if = ast.get(outer_if.children[2]);
        assert_eq!(nested_if.kind, NodeKind::If);
        assert_eq!(nested_if.children.len(), 3);
    }

    #[test]
    fn leaves_plain_if_else_untouched() {
        let (_, diags) = transform_source("if (a) { return 1; } else { return 2; }");
        assert!(!diags.iter().any(|d| d.code == "elif_chain_canonicalized"));
    }

    #[test]
    fn desugars_array_destructuring() {
        let (ast, diags) = transform_source("[a, b] = pair;");
        assert!(diags.iter().any(|d| d.code == "destructuring_desugared"));
        let root = ast.get(ast.root.unwrap());
        let block = ast.get(root.children[0]);
        assert_eq!(block.kind, NodeKind::Block);
        assert_eq!(block.children.len(), 2);
        assert_eq!(ast.get(block.children[0]).kind, NodeKind::Assignment);
    }

    #[test]
    fn materializes_implicit_return() {
        let (ast, diags) = transform_source("function f(x) { x + 1; }");
        assert!(diags.iter().any(|d| d.code == "implicit_return_materialized"));
        let root = ast.get(ast.root.unwrap());
        let func = ast.get(root.children[0]);
        let body = ast.get(*func.children.last().unwrap());
        let last_stmt = ast.get(*body.children.last().unwrap());
        assert_eq!(last_stmt.kind, NodeKind::Return);
    }

    #[test]
    fn leaves_explicit_return_untouched() {
        let (_, diags) = transform_source("function f(x) { return x; }");
        assert!(!diags.iter().any(|d| d.code == "implicit_return_materialized"));
    }
}
