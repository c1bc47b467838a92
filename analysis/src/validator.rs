//! C2: AST structural validator.
//!
//! Checks invariants spec §3/§4.2 requires of every AST before it is safe to
//! transform or analyze: span containment, and that `nonlocal`/`break`/
//! `continue`/`return` only occur in a syntactic context that can host them.
//! The validator never rewrites a node; it only emits diagnostics.

use mlpy_types::{Ast, Diagnostic, NodeId, NodeKind, Severity, Stage};

#[must_use]
pub fn validate(ast: &Ast) -> Vec<Diagnostic> {
    tracing::debug!(stage = "validate", nodes = ast.len(), "validating AST structure");
    let mut diagnostics = Vec::new();

    for &bad_child in &ast.find_span_violations() {
        let node = ast.get(bad_child);
        diagnostics.push(Diagnostic::new(
            Severity::Critical,
            Stage::Validator,
            "span_not_contained",
            format!("{:?} node's span escapes its parent's span", node.kind),
            node.location,
        ));
    }

    let Some(root) = ast.root else {
        return diagnostics;
    };

    let mut ctx = Context { in_function: 0, in_loop: 0 };
    walk(ast, root, &mut ctx, &mut diagnostics);
    diagnostics
}

#[derive(Clone, Copy)]
struct Context {
    in_function: u32,
    in_loop: u32,
}

fn walk(ast: &Ast, id: NodeId, ctx: &mut Context, diagnostics: &mut Vec<Diagnostic>) {
    let node = ast.get(id);
    match node.kind {
        NodeKind::Nonlocal if ctx.in_function == 0 => diagnostics.push(Diagnostic::new(
            Severity::Error,
            Stage::Validator,
            "nonlocal_outside_function",
            "`nonlocal` may only appear inside a function body",
            node.location,
        )),
        NodeKind::Break if ctx.in_loop == 0 => diagnostics.push(Diagnostic::new(
            Severity::Error,
            Stage::Validator,
            "break_outside_loop",
            "`break` may only appear inside a `while` or `for` loop",
            node.location,
        )),
        NodeKind::Continue if ctx.in_loop == 0 => diagnostics.push(Diagnostic::new(
            Severity::Error,
            Stage::Validator,
            "continue_outside_loop",
            "`continue` may only appear inside a `while` or `for` loop",
            node.location,
        )),
        NodeKind::Return if ctx.in_function == 0 => diagnostics.push(Diagnostic::new(
            Severity::Error,
            Stage::Validator,
            "return_outside_function",
            "`return` may only appear inside a function body",
            node.location,
        )),
        NodeKind::CapabilityDecl if ctx.in_function > 0 || ctx.in_loop > 0 => {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                Stage::Validator,
                "capability_decl_not_at_program_scope",
                "`capability` declarations are only permitted at program scope",
                node.location,
            ));
        }
        _ => {}
    }

    let mut child_ctx = *ctx;
    match node.kind {
        NodeKind::FunctionDef | NodeKind::ArrowFn => child_ctx.in_function += 1,
        NodeKind::While | NodeKind::For => child_ctx.in_loop += 1,
        _ => {}
    }

    for &child in &node.children {
        walk(ast, child, &mut child_ctx, diagnostics);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_lexer::parse;
    use mlpy_types::UnitId;

    fn validate_source(src: &str) -> Vec<Diagnostic> {
        let out = parse(UnitId::new(0), src);
        validate(&out.ast)
    }

    #[test]
    fn accepts_well_formed_program() {
        let diags = validate_source("function f(x) { return x; }");
        assert!(diags.is_empty());
    }

    #[test]
    fn rejects_return_at_top_level() {
        let diags = validate_source("return 1;");
        assert!(diags.iter().any(|d| d.code == "return_outside_function"));
    }

    #[test]
    fn rejects_break_outside_loop() {
        let diags = validate_source("function f() { break; }");
        assert!(diags.iter().any(|d| d.code == "break_outside_loop"));
    }

    #[test]
    fn accepts_break_inside_nested_function_in_loop() {
        let diags = validate_source("while (true) { function f() { return 1; } break; }");
        assert!(diags.is_empty());
    }

    #[test]
    fn rejects_capability_decl_inside_function() {
        let diags = validate_source(r#"function f() { capability C { resource "/x"; allow read; } }"#);
        assert!(diags.iter().any(|d| d.code == "capability_decl_not_at_program_scope"));
    }
}
