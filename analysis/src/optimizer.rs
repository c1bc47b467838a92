//! C7: optimizer.
//!
//! Runs after security analysis so every rewrite starts from a cleared
//! tree: constant folding, dead-branch elimination, straight-line redundant
//! capability-check elision, and a couple of peephole simplifications.
//! Nodes are never removed from the arena -- a rewrite re-links a node's
//! `kind`/`children`/`payload` in place (or drops an id from its parent's
//! child list), leaving the old subtree orphaned but harmless, consistent
//! with the AST's copy-free arena model. Every rewrite is logged as an
//! info-severity diagnostic (spec §4.7, §8 "optimizer soundness").

use mlpy_types::{Ast, Diagnostic, LiteralValue, NodeId, NodeKind, NodePayload, Severity, Stage};

#[must_use]
pub fn optimize(ast: &mut Ast) -> Vec<Diagnostic> {
    tracing::debug!(stage = "optimize", nodes = ast.len(), "folding constants and eliding dead branches");
    let mut diagnostics = Vec::new();
    // Constant folding and peephole simplification can each expose new
    // opportunities for the other (e.g. folding turns `!!(1 == 1)` into
    // `!!true`); iterate to a fixpoint, bounded generously against cycles.
    for _ in 0..16 {
        let mut changed = false;
        fold_constants(ast, &mut diagnostics, &mut changed);
        simplify_peephole(ast, &mut diagnostics, &mut changed);
        if !changed {
            break;
        }
    }
    eliminate_dead_branches(ast, &mut diagnostics);
    elide_redundant_capability_checks(ast, &mut diagnostics);
    diagnostics
}

fn nodes_of_kind(ast: &Ast, kind: NodeKind) -> Vec<NodeId> {
    ast.iter()
        .enumerate()
        .filter(|(_, node)| node.kind == kind)
        .map(|(i, _)| NodeId::new(u32::try_from(i).expect("AST exceeds 2^32 nodes")))
        .collect()
}

fn as_literal(ast: &Ast, id: NodeId) -> Option<LiteralValue> {
    let node = ast.get(id);
    if node.kind == NodeKind::Literal {
        node.payload.literal.clone()
    } else {
        None
    }
}

fn replace_with_literal(ast: &mut Ast, id: NodeId, value: LiteralValue) {
    let node = ast.get_mut(id);
    node.kind = NodeKind::Literal;
    node.children = Vec::new();
    node.payload = NodePayload { literal: Some(value), ..Default::default() };
}

fn fold_constants(ast: &mut Ast, diagnostics: &mut Vec<Diagnostic>, changed: &mut bool) {
    for id in nodes_of_kind(ast, NodeKind::Unary) {
        let node = ast.get(id).clone();
        let Some(operand) = node.children.first().copied() else { continue };
        let Some(value) = as_literal(ast, operand) else { continue };
        let folded = match (node.payload.operator.as_deref(), &value) {
            (Some("!"), LiteralValue::Boolean(b)) => Some(LiteralValue::Boolean(!b)),
            (Some("-"), LiteralValue::Number(n)) => Some(LiteralValue::Number(-n)),
            _ => None,
        };
        if let Some(result) = folded {
            replace_with_literal(ast, id, result);
            diagnostics.push(Diagnostic::new(Severity::Info, Stage::Optimizer, "constant_folded", "folded a unary operation over a literal operand", node.location));
            *changed = true;
        }
    }

    for id in nodes_of_kind(ast, NodeKind::Binary) {
        let node = ast.get(id).clone();
        let (Some(&lhs_id), Some(&rhs_id)) = (node.children.first(), node.children.get(1)) else { continue };
        let (Some(lhs), Some(rhs)) = (as_literal(ast, lhs_id), as_literal(ast, rhs_id)) else { continue };
        let Some(op) = node.payload.operator.as_deref() else { continue };
        if let Some(result) = fold_binary_op(op, &lhs, &rhs) {
            replace_with_literal(ast, id, result);
            diagnostics.push(Diagnostic::new(Severity::Info, Stage::Optimizer, "constant_folded", format!("folded constant expression `{op}`"), node.location));
            *changed = true;
        }
    }
}

fn fold_binary_op(op: &str, lhs: &LiteralValue, rhs: &LiteralValue) -> Option<LiteralValue> {
    use LiteralValue::{Boolean, Number, String as Str};
    match (op, lhs, rhs) {
        ("+", Number(a), Number(b)) => Some(Number(a + b)),
        ("-", Number(a), Number(b)) => Some(Number(a - b)),
        ("*", Number(a), Number(b)) => Some(Number(a * b)),
        ("/", Number(a), Number(b)) if *b != 0.0 => Some(Number(a / b)),
        ("%", Number(a), Number(b)) if *b != 0.0 => Some(Number(a % b)),
        ("+", Str(a), Str(b)) => Some(Str(format!("{a}{b}"))),
        ("==", a, b) => Some(Boolean(a == b)),
        ("!=", a, b) => Some(Boolean(a != b)),
        ("<", Number(a), Number(b)) => Some(Boolean(a < b)),
        ("<=", Number(a), Number(b)) => Some(Boolean(a <= b)),
        (">", Number(a), Number(b)) => Some(Boolean(a > b)),
        (">=", Number(a), Number(b)) => Some(Boolean(a >= b)),
        ("&&", Boolean(a), Boolean(b)) => Some(Boolean(*a && *b)),
        ("||", Boolean(a), Boolean(b)) => Some(Boolean(*a || *b)),
        _ => None,
    }
}

fn subtree_eq(ast: &Ast, a: NodeId, b: NodeId) -> bool {
    let na = ast.get(a);
    let nb = ast.get(b);
    na.kind == nb.kind && na.payload == nb.payload && na.children.len() == nb.children.len() && na.children.iter().zip(&nb.children).all(|(&ca, &cb)| subtree_eq(ast, ca, cb))
}

fn copy_subtree_into(ast: &mut Ast, target: NodeId, source: NodeId) {
    let source_node = ast.get(source).clone();
    let dest = ast.get_mut(target);
    dest.kind = source_node.kind;
    dest.children = source_node.children;
    dest.payload = source_node.payload;
}

/// `!!x` -> `x`, and `cond ? a : b` -> `a` when `a` and `b` are structurally
/// identical (the condition is then dead regardless of its value).
fn simplify_peephole(ast: &mut Ast, diagnostics: &mut Vec<Diagnostic>, changed: &mut bool) {
    for id in nodes_of_kind(ast, NodeKind::Unary) {
        let node = ast.get(id).clone();
        if node.payload.operator.as_deref() != Some("!") {
            continue;
        }
        let Some(&inner_id) = node.children.first() else { continue };
        let inner = ast.get(inner_id);
        if inner.kind == NodeKind::Unary && inner.payload.operator.as_deref() == Some("!") {
            let innermost = inner.children[0];
            copy_subtree_into(ast, id, innermost);
            diagnostics.push(Diagnostic::new(Severity::Info, Stage::Optimizer, "double_negation_eliminated", "simplified `!!x` to `x`", node.location));
            *changed = true;
        }
    }

    for id in nodes_of_kind(ast, NodeKind::Ternary) {
        let node = ast.get(id).clone();
        if node.children.len() != 3 {
            continue;
        }
        let (then_id, else_id) = (node.children[1], node.children[2]);
        if subtree_eq(ast, then_id, else_id) {
            copy_subtree_into(ast, id, then_id);
            diagnostics.push(Diagnostic::new(Severity::Info, Stage::Optimizer, "identical_ternary_arms_collapsed", "both ternary branches are identical; collapsed to the shared branch", node.location));
            *changed = true;
        }
    }
}

/// `if (true) { a } else { b }` -> `a`, `if (false) { a }` -> empty block.
/// Only fires once the condition has already folded to a literal boolean.
fn eliminate_dead_branches(ast: &mut Ast, diagnostics: &mut Vec<Diagnostic>) {
    for id in nodes_of_kind(ast, NodeKind::If) {
        let node = ast.get(id).clone();
        let Some(LiteralValue::Boolean(cond)) = as_literal(ast, node.children[0]) else { continue };
        if cond {
            copy_subtree_into(ast, id, node.children[1]);
        } else if let Some(&else_branch) = node.children.get(2) {
            copy_subtree_into(ast, id, else_branch);
        } else {
            let n = ast.get_mut(id);
            n.kind = NodeKind::Block;
            n.children = Vec::new();
        }
        diagnostics.push(Diagnostic::new(
            Severity::Info,
            Stage::Optimizer,
            "dead_branch_eliminated",
            format!("condition folded to `{cond}`; removed the unreachable branch"),
            node.location,
        ));
    }
}

/// Within a single block, a `require(...)`/`check(...)` call that repeats an
/// identical call with no intervening statement is redundant: the first
/// call already proved (or would already have failed) the same check. This
/// only fires on direct, straight-line repetition -- a provable dominance
/// relationship, not a data-flow analysis.
fn elide_redundant_capability_checks(ast: &mut Ast, diagnostics: &mut Vec<Diagnostic>) {
    const CHECK_NAMES: &[&str] = &["require", "check"];

    let mut block_like = nodes_of_kind(ast, NodeKind::Block);
    block_like.extend(nodes_of_kind(ast, NodeKind::Program));

    for block_id in block_like {
        let children = ast.get(block_id).children.clone();
        let mut kept = Vec::with_capacity(children.len());
        let mut previous_check: Option<NodeId> = None;

        for stmt_id in children {
            let is_check_call = call_name(ast, stmt_id).is_some_and(|name| CHECK_NAMES.contains(&name.as_str()));
            if is_check_call {
                if let Some(prev) = previous_check {
                    if subtree_eq(ast, prev, stmt_id) {
                        diagnostics.push(Diagnostic::new(
                            Severity::Info,
                            Stage::Optimizer,
                            "redundant_capability_check_elided",
                            "removed a capability check identical to the immediately preceding one",
                            ast.get(stmt_id).location,
                        ));
                        continue; // drop stmt_id from the block
                    }
                }
                previous_check = Some(stmt_id);
            } else {
                previous_check = None;
            }
            kept.push(stmt_id);
        }

        ast.get_mut(block_id).children = kept;
    }
}

fn call_name(ast: &Ast, stmt_id: NodeId) -> Option<String> {
    let stmt = ast.get(stmt_id);
    if stmt.kind != NodeKind::ExprStmt {
        return None;
    }
    let call = ast.get(*stmt.children.first()?);
    if call.kind != NodeKind::FunctionCall {
        return None;
    }
    let callee = ast.get(*call.children.first()?);
    if callee.kind != NodeKind::Identifier {
        return None;
    }
    callee.payload.name.clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlpy_lexer::parse;
    use mlpy_types::UnitId;

    fn optimize_source(src: &str) -> (Ast, Vec<Diagnostic>) {
        let out = parse(UnitId::new(0), src);
        let mut ast = out.ast;
        let diags = optimize(&mut ast);
        (ast, diags)
    }

    #[test]
    fn folds_arithmetic_expression_to_fourteen() {
        let (ast, diags) = optimize_source("x = 2 + 3 * 4;");
        assert!(diags.iter().any(|d| d.code == "constant_folded"));
        let root = ast.get(ast.root.unwrap());
        let assignment = ast.get(root.children[0]);
        let rhs = ast.get(assignment.children[1]);
        assert_eq!(rhs.kind, NodeKind::Literal);
        assert_eq!(rhs.payload.literal, Some(LiteralValue::Number(14.0)));
    }

    #[test]
    fn eliminates_double_negation() {
        let (ast, diags) = optimize_source("x = !!flag;");
        assert!(diags.iter().any(|d| d.code == "double_negation_eliminated"));
        let root = ast.get(ast.root.unwrap());
        let assignment = ast.get(root.children[0]);
        let rhs = ast.get(assignment.children[1]);
        assert_eq!(rhs.kind, NodeKind::Identifier);
    }

    #[test]
    fn eliminates_dead_else_branch() {
        let (ast, diags) = optimize_source("if (true) { x = 1; } else { x = 2; }");
        assert!(diags.iter().any(|d| d.code == "dead_branch_eliminated"));
        let root = ast.get(ast.root.unwrap());
        let surviving = ast.get(root.children[0]);
        assert_eq!(surviving.kind, NodeKind::Block);
        let assignment = ast.get(surviving.children[0]);
        assert_eq!(assignment.kind, NodeKind::Assignment);
    }

    #[test]
    fn collapses_identical_ternary_arms() {
        let (ast, diags) = optimize_source("x = flag ? 1 : 1;");
        assert!(diags.iter().any(|d| d.code == "identical_ternary_arms_collapsed"));
        let root = ast.get(ast.root.unwrap());
        let assignment = ast.get(root.children[0]);
        let rhs = ast.get(assignment.children[1]);
        assert_eq!(rhs.kind, NodeKind::Literal);
    }

    #[test]
    fn elides_second_identical_capability_check() {
        let (ast, diags) = optimize_source("require(1); require(1); x = 1;");
        assert!(diags.iter().any(|d| d.code == "redundant_capability_check_elided"));
        let root = ast.get(ast.root.unwrap());
        assert_eq!(root.children.len(), 2); // one require(1); plus x = 1;
    }

    #[test]
    fn keeps_distinct_capability_checks() {
        let (ast, diags) = optimize_source("require(1); require(2);");
        assert!(!diags.iter().any(|d| d.code == "redundant_capability_check_elided"));
        let root = ast.get(ast.root.unwrap());
        assert_eq!(root.children.len(), 2);
    }
}
