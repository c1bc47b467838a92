//! C5: deep security analyzer.
//!
//! Four ordered AST-level passes over an already-collected unit: an import
//! guard, a reflection guard, an injection guard, and a capability-gap pass
//! that aggregates the manifest of capabilities the unit will need at
//! runtime. Findings are diagnostics; the capability manifest is returned
//! separately for the coordinator (C13) to fold into the compiled artifact.
//!
//! The three name-based guards share a single compiled [`DenyList`] rather
//! than three linear `Vec<&str>` scans, the same single-pass-over-a-`RegexSet`
//! shape used for command-line denylisting elsewhere in this codebase.

use std::sync::OnceLock;

use regex::RegexSet;

use mlpy_types::{Ast, Diagnostic, Node, NodeId, NodeKind, RequiredCapability, Severity, Stage};

/// Module names with no legitimate use inside sandboxed ML source: every one
/// is a direct route to the host filesystem, network, or process table.
const DENIED_IMPORTS: &[&str] = &["os", "sys", "subprocess", "socket", "ctypes", "importlib", "shutil", "pickle", "marshal"];

/// Attribute names that exist only to climb from an object back to its
/// class, module globals, or the interpreter's builtins -- reflection paths
/// that bypass the safe attribute registry entirely (spec §4.5).
const DENIED_REFLECTION_ATTRS: &[&str] = &[
    "__class__", "__globals__", "__subclasses__", "__bases__", "__mro__", "__dict__",
    "__builtins__", "__import__", "__getattribute__", "__reduce__", "__code__",
];

/// Call targets that accept and execute a string of code at runtime.
const DENIED_DYNAMIC_CALLS: &[&str] = &["eval", "exec", "compile", "__import__"];

/// Compiled exact-name denylist, matching a whole name in one pass via
/// `RegexSet` rather than a linear `contains` scan per name.
struct DenyList {
    set: RegexSet,
}

impl DenyList {
    fn compile(names: &[&str]) -> Self {
        let patterns: Vec<String> = names.iter().map(|n| format!("^{}$", regex::escape(n))).collect();
        Self { set: RegexSet::new(patterns).expect("denylist patterns are escaped literals") }
    }

    fn denies(&self, name: &str) -> bool {
        self.set.is_match(name)
    }
}

fn denied_imports() -> &'static DenyList {
    static LIST: OnceLock<DenyList> = OnceLock::new();
    LIST.get_or_init(|| DenyList::compile(DENIED_IMPORTS))
}

fn denied_reflection_attrs() -> &'static DenyList {
    static LIST: OnceLock<DenyList> = OnceLock::new();
    LIST.get_or_init(|| DenyList::compile(DENIED_REFLECTION_ATTRS))
}

fn denied_dynamic_calls() -> &'static DenyList {
    static LIST: OnceLock<DenyList> = OnceLock::new();
    LIST.get_or_init(|| DenyList::compile(DENIED_DYNAMIC_CALLS))
}

pub struct SecurityAnalysis {
    pub diagnostics: Vec<Diagnostic>,
    pub required_capabilities: Vec<RequiredCapability>,
}

#[must_use]
pub fn analyze(ast: &Ast) -> SecurityAnalysis {
    tracing::debug!(stage = "security", nodes = ast.len(), "scanning AST for denied imports, reflection, and injection sinks");
    let Some(root) = ast.root else {
        return SecurityAnalysis { diagnostics: Vec::new(), required_capabilities: Vec::new() };
    };

    let mut diagnostics = Vec::new();
    import_guard(ast, root, &mut diagnostics);
    reflection_guard(ast, root, &mut diagnostics);
    injection_guard(ast, root, &mut diagnostics);
    let required_capabilities = capability_gap(ast, root);

    SecurityAnalysis { diagnostics, required_capabilities }
}

fn each_node(ast: &Ast, root: NodeId, mut visit: impl FnMut(&Node)) {
    ast.walk_preorder(root, |node| visit(node));
}

fn import_guard(ast: &Ast, root: NodeId, diagnostics: &mut Vec<Diagnostic>) {
    each_node(ast, root, |node| {
        if node.kind != NodeKind::Import {
            return;
        }
        let Some(name) = &node.payload.name else { return };
        if denied_imports().denies(name) {
            diagnostics.push(Diagnostic::new(
                Severity::Critical,
                Stage::SecurityAnalyzer,
                "dangerous_import",
                format!("import of `{name}` is never permitted in sandboxed source"),
                node.location,
            ));
        }
    });
}

fn reflection_guard(ast: &Ast, root: NodeId, diagnostics: &mut Vec<Diagnostic>) {
    each_node(ast, root, |node| {
        if node.kind != NodeKind::MemberAccess {
            return;
        }
        let Some(name) = &node.payload.name else { return };
        if denied_reflection_attrs().denies(name) {
            diagnostics.push(Diagnostic::new(
                Severity::Critical,
                Stage::SecurityAnalyzer,
                "reflection_access_denied",
                format!("access to `{name}` would climb out of the sandboxed object graph"),
                node.location,
            ));
        }
    });
}

/// Flags calls to a dynamic-eval-like sink, unless the callee identifier
/// already resolved to a user-defined binding (spec §4.5: a local function
/// shadowing `eval` is not the dangerous builtin and should not be flagged).
fn injection_guard(ast: &Ast, root: NodeId, diagnostics: &mut Vec<Diagnostic>) {
    each_node(ast, root, |node| {
        if node.kind != NodeKind::FunctionCall {
            return;
        }
        let Some(&callee_id) = node.children.first() else { return };
        let callee = ast.get(callee_id);
        if callee.kind != NodeKind::Identifier {
            return;
        }
        if callee.payload.resolved_binding.is_some() {
            return; // shadowed by a user declaration, not the host builtin
        }
        let Some(name) = &callee.payload.name else { return };
        if denied_dynamic_calls().denies(name) {
            diagnostics.push(Diagnostic::new(
                Severity::Error,
                Stage::SecurityAnalyzer,
                "dynamic_eval_sink",
                format!("call to `{name}` executes a dynamically constructed program"),
                node.location,
            ));
        }
    });
}

/// Aggregates every `capability { resource "..."; allow op; }` block into
/// the manifest of capabilities the compiled artifact will require at
/// sandbox entry, deduplicating by `(capability_type, operation, resource)`.
fn capability_gap(ast: &Ast, root: NodeId) -> Vec<RequiredCapability> {
    let mut required = Vec::new();
    each_node(ast, root, |node| {
        if node.kind != NodeKind::CapabilityDecl {
            return;
        }
        let Some(capability_type) = &node.payload.name else { return };
        let mut resources = Vec::new();
        let mut operations = Vec::new();
        for &child_id in &node.children {
            let child = ast.get(child_id);
            match child.kind {
                NodeKind::ResourcePattern => {
                    if let Some(mlpy_types::LiteralValue::String(glob)) = &child.payload.literal {
                        resources.push(glob.clone());
                    }
                }
                NodeKind::PermissionGrant => {
                    if let Some(op) = &child.payload.name {
                        operations.push(op.clone());
                    }
                }
                _ => {}
            }
        }
        for operation in operations {
            let entry = RequiredCapability { capability_type: capability_type.clone(), operation, resources: resources.clone() };
            if !required.contains(&entry) {
                required.push(entry);
            }
        }
    });
    required
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::parse_and_collect;

    #[test]
    fn flags_dangerous_import() {
        let (ast, _) = parse_and_collect("import os;");
        let result = analyze(&ast);
        assert!(result.diagnostics.iter().any(|d| d.code == "dangerous_import"));
    }

    #[test]
    fn allows_registered_import() {
        let (ast, _) = parse_and_collect("import math;");
        let result = analyze(&ast);
        assert!(!result.diagnostics.iter().any(|d| d.code == "dangerous_import"));
    }

    #[test]
    fn denylist_matches_whole_names_only() {
        let list = DenyList::compile(DENIED_IMPORTS);
        assert!(list.denies("os"));
        assert!(!list.denies("osprey"));
        assert!(!list.denies("my_os"));
    }

    #[test]
    fn flags_dunder_member_access() {
        let (ast, _) = parse_and_collect("x = obj.__class__;");
        let result = analyze(&ast);
        assert!(result.diagnostics.iter().any(|d| d.code == "reflection_access_denied"));
    }

    #[test]
    fn flags_eval_call_when_unshadowed() {
        let (ast, _) = parse_and_collect(r#"x = eval("2 + 2");"#);
        let result = analyze(&ast);
        assert!(result.diagnostics.iter().any(|d| d.code == "dynamic_eval_sink"));
    }

    #[test]
    fn does_not_flag_user_defined_eval() {
        let (ast, _) = parse_and_collect(r#"function eval(x) { return x; } y = eval(1);"#);
        let result = analyze(&ast);
        assert!(!result.diagnostics.iter().any(|d| d.code == "dynamic_eval_sink"));
    }

    #[test]
    fn aggregates_required_capabilities() {
        let (ast, _) = parse_and_collect(r#"capability FileAccess { resource "/data/*"; allow read; allow write; }"#);
        let result = analyze(&ast);
        assert_eq!(result.required_capabilities.len(), 2);
        assert!(result.required_capabilities.iter().all(|c| c.capability_type == "FileAccess"));
    }
}
