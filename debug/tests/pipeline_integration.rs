//! Exercises the debug index against a real compiled unit: lexer -> analysis
//! -> emitter -> debug index, rather than against hand-built source maps.

use mlpy_analysis::{collect, optimize, transform, validate};
use mlpy_codegen::{emit, HostSurface};
use mlpy_debug::{visible_frame_variables, BreakpointTable, DebugIndex};
use mlpy_types::UnitId;

#[test]
fn breakpoint_on_a_throw_resolves_after_compilation() {
    let src = "x = 1;\ny = 2;\nthrow \"boom\";\n";
    let parsed = mlpy_lexer::parse(UnitId::new(0), src);
    let mut ast = parsed.ast;
    assert!(validate(&ast).is_empty());
    transform(&mut ast);
    let collected = collect(&mut ast);
    optimize(&mut ast);
    let out = emit(&ast, &collected.symbols, UnitId::new(0), "unit.ml", &HostSurface::new());
    assert!(out.diagnostics.is_empty(), "{:?}", out.diagnostics);

    let mut breakpoints = BreakpointTable::new();
    let bp = breakpoints.set("unit.ml", 3);
    assert!(breakpoints.resolved_generated_lines(bp).is_empty());

    breakpoints.register_source_map(DebugIndex::new(out.source_map));
    let generated_lines = breakpoints.resolved_generated_lines(bp);
    assert!(!generated_lines.is_empty(), "line 3 should have produced at least one generated line");
    assert!(breakpoints.record_hit(bp).is_ok());
}

#[test]
fn frame_variables_exclude_the_runtime_import_alias() {
    let src = "x = 1;\nfunction f() {\n  y = 2;\n  return x + y;\n}\n";
    let parsed = mlpy_lexer::parse(UnitId::new(0), src);
    let mut ast = parsed.ast;
    assert!(validate(&ast).is_empty());
    transform(&mut ast);
    let collected = collect(&mut ast);

    let program_scope = collected.symbols.scopes().next().expect("program scope exists").id;
    let visible = visible_frame_variables(&collected.symbols, program_scope);
    assert!(visible.contains(&"x".to_string()));
    assert!(!visible.iter().any(|name| name == "_mlpy_runtime"));
}
