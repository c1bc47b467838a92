//! Shared parse+collect helper for this crate's unit tests.

use mlpy_lexer::parse;
use mlpy_types::{Ast, SymbolTable, UnitId};

pub fn parse_and_collect(src: &str) -> (Ast, SymbolTable) {
    let out = parse(UnitId::new(0), src);
    let mut ast = out.ast;
    let result = crate::collector::collect(&mut ast);
    (ast, result.symbols)
}
