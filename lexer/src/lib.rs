//! Lexer and recursive-descent parser for the ML language (spec §4.1, C1).
//!
//! This crate turns source text into an `mlpy_types::Ast` plus a list of
//! diagnostics. It never rejects a unit outright except on total
//! tokenization failure: recoverable lex and parse errors are collected and
//! parsing continues past them so a single compile surfaces as many
//! problems as it can find in one pass.

pub mod lexer;
pub mod parser;
pub mod token;

pub use lexer::{LexError, Lexer};
pub use parser::{parse, ParseOutput};
pub use token::{keyword, Token, TokenKind};
