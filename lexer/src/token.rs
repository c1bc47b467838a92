//! Token vocabulary for the ML language (spec §4.1, §6).

use mlpy_types::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    Number(f64),
    String(String),
    True,
    False,
    Null,
    Identifier(String),

    // Keywords
    Function,
    Fn,
    Return,
    If,
    Elif,
    Else,
    While,
    For,
    In,
    Try,
    Except,
    Finally,
    Throw,
    Break,
    Continue,
    Nonlocal,
    Import,
    As,
    Capability,
    Resource,
    Allow,
    Match,
    Case,

    // Punctuation
    Semicolon,
    Comma,
    Colon,
    Dot,
    DotDotDot,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    FatArrow,   // =>
    PipeArrow,  // |>

    // Operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    AndAnd,
    OrOr,
    Bang,
    Question,
    PlusAssign,
    MinusAssign,

    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

impl Token {
    #[must_use]
    pub fn new(kind: TokenKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[must_use]
pub fn keyword(ident: &str) -> Option<TokenKind> {
    Some(match ident {
        "function" => TokenKind::Function,
        "fn" => TokenKind::Fn,
        "return" => TokenKind::Return,
        "if" => TokenKind::If,
        "elif" => TokenKind::Elif,
        "else" => TokenKind::Else,
        "while" => TokenKind::While,
        "for" => TokenKind::For,
        "in" => TokenKind::In,
        "try" => TokenKind::Try,
        "except" => TokenKind::Except,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "nonlocal" => TokenKind::Nonlocal,
        "import" => TokenKind::Import,
        "as" => TokenKind::As,
        "capability" => TokenKind::Capability,
        "resource" => TokenKind::Resource,
        "allow" => TokenKind::Allow,
        "match" => TokenKind::Match,
        "case" => TokenKind::Case,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => return None,
    })
}
