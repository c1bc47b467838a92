//! Character-level scanner (spec §4.1).

use mlpy_types::{Position, Span};

use crate::token::{keyword, Token, TokenKind};

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum LexError {
    #[error("unterminated string literal starting at line {line}")]
    UnterminatedString { line: u32 },
    #[error("invalid escape sequence '\\{ch}' at line {line}")]
    InvalidEscape { ch: char, line: u32 },
    #[error("unexpected character '{ch}' at line {line}")]
    UnexpectedChar { ch: char, line: u32 },
}

impl LexError {
    #[must_use]
    pub fn line(&self) -> u32 {
        match self {
            Self::UnterminatedString { line } | Self::InvalidEscape { line, .. } | Self::UnexpectedChar { line, .. } => *line,
        }
    }
}

pub struct Lexer<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
    line: u32,
    column: u32,
}

impl<'a> Lexer<'a> {
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self { source, chars: source.chars().collect(), pos: 0, line: 1, column: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(c)
    }

    fn here(&self) -> Position {
        Position::new(self.line, self.column)
    }

    fn single(&mut self, kind: TokenKind) -> Token {
        let start = self.here();
        self.advance();
        Token::new(kind, Span::new(start, self.here()))
    }

    /// Produce the full token stream, collecting lex errors rather than
    /// stopping at the first one (best-effort continuation, spec §4.1).
    pub fn tokenize(mut self) -> (Vec<Token>, Vec<LexError>) {
        let mut tokens = Vec::new();
        let mut errors = Vec::new();

        loop {
            self.skip_whitespace_and_comments();
            let Some(c) = self.peek() else {
                tokens.push(Token::new(TokenKind::Eof, Span::point(self.here())));
                break;
            };

            let token = match c {
                '0'..='9' => self.scan_number(),
                '"' | '\'' => match self.scan_string(c) {
                    Ok(t) => t,
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                },
                c if c.is_alphabetic() || c == '_' => self.scan_identifier(),
                ';' => self.single(TokenKind::Semicolon),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                '?' => self.single(TokenKind::Question),
                '.' => self.scan_dot(),
                '+' => self.scan_plus(),
                '-' => self.scan_minus(),
                '*' => self.single(TokenKind::Star),
                '/' => self.single(TokenKind::Slash),
                '%' => self.single(TokenKind::Percent),
                '=' => self.scan_eq(),
                '!' => self.scan_bang(),
                '<' => self.scan_lt(),
                '>' => self.scan_gt(),
                '&' => self.scan_and(&mut errors),
                '|' => self.scan_or(),
                other => {
                    let line = self.line;
                    self.advance();
                    errors.push(LexError::UnexpectedChar { ch: other, line });
                    continue;
                }
            };
            tokens.push(token);
        }

        (tokens, errors)
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek() {
                Some(c) if c.is_whitespace() => {
                    self.advance();
                }
                Some('/') if self.peek_at(1) == Some('/') => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn scan_number(&mut self) -> Token {
        let start = self.here();
        let start_idx = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some('.') && self.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let save = self.pos;
            self.advance();
            if matches!(self.peek(), Some('+' | '-')) {
                self.advance();
            }
            if self.peek().is_some_and(|c| c.is_ascii_digit()) {
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.pos = save;
            }
        }
        let text: String = self.chars[start_idx..self.pos].iter().collect();
        let value: f64 = text.parse().unwrap_or(f64::NAN);
        Token::new(TokenKind::Number(value), Span::new(start, self.here()))
    }

    fn scan_string(&mut self, quote: char) -> Result<Token, LexError> {
        let start = self.here();
        let start_line = self.line;
        self.advance(); // opening quote
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(LexError::UnterminatedString { line: start_line }),
                Some(c) if c == quote => {
                    self.advance();
                    break;
                }
                Some('\\') => {
                    self.advance();
                    let line = self.line;
                    let escaped = self.advance().ok_or(LexError::UnterminatedString { line: start_line })?;
                    value.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        '\\' => '\\',
                        '"' => '"',
                        '\'' => '\'',
                        other => return Err(LexError::InvalidEscape { ch: other, line }),
                    });
                }
                Some(c) => {
                    value.push(c);
                    self.advance();
                }
            }
        }
        Ok(Token::new(TokenKind::String(value), Span::new(start, self.here())))
    }

    fn scan_identifier(&mut self) -> Token {
        let start = self.here();
        let start_idx = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.advance();
        }
        let text: String = self.chars[start_idx..self.pos].iter().collect();
        let kind = keyword(&text).unwrap_or(TokenKind::Identifier(text));
        Token::new(kind, Span::new(start, self.here()))
    }

    fn scan_dot(&mut self) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('.') && self.peek_at(1) == Some('.') {
            self.advance();
            self.advance();
            return Token::new(TokenKind::DotDotDot, Span::new(start, self.here()));
        }
        Token::new(TokenKind::Dot, Span::new(start, self.here()))
    }

    fn scan_plus(&mut self) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            return Token::new(TokenKind::PlusAssign, Span::new(start, self.here()));
        }
        Token::new(TokenKind::Plus, Span::new(start, self.here()))
    }

    fn scan_minus(&mut self) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            return Token::new(TokenKind::MinusAssign, Span::new(start, self.here()));
        }
        Token::new(TokenKind::Minus, Span::new(start, self.here()))
    }

    fn scan_eq(&mut self) -> Token {
        let start = self.here();
        self.advance();
        match self.peek() {
            Some('=') => {
                self.advance();
                Token::new(TokenKind::Eq, Span::new(start, self.here()))
            }
            Some('>') => {
                self.advance();
                Token::new(TokenKind::FatArrow, Span::new(start, self.here()))
            }
            _ => Token::new(TokenKind::Assign, Span::new(start, self.here())),
        }
    }

    fn scan_bang(&mut self) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            return Token::new(TokenKind::NotEq, Span::new(start, self.here()));
        }
        Token::new(TokenKind::Bang, Span::new(start, self.here()))
    }

    fn scan_lt(&mut self) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            return Token::new(TokenKind::LtEq, Span::new(start, self.here()));
        }
        Token::new(TokenKind::Lt, Span::new(start, self.here()))
    }

    fn scan_gt(&mut self) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('=') {
            self.advance();
            return Token::new(TokenKind::GtEq, Span::new(start, self.here()));
        }
        Token::new(TokenKind::Gt, Span::new(start, self.here()))
    }

    fn scan_and(&mut self, errors: &mut Vec<LexError>) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('&') {
            self.advance();
            return Token::new(TokenKind::AndAnd, Span::new(start, self.here()));
        }
        let line = self.line;
        errors.push(LexError::UnexpectedChar { ch: '&', line });
        Token::new(TokenKind::AndAnd, Span::new(start, self.here()))
    }

    fn scan_or(&mut self) -> Token {
        let start = self.here();
        self.advance();
        if self.peek() == Some('>') {
            self.advance();
            return Token::new(TokenKind::PipeArrow, Span::new(start, self.here()));
        }
        if self.peek() == Some('|') {
            self.advance();
            return Token::new(TokenKind::OrOr, Span::new(start, self.here()));
        }
        Token::new(TokenKind::OrOr, Span::new(start, self.here()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let (tokens, errors) = Lexer::new(src).tokenize();
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn scans_arithmetic_statement() {
        let kinds = kinds("x = 2 + 3 * 4;");
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier("x".into()),
                TokenKind::Assign,
                TokenKind::Number(2.0),
                TokenKind::Plus,
                TokenKind::Number(3.0),
                TokenKind::Star,
                TokenKind::Number(4.0),
                TokenKind::Semicolon,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn scans_string_with_escapes() {
        let kinds = kinds(r#""a\nb";"#);
        assert_eq!(kinds[0], TokenKind::String("a\nb".to_string()));
    }

    #[test]
    fn ignores_line_comments() {
        let kinds = kinds("x = 1; // trailing comment\ny = 2;");
        assert!(kinds.contains(&TokenKind::Identifier("y".into())));
    }

    #[test]
    fn reports_unterminated_string() {
        let (_, errors) = Lexer::new("\"unterminated").tokenize();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::UnterminatedString { .. }));
    }

    #[test]
    fn scans_scientific_notation() {
        let kinds = kinds("1.5e10;");
        assert_eq!(kinds[0], TokenKind::Number(1.5e10));
    }
}
