//! Recursive-descent parser (spec §4.1): concrete token stream -> typed AST.
//!
//! Parse errors are recoverable: each failure emits an error diagnostic and
//! the parser skips to a statement boundary (`;` or the token after a
//! matching `}`) so that later errors in the same unit still surface in one
//! pass (spec §4.1 "best-effort continuation").

use mlpy_types::{
    Ast, Diagnostic, Location, LiteralValue, NodeId, NodeKind, NodePayload, Severity, Span, Stage,
    UnitId,
};

use crate::lexer::{LexError, Lexer};
use crate::token::{Token, TokenKind};

pub struct ParseOutput {
    pub ast: Ast,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse one unit's source text. On fatal failure (no tokens could be
/// recognized at all) returns an empty AST with a single critical
/// diagnostic, per spec §4.1.
#[must_use]
pub fn parse(unit: UnitId, source: &str) -> ParseOutput {
    tracing::debug!(stage = "lex", unit = unit.index(), bytes = source.len(), "lexing and parsing unit");
    let (tokens, lex_errors) = Lexer::new(source).tokenize();
    let mut diagnostics: Vec<Diagnostic> = lex_errors
        .iter()
        .map(|e| {
            let loc = point_location(unit, e.line());
            Diagnostic::new(Severity::Error, Stage::Lexer, "lex_error", e.to_string(), loc)
        })
        .collect();

    if tokens.len() <= 1 && !lex_errors.is_empty() {
        diagnostics.push(Diagnostic::new(
            Severity::Critical,
            Stage::Parser,
            "fatal_parse_failure",
            "source could not be tokenized",
            point_location(unit, 1),
        ));
        return ParseOutput { ast: Ast::new(), diagnostics };
    }

    let mut parser = Parser { unit, tokens, pos: 0, ast: Ast::new(), diagnostics };
    let root = parser.parse_program();
    parser.ast.root = Some(root);
    ParseOutput { ast: parser.ast, diagnostics: parser.diagnostics }
}

fn point_location(unit: UnitId, line: u32) -> Location {
    use mlpy_types::Position;
    Location::new(unit, Span::point(Position::new(line, 0)))
}

struct Parser {
    unit: UnitId,
    tokens: Vec<Token>,
    pos: usize,
    ast: Ast,
    diagnostics: Vec<Diagnostic>,
}

type PResult<T> = Result<T, ()>;

impl Parser {
    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn peek_token(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn at(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(kind)
    }

    fn advance(&mut self) -> Token {
        let tok = self.tokens[self.pos.min(self.tokens.len() - 1)].clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn location(&self, span: Span) -> Location {
        Location::new(self.unit, span)
    }

    fn error(&mut self, code: &str, message: impl Into<String>) {
        let span = self.peek_token().span;
        self.diagnostics.push(Diagnostic::new(
            Severity::Error,
            Stage::Parser,
            code,
            message,
            self.location(span),
        ));
    }

    fn expect(&mut self, kind: &TokenKind, code: &str) -> PResult<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            self.error(code, format!("expected {kind:?}, found {:?}", self.peek()));
            Err(())
        }
    }

    /// Skip tokens until a statement boundary: past the next `;`, or the
    /// token after a balanced `}`, or EOF.
    fn recover_to_statement_boundary(&mut self) {
        let mut depth = 0i32;
        loop {
            match self.peek() {
                TokenKind::Eof => return,
                TokenKind::LBrace => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::RBrace => {
                    if depth == 0 {
                        self.advance();
                        return;
                    }
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        return;
                    }
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    fn push(&mut self, kind: NodeKind, children: Vec<NodeId>, span: Span, payload: NodePayload) -> NodeId {
        self.ast.push(kind, children, self.location(span), payload)
    }

    // -- program & statements ------------------------------------------------

    fn parse_program(&mut self) -> NodeId {
        let start = self.peek_token().span;
        let mut statements = Vec::new();
        while !self.at(&TokenKind::Eof) {
            let before = self.pos;
            match self.parse_statement() {
                Ok(id) => statements.push(id),
                Err(()) => self.recover_to_statement_boundary(),
            }
            if self.pos == before {
                // Safety valve: guarantee forward progress.
                self.advance();
            }
        }
        let end = self.peek_token().span;
        self.push(NodeKind::Program, statements, Span::new(start.start, end.end), NodePayload::default())
    }

    fn parse_block(&mut self) -> PResult<NodeId> {
        let open = self.expect(&TokenKind::LBrace, "expected_block")?;
        let mut statements = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            let before = self.pos;
            match self.parse_statement() {
                Ok(id) => statements.push(id),
                Err(()) => self.recover_to_statement_boundary(),
            }
            if self.pos == before {
                self.advance();
            }
        }
        let close = self.expect(&TokenKind::RBrace, "unterminated_block")?;
        Ok(self.push(NodeKind::Block, statements, Span::new(open.span.start, close.span.end), NodePayload::default()))
    }

    fn parse_statement(&mut self) -> PResult<NodeId> {
        match self.peek().clone() {
            TokenKind::Import => self.parse_import(),
            TokenKind::Capability => self.parse_capability_decl(),
            TokenKind::Function => self.parse_function_def(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::For => self.parse_for(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Throw => self.parse_throw(),
            TokenKind::Break => self.parse_simple_jump(NodeKind::Break),
            TokenKind::Continue => self.parse_simple_jump(NodeKind::Continue),
            TokenKind::Return => self.parse_return(),
            TokenKind::Nonlocal => self.parse_nonlocal(),
            TokenKind::LBrace => self.parse_block(),
            TokenKind::LBracket => self.parse_destructuring_or_expr_stmt(),
            _ => self.parse_expr_or_assignment_stmt(),
        }
    }

    fn parse_import(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'import'
        let name_tok = self.expect(&TokenKind::Identifier(String::new()), "expected_import_name")?;
        let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
        let mut alias = None;
        if self.at(&TokenKind::As) {
            self.advance();
            let alias_tok = self.expect(&TokenKind::Identifier(String::new()), "expected_alias_name")?;
            if let TokenKind::Identifier(a) = alias_tok.kind {
                alias = Some(a);
            }
        }
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        let mut payload = NodePayload { name: Some(name), ..Default::default() };
        if let Some(a) = alias {
            payload.operator = Some(a);
        }
        Ok(self.push(NodeKind::Import, vec![], Span::new(start.start, end.span.end), payload))
    }

    fn parse_capability_decl(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'capability'
        let name_tok = self.expect(&TokenKind::Identifier(String::new()), "expected_capability_name")?;
        let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
        self.expect(&TokenKind::LBrace, "expected_capability_body")?;
        let mut entries = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            match self.peek().clone() {
                TokenKind::Resource => entries.push(self.parse_resource_pattern()?),
                TokenKind::Allow => entries.push(self.parse_permission_grant()?),
                _ => {
                    self.error("expected_capability_entry", "expected `resource` or `allow`");
                    return Err(());
                }
            }
        }
        let close = self.expect(&TokenKind::RBrace, "unterminated_capability_body")?;
        Ok(self.push(
            NodeKind::CapabilityDecl,
            entries,
            Span::new(start.start, close.span.end),
            NodePayload { name: Some(name), ..Default::default() },
        ))
    }

    fn parse_resource_pattern(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'resource'
        let tok = self.expect(&TokenKind::String(String::new()), "expected_resource_glob")?;
        let TokenKind::String(glob) = tok.kind else { unreachable!() };
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        Ok(self.push(
            NodeKind::ResourcePattern,
            vec![],
            Span::new(start.start, end.span.end),
            NodePayload { literal: Some(LiteralValue::String(glob)), ..Default::default() },
        ))
    }

    fn parse_permission_grant(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'allow'
        let tok = self.expect(&TokenKind::Identifier(String::new()), "expected_operation_name")?;
        let TokenKind::Identifier(op) = tok.kind else { unreachable!() };
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        Ok(self.push(
            NodeKind::PermissionGrant,
            vec![],
            Span::new(start.start, end.span.end),
            NodePayload { name: Some(op), ..Default::default() },
        ))
    }

    fn parse_function_def(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'function'
        let name_tok = self.expect(&TokenKind::Identifier(String::new()), "expected_function_name")?;
        let TokenKind::Identifier(name) = name_tok.kind else { unreachable!() };
        self.expect(&TokenKind::LParen, "expected_param_list")?;
        let params = self.parse_params()?;
        self.expect(&TokenKind::RParen, "unterminated_param_list")?;
        let body = self.parse_block()?;
        let end_span = self.ast.get(body).location.span;
        let mut children = params;
        children.push(body);
        Ok(self.push(
            NodeKind::FunctionDef,
            children,
            Span::new(start.start, end_span.end),
            NodePayload { name: Some(name), ..Default::default() },
        ))
    }

    fn parse_params(&mut self) -> PResult<Vec<NodeId>> {
        let mut params = Vec::new();
        if self.at(&TokenKind::RParen) {
            return Ok(params);
        }
        loop {
            let tok = self.expect(&TokenKind::Identifier(String::new()), "expected_parameter_name")?;
            let TokenKind::Identifier(name) = tok.kind else { unreachable!() };
            params.push(self.push(
                NodeKind::Parameter,
                vec![],
                tok.span,
                NodePayload { name: Some(name), ..Default::default() },
            ));
            if self.at(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(params)
    }

    fn parse_if(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'if'
        self.expect(&TokenKind::LParen, "expected_condition")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "unterminated_condition")?;
        let then_block = self.parse_block()?;
        let mut children = vec![cond, then_block];
        let mut end_span = self.ast.get(then_block).location.span;

        while self.at(&TokenKind::Elif) {
            self.advance();
            self.expect(&TokenKind::LParen, "expected_condition")?;
            let elif_cond = self.parse_expr()?;
            self.expect(&TokenKind::RParen, "unterminated_condition")?;
            let elif_block = self.parse_block()?;
            end_span = self.ast.get(elif_block).location.span;
            let elif_node = self.push(NodeKind::Elif, vec![elif_cond, elif_block], end_span, NodePayload::default());
            children.push(elif_node);
        }

        if self.at(&TokenKind::Else) {
            self.advance();
            let else_block = self.parse_block()?;
            end_span = self.ast.get(else_block).location.span;
            children.push(else_block);
        }

        Ok(self.push(NodeKind::If, children, Span::new(start.start, end_span.end), NodePayload::default()))
    }

    fn parse_while(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'while'
        self.expect(&TokenKind::LParen, "expected_condition")?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "unterminated_condition")?;
        let body = self.parse_block()?;
        let end_span = self.ast.get(body).location.span;
        Ok(self.push(NodeKind::While, vec![cond, body], Span::new(start.start, end_span.end), NodePayload::default()))
    }

    fn parse_for(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'for'
        self.expect(&TokenKind::LParen, "expected_for_header")?;
        let var_tok = self.expect(&TokenKind::Identifier(String::new()), "expected_loop_variable")?;
        let TokenKind::Identifier(var_name) = var_tok.kind else { unreachable!() };
        let var_node = self.push(NodeKind::Identifier, vec![], var_tok.span, NodePayload { name: Some(var_name), ..Default::default() });
        self.expect(&TokenKind::In, "expected_in")?;
        let iterable = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "unterminated_for_header")?;
        let body = self.parse_block()?;
        let end_span = self.ast.get(body).location.span;
        Ok(self.push(
            NodeKind::For,
            vec![var_node, iterable, body],
            Span::new(start.start, end_span.end),
            NodePayload::default(),
        ))
    }

    fn parse_try(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'try'
        let try_block = self.parse_block()?;
        let mut children = vec![try_block];
        let mut end_span = self.ast.get(try_block).location.span;

        if self.at(&TokenKind::Except) {
            let except_start = self.advance().span;
            let mut binding = None;
            if self.at(&TokenKind::LParen) {
                self.advance();
                let tok = self.expect(&TokenKind::Identifier(String::new()), "expected_exception_binding")?;
                if let TokenKind::Identifier(n) = tok.kind {
                    binding = Some(n);
                }
                self.expect(&TokenKind::RParen, "unterminated_exception_binding")?;
            }
            let except_block = self.parse_block()?;
            end_span = self.ast.get(except_block).location.span;
            let payload = NodePayload { name: binding, ..Default::default() };
            let except_node = self.push(NodeKind::Except, vec![except_block], Span::new(except_start.start, end_span.end), payload);
            children.push(except_node);
        } else {
            self.error("expected_except", "`try` must be followed by `except`");
            return Err(());
        }

        if self.at(&TokenKind::Finally) {
            self.advance();
            let finally_block = self.parse_block()?;
            end_span = self.ast.get(finally_block).location.span;
            children.push(finally_block);
        }

        Ok(self.push(NodeKind::Try, children, Span::new(start.start, end_span.end), NodePayload::default()))
    }

    fn parse_throw(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'throw'
        if let TokenKind::String(_) = self.peek() {
            self.error(
                "throw_requires_object",
                "`throw` of a bare string is discouraged; use object-literal syntax: throw { message: \"...\" };",
            );
        }
        let value = self.parse_expr()?;
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        Ok(self.push(NodeKind::Throw, vec![value], Span::new(start.start, end.span.end), NodePayload::default()))
    }

    fn parse_simple_jump(&mut self, kind: NodeKind) -> PResult<NodeId> {
        let start = self.advance().span;
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        Ok(self.push(kind, vec![], Span::new(start.start, end.span.end), NodePayload::default()))
    }

    fn parse_return(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'return'
        let mut children = Vec::new();
        if !self.at(&TokenKind::Semicolon) {
            children.push(self.parse_expr()?);
        }
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        Ok(self.push(NodeKind::Return, children, Span::new(start.start, end.span.end), NodePayload::default()))
    }

    fn parse_nonlocal(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'nonlocal'
        let mut names = Vec::new();
        loop {
            let tok = self.expect(&TokenKind::Identifier(String::new()), "expected_identifier")?;
            if let TokenKind::Identifier(n) = tok.kind {
                names.push(n);
            }
            if self.at(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        // Multiple names collapse to one `nonlocal` node per name, matching
        // one binding per nonlocal declaration in the symbol table.
        let mut last = None;
        for name in names {
            last = Some(self.push(
                NodeKind::Nonlocal,
                vec![],
                Span::new(start.start, end.span.end),
                NodePayload { name: Some(name), ..Default::default() },
            ));
        }
        last.ok_or(())
    }

    fn parse_destructuring_or_expr_stmt(&mut self) -> PResult<NodeId> {
        // `[a, b] = expr;` destructuring, or a bare array-literal expression
        // statement; disambiguate by scanning for a top-level `=` before `;`.
        let save = self.pos;
        if let Ok(pattern) = self.try_parse_array_pattern() {
            if self.at(&TokenKind::Assign) {
                self.advance();
                let value = self.parse_expr()?;
                let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
                let start_span = self.ast.get(pattern).location.span;
                return Ok(self.push(
                    NodeKind::Destructuring,
                    vec![pattern, value],
                    Span::new(start_span.start, end.span.end),
                    NodePayload::default(),
                ));
            }
        }
        self.pos = save;
        self.parse_expr_or_assignment_stmt()
    }

    fn try_parse_array_pattern(&mut self) -> PResult<NodeId> {
        let open = self.expect(&TokenKind::LBracket, "expected_pattern")?;
        let mut elements = Vec::new();
        while !self.at(&TokenKind::RBracket) && !self.at(&TokenKind::Eof) {
            let tok = self.expect(&TokenKind::Identifier(String::new()), "expected_pattern_name")?;
            if let TokenKind::Identifier(n) = tok.kind {
                elements.push(self.push(NodeKind::Identifier, vec![], tok.span, NodePayload { name: Some(n), ..Default::default() }));
            }
            if self.at(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        let close = self.expect(&TokenKind::RBracket, "unterminated_pattern")?;
        Ok(self.push(NodeKind::ArrayLiteral, elements, Span::new(open.span.start, close.span.end), NodePayload::default()))
    }

    fn parse_expr_or_assignment_stmt(&mut self) -> PResult<NodeId> {
        let expr = self.parse_expr()?;
        if self.at(&TokenKind::Assign) {
            self.advance();
            let value = self.parse_expr()?;
            let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
            let start_span = self.ast.get(expr).location.span;
            return Ok(self.push(
                NodeKind::Assignment,
                vec![expr, value],
                Span::new(start_span.start, end.span.end),
                NodePayload::default(),
            ));
        }
        let end = self.expect(&TokenKind::Semicolon, "expected_semicolon")?;
        let start_span = self.ast.get(expr).location.span;
        Ok(self.push(
            NodeKind::ExprStmt,
            vec![expr],
            Span::new(start_span.start, end.span.end),
            NodePayload::default(),
        ))
    }

    // -- expressions ----------------------------------------------------------

    fn parse_expr(&mut self) -> PResult<NodeId> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> PResult<NodeId> {
        let cond = self.parse_pipeline()?;
        if self.at(&TokenKind::Question) {
            self.advance();
            let then_branch = self.parse_expr()?;
            self.expect(&TokenKind::Colon, "expected_ternary_colon")?;
            let else_branch = self.parse_expr()?;
            let start_span = self.ast.get(cond).location.span;
            let end_span = self.ast.get(else_branch).location.span;
            return Ok(self.push(
                NodeKind::Ternary,
                vec![cond, then_branch, else_branch],
                Span::new(start_span.start, end_span.end),
                NodePayload::default(),
            ));
        }
        Ok(cond)
    }

    fn parse_pipeline(&mut self) -> PResult<NodeId> {
        let mut left = self.parse_logical_or()?;
        while self.at(&TokenKind::PipeArrow) {
            self.advance();
            let right = self.parse_logical_or()?;
            left = self.binary_like(NodeKind::Pipeline, left, right, None);
        }
        Ok(left)
    }

    fn parse_logical_or(&mut self) -> PResult<NodeId> {
        let mut left = self.parse_logical_and()?;
        while self.at(&TokenKind::OrOr) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = self.binary_like(NodeKind::Binary, left, right, Some("||".to_string()));
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> PResult<NodeId> {
        let mut left = self.parse_equality()?;
        while self.at(&TokenKind::AndAnd) {
            self.advance();
            let right = self.parse_equality()?;
            left = self.binary_like(NodeKind::Binary, left, right, Some("&&".to_string()));
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> PResult<NodeId> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                TokenKind::Eq => "==",
                TokenKind::NotEq => "!=",
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = self.binary_like(NodeKind::Binary, left, right, Some(op.to_string()));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> PResult<NodeId> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                TokenKind::Lt => "<",
                TokenKind::LtEq => "<=",
                TokenKind::Gt => ">",
                TokenKind::GtEq => ">=",
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.binary_like(NodeKind::Binary, left, right, Some(op.to_string()));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> PResult<NodeId> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => "+",
                TokenKind::Minus => "-",
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.binary_like(NodeKind::Binary, left, right, Some(op.to_string()));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> PResult<NodeId> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => "*",
                TokenKind::Slash => "/",
                TokenKind::Percent => "%",
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary_like(NodeKind::Binary, left, right, Some(op.to_string()));
        }
        Ok(left)
    }

    fn binary_like(&mut self, kind: NodeKind, left: NodeId, right: NodeId, op: Option<String>) -> NodeId {
        let start_span = self.ast.get(left).location.span;
        let end_span = self.ast.get(right).location.span;
        self.push(kind, vec![left, right], Span::new(start_span.start, end_span.end), NodePayload { operator: op, ..Default::default() })
    }

    fn parse_unary(&mut self) -> PResult<NodeId> {
        match self.peek() {
            TokenKind::Bang => {
                let start = self.advance().span;
                let operand = self.parse_unary()?;
                let end_span = self.ast.get(operand).location.span;
                Ok(self.push(
                    NodeKind::Unary,
                    vec![operand],
                    Span::new(start.start, end_span.end),
                    NodePayload { operator: Some("!".to_string()), ..Default::default() },
                ))
            }
            TokenKind::Minus => {
                let start = self.advance().span;
                let operand = self.parse_unary()?;
                let end_span = self.ast.get(operand).location.span;
                Ok(self.push(
                    NodeKind::Unary,
                    vec![operand],
                    Span::new(start.start, end_span.end),
                    NodePayload { operator: Some("-".to_string()), ..Default::default() },
                ))
            }
            _ => self.parse_postfix(),
        }
    }

    fn parse_postfix(&mut self) -> PResult<NodeId> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::LParen => {
                    self.advance();
                    let args = self.parse_args()?;
                    let end = self.expect(&TokenKind::RParen, "unterminated_call")?;
                    let start_span = self.ast.get(expr).location.span;
                    let mut children = vec![expr];
                    children.extend(args);
                    expr = self.push(NodeKind::FunctionCall, children, Span::new(start_span.start, end.span.end), NodePayload::default());
                }
                TokenKind::Dot => {
                    self.advance();
                    let tok = self.expect(&TokenKind::Identifier(String::new()), "expected_member_name")?;
                    let TokenKind::Identifier(name) = tok.kind else { unreachable!() };
                    let start_span = self.ast.get(expr).location.span;
                    expr = self.push(
                        NodeKind::MemberAccess,
                        vec![expr],
                        Span::new(start_span.start, tok.span.end),
                        NodePayload { name: Some(name), ..Default::default() },
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    if self.at(&TokenKind::Colon) {
                        self.advance();
                        let end_expr = self.parse_expr()?;
                        let close = self.expect(&TokenKind::RBracket, "unterminated_slice")?;
                        let start_span = self.ast.get(expr).location.span;
                        expr = self.push(NodeKind::Slice, vec![expr, end_expr], Span::new(start_span.start, close.span.end), NodePayload::default());
                    } else {
                        let index = self.parse_expr()?;
                        if self.at(&TokenKind::Colon) {
                            self.advance();
                            let end_expr = self.parse_expr()?;
                            let close = self.expect(&TokenKind::RBracket, "unterminated_slice")?;
                            let start_span = self.ast.get(expr).location.span;
                            expr = self.push(NodeKind::Slice, vec![expr, index, end_expr], Span::new(start_span.start, close.span.end), NodePayload::default());
                        } else {
                            let close = self.expect(&TokenKind::RBracket, "unterminated_index")?;
                            let start_span = self.ast.get(expr).location.span;
                            expr = self.push(NodeKind::ArrayAccess, vec![expr, index], Span::new(start_span.start, close.span.end), NodePayload::default());
                        }
                    }
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_args(&mut self) -> PResult<Vec<NodeId>> {
        let mut args = Vec::new();
        if self.at(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            if self.at(&TokenKind::DotDotDot) {
                let start = self.advance().span;
                let inner = self.parse_expr()?;
                let end_span = self.ast.get(inner).location.span;
                args.push(self.push(NodeKind::Spread, vec![inner], Span::new(start.start, end_span.end), NodePayload::default()));
            } else {
                args.push(self.parse_expr()?);
            }
            if self.at(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        Ok(args)
    }

    fn parse_primary(&mut self) -> PResult<NodeId> {
        match self.peek().clone() {
            TokenKind::Number(n) => {
                let tok = self.advance();
                Ok(self.push(NodeKind::Literal, vec![], tok.span, NodePayload { literal: Some(LiteralValue::Number(n)), ..Default::default() }))
            }
            TokenKind::String(s) => {
                let tok = self.advance();
                Ok(self.push(NodeKind::Literal, vec![], tok.span, NodePayload { literal: Some(LiteralValue::String(s)), ..Default::default() }))
            }
            TokenKind::True => {
                let tok = self.advance();
                Ok(self.push(NodeKind::Literal, vec![], tok.span, NodePayload { literal: Some(LiteralValue::Boolean(true)), ..Default::default() }))
            }
            TokenKind::False => {
                let tok = self.advance();
                Ok(self.push(NodeKind::Literal, vec![], tok.span, NodePayload { literal: Some(LiteralValue::Boolean(false)), ..Default::default() }))
            }
            TokenKind::Null => {
                let tok = self.advance();
                Ok(self.push(NodeKind::Literal, vec![], tok.span, NodePayload { literal: Some(LiteralValue::Null), ..Default::default() }))
            }
            TokenKind::Identifier(name) => {
                let tok = self.advance();
                Ok(self.push(NodeKind::Identifier, vec![], tok.span, NodePayload { name: Some(name), ..Default::default() }))
            }
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                self.expect(&TokenKind::RParen, "unterminated_group")?;
                Ok(inner)
            }
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::Fn => self.parse_arrow_fn(),
            TokenKind::Match => self.parse_match(),
            _ => {
                self.error("expected_expression", format!("expected an expression, found {:?}", self.peek()));
                Err(())
            }
        }
    }

    fn parse_array_literal(&mut self) -> PResult<NodeId> {
        let open = self.expect(&TokenKind::LBracket, "expected_array")?;
        let mut elements = Vec::new();
        while !self.at(&TokenKind::RBracket) && !self.at(&TokenKind::Eof) {
            if self.at(&TokenKind::DotDotDot) {
                let start = self.advance().span;
                let inner = self.parse_expr()?;
                let end_span = self.ast.get(inner).location.span;
                elements.push(self.push(NodeKind::Spread, vec![inner], Span::new(start.start, end_span.end), NodePayload::default()));
            } else {
                elements.push(self.parse_expr()?);
            }
            if self.at(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        let close = self.expect(&TokenKind::RBracket, "unterminated_array")?;
        Ok(self.push(NodeKind::ArrayLiteral, elements, Span::new(open.span.start, close.span.end), NodePayload::default()))
    }

    fn parse_object_literal(&mut self) -> PResult<NodeId> {
        let open = self.expect(&TokenKind::LBrace, "expected_object")?;
        let mut entries = Vec::new();
        while !self.at(&TokenKind::RBrace) && !self.at(&TokenKind::Eof) {
            if self.at(&TokenKind::DotDotDot) {
                let start = self.advance().span;
                let inner = self.parse_expr()?;
                let end_span = self.ast.get(inner).location.span;
                entries.push(self.push(NodeKind::Spread, vec![inner], Span::new(start.start, end_span.end), NodePayload::default()));
            } else {
                let key_tok = self.advance();
                let key = match key_tok.kind {
                    TokenKind::Identifier(n) | TokenKind::String(n) => n,
                    other => {
                        self.error("expected_object_key", format!("expected an object key, found {other:?}"));
                        return Err(());
                    }
                };
                self.expect(&TokenKind::Colon, "expected_colon")?;
                let value = self.parse_expr()?;
                let end_span = self.ast.get(value).location.span;
                entries.push(self.push(
                    NodeKind::Literal,
                    vec![value],
                    Span::new(key_tok.span.start, end_span.end),
                    NodePayload { name: Some(key), ..Default::default() },
                ));
            }
            if self.at(&TokenKind::Comma) {
                self.advance();
            } else {
                break;
            }
        }
        let close = self.expect(&TokenKind::RBrace, "unterminated_object")?;
        Ok(self.push(NodeKind::ObjectLiteral, entries, Span::new(open.span.start, close.span.end), NodePayload::default()))
    }

    fn parse_arrow_fn(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'fn'
        self.expect(&TokenKind::LParen, "expected_param_list")?;
        let mut params = self.parse_params()?;
        self.expect(&TokenKind::RParen, "unterminated_param_list")?;
        self.expect(&TokenKind::FatArrow, "expected_fat_arrow")?;
        let body = self.parse_expr()?;
        let end_span = self.ast.get(body).location.span;
        params.push(body);
        Ok(self.push(NodeKind::ArrowFn, params, Span::new(start.start, end_span.end), NodePayload::default()))
    }

    fn parse_match(&mut self) -> PResult<NodeId> {
        let start = self.advance().span; // 'match'
        self.expect(&TokenKind::LParen, "expected_match_subject")?;
        let subject = self.parse_expr()?;
        self.expect(&TokenKind::RParen, "unterminated_match_subject")?;
        self.expect(&TokenKind::LBrace, "expected_match_body")?;
        let mut cases = vec![subject];
        while self.at(&TokenKind::Case) {
            let case_start = self.advance().span;
            let pattern = self.parse_expr()?;
            self.expect(&TokenKind::Colon, "expected_case_colon")?;
            let body = self.parse_block()?;
            let end_span = self.ast.get(body).location.span;
            cases.push(self.push(NodeKind::Case, vec![pattern, body], Span::new(case_start.start, end_span.end), NodePayload::default()));
        }
        let close = self.expect(&TokenKind::RBrace, "unterminated_match_body")?;
        Ok(self.push(NodeKind::Match, cases, Span::new(start.start, close.span.end), NodePayload::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_ok(src: &str) -> Ast {
        let out = parse(UnitId::new(0), src);
        assert!(out.diagnostics.iter().all(|d| d.severity != Severity::Error), "unexpected diagnostics: {:?}", out.diagnostics);
        out.ast
    }

    #[test]
    fn parses_arithmetic_assignment_and_return() {
        let ast = parse_ok("x = 2 + 3 * 4; return x;");
        let root = ast.get(ast.root.unwrap());
        assert_eq!(root.kind, NodeKind::Program);
        assert_eq!(root.children.len(), 2);
        assert_eq!(ast.get(root.children[0]).kind, NodeKind::Assignment);
        assert_eq!(ast.get(root.children[1]).kind, NodeKind::Return);
    }

    #[test]
    fn parses_import_with_alias() {
        let ast = parse_ok("import file as f;");
        let root = ast.get(ast.root.unwrap());
        let import = ast.get(root.children[0]);
        assert_eq!(import.kind, NodeKind::Import);
        assert_eq!(import.payload.name.as_deref(), Some("file"));
        assert_eq!(import.payload.operator.as_deref(), Some("f"));
    }

    #[test]
    fn parses_capability_declaration() {
        let ast = parse_ok(r#"capability FileAccess { resource "/data/*"; allow read; }"#);
        let root = ast.get(ast.root.unwrap());
        let decl = ast.get(root.children[0]);
        assert_eq!(decl.kind, NodeKind::CapabilityDecl);
        assert_eq!(decl.children.len(), 2);
    }

    #[test]
    fn parses_function_definition() {
        let ast = parse_ok("function add(a, b) { return a + b; }");
        let root = ast.get(ast.root.unwrap());
        let func = ast.get(root.children[0]);
        assert_eq!(func.kind, NodeKind::FunctionDef);
        assert_eq!(func.children.len(), 3); // a, b, body
    }

    #[test]
    fn parses_arrow_function() {
        let ast = parse_ok("f = fn(x) => x + 1;");
        let root = ast.get(ast.root.unwrap());
        let assignment = ast.get(root.children[0]);
        let arrow = ast.get(assignment.children[1]);
        assert_eq!(arrow.kind, NodeKind::ArrowFn);
    }

    #[test]
    fn recovers_past_a_parse_error() {
        let out = parse(UnitId::new(0), "x = ; y = 1;");
        assert!(out.diagnostics.iter().any(|d| d.severity == Severity::Error));
        // The parser should still find the second statement.
        let root = out.ast.get(out.ast.root.unwrap());
        assert!(root.children.iter().any(|&id| {
            let n = out.ast.get(id);
            n.kind == NodeKind::Assignment
        }));
    }

    #[test]
    fn flags_bare_string_throw() {
        let out = parse(UnitId::new(0), r#"throw "boom";"#);
        assert!(out.diagnostics.iter().any(|d| d.code == "throw_requires_object"));
    }

    #[test]
    fn accepts_object_literal_throw() {
        let out = parse(UnitId::new(0), r#"throw { message: "boom" };"#);
        assert!(!out.diagnostics.iter().any(|d| d.code == "throw_requires_object"));
    }

    #[test]
    fn parses_elif_chain() {
        let ast = parse_ok("if (a) { return 1; } elif (b) { return 2; } else { return 3; }");
        let root = ast.get(ast.root.unwrap());
        let if_node = ast.get(root.children[0]);
        assert_eq!(if_node.kind, NodeKind::If);
        assert_eq!(if_node.children.len(), 4); // cond, then, elif, else
    }

    #[test]
    fn parses_pipeline_operator() {
        let ast = parse_ok("x = a |> b;");
        let root = ast.get(ast.root.unwrap());
        let assignment = ast.get(root.children[0]);
        assert_eq!(ast.get(assignment.children[1]).kind, NodeKind::Pipeline);
    }
}
