use super::error::{ParseError, ParseErrorKind};
use crate::ast::BinaryOp;
use crate::lexer::{Token, TokenKind};

pub(super) const PREC_OR: u8 = 1;
pub(super) const PREC_ADDITIVE: u8 = 2;
pub(super) const PREC_MULTIPLICATIVE: u8 = 3;

// Binary operators and their precedence levels, all left-associative
pub(super) fn get_precedence(token_kind: &TokenKind) -> Option<(BinaryOp, u8)> {
    match token_kind {
        TokenKind::Or => Some((BinaryOp::Or, PREC_OR)),
        TokenKind::Plus => Some((BinaryOp::Add, PREC_ADDITIVE)),
        TokenKind::Minus => Some((BinaryOp::Sub, PREC_ADDITIVE)),
        TokenKind::Star => Some((BinaryOp::Mul, PREC_MULTIPLICATIVE)),
        TokenKind::Slash => Some((BinaryOp::Div, PREC_MULTIPLICATIVE)),
        _ => None,
    }
}

// Parser helper methods
impl<'a> super::Parser<'a> {
    pub(super) fn new_unexpected_token(&self, expected: &str) -> ParseError {
        ParseError::unexpected_token(expected, self.current_token(), self.current, self.tokens)
    }

    fn limit_error(&self, message: String) -> ParseError {
        ParseError::from_token(
            ParseErrorKind::Limit,
            message,
            self.current_token(),
            self.current,
        )
    }

    // Helper: Check expression recursion depth limit
    pub(super) fn check_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth >= self.limits.max_expr_depth {
            return Err(self.limit_error(format!(
                "Expression nesting too deep: {} levels (max {})",
                depth, self.limits.max_expr_depth
            )));
        }
        Ok(())
    }

    // Helper: Check block nesting limit
    pub(super) fn check_block_depth(&self, depth: usize) -> Result<(), ParseError> {
        if depth > self.limits.max_block_depth {
            return Err(self.limit_error(format!(
                "Blocks nested too deep: {} levels (max {})",
                depth, self.limits.max_block_depth
            )));
        }
        Ok(())
    }

    /// Helper: Count a freshly built AST node against the node limit
    pub(super) fn node<T>(&mut self, node: T) -> Result<T, ParseError> {
        if self.node_count >= self.limits.max_ast_nodes {
            return Err(self.limit_error(format!(
                "AST node limit exceeded: {} nodes (max: {})",
                self.node_count, self.limits.max_ast_nodes
            )));
        }
        self.node_count += 1;
        Ok(node)
    }

    /// Helper: Consume a specific token kind or error, returning the consumed token
    pub(super) fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token, ParseError> {
        let token = self.current_token();
        if token.kind != kind {
            return Err(self.new_unexpected_token(expected));
        }
        let token = token.clone();
        self.advance();
        Ok(token)
    }

    /// Helper: Advance to the next token
    pub(super) fn advance(&mut self) {
        self.current = (self.current + 1).min(self.tokens.list.len());
    }

    pub(super) fn peek_kind(&self) -> TokenKind {
        self.tokens.peek_kind(self.current)
    }

    pub(super) fn peek_kind_is(&self, kind: TokenKind) -> bool {
        self.peek_kind() == kind
    }

    pub(super) fn at_eof(&self) -> bool {
        self.peek_kind_is(TokenKind::Eof)
    }

    // Helper: Get current token
    pub(super) fn current_token(&self) -> &Token {
        self.tokens.get(self.current)
    }

    /// Helper: Lexeme of a token carrying one
    pub(super) fn text_of(&self, token: &Token) -> String {
        self.tokens.text(token).to_string()
    }

    // Indentation

    /// Consume exactly `depth` Tab tokens
    pub(super) fn check_indent(&mut self, depth: usize) -> Result<(), ParseError> {
        for _ in 0..depth {
            self.consume(TokenKind::Tab, "indentation")?;
        }
        Ok(())
    }

    /// If the tokens at `from` form a blank line (tabs then a newline),
    /// return the index just past its newline
    fn blank_line_end(&self, from: usize) -> Option<usize> {
        let mut pos = from;
        while self.tokens.peek_kind(pos) == TokenKind::Tab {
            pos += 1;
        }
        if self.tokens.peek_kind(pos) == TokenKind::Newline {
            Some(pos + 1)
        } else {
            None
        }
    }

    /// Consume any run of blank lines
    pub(super) fn skip_blank_lines(&mut self) {
        while let Some(next) = self.blank_line_end(self.current) {
            self.current = next;
        }
    }

    /// Pure lookahead: true at end of input, or when the next non-blank line
    /// carries fewer than `depth` leading tabs
    pub(super) fn end_of_block(&self, depth: usize) -> bool {
        let mut pos = self.current;
        while let Some(next) = self.blank_line_end(pos) {
            pos = next;
        }

        if self.tokens.peek_kind(pos) == TokenKind::Eof {
            return true;
        }

        (pos..pos + depth).any(|idx| self.tokens.peek_kind(idx) != TokenKind::Tab)
    }

    /// Statement terminator: trailing tabs then one newline, or end of input
    pub(super) fn end_statement(&mut self) -> Result<(), ParseError> {
        if self.at_eof() {
            return Ok(());
        }
        while self.peek_kind_is(TokenKind::Tab) {
            self.advance();
        }
        if self.at_eof() {
            return Ok(());
        }
        self.consume(TokenKind::Newline, "newline after statement")?;
        Ok(())
    }
}
