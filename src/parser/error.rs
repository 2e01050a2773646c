use crate::lexer::{Position, Token, TokenKind, Tokens};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// Token of the wrong kind or value
    Syntax,
    /// A token was required but the stream had ended
    UnexpectedEndOfInput,
    /// A compiler safety limit was hit
    Limit,
}

// Parse error
#[derive(Debug, Clone)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub token_idx: usize,
}

impl ParseError {
    pub(super) fn from_token(
        kind: ParseErrorKind,
        message: String,
        token: &Token,
        token_idx: usize,
    ) -> Self {
        Self {
            kind,
            message,
            line: token.line,
            column: token.column,
            token_idx,
        }
    }

    pub(super) fn unexpected_token(
        expected: &str,
        token: &Token,
        token_idx: usize,
        tokens: &Tokens,
    ) -> Self {
        let kind = if token.kind == TokenKind::Eof {
            ParseErrorKind::UnexpectedEndOfInput
        } else {
            ParseErrorKind::Syntax
        };

        Self::from_token(
            kind,
            format!("Expected {}, found {}", expected, tokens.describe(token)),
            token,
            token_idx,
        )
    }

    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let label = match self.kind {
            ParseErrorKind::Syntax => "Syntax error",
            ParseErrorKind::UnexpectedEndOfInput => "Unexpected end of input",
            ParseErrorKind::Limit => "Limit exceeded",
        };
        write!(f, "{} at {}:{}: {}", label, self.line, self.column, self.message)
    }
}

impl std::error::Error for ParseError {}
