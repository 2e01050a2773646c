use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::limits::CompilerLimits;
use crate::string_storage::{StringId, StringStorage};

/// A run of this many spaces at the start of a line counts as one tab
pub const SPACES_PER_INDENT: usize = 4;

// Token types

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    // Keywords (5 total)
    Def,
    Return,
    If,
    Else,
    Or,

    // Identifiers and Literals
    Identifier,
    Number(NumberKind),
    String,

    // Operators
    Plus,       // +
    Minus,      // -
    Star,       // *
    Slash,      // /
    Assign,     // =
    StarAssign, // *=
    LParen,     // (
    RParen,     // )
    Colon,      // :

    // Layout
    Newline,
    Tab, // one indentation level at the start of a line

    // Special
    Eof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberKind {
    Decimal, // 42
    Binary,  // 0b1010
}

impl TokenKind {
    /// Spelling used in diagnostics
    pub fn describe(&self) -> &'static str {
        match self {
            TokenKind::Def => "'def'",
            TokenKind::Return => "'return'",
            TokenKind::If => "'if'",
            TokenKind::Else => "'else'",
            TokenKind::Or => "'or'",
            TokenKind::Identifier => "identifier",
            TokenKind::Number(NumberKind::Decimal) => "number",
            TokenKind::Number(NumberKind::Binary) => "binary number",
            TokenKind::String => "string",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Star => "'*'",
            TokenKind::Slash => "'/'",
            TokenKind::Assign => "'='",
            TokenKind::StarAssign => "'*='",
            TokenKind::LParen => "'('",
            TokenKind::RParen => "')'",
            TokenKind::Colon => "':'",
            TokenKind::Newline => "newline",
            TokenKind::Tab => "indentation",
            TokenKind::Eof => "end of file",
        }
    }
}

/// Line and column of a token, both 1-indexed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,                 // 1-indexed
    pub column: usize,               // 1-indexed
    pub string_id: Option<StringId>, // For identifiers, numbers and string literals
}

impl Token {
    pub fn text<'a>(&self, storage: &'a StringStorage) -> Option<&'a str> {
        self.string_id.map(|id| storage.resolve(id))
    }

    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

// Stands in for lookups past the end of an empty token list
static DETACHED_EOF: Token = Token {
    kind: TokenKind::Eof,
    line: 1,
    column: 1,
    string_id: None,
};

#[derive(Debug, Clone)]
pub struct Tokens {
    pub list: Vec<Token>,
    pub string_storage: StringStorage,
}

impl Tokens {
    pub fn new(tokens: Vec<Token>, storage: StringStorage) -> Self {
        Self {
            list: tokens,
            string_storage: storage,
        }
    }

    pub fn peek_kind(&self, index: usize) -> TokenKind {
        match self.list.get(index) {
            Some(token) => token.kind,
            _ => TokenKind::Eof,
        }
    }

    /// Token at `index`; anything past the end is the trailing Eof
    pub fn get(&self, index: usize) -> &Token {
        self.list
            .get(index)
            .or_else(|| self.list.last())
            .unwrap_or(&DETACHED_EOF)
    }

    pub fn text(&self, token: &Token) -> &str {
        token.text(&self.string_storage).unwrap_or("")
    }

    /// Human-readable token description, lexeme included where there is one
    pub fn describe(&self, token: &Token) -> String {
        match token.kind {
            TokenKind::Identifier | TokenKind::Number(_) => {
                format!("{} '{}'", token.kind.describe(), self.text(token))
            }
            TokenKind::String => format!("string \"{}\"", self.text(token)),
            kind => kind.describe().to_string(),
        }
    }

    /// One token per line, used by `snakec tokens`
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for token in &self.list {
            out.push_str(&format!("{:>4}:{:<4} {}\n", token.line, token.column, self.describe(token)));
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct LexError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub pos: usize,
}

impl LexError {
    pub fn position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
        }
    }
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Lexical error at {}:{}: {}",
            self.line, self.column, self.message
        )
    }
}

impl std::error::Error for LexError {}

// Lexer

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    pos: usize,
    line: usize,
    column: usize,
    at_line_start: bool,
    limits: &'a CompilerLimits,
    token_count: usize,
    string_storage: StringStorage,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str, limits: &'a CompilerLimits) -> Result<Self, LexError> {
        if source.len() > limits.max_input_size {
            return Err(LexError {
                message: format!(
                    "Input too large: {} bytes (max: {} bytes)",
                    source.len(),
                    limits.max_input_size
                ),
                line: 1,
                column: 1,
                pos: 0,
            });
        }

        Ok(Self {
            source,
            chars: source.char_indices().peekable(),
            pos: 0,
            line: 1,
            column: 1,
            at_line_start: true,
            limits,
            token_count: 0,
            string_storage: StringStorage::new(),
        })
    }

    // Character navigation methods

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_char2(&mut self) -> Option<char> {
        let mut iter = self.chars.clone();
        iter.next();
        iter.peek().map(|(_, c)| *c)
    }

    fn consume_char(&mut self) -> Option<char> {
        if let Some((pos, ch)) = self.chars.next() {
            self.pos = pos + ch.len_utf8();

            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }

            Some(ch)
        } else {
            None
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == ' ' || c == '\t' || c == '\r' {
                self.consume_char();
            } else {
                break;
            }
        }
    }

    fn consume_while<F>(&mut self, predicate: F) -> bool
    where
        F: Fn(char) -> bool,
    {
        let mut consumed = false;
        while let Some(c) = self.peek_char() {
            if predicate(c) {
                self.consume_char();
                consumed = true;
            } else {
                break;
            }
        }
        consumed
    }

    fn error(&self, message: String) -> LexError {
        LexError {
            message,
            line: self.line,
            column: self.column,
            pos: self.pos,
        }
    }

    fn error_at(&self, message: String, line: usize, column: usize, pos: usize) -> LexError {
        LexError {
            message,
            line,
            column,
            pos,
        }
    }

    // Main tokenization method

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if self.token_count >= self.limits.max_token_count {
            return Err(self.error(format!(
                "Token limit exceeded: {} tokens (max: {})",
                self.token_count, self.limits.max_token_count
            )));
        }

        if self.at_line_start {
            if let Some(tab) = self.lex_indent()? {
                self.token_count += 1;
                return Ok(tab);
            }
        }

        self.skip_whitespace();
        if self.peek_char() == Some('#') {
            self.skip_comment()?;
        }

        let start_line = self.line;
        let start_column = self.column;
        let start_pos = self.pos;

        let (kind, string_id) = match self.peek_char() {
            None => (TokenKind::Eof, None),
            Some('\n') => {
                self.consume_char();
                self.at_line_start = true;
                (TokenKind::Newline, None)
            }
            Some(c) if c.is_ascii_digit() => self.lex_number()?,
            Some(c) if is_ident_start(c) => self.lex_ident_or_keyword()?,
            Some('"') | Some('\'') => self.lex_string()?,
            Some('*') => {
                self.consume_char();
                if self.peek_char() == Some('=') {
                    self.consume_char();
                    (TokenKind::StarAssign, None)
                } else {
                    (TokenKind::Star, None)
                }
            }
            Some(c) => {
                let kind = match c {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '/' => TokenKind::Slash,
                    '=' => TokenKind::Assign,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ':' => TokenKind::Colon,
                    _ => {
                        return Err(self.error_at(
                            format!("Unexpected character: '{}'", c.escape_debug()),
                            start_line,
                            start_column,
                            start_pos,
                        ));
                    }
                };
                self.consume_char();
                (kind, None)
            }
        };

        self.token_count += 1;

        Ok(Token {
            kind,
            line: start_line,
            column: start_column,
            string_id,
        })
    }

    // Indentation handling

    /// Emit one `Tab` per tab character or group of four spaces at the start of a line
    fn lex_indent(&mut self) -> Result<Option<Token>, LexError> {
        let line = self.line;
        let column = self.column;

        match self.peek_char() {
            Some('\t') => {
                self.consume_char();
            }
            Some(' ') => {
                let mut lookahead = self.chars.clone();
                let mut spaces = 0;
                while let Some((_, ' ')) = lookahead.peek() {
                    lookahead.next();
                    spaces += 1;
                }

                if spaces < SPACES_PER_INDENT {
                    let blank = matches!(
                        lookahead.peek().map(|(_, c)| *c),
                        None | Some('\n') | Some('\r') | Some('#')
                    );
                    if !blank {
                        return Err(self.error(format!(
                            "Indentation is not a multiple of {} spaces",
                            SPACES_PER_INDENT
                        )));
                    }
                    self.at_line_start = false;
                    return Ok(None);
                }

                for _ in 0..SPACES_PER_INDENT {
                    self.consume_char();
                }
            }
            _ => {
                self.at_line_start = false;
                return Ok(None);
            }
        }

        Ok(Some(Token {
            kind: TokenKind::Tab,
            line,
            column,
            string_id: None,
        }))
    }

    // Comment handling

    /// Skip a `#` comment up to, not including, the end of line
    fn skip_comment(&mut self) -> Result<(), LexError> {
        let comment_start = self.pos;

        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.consume_char();

            let comment_len = self.pos - comment_start;
            if comment_len > self.limits.max_comment_length {
                return Err(self.error(format!(
                    "Comment too long: {} bytes (max: {} bytes)",
                    comment_len, self.limits.max_comment_length
                )));
            }
        }
        Ok(())
    }

    // Identifier and keyword lexing

    fn lex_ident_or_keyword(&mut self) -> Result<(TokenKind, Option<StringId>), LexError> {
        let (line, column, start) = (self.line, self.column, self.pos);
        self.consume_while(is_ident_continue);

        let text = &self.source[start..self.pos];

        if text.len() > self.limits.max_identifier_length {
            return Err(self.error_at(
                format!(
                    "Identifier too long: {} bytes (max: {} bytes)",
                    text.len(),
                    self.limits.max_identifier_length
                ),
                line,
                column,
                start,
            ));
        }

        let kind = match text {
            "def" => TokenKind::Def,
            "return" => TokenKind::Return,
            "if" => TokenKind::If,
            "else" => TokenKind::Else,
            "or" => TokenKind::Or,
            _ => {
                let string_id = self.string_storage.intern(text);
                return Ok((TokenKind::Identifier, Some(string_id)));
            }
        };

        // Keywords don't get interned
        Ok((kind, None))
    }

    // Number lexing

    fn lex_number(&mut self) -> Result<(TokenKind, Option<StringId>), LexError> {
        let (line, column, start) = (self.line, self.column, self.pos);

        let binary = self.peek_char() == Some('0') && matches!(self.peek_char2(), Some('b' | 'B'));
        let kind = if binary {
            self.consume_char(); // '0'
            self.consume_char(); // 'b' or 'B'
            if !self.consume_while(|c| c == '0' || c == '1') {
                return Err(self.error("Binary number must have at least one digit".into()));
            }
            NumberKind::Binary
        } else {
            self.consume_while(|c| c.is_ascii_digit());
            NumberKind::Decimal
        };

        if let Some(c) = self.peek_char() {
            if is_ident_continue(c) {
                return Err(self.error(format!("Invalid character '{}' in number literal", c)));
            }
        }

        let text = &self.source[start..self.pos];
        if parse_integer(text, kind).is_none() {
            return Err(self.error_at(
                format!("Integer literal '{}' does not fit in 64 bits", text),
                line,
                column,
                start,
            ));
        }

        let string_id = self.string_storage.intern(text);
        Ok((TokenKind::Number(kind), Some(string_id)))
    }

    // String lexing

    /// Strings run to the matching quote; there are no escape sequences
    fn lex_string(&mut self) -> Result<(TokenKind, Option<StringId>), LexError> {
        let (line, column, string_start) = (self.line, self.column, self.pos);
        let Some(quote) = self.consume_char() else {
            return Err(self.error("Expected string literal".into()));
        };
        let content_start = self.pos;

        loop {
            match self.peek_char() {
                None => {
                    return Err(self.error_at(
                        "Unterminated string literal".into(),
                        line,
                        column,
                        string_start,
                    ));
                }
                Some('\n') => {
                    return Err(self.error("Newline in string literal".into()));
                }
                Some(c) if c == quote => {
                    let content_end = self.pos;
                    self.consume_char();

                    let string_len = self.pos - string_start;
                    if string_len > self.limits.max_string_length {
                        return Err(self.error(format!(
                            "String literal too long: {} bytes (max: {} bytes)",
                            string_len, self.limits.max_string_length
                        )));
                    }

                    let content = &self.source[content_start..content_end];
                    let string_id = self.string_storage.intern(content);
                    return Ok((TokenKind::String, Some(string_id)));
                }
                Some(_) => {
                    self.consume_char();
                }
            }
        }
    }
}

// Helper functions

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Value of a number lexeme, `None` when it does not fit in an i64
pub fn parse_integer(text: &str, kind: NumberKind) -> Option<i64> {
    match kind {
        NumberKind::Decimal => text.parse::<i64>().ok(),
        NumberKind::Binary => i64::from_str_radix(text.get(2..)?, 2).ok(),
    }
}

// Public API

pub fn lex(source: &str, limits: &CompilerLimits) -> Result<Tokens, LexError> {
    let mut lexer = Lexer::new(source, limits)?;
    let mut tokens = Vec::new();

    loop {
        let token = lexer.next_token()?;
        let is_eof = token.kind == TokenKind::Eof;
        tokens.push(token);
        if is_eof {
            break;
        }
    }

    Ok(Tokens::new(tokens, lexer.string_storage))
}

// Tests


#[cfg(test)]
mod integration_tests {
    use crate::lexer::{self, LexError, NumberKind, TokenKind, Tokens};
    use crate::limits::CompilerLimits;

    fn lex(source: &str) -> Result<Tokens, LexError> {
        let limits = CompilerLimits::default();
        lexer::lex(source, &limits)
    }

    #[test]
    fn test_function_header() {
        let tokens = lex("def main():\n\treturn 42\n").unwrap();

        assert_eq!(tokens.peek_kind(0), TokenKind::Def);
        assert_eq!(tokens.peek_kind(1), TokenKind::Identifier);
        assert_eq!(tokens.peek_kind(2), TokenKind::LParen);
        assert_eq!(tokens.peek_kind(3), TokenKind::RParen);
        assert_eq!(tokens.peek_kind(4), TokenKind::Colon);
        assert_eq!(tokens.peek_kind(5), TokenKind::Newline);
        assert_eq!(tokens.peek_kind(6), TokenKind::Tab);
        assert_eq!(tokens.peek_kind(7), TokenKind::Return);
        assert_eq!(tokens.peek_kind(8), TokenKind::Number(NumberKind::Decimal));
        assert_eq!(tokens.peek_kind(9), TokenKind::Newline);
        assert_eq!(tokens.peek_kind(10), TokenKind::Eof);
        // Past the end stays at Eof
        assert_eq!(tokens.peek_kind(50), TokenKind::Eof);
        assert_eq!(tokens.get(50).kind, TokenKind::Eof);
    }

    #[test]
    fn test_position_tracking() {
        let tokens = lex("def f():\n\tx = 10\n").unwrap();

        let def = tokens.get(0);
        assert_eq!((def.line, def.column), (1, 1));

        let name = tokens.get(1);
        assert_eq!((name.line, name.column), (1, 5));

        let tab = tokens.get(6);
        assert_eq!(tab.kind, TokenKind::Tab);
        assert_eq!((tab.line, tab.column), (2, 1));

        let x = tokens.get(7);
        assert_eq!((x.line, x.column), (2, 2));

        let ten = tokens.get(9);
        assert_eq!(ten.position().to_string(), "2:6");
    }

    #[test]
    fn test_same_name_same_id() {
        let tokens = lex("x = x").unwrap();
        assert_eq!(tokens.get(0).string_id, tokens.get(2).string_id);
    }

    #[test]
    fn test_describe() {
        let tokens = lex("total 'hi' : 7").unwrap();
        assert_eq!(tokens.describe(tokens.get(0)), "identifier 'total'");
        assert_eq!(tokens.describe(tokens.get(1)), "string \"hi\"");
        assert_eq!(tokens.describe(tokens.get(2)), "':'");
        assert_eq!(tokens.describe(tokens.get(3)), "number '7'");
        assert_eq!(tokens.describe(tokens.get(4)), "end of file");
    }

    #[test]
    fn test_empty_source() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens.list.len(), 1);
        assert_eq!(tokens.peek_kind(0), TokenKind::Eof);
    }

    #[test]
    fn test_blank_lines_keep_their_tabs() {
        let tokens = lex("\t\n\n").unwrap();
        assert_eq!(tokens.peek_kind(0), TokenKind::Tab);
        assert_eq!(tokens.peek_kind(1), TokenKind::Newline);
        assert_eq!(tokens.peek_kind(2), TokenKind::Newline);
        assert_eq!(tokens.peek_kind(3), TokenKind::Eof);
    }
}
