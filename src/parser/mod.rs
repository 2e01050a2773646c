// Parser module - recursive descent, one method per grammar production.
//
// Block structure is recovered from raw Tab/Newline tokens: every block and
// statement rule takes the nesting `depth` as a parameter instead of relying
// on INDENT/DEDENT tokens.
mod error;
mod expressions;
mod helpers;
mod statements;

pub use error::{ParseError, ParseErrorKind};

use crate::ast::Function;
use crate::lexer::Tokens;
use crate::limits::CompilerLimits;

// Parser structure
pub struct Parser<'a> {
    tokens: &'a Tokens,
    current: usize,
    limits: &'a CompilerLimits,
    node_count: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a Tokens, limits: &'a CompilerLimits) -> Self {
        Self {
            tokens,
            current: 0,
            limits,
            node_count: 0,
        }
    }

    // Main parsing entry point
    pub fn parse(mut self) -> Result<Function, ParseError> {
        self.parse_program()
    }
}

// Public API function
pub fn parse(tokens: &Tokens, limits: &CompilerLimits) -> Result<Function, ParseError> {
    Parser::new(tokens, limits).parse()
}
