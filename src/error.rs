//! Aggregate error for the whole pipeline.
//!
//! Each stage keeps its own error type; `?` lifts any of them into
//! `CompileError` so callers deal with a single type.

use std::path::PathBuf;

use snafu::Snafu;

use crate::codegen::CodegenError;
use crate::eval::EvalError;
use crate::lexer::LexError;
use crate::limits::LimitError;
use crate::parser::ParseError;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum CompileError {
    #[snafu(context(false), display("{source}"))]
    Limits { source: LimitError },

    #[snafu(context(false), display("{source}"))]
    Lex { source: LexError },

    #[snafu(context(false), display("{source}"))]
    Parse { source: ParseError },

    #[snafu(context(false), display("{source}"))]
    Codegen { source: CodegenError },

    #[snafu(context(false), display("{source}"))]
    Eval { source: EvalError },

    #[snafu(display("I/O error on {}: {source}", path.display()))]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
}

impl CompileError {
    /// Stage that produced the error
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Limits { .. } => "limits",
            CompileError::Lex { .. } => "lex",
            CompileError::Parse { .. } => "parse",
            CompileError::Codegen { .. } => "codegen",
            CompileError::Eval { .. } => "eval",
            CompileError::Io { .. } => "io",
        }
    }
}
