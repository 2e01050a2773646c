//! Crate root: wires together the compilation pipeline.
//!
//! - `lexer` turns source text into tokens, keeping newlines and leading tabs.
//! - `parser` builds the single-function AST from the token stream.
//! - `codegen` lowers the AST into assembly or LLVM IR text.
//! - `eval` runs the AST directly with the same semantics.
//! - `limits` and `error` are shared by every stage.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod eval;
pub mod lexer;
pub mod limits;
pub mod parser;
pub mod string_storage;

use std::fs;
use std::path::Path;

use snafu::ResultExt;

pub use codegen::Backend;
pub use error::{CompileError, CompileResult};
pub use limits::CompilerLimits;

use error::IoSnafu;

/// Load limits from a project file and check they are usable
pub fn load_limits(path: &Path) -> CompileResult<CompilerLimits> {
    let limits = CompilerLimits::from_project_toml(path)?;
    limits.validate()?;
    Ok(limits)
}

/// Compile a source string into target code text
pub fn compile(source: &str, limits: &CompilerLimits, backend: Backend) -> CompileResult<String> {
    let tokens = lexer::lex(source, limits)?;
    let function = parser::parse(&tokens, limits)?;
    Ok(codegen::generate(&function, backend)?)
}

/// Compile and write the result to `path`; nothing is written on failure
pub fn compile_to_file(
    source: &str,
    limits: &CompilerLimits,
    backend: Backend,
    path: &Path,
) -> CompileResult<()> {
    let code = compile(source, limits, backend)?;
    fs::write(path, code).context(IoSnafu { path })
}

/// Run a source string through the reference evaluator. Programs that
/// `compile` rejects are rejected here too, before anything runs.
pub fn evaluate(source: &str, limits: &CompilerLimits) -> CompileResult<Option<i64>> {
    let tokens = lexer::lex(source, limits)?;
    let function = parser::parse(&tokens, limits)?;
    codegen::check(&function)?;
    Ok(eval::evaluate(&function)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROGRAM: &str = "def f():\n\tx = 5\n\tx *= 3\n\treturn x\n";

    #[test]
    fn test_compile_and_evaluate_agree_on_success() {
        let limits = CompilerLimits::default();
        assert!(compile(PROGRAM, &limits, Backend::X86_64).is_ok());
        assert_eq!(evaluate(PROGRAM, &limits).unwrap(), Some(15));
    }

    #[test]
    fn test_evaluate_rejects_what_compile_rejects() {
        let limits = CompilerLimits::default();
        let dead_branches = [
            "def f():\n\tif 1:\n\t\treturn 1\n\telse:\n\t\treturn y\n",
            "def f():\n\tif 1:\n\t\treturn 1\n\telse:\n\t\treturn 1 / 0\n",
        ];
        for source in dead_branches {
            let compiled = compile(source, &limits, Backend::X86_64).unwrap_err();
            let evaluated = evaluate(source, &limits).unwrap_err();
            assert_eq!(evaluated.kind(), "codegen");
            assert_eq!(evaluated.to_string(), compiled.to_string());
        }
    }

    #[test]
    fn test_runtime_errors_come_from_the_evaluator() {
        let limits = CompilerLimits::default();
        let source = "def f():\n\td = 0\n\treturn 10 / d\n";
        assert!(compile(source, &limits, Backend::X86_64).is_ok());
        assert_eq!(evaluate(source, &limits).unwrap_err().kind(), "eval");
    }

    #[test]
    fn test_error_stages() {
        let limits = CompilerLimits::default();
        let cases = [
            ("def f():\n\treturn @\n", "lex"),
            ("def f()\n\treturn 1\n", "parse"),
            ("def f():\n\treturn y\n", "codegen"),
        ];
        for (source, kind) in cases {
            let err = compile(source, &limits, Backend::X86_64).unwrap_err();
            assert_eq!(err.kind(), kind, "{}", source);
        }
    }

    #[test]
    fn test_compile_to_file_writes_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.s");
        compile_to_file(PROGRAM, &CompilerLimits::default(), Backend::X86_64, &path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("main:"));
    }

    #[test]
    fn test_compile_to_file_leaves_no_artifact_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.s");
        let err = compile_to_file(
            "def f():\n\treturn 1 / 0\n",
            &CompilerLimits::default(),
            Backend::X86_64,
            &path,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "codegen");
        assert!(!path.exists());
    }

    #[test]
    fn test_load_limits_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.toml");

        assert_eq!(load_limits(&path).unwrap(), CompilerLimits::default());

        fs::write(&path, "[limits]\nmax_expr_depth = 0\n").unwrap();
        let err = load_limits(&path).unwrap_err();
        assert_eq!(err.kind(), "limits");
    }

    #[test]
    fn test_compile_to_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.s");
        let err = compile_to_file(PROGRAM, &CompilerLimits::default(), Backend::X86_64, &path)
            .unwrap_err();
        assert_eq!(err.kind(), "io");
    }
}
