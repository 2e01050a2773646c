// Compiler safety limits
//
// Guards every stage against pathological input:
// - oversized sources and token streams in the lexer
// - runaway expression recursion and block nesting in the parser
// - unbounded tree growth while building the AST
//
// Defaults are permissive; a project.toml `[limits]` table overrides them.

use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Compiler safety limits with permissive defaults
#[derive(Debug, Clone, PartialEq)]
pub struct CompilerLimits {
    // Lexer limits
    pub max_input_size: usize,        // Maximum source size in bytes
    pub max_token_count: usize,       // Maximum number of tokens, Eof included
    pub max_identifier_length: usize, // Maximum identifier length in bytes
    pub max_string_length: usize,     // Maximum string literal length in bytes
    pub max_comment_length: usize,    // Maximum `#` comment length in bytes

    // Parser limits
    pub max_expr_depth: usize,  // Maximum expression recursion depth
    pub max_block_depth: usize, // Maximum indentation depth of a block

    // AST limits
    pub max_ast_nodes: usize,
}

impl Default for CompilerLimits {
    fn default() -> Self {
        Self {
            max_input_size: 10_000_000,    // 10 MB
            max_token_count: 100_000,      // 100k tokens
            max_identifier_length: 1_000,  // 1k bytes
            max_string_length: 10_000_000, // 10 MB
            max_comment_length: 100_000,   // 100k bytes
            max_expr_depth: 256,
            max_block_depth: 64,
            max_ast_nodes: 1_000_000,
        }
    }
}

impl CompilerLimits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load limits from project.toml, falling back to defaults
    ///
    /// Returns error only if TOML is malformed, not if file is missing
    pub fn from_project_toml<P: AsRef<Path>>(path: P) -> Result<Self, LimitError> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| LimitError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        Self::from_toml_str(&content).map_err(|e| LimitError {
            message: format!("Failed to parse {}: {}", path.display(), e.message),
        })
    }

    /// Parse a project.toml document; keys absent from `[limits]` keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, LimitError> {
        let config: ProjectConfig = toml::from_str(content).map_err(|e| LimitError {
            message: e.to_string(),
        })?;

        let mut limits = Self::default();

        if let Some(overrides) = config.limits {
            let LimitsConfig {
                max_input_size,
                max_token_count,
                max_identifier_length,
                max_string_length,
                max_comment_length,
                max_expr_depth,
                max_block_depth,
                max_ast_nodes,
            } = overrides;

            limits.max_input_size = max_input_size.unwrap_or(limits.max_input_size);
            limits.max_token_count = max_token_count.unwrap_or(limits.max_token_count);
            limits.max_identifier_length =
                max_identifier_length.unwrap_or(limits.max_identifier_length);
            limits.max_string_length = max_string_length.unwrap_or(limits.max_string_length);
            limits.max_comment_length = max_comment_length.unwrap_or(limits.max_comment_length);
            limits.max_expr_depth = max_expr_depth.unwrap_or(limits.max_expr_depth);
            limits.max_block_depth = max_block_depth.unwrap_or(limits.max_block_depth);
            limits.max_ast_nodes = max_ast_nodes.unwrap_or(limits.max_ast_nodes);
        }

        Ok(limits)
    }

    /// Validate that all limits are reasonable (positive, not absurdly large)
    pub fn validate(&self) -> Result<(), LimitError> {
        const MAX_REASONABLE: usize = 100_000_000; // 100 MB

        let checks = [
            ("max_input_size", self.max_input_size, MAX_REASONABLE),
            ("max_token_count", self.max_token_count, usize::MAX),
            ("max_identifier_length", self.max_identifier_length, 100_000),
            ("max_string_length", self.max_string_length, MAX_REASONABLE),
            ("max_comment_length", self.max_comment_length, MAX_REASONABLE),
            ("max_expr_depth", self.max_expr_depth, 10_000),
            ("max_block_depth", self.max_block_depth, 1_000),
            ("max_ast_nodes", self.max_ast_nodes, 10_000_000),
        ];

        for (name, value, max) in checks {
            if value == 0 || value > max {
                return Err(LimitError::invalid(name, value));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct ProjectConfig {
    limits: Option<LimitsConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LimitsConfig {
    max_input_size: Option<usize>,
    max_token_count: Option<usize>,
    max_identifier_length: Option<usize>,
    max_string_length: Option<usize>,
    max_comment_length: Option<usize>,
    max_expr_depth: Option<usize>,
    max_block_depth: Option<usize>,
    max_ast_nodes: Option<usize>,
}

/// Error type for limit validation and loading
#[derive(Debug, Clone)]
pub struct LimitError {
    pub message: String,
}

impl LimitError {
    fn invalid(name: &str, value: usize) -> Self {
        Self {
            message: format!(
                "Invalid limit '{}': {} (must be positive and reasonable)",
                name, value
            ),
        }
    }
}

impl std::fmt::Display for LimitError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Limit error: {}", self.message)
    }
}

impl std::error::Error for LimitError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits_are_reasonable() {
        let limits = CompilerLimits::default();
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_default_values() {
        let limits = CompilerLimits::default();
        assert_eq!(limits.max_input_size, 10_000_000);
        assert_eq!(limits.max_token_count, 100_000);
        assert_eq!(limits.max_identifier_length, 1_000);
        assert_eq!(limits.max_string_length, 10_000_000);
        assert_eq!(limits.max_comment_length, 100_000);
        assert_eq!(limits.max_expr_depth, 256);
        assert_eq!(limits.max_block_depth, 64);
        assert_eq!(limits.max_ast_nodes, 1_000_000);
    }

    #[test]
    fn test_validation_catches_zero_values() {
        let mut limits = CompilerLimits::default();
        limits.max_input_size = 0;
        assert!(limits.validate().is_err());

        limits = CompilerLimits::default();
        limits.max_token_count = 0;
        assert!(limits.validate().is_err());

        limits = CompilerLimits::default();
        limits.max_block_depth = 0;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_validation_catches_too_large_values() {
        let mut limits = CompilerLimits::default();
        limits.max_input_size = 200_000_000;
        assert!(limits.validate().is_err());

        limits = CompilerLimits::default();
        limits.max_expr_depth = 20_000;
        assert!(limits.validate().is_err());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let limits = CompilerLimits::from_project_toml(dir.path().join("project.toml")).unwrap();
        assert_eq!(limits, CompilerLimits::default());
    }

    #[test]
    fn test_partial_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.toml");
        fs::write(
            &path,
            r#"
[limits]
max_input_size = 2000000
max_block_depth = 8
"#,
        )
        .unwrap();

        let limits = CompilerLimits::from_project_toml(&path).unwrap();
        assert_eq!(limits.max_input_size, 2_000_000); // Overridden
        assert_eq!(limits.max_block_depth, 8); // Overridden
        assert_eq!(limits.max_token_count, 100_000); // Default
        assert_eq!(limits.max_expr_depth, 256); // Default
    }

    #[test]
    fn test_file_without_limits_table_uses_defaults() {
        let limits = CompilerLimits::from_toml_str("[package]\nname = \"demo\"\n").unwrap();
        assert_eq!(limits, CompilerLimits::default());
    }

    #[test]
    fn test_malformed_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("project.toml");
        fs::write(&path, "this is not valid toml {{{").unwrap();

        let err = CompilerLimits::from_project_toml(&path).unwrap_err();
        assert!(err.message.starts_with("Failed to parse"));
    }

    #[test]
    fn test_unknown_limit_is_rejected() {
        assert!(CompilerLimits::from_toml_str("[limits]\nmax_loops = 3\n").is_err());
    }
}
