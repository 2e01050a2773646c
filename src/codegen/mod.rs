//! Lowering of the syntax tree into target code text.
//!
//! Both backends share the rules in this module: one flat slot map for the
//! whole function, labels from a counter owned by the generator, and the
//! constant-divisor check that rejects `x / 0` before anything is emitted.

#[cfg(feature = "llvm")]
mod llvm;
mod x86_64;

use std::collections::HashMap;
use std::fmt;

use crate::ast::{BinaryOp, Block, Expr, Function, Literal, LiteralKind, Stmt, UnaryOp};
use crate::lexer::{NumberKind, Position, parse_integer};

/// Target code flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// GNU assembler, AT&T syntax, x86-64 System V
    #[default]
    X86_64,
    /// Textual LLVM IR (requires the `llvm` feature)
    Llvm,
}

impl Backend {
    /// File extension of the emitted translation unit
    pub fn extension(&self) -> &'static str {
        match self {
            Backend::X86_64 => "s",
            Backend::Llvm => "ll",
        }
    }
}

/// Lower a parsed function into one self-contained translation unit
pub fn generate(function: &Function, backend: Backend) -> Result<String, CodegenError> {
    match backend {
        Backend::X86_64 => x86_64::generate(function),
        #[cfg(feature = "llvm")]
        Backend::Llvm => llvm::generate(function),
        #[cfg(not(feature = "llvm"))]
        Backend::Llvm => Err(CodegenError::new(
            CodegenErrorKind::UnsupportedBackend,
            "the LLVM backend requires building with the `llvm` feature".to_string(),
            None,
        )),
    }
}

/// Run every lowering-time check without emitting code. Fails exactly where
/// `generate` would, in the same order.
pub fn check(function: &Function) -> Result<(), CodegenError> {
    let mut slots = Slots::default();
    check_block(&function.body, &mut slots)
}

fn check_block(block: &Block, slots: &mut Slots) -> Result<(), CodegenError> {
    for stmt in &block.statements {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                check_expr(value, slots)?;
                slots.assign(target);
            }
            Stmt::Return { value } => check_expr(value, slots)?,
            Stmt::Conditional {
                condition,
                then_block,
                else_block,
            } => {
                check_expr(condition, slots)?;
                check_block(then_block, slots)?;
                check_block(else_block, slots)?;
            }
        }
    }
    Ok(())
}

fn check_expr(expr: &Expr, slots: &Slots) -> Result<(), CodegenError> {
    match expr {
        Expr::Literal(literal) => literal_value(literal).map(|_| ()),
        Expr::Identifier { name, pos } => slots.lookup(name, *pos).map(|_| ()),
        Expr::Unary { operand, .. } => check_expr(operand, slots),
        Expr::Binary { op, lhs, rhs, pos } => {
            if *op == BinaryOp::Div {
                check_divisor(rhs, *pos)?;
            }
            check_expr(lhs, slots)?;
            check_expr(rhs, slots)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodegenErrorKind {
    /// Read of a name before its first assignment in lowering order
    UndefinedVariable,
    /// Division by a constant expression equal to zero
    DivisionByZero,
    /// String literal used where an integer is required
    StringValue,
    /// Numeric literal outside the 64-bit range
    InvalidLiteral,
    UnsupportedBackend,
    /// Internal failure reported by a backend library
    Backend,
}

#[derive(Debug, Clone)]
pub struct CodegenError {
    pub kind: CodegenErrorKind,
    pub message: String,
    pub position: Option<Position>,
}

impl CodegenError {
    pub fn new(kind: CodegenErrorKind, message: String, position: Option<Position>) -> Self {
        Self {
            kind,
            message,
            position,
        }
    }
}

impl fmt::Display for CodegenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let label = match self.kind {
            CodegenErrorKind::UndefinedVariable => "Undefined variable",
            CodegenErrorKind::DivisionByZero => "Division by zero",
            CodegenErrorKind::StringValue => "Invalid operand",
            CodegenErrorKind::InvalidLiteral => "Invalid literal",
            CodegenErrorKind::UnsupportedBackend => "Unsupported backend",
            CodegenErrorKind::Backend => "Backend error",
        };
        match self.position {
            Some(pos) => write!(f, "{} at {}: {}", label, pos, self.message),
            None => write!(f, "{}: {}", label, self.message),
        }
    }
}

impl std::error::Error for CodegenError {}

/// Flat name -> slot map for the single function scope.
/// The first assignment of a name allocates its slot; later ones reuse it.
#[derive(Debug, Default)]
pub(crate) struct Slots {
    slots: HashMap<String, usize>,
}

impl Slots {
    pub(crate) fn lookup(&self, name: &str, pos: Position) -> Result<usize, CodegenError> {
        self.slots.get(name).copied().ok_or_else(|| {
            CodegenError::new(
                CodegenErrorKind::UndefinedVariable,
                format!("'{}' is read before it is assigned", name),
                Some(pos),
            )
        })
    }

    /// Slot for an assignment target, allocating on first sight
    pub(crate) fn assign(&mut self, name: &str) -> usize {
        let next = self.slots.len();
        *self.slots.entry(name.to_string()).or_insert(next)
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

/// Unique label source, one per generator instance
#[derive(Debug, Default)]
pub(crate) struct LabelGen {
    n: usize,
}

impl LabelGen {
    /// Fresh (else, end) label pair for one conditional
    pub(crate) fn branch_pair(&mut self) -> (String, String) {
        let id = self.n;
        self.n += 1;
        (format!(".L.else.{}", id), format!(".L.end.{}", id))
    }

    /// Fresh (negate, end) label pair for a division by -1 at run time
    pub(crate) fn division_pair(&mut self) -> (String, String) {
        let id = self.n;
        self.n += 1;
        (format!(".L.div_neg.{}", id), format!(".L.div_end.{}", id))
    }
}

/// Integer value of a literal; strings have none
pub(crate) fn literal_value(literal: &Literal) -> Result<i64, CodegenError> {
    let number_kind = match literal.kind {
        LiteralKind::Decimal => NumberKind::Decimal,
        LiteralKind::Binary => NumberKind::Binary,
        LiteralKind::String => {
            return Err(CodegenError::new(
                CodegenErrorKind::StringValue,
                format!("string literal \"{}\" cannot be used as a number", literal.raw),
                None,
            ));
        }
    };

    parse_integer(&literal.raw, number_kind).ok_or_else(|| {
        CodegenError::new(
            CodegenErrorKind::InvalidLiteral,
            format!("integer literal '{}' does not fit in 64 bits", literal.raw),
            None,
        )
    })
}

/// Value of an expression built only from numeric literals, if it has one.
/// A nested division by zero or a string makes the expression non-constant.
pub(crate) fn constant_value(expr: &Expr) -> Option<i64> {
    match expr {
        Expr::Literal(literal) => literal_value(literal).ok(),
        Expr::Identifier { .. } => None,
        Expr::Unary {
            op: UnaryOp::Neg,
            operand,
        } => constant_value(operand).map(i64::wrapping_neg),
        Expr::Binary { op, lhs, rhs, .. } => {
            let lhs = constant_value(lhs)?;
            let rhs = constant_value(rhs)?;
            match op {
                BinaryOp::Add => Some(lhs.wrapping_add(rhs)),
                BinaryOp::Sub => Some(lhs.wrapping_sub(rhs)),
                BinaryOp::Mul => Some(lhs.wrapping_mul(rhs)),
                BinaryOp::Div => lhs.checked_div(rhs),
                BinaryOp::Or => Some(i64::from(lhs != 0 || rhs != 0)),
            }
        }
    }
}

/// Reject a divisor that is constantly zero
pub(crate) fn check_divisor(divisor: &Expr, pos: Position) -> Result<Option<i64>, CodegenError> {
    match constant_value(divisor) {
        Some(0) => Err(CodegenError::new(
            CodegenErrorKind::DivisionByZero,
            "divisor is always zero".to_string(),
            Some(pos),
        )),
        value => Ok(value),
    }
}
