//! Tree-walking evaluator with the semantics of the generated code.
//!
//! Used by `snakec eval` and by the test suite to check program results
//! without an assembler or linker.

use std::collections::HashMap;
use std::fmt;

use crate::ast::{BinaryOp, Block, Expr, Function, Literal, LiteralKind, Stmt, UnaryOp};
use crate::lexer::{NumberKind, Position, parse_integer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    UndefinedVariable { name: String, pos: Position },
    DivisionByZero { pos: Position },
    StringValue { raw: String },
    InvalidLiteral { raw: String },
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::UndefinedVariable { name, pos } => write!(
                f,
                "Undefined variable at {}: '{}' is read before it is assigned",
                pos, name
            ),
            EvalError::DivisionByZero { pos } => write!(f, "Division by zero at {}", pos),
            EvalError::StringValue { raw } => write!(
                f,
                "Invalid operand: string literal \"{}\" cannot be used as a number",
                raw
            ),
            EvalError::InvalidLiteral { raw } => write!(
                f,
                "Invalid literal: integer literal '{}' does not fit in 64 bits",
                raw
            ),
        }
    }
}

impl std::error::Error for EvalError {}

/// Run the function body. `None` means control fell off the end.
pub fn evaluate(function: &Function) -> Result<Option<i64>, EvalError> {
    let mut interpreter = Interpreter::new();
    match interpreter.exec_block(&function.body)? {
        Flow::Return(value) => Ok(Some(value)),
        Flow::Normal => Ok(None),
    }
}

enum Flow {
    Normal,
    Return(i64),
}

pub struct Interpreter {
    variables: HashMap<String, i64>,
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            variables: HashMap::new(),
        }
    }

    pub fn get_variables(&self) -> &HashMap<String, i64> {
        &self.variables
    }

    fn exec_block(&mut self, block: &Block) -> Result<Flow, EvalError> {
        for stmt in &block.statements {
            if let Flow::Return(value) = self.exec_stmt(stmt)? {
                return Ok(Flow::Return(value));
            }
        }
        Ok(Flow::Normal)
    }

    fn exec_stmt(&mut self, stmt: &Stmt) -> Result<Flow, EvalError> {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                let value = self.eval_expr(value)?;
                self.variables.insert(target.clone(), value);
                Ok(Flow::Normal)
            }
            Stmt::Return { value } => Ok(Flow::Return(self.eval_expr(value)?)),
            Stmt::Conditional {
                condition,
                then_block,
                else_block,
            } => {
                let (taken, skipped) = if self.eval_expr(condition)? != 0 {
                    (then_block, else_block)
                } else {
                    (else_block, then_block)
                };
                // The compiled frame holds a zeroed slot for every name the
                // skipped branch assigns
                self.declare_assigned(skipped);
                self.exec_block(taken)
            }
        }
    }

    fn declare_assigned(&mut self, block: &Block) {
        for stmt in &block.statements {
            match stmt {
                Stmt::Assign { target, .. } => {
                    self.variables.entry(target.clone()).or_insert(0);
                }
                Stmt::Return { .. } => {}
                Stmt::Conditional {
                    then_block,
                    else_block,
                    ..
                } => {
                    self.declare_assigned(then_block);
                    self.declare_assigned(else_block);
                }
            }
        }
    }

    fn eval_expr(&mut self, expr: &Expr) -> Result<i64, EvalError> {
        match expr {
            Expr::Literal(literal) => literal_value(literal),
            Expr::Identifier { name, pos } => {
                self.variables
                    .get(name)
                    .copied()
                    .ok_or_else(|| EvalError::UndefinedVariable {
                        name: name.clone(),
                        pos: *pos,
                    })
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => Ok(self.eval_expr(operand)?.wrapping_neg()),
            Expr::Binary { op, lhs, rhs, pos } => {
                let lhs = self.eval_expr(lhs)?;
                let rhs = self.eval_expr(rhs)?;
                match op {
                    BinaryOp::Add => Ok(lhs.wrapping_add(rhs)),
                    BinaryOp::Sub => Ok(lhs.wrapping_sub(rhs)),
                    BinaryOp::Mul => Ok(lhs.wrapping_mul(rhs)),
                    BinaryOp::Div => {
                        if rhs == 0 {
                            Err(EvalError::DivisionByZero { pos: *pos })
                        } else {
                            Ok(lhs.wrapping_div(rhs))
                        }
                    }
                    BinaryOp::Or => Ok(i64::from(lhs != 0 || rhs != 0)),
                }
            }
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

fn literal_value(literal: &Literal) -> Result<i64, EvalError> {
    let number_kind = match literal.kind {
        LiteralKind::Decimal => NumberKind::Decimal,
        LiteralKind::Binary => NumberKind::Binary,
        LiteralKind::String => {
            return Err(EvalError::StringValue {
                raw: literal.raw.clone(),
            });
        }
    };
    parse_integer(&literal.raw, number_kind).ok_or_else(|| EvalError::InvalidLiteral {
        raw: literal.raw.clone(),
    })
}
