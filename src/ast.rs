use std::fmt;

use crate::lexer::Position;

// Syntax tree: every node is owned by its parent, the Function is the root

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    Decimal,
    Binary,
    String,
}

/// Literal with its raw lexeme (string content excludes the quotes)
#[derive(Debug, Clone, PartialEq)]
pub struct Literal {
    pub kind: LiteralKind,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Or,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Or => "or",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Identifier {
        name: String,
        pos: Position,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// `pos` is the position of the operator token
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
        pos: Position,
    },
}

impl Expr {
    pub fn literal(kind: LiteralKind, raw: impl Into<String>) -> Self {
        Self::Literal(Literal {
            kind,
            raw: raw.into(),
        })
    }

    pub fn identifier(name: impl Into<String>, pos: Position) -> Self {
        Self::Identifier {
            name: name.into(),
            pos,
        }
    }

    pub fn negate(operand: Expr) -> Self {
        Self::Unary {
            op: UnaryOp::Neg,
            operand: Box::new(operand),
        }
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr, pos: Position) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
            pos,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Both `=` and `*=`; the parser rewrites `x *= e` to `x = x * e`
    Assign {
        target: String,
        pos: Position,
        value: Expr,
    },
    Return {
        value: Expr,
    },
    Conditional {
        condition: Expr,
        then_block: Block,
        else_block: Block,
    },
}

/// Statements of one indentation level, in execution order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub body: Block,
}

// Tree dump, one node per line, two spaces per level

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Function '{}'", self.name)?;
        write_block(f, &self.body, 1)
    }
}

fn write_block(f: &mut fmt::Formatter, block: &Block, level: usize) -> fmt::Result {
    writeln!(f, "{}Block", "  ".repeat(level))?;
    for stmt in &block.statements {
        write_stmt(f, stmt, level + 1)?;
    }
    Ok(())
}

fn write_stmt(f: &mut fmt::Formatter, stmt: &Stmt, level: usize) -> fmt::Result {
    let indent = "  ".repeat(level);
    match stmt {
        Stmt::Assign { target, value, .. } => {
            writeln!(f, "{}Assign '{}'", indent, target)?;
            write_expr(f, value, level + 1)
        }
        Stmt::Return { value } => {
            writeln!(f, "{}Return", indent)?;
            write_expr(f, value, level + 1)
        }
        Stmt::Conditional {
            condition,
            then_block,
            else_block,
        } => {
            writeln!(f, "{}Conditional", indent)?;
            write_expr(f, condition, level + 1)?;
            write_block(f, then_block, level + 1)?;
            write_block(f, else_block, level + 1)
        }
    }
}

fn write_expr(f: &mut fmt::Formatter, expr: &Expr, level: usize) -> fmt::Result {
    let indent = "  ".repeat(level);
    match expr {
        Expr::Literal(Literal { kind, raw }) => {
            let node = match kind {
                LiteralKind::Decimal => "LiteralDecimal",
                LiteralKind::Binary => "LiteralBinary",
                LiteralKind::String => "LiteralString",
            };
            writeln!(f, "{}{} '{}'", indent, node, raw)
        }
        Expr::Identifier { name, .. } => writeln!(f, "{}Identifier '{}'", indent, name),
        Expr::Unary { op: UnaryOp::Neg, operand } => {
            writeln!(f, "{}Negate", indent)?;
            write_expr(f, operand, level + 1)
        }
        Expr::Binary { op, lhs, rhs, .. } => {
            writeln!(f, "{}BinaryOp '{}'", indent, op.symbol())?;
            write_expr(f, lhs, level + 1)?;
            write_expr(f, rhs, level + 1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(line: usize, column: usize) -> Position {
        Position { line, column }
    }

    #[test]
    fn test_tree_dump() {
        let function = Function {
            name: "f".to_string(),
            body: Block {
                statements: vec![
                    Stmt::Assign {
                        target: "x".to_string(),
                        pos: at(2, 2),
                        value: Expr::negate(Expr::literal(LiteralKind::Binary, "0b11")),
                    },
                    Stmt::Conditional {
                        condition: Expr::identifier("x", at(3, 5)),
                        then_block: Block {
                            statements: vec![Stmt::Return {
                                value: Expr::binary(
                                    BinaryOp::Or,
                                    Expr::identifier("x", at(4, 10)),
                                    Expr::literal(LiteralKind::Decimal, "1"),
                                    at(4, 12),
                                ),
                            }],
                        },
                        else_block: Block {
                            statements: vec![Stmt::Return {
                                value: Expr::literal(LiteralKind::String, "no"),
                            }],
                        },
                    },
                ],
            },
        };

        let expected = "\
Function 'f'
  Block
    Assign 'x'
      Negate
        LiteralBinary '0b11'
    Conditional
      Identifier 'x'
      Block
        Return
          BinaryOp 'or'
            Identifier 'x'
            LiteralDecimal '1'
      Block
        Return
          LiteralString 'no'
";
        assert_eq!(function.to_string(), expected);
    }

    #[test]
    fn test_binary_op_symbols() {
        assert_eq!(BinaryOp::Add.symbol(), "+");
        assert_eq!(BinaryOp::Sub.symbol(), "-");
        assert_eq!(BinaryOp::Mul.symbol(), "*");
        assert_eq!(BinaryOp::Div.symbol(), "/");
        assert_eq!(BinaryOp::Or.symbol(), "or");
    }
}
