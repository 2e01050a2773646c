use super::helpers::{PREC_ADDITIVE, PREC_MULTIPLICATIVE, PREC_OR, get_precedence};
use super::{ParseError, Parser};
use crate::ast::{BinaryOp, Expr, LiteralKind};
use crate::lexer::{NumberKind, Position, TokenKind};

// Expression rules, lowest precedence first. `depth` counts recursion
// through parentheses and unary minus, checked against max_expr_depth.
impl<'a> Parser<'a> {
    /// expr := or_expr
    pub(super) fn parse_expression(&mut self, depth: usize) -> Result<Expr, ParseError> {
        self.check_depth(depth)?;
        self.parse_or(depth)
    }

    /// Binary operator at the cursor if it belongs to precedence `level`
    fn binary_op_at(&self, level: u8) -> Option<(BinaryOp, Position)> {
        match get_precedence(&self.peek_kind()) {
            Some((op, prec)) if prec == level => Some((op, self.current_token().position())),
            _ => None,
        }
    }

    /// or_expr := additive ("or" additive)*
    fn parse_or(&mut self, depth: usize) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_additive(depth)?;
        while let Some((op, pos)) = self.binary_op_at(PREC_OR) {
            self.advance();
            let rhs = self.parse_additive(depth)?;
            lhs = self.node(Expr::binary(op, lhs, rhs, pos))?;
        }
        Ok(lhs)
    }

    /// additive := multiplicative (("+" | "-") multiplicative)*
    fn parse_additive(&mut self, depth: usize) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_multiplicative(depth)?;
        while let Some((op, pos)) = self.binary_op_at(PREC_ADDITIVE) {
            self.advance();
            let rhs = self.parse_multiplicative(depth)?;
            lhs = self.node(Expr::binary(op, lhs, rhs, pos))?;
        }
        Ok(lhs)
    }

    /// multiplicative := atom (("*" | "/") atom)*
    fn parse_multiplicative(&mut self, depth: usize) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_atom(depth)?;
        while let Some((op, pos)) = self.binary_op_at(PREC_MULTIPLICATIVE) {
            self.advance();
            let rhs = self.parse_atom(depth)?;
            lhs = self.node(Expr::binary(op, lhs, rhs, pos))?;
        }
        Ok(lhs)
    }

    /// atom := "(" expr ")" | "-" atom | DECIMAL | BINARY | STRING | ID
    fn parse_atom(&mut self, depth: usize) -> Result<Expr, ParseError> {
        self.check_depth(depth)?;

        let token = self.current_token().clone();
        let expr = match token.kind {
            TokenKind::LParen => {
                self.advance();
                let inner = self.parse_expression(depth + 1)?;
                self.consume(TokenKind::RParen, "')'")?;
                return Ok(inner);
            }
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_atom(depth + 1)?;
                Expr::negate(operand)
            }
            TokenKind::Number(kind) => {
                self.advance();
                let literal_kind = match kind {
                    NumberKind::Decimal => LiteralKind::Decimal,
                    NumberKind::Binary => LiteralKind::Binary,
                };
                Expr::literal(literal_kind, self.text_of(&token))
            }
            TokenKind::String => {
                self.advance();
                Expr::literal(LiteralKind::String, self.text_of(&token))
            }
            TokenKind::Identifier => {
                self.advance();
                Expr::identifier(self.text_of(&token), token.position())
            }
            _ => return Err(self.new_unexpected_token("expression")),
        };

        self.node(expr)
    }
}
