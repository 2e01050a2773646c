use super::{ParseError, Parser};
use crate::ast::{BinaryOp, Block, Expr, Function, Stmt};
use crate::lexer::TokenKind;

// Statement-level rules; each takes the block nesting depth it sits at
impl<'a> Parser<'a> {
    /// program := blank* function blank*
    pub(super) fn parse_program(&mut self) -> Result<Function, ParseError> {
        self.skip_blank_lines();
        let function = self.parse_function(0)?;

        self.skip_blank_lines();
        if !self.at_eof() {
            return Err(self.new_unexpected_token("end of input"));
        }
        Ok(function)
    }

    /// function := "def" ID "(" ")" ":" NEWLINE block(depth + 1)
    fn parse_function(&mut self, depth: usize) -> Result<Function, ParseError> {
        self.check_indent(depth)?;
        self.consume(TokenKind::Def, "'def'")?;
        let name_token = self.consume(TokenKind::Identifier, "function name")?;
        let name = self.text_of(&name_token);
        self.consume(TokenKind::LParen, "'('")?;
        self.consume(TokenKind::RParen, "')'")?;
        self.consume(TokenKind::Colon, "':'")?;
        self.consume(TokenKind::Newline, "newline")?;

        let body = self.parse_block(depth + 1)?;
        self.node(Function { name, body })
    }

    /// Statements indented by exactly `depth` tabs, up to the first line
    /// indented less deeply or the end of input
    pub(super) fn parse_block(&mut self, depth: usize) -> Result<Block, ParseError> {
        self.check_block_depth(depth)?;
        self.skip_blank_lines();

        let mut statements = Vec::new();
        loop {
            self.check_indent(depth)?;
            statements.push(self.parse_statement(depth)?);

            if self.end_of_block(depth) {
                break;
            }
            self.skip_blank_lines();
        }

        self.node(Block { statements })
    }

    /// statement := assignment | "return" expr | conditional
    fn parse_statement(&mut self, depth: usize) -> Result<Stmt, ParseError> {
        match self.peek_kind() {
            TokenKind::Return => {
                self.advance();
                let value = self.parse_expression(0)?;
                self.end_statement()?;
                self.node(Stmt::Return { value })
            }
            TokenKind::If => self.parse_conditional(depth),
            TokenKind::Identifier => {
                let stmt = self.parse_assignment()?;
                self.end_statement()?;
                Ok(stmt)
            }
            _ => Err(self.new_unexpected_token("statement")),
        }
    }

    /// assignment := ID ("=" | "*=") expr
    fn parse_assignment(&mut self) -> Result<Stmt, ParseError> {
        let target_token = self.consume(TokenKind::Identifier, "identifier")?;
        let target = self.text_of(&target_token);
        let pos = target_token.position();

        let value = match self.peek_kind() {
            TokenKind::Assign => {
                self.advance();
                self.parse_expression(0)?
            }
            TokenKind::StarAssign => {
                // x *= e  ==>  x = x * e
                let op_pos = self.current_token().position();
                self.advance();
                let rhs = self.parse_expression(0)?;
                let current = self.node(Expr::identifier(target.clone(), pos))?;
                self.node(Expr::binary(BinaryOp::Mul, current, rhs, op_pos))?
            }
            _ => return Err(self.new_unexpected_token("'=' or '*='")),
        };

        self.node(Stmt::Assign { target, pos, value })
    }

    /// conditional := "if" expr ":" NEWLINE block(depth + 1)
    ///                INDENT(depth) "else" ":" NEWLINE block(depth + 1)
    fn parse_conditional(&mut self, depth: usize) -> Result<Stmt, ParseError> {
        self.consume(TokenKind::If, "'if'")?;
        let condition = self.parse_expression(0)?;
        self.consume(TokenKind::Colon, "':'")?;
        self.consume(TokenKind::Newline, "newline")?;
        let then_block = self.parse_block(depth + 1)?;

        self.skip_blank_lines();
        self.check_indent(depth)?;
        self.consume(TokenKind::Else, "'else'")?;
        self.consume(TokenKind::Colon, "':'")?;
        self.consume(TokenKind::Newline, "newline")?;
        let else_block = self.parse_block(depth + 1)?;

        self.node(Stmt::Conditional {
            condition,
            then_block,
            else_block,
        })
    }
}
