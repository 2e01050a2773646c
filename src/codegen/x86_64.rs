//! x86-64 emitter: GNU assembler, AT&T syntax, System V calling convention.
//!
//! Every expression leaves its value in `%rax`. A binary operator evaluates
//! its left operand, pushes it, evaluates the right operand into `%rax`, then
//! pops the left side back so the operands meet in `%rax` (left) and `%rdi`
//! (right). Variables live in 8-byte slots below `%rbp`, zeroed on entry.

use super::{CodegenError, LabelGen, Slots, check_divisor, literal_value};
use crate::ast::{BinaryOp, Block, Expr, Function, Stmt, UnaryOp};

const SLOT_SIZE: usize = 8;
const RETURN_LABEL: &str = ".L.return";
const EXIT_LABEL: &str = ".L.exit";
const DIV_ZERO_LABEL: &str = ".L.div_zero";

/// Emit a complete assembly file whose `main` runs the function body
pub fn generate(function: &Function) -> Result<String, CodegenError> {
    let mut emitter = Emitter::default();
    emitter.emit_block(&function.body)?;
    Ok(emitter.finish(&function.name))
}

#[derive(Default)]
struct Emitter {
    body: String,
    slots: Slots,
    labels: LabelGen,
    needs_div_check: bool,
}

impl Emitter {
    fn emit(&mut self, instruction: &str) {
        self.body.push_str("    ");
        self.body.push_str(instruction);
        self.body.push('\n');
    }

    fn label(&mut self, name: &str) {
        self.body.push_str(name);
        self.body.push_str(":\n");
    }

    /// Wrap the lowered body with data, prologue and epilogue. Slot count is
    /// only known once the body is lowered, so the frame is sized here.
    fn finish(self, name: &str) -> String {
        let frame_size = (self.slots.len() * SLOT_SIZE).div_ceil(16) * 16;

        let mut asm = String::new();
        asm.push_str(&format!("# function '{}'\n", name));
        asm.push_str("    .section .rodata\n");
        asm.push_str(".L.fmt:\n");
        asm.push_str("    .string \"%ld\\n\"\n");
        if self.needs_div_check {
            asm.push_str(".L.div_zero_msg:\n");
            asm.push_str("    .string \"error: division by zero\\n\"\n");
        }
        asm.push_str("    .text\n");
        asm.push_str("    .globl main\n");
        asm.push_str("main:\n");
        asm.push_str("    push %rbp\n");
        asm.push_str("    mov %rsp, %rbp\n");
        if frame_size > 0 {
            asm.push_str(&format!("    sub ${}, %rsp\n", frame_size));
        }
        for slot in 0..self.slots.len() {
            asm.push_str(&format!("    movq $0, {}\n", slot_operand(slot)));
        }

        asm.push_str(&self.body);

        // Falling off the end of the body prints nothing
        asm.push_str(&format!("    jmp {}\n", EXIT_LABEL));
        asm.push_str(&format!("{}:\n", RETURN_LABEL));
        asm.push_str("    lea .L.fmt(%rip), %rdi\n");
        asm.push_str("    mov %rax, %rsi\n");
        asm.push_str("    xor %eax, %eax\n");
        asm.push_str("    call printf@PLT\n");
        asm.push_str(&format!("{}:\n", EXIT_LABEL));
        asm.push_str("    xor %eax, %eax\n");
        asm.push_str("    mov %rbp, %rsp\n");
        asm.push_str("    pop %rbp\n");
        asm.push_str("    ret\n");

        if self.needs_div_check {
            asm.push_str(&format!("{}:\n", DIV_ZERO_LABEL));
            // Temporaries may still be pushed; realign before calling out
            asm.push_str("    and $-16, %rsp\n");
            asm.push_str("    mov $2, %edi\n");
            asm.push_str("    lea .L.div_zero_msg(%rip), %rsi\n");
            asm.push_str("    xor %eax, %eax\n");
            asm.push_str("    call dprintf@PLT\n");
            asm.push_str("    mov $1, %edi\n");
            asm.push_str("    call exit@PLT\n");
        }

        asm.push_str("    .section .note.GNU-stack,\"\",@progbits\n");
        asm
    }

    fn emit_block(&mut self, block: &Block) -> Result<(), CodegenError> {
        for stmt in &block.statements {
            self.emit_stmt(stmt)?;
        }
        Ok(())
    }

    fn emit_stmt(&mut self, stmt: &Stmt) -> Result<(), CodegenError> {
        match stmt {
            Stmt::Assign { target, value, .. } => {
                // The value is lowered first: `x = x + 1` needs an earlier `x`
                self.emit_expr(value)?;
                let slot = self.slots.assign(target);
                self.emit(&format!("mov %rax, {}", slot_operand(slot)));
            }
            Stmt::Return { value } => {
                self.emit_expr(value)?;
                self.emit(&format!("jmp {}", RETURN_LABEL));
            }
            Stmt::Conditional {
                condition,
                then_block,
                else_block,
            } => {
                let (else_label, end_label) = self.labels.branch_pair();

                self.emit_expr(condition)?;
                self.emit("cmp $0, %rax");
                self.emit(&format!("je {}", else_label));

                self.emit_block(then_block)?;
                self.emit(&format!("jmp {}", end_label));

                self.label(&else_label);
                self.emit_block(else_block)?;

                self.label(&end_label);
            }
        }
        Ok(())
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<(), CodegenError> {
        match expr {
            Expr::Literal(literal) => {
                let value = literal_value(literal)?;
                if i32::try_from(value).is_ok() {
                    self.emit(&format!("mov ${}, %rax", value));
                } else {
                    self.emit(&format!("movabs ${}, %rax", value));
                }
            }
            Expr::Identifier { name, pos } => {
                let slot = self.slots.lookup(name, *pos)?;
                self.emit(&format!("mov {}, %rax", slot_operand(slot)));
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                self.emit_expr(operand)?;
                self.emit("neg %rax");
            }
            Expr::Binary { op, lhs, rhs, pos } => {
                let divisor = match op {
                    BinaryOp::Div => check_divisor(rhs, *pos)?,
                    _ => None,
                };

                self.emit_expr(lhs)?;
                self.emit("push %rax");
                self.emit_expr(rhs)?;
                self.emit("mov %rax, %rdi");
                self.emit("pop %rax");

                match op {
                    BinaryOp::Add => self.emit("add %rdi, %rax"),
                    BinaryOp::Sub => self.emit("sub %rdi, %rax"),
                    BinaryOp::Mul => self.emit("imul %rdi, %rax"),
                    // idiv faults on i64::MIN / -1; x / -1 is lowered as a
                    // wrapping negation instead
                    BinaryOp::Div => match divisor {
                        Some(-1) => self.emit("neg %rax"),
                        Some(_) => {
                            self.emit("cqo");
                            self.emit("idiv %rdi");
                        }
                        None => {
                            self.needs_div_check = true;
                            self.emit("test %rdi, %rdi");
                            self.emit(&format!("je {}", DIV_ZERO_LABEL));

                            let (neg_label, end_label) = self.labels.division_pair();
                            self.emit("cmp $-1, %rdi");
                            self.emit(&format!("je {}", neg_label));
                            self.emit("cqo");
                            self.emit("idiv %rdi");
                            self.emit(&format!("jmp {}", end_label));
                            self.label(&neg_label);
                            self.emit("neg %rax");
                            self.label(&end_label);
                        }
                    },
                    BinaryOp::Or => {
                        self.emit("or %rdi, %rax");
                        self.emit("setne %al");
                        self.emit("movzbl %al, %eax");
                    }
                }
            }
        }
        Ok(())
    }
}

fn slot_operand(slot: usize) -> String {
    format!("-{}(%rbp)", (slot + 1) * SLOT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::CodegenErrorKind;
    use crate::lexer::lex;
    use crate::limits::CompilerLimits;
    use crate::parser::parse;

    fn compile(source: &str) -> Result<String, CodegenError> {
        let limits = CompilerLimits::default();
        let tokens = lex(source, &limits).unwrap();
        let function = parse(&tokens, &limits).unwrap();
        generate(&function)
    }

    fn body(source: &str) -> Vec<String> {
        let asm = compile(source).unwrap();
        asm.lines()
            .skip_while(|line| *line != "main:")
            .map(|line| line.trim().to_string())
            .collect()
    }

    #[test]
    fn test_program_skeleton() {
        let asm = compile("def f():\n\treturn 7\n").unwrap();

        assert!(asm.starts_with("# function 'f'\n"));
        assert!(asm.contains("    .globl main\nmain:\n    push %rbp\n    mov %rsp, %rbp\n"));
        assert!(asm.contains("    mov $7, %rax\n    jmp .L.return\n"));
        assert!(asm.contains("    call printf@PLT\n"));
        assert!(asm.ends_with("    .section .note.GNU-stack,\"\",@progbits\n"));
        // No slots, no frame adjustment, no division check
        assert!(!asm.contains("sub $"));
        assert!(!asm.contains(DIV_ZERO_LABEL));
    }

    #[test]
    fn test_slots_are_reused() {
        let lines = body("def f():\n\tx = 5\n\tx *= 3\n\ty = x\n\treturn y\n");

        assert!(lines.contains(&"sub $16, %rsp".to_string()));
        assert!(lines.contains(&"movq $0, -8(%rbp)".to_string()));
        assert!(lines.contains(&"movq $0, -16(%rbp)".to_string()));
        assert_eq!(lines.iter().filter(|l| *l == "mov %rax, -8(%rbp)").count(), 2);
        assert_eq!(lines.iter().filter(|l| *l == "mov %rax, -16(%rbp)").count(), 1);
        assert!(!lines.iter().any(|l| l.contains("-24(%rbp)")));
    }

    #[test]
    fn test_frame_is_16_byte_aligned() {
        let lines = body("def f():\n\ta = 1\n\tb = 2\n\tc = 3\n\treturn a\n");
        assert!(lines.contains(&"sub $32, %rsp".to_string()));
    }

    #[test]
    fn test_binary_operand_order() {
        let lines = body("def f():\n\treturn 10 - 3\n");
        let start = lines.iter().position(|l| l == "mov $10, %rax").unwrap();
        assert_eq!(
            lines[start..start + 6],
            [
                "mov $10, %rax",
                "push %rax",
                "mov $3, %rax",
                "mov %rax, %rdi",
                "pop %rax",
                "sub %rdi, %rax",
            ]
        );
    }

    #[test]
    fn test_or_normalises_to_bool() {
        let lines = body("def f():\n\treturn 2 or 0\n");
        let start = lines.iter().position(|l| l == "or %rdi, %rax").unwrap();
        assert_eq!(lines[start + 1], "setne %al");
        assert_eq!(lines[start + 2], "movzbl %al, %eax");
    }

    #[test]
    fn test_large_literal_uses_movabs() {
        let lines = body("def f():\n\treturn 12345678901\n");
        assert!(lines.contains(&"movabs $12345678901, %rax".to_string()));

        let lines = body("def f():\n\treturn 0b11111111\n");
        assert!(lines.contains(&"mov $255, %rax".to_string()));
    }

    #[test]
    fn test_conditional_labels_are_unique() {
        let source = "\
def f():
\tif 1:
\t\tx = 1
\telse:
\t\tx = 2
\tif x:
\t\treturn 3
\telse:
\t\treturn 4
";
        let lines = body(source);
        for label in [".L.else.0:", ".L.end.0:", ".L.else.1:", ".L.end.1:"] {
            assert_eq!(lines.iter().filter(|l| *l == label).count(), 1, "{}", label);
        }
        assert!(lines.contains(&"je .L.else.0".to_string()));
        assert!(lines.contains(&"jmp .L.end.1".to_string()));
    }

    #[test]
    fn test_generators_do_not_share_labels() {
        let source = "def f():\n\tif 1:\n\t\treturn 1\n\telse:\n\t\treturn 2\n";
        assert_eq!(compile(source).unwrap(), compile(source).unwrap());
    }

    #[test]
    fn test_runtime_division_check() {
        let asm = compile("def f():\n\td = 0\n\treturn 10 / d\n").unwrap();
        assert!(asm.contains("    test %rdi, %rdi\n    je .L.div_zero\n"));
        assert!(asm.contains(
            "    cmp $-1, %rdi\n    je .L.div_neg.0\n    cqo\n    idiv %rdi\n    jmp .L.div_end.0\n\
             .L.div_neg.0:\n    neg %rax\n.L.div_end.0:\n"
        ));
        assert!(asm.contains(".L.div_zero:\n"));
        assert!(asm.contains("call dprintf@PLT"));
        assert!(asm.contains("call exit@PLT"));
    }

    #[test]
    fn test_constant_nonzero_divisor_skips_check() {
        let asm = compile("def f():\n\td = 8\n\treturn d / 2\n").unwrap();
        assert!(asm.contains("cqo\n    idiv %rdi\n"));
        assert!(!asm.contains(DIV_ZERO_LABEL));
    }

    #[test]
    fn test_constant_minus_one_divisor_negates() {
        let lines = body("def f():\n\tx = 5\n\treturn x / -1\n");
        let start = lines.iter().position(|l| l == "pop %rax").unwrap();
        assert_eq!(lines[start + 1], "neg %rax");
        assert!(!lines.iter().any(|l| l == "idiv %rdi"));
    }

    #[test]
    fn test_constant_zero_divisor_is_rejected() {
        let err = compile("def f():\n\treturn 10 / 0\n").unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::DivisionByZero);
        assert_eq!(err.position.unwrap().to_string(), "2:12");

        let err = compile("def f():\n\treturn 1 / (2 - 2)\n").unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::DivisionByZero);
    }

    #[test]
    fn test_undefined_variable() {
        let err = compile("def f():\n\treturn y\n").unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::UndefinedVariable);
        assert_eq!(err.position.unwrap().to_string(), "2:9");
    }

    #[test]
    fn test_self_reference_before_assignment() {
        let err = compile("def f():\n\tx = x + 1\n\treturn x\n").unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::UndefinedVariable);
    }

    #[test]
    fn test_branch_assignment_is_visible_afterwards() {
        // Lowering order, not execution order, decides whether a slot exists
        let source = "def f():\n\tif 0:\n\t\tx = 1\n\telse:\n\t\ty = 2\n\treturn x\n";
        assert!(compile(source).is_ok());
    }

    #[test]
    fn test_string_operand_is_rejected() {
        let err = compile("def f():\n\treturn 'abc'\n").unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::StringValue);
    }
}
