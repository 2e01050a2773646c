//! LLVM IR emitter built on inkwell.
//!
//! Every variable gets an `alloca` in a dedicated entry block that branches
//! to the body once lowering is done, so slots can be created lazily while
//! the body is still being built.

use inkwell::basic_block::BasicBlock;
use inkwell::builder::{Builder, BuilderError};
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::types::IntType;
use inkwell::values::{FunctionValue, IntValue, PointerValue};
use inkwell::{AddressSpace, IntPredicate};

use super::{CodegenError, CodegenErrorKind, LabelGen, Slots, check_divisor, literal_value};
use crate::ast::{BinaryOp, Block, Expr, Function, Stmt, UnaryOp};

impl From<BuilderError> for CodegenError {
    fn from(err: BuilderError) -> Self {
        CodegenError::new(CodegenErrorKind::Backend, err.to_string(), None)
    }
}

/// Emit a textual LLVM module whose `main` runs the function body
pub fn generate(function: &Function) -> Result<String, CodegenError> {
    let context = Context::create();
    let mut emitter = Emitter::new(&context, &function.name)?;
    emitter.emit_block(&function.body)?;
    emitter.finish()
}

struct Emitter<'ctx> {
    context: &'ctx Context,
    module: Module<'ctx>,
    builder: Builder<'ctx>,
    alloca_builder: Builder<'ctx>,
    main_fn: FunctionValue<'ctx>,
    i64_type: IntType<'ctx>,
    entry: BasicBlock<'ctx>,
    body: BasicBlock<'ctx>,
    return_block: BasicBlock<'ctx>,
    exit_block: BasicBlock<'ctx>,
    div_zero_block: Option<BasicBlock<'ctx>>,
    result: PointerValue<'ctx>,
    slots: Slots,
    slot_ptrs: Vec<PointerValue<'ctx>>,
    labels: LabelGen,
}

impl<'ctx> Emitter<'ctx> {
    fn new(context: &'ctx Context, name: &str) -> Result<Self, CodegenError> {
        let module = context.create_module(name);
        let builder = context.create_builder();
        let alloca_builder = context.create_builder();

        let i32_type = context.i32_type();
        let i64_type = context.i64_type();

        let main_type = i32_type.fn_type(&[], false);
        let main_fn = module.add_function("main", main_type, None);
        let entry = context.append_basic_block(main_fn, "entry");
        let body = context.append_basic_block(main_fn, "body");
        let return_block = context.append_basic_block(main_fn, "return");
        let exit_block = context.append_basic_block(main_fn, "exit");

        alloca_builder.position_at_end(entry);
        let result = alloca_builder.build_alloca(i64_type, "result")?;
        builder.position_at_end(body);

        Ok(Self {
            context,
            module,
            builder,
            alloca_builder,
            main_fn,
            i64_type,
            entry,
            body,
            return_block,
            exit_block,
            div_zero_block: None,
            result,
            slots: Slots::default(),
            slot_ptrs: Vec::new(),
            labels: LabelGen::default(),
        })
    }

    fn finish(self) -> Result<String, CodegenError> {
        let i32_type = self.context.i32_type();
        let ptr_type = self.context.ptr_type(AddressSpace::default());

        // Falling off the end of the body prints nothing
        self.builder.build_unconditional_branch(self.exit_block)?;

        self.alloca_builder.position_at_end(self.entry);
        self.alloca_builder.build_unconditional_branch(self.body)?;

        // int printf(const char*, ...)
        let printf_type = i32_type.fn_type(&[ptr_type.into()], true);
        let printf_fn = self.module.add_function("printf", printf_type, None);

        self.builder.position_at_end(self.return_block);
        let fmt = self.builder.build_global_string_ptr("%ld\n", ".fmt")?;
        let value = self
            .builder
            .build_load(self.i64_type, self.result, "result")?
            .into_int_value();
        self.builder.build_call(
            printf_fn,
            &[fmt.as_pointer_value().into(), value.into()],
            "printf_call",
        )?;
        self.builder.build_unconditional_branch(self.exit_block)?;

        self.builder.position_at_end(self.exit_block);
        self.builder
            .build_return(Some(&i32_type.const_int(0, false)))?;

        if let Err(err) = self.module.verify() {
            return Err(CodegenError::new(
                CodegenErrorKind::Backend,
                format!("module verification failed: {}", err),
                None,
            ));
        }

        Ok(self.module.print_to_string().to_string())
    }

    /// Alloca for a variable, created zero-initialised on first assignment
    fn slot_for_assign(&mut self, name: &str) -> Result<PointerValue<'ctx>, CodegenError> {
        let slot = self.slots.assign(name);
        if slot == self.slot_ptrs.len() {
            let ptr = self.alloca_builder.build_alloca(self.i64_type, name)?;
            self.alloca_builder
                .build_store(ptr, self.i64_type.const_zero())?;
            self.slot_ptrs.push(ptr);
        }
        Ok(self.slot_ptrs[slot])
    }

    /// Block that reports a zero divisor and exits with status 1
    fn div_zero_block(&mut self) -> Result<BasicBlock<'ctx>, CodegenError> {
        if let Some(block) = self.div_zero_block {
            return Ok(block);
        }

        let i32_type = self.context.i32_type();
        let ptr_type = self.context.ptr_type(AddressSpace::default());
        let resume = self.builder.get_insert_block();

        // int dprintf(int, const char*, ...) and void exit(int)
        let dprintf_type = i32_type.fn_type(&[i32_type.into(), ptr_type.into()], true);
        let dprintf_fn = self.module.add_function("dprintf", dprintf_type, None);
        let exit_type = self.context.void_type().fn_type(&[i32_type.into()], false);
        let exit_fn = self.module.add_function("exit", exit_type, None);

        let block = self.context.append_basic_block(self.main_fn, "div_zero");
        self.builder.position_at_end(block);
        let message = self
            .builder
            .build_global_string_ptr("error: division by zero\n", ".div_zero_msg")?;
        self.builder.build_call(
            dprintf_fn,
            &[
                i32_type.const_int(2, false).into(),
                message.as_pointer_value().into(),
            ],
            "dprintf_call",
        )?;
        self.builder
            .build_call(exit_fn, &[i32_type.const_int(1, false).into()], "")?;
        self.builder.build_unreachable()?;

        if let Some(resume) = resume {
            self.builder.position_at_end(resume);
        }
        self.div_zero_block = Some(block);
        Ok(block)
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
                let value = self.emit_expr(value)?;
                let ptr = self.slot_for_assign(target)?;
                self.builder.build_store(ptr, value)?;
            }
            Stmt::Return { value } => {
                let value = self.emit_expr(value)?;
                self.builder.build_store(self.result, value)?;
                self.builder.build_unconditional_branch(self.return_block)?;
                // Anything after a return still needs a block to land in
                let dead = self.context.append_basic_block(self.main_fn, "after_return");
                self.builder.position_at_end(dead);
            }
            Stmt::Conditional {
                condition,
                then_block,
                else_block,
            } => {
                let (else_label, end_label) = self.labels.branch_pair();
                let then_bb = self.context.append_basic_block(self.main_fn, "then");
                let else_bb = self.context.append_basic_block(self.main_fn, &else_label);
                let end_bb = self.context.append_basic_block(self.main_fn, &end_label);

                let value = self.emit_expr(condition)?;
                let cond = self.builder.build_int_compare(
                    IntPredicate::NE,
                    value,
                    self.i64_type.const_zero(),
                    "cond",
                )?;
                self.builder.build_conditional_branch(cond, then_bb, else_bb)?;

                self.builder.position_at_end(then_bb);
                self.emit_block(then_block)?;
                self.builder.build_unconditional_branch(end_bb)?;

                self.builder.position_at_end(else_bb);
                self.emit_block(else_block)?;
                self.builder.build_unconditional_branch(end_bb)?;

                self.builder.position_at_end(end_bb);
            }
        }
        Ok(())
    }

    fn emit_expr(&mut self, expr: &Expr) -> Result<IntValue<'ctx>, CodegenError> {
        match expr {
            Expr::Literal(literal) => {
                let value = literal_value(literal)?;
                Ok(self.i64_type.const_int(value as u64, true))
            }
            Expr::Identifier { name, pos } => {
                let slot = self.slots.lookup(name, *pos)?;
                let value = self
                    .builder
                    .build_load(self.i64_type, self.slot_ptrs[slot], name)?;
                Ok(value.into_int_value())
            }
            Expr::Unary {
                op: UnaryOp::Neg,
                operand,
            } => {
                let value = self.emit_expr(operand)?;
                Ok(self.builder.build_int_neg(value, "neg")?)
            }
            Expr::Binary { op, lhs, rhs, pos } => {
                let divisor = match op {
                    BinaryOp::Div => check_divisor(rhs, *pos)?,
                    _ => None,
                };

                let lhs = self.emit_expr(lhs)?;
                let rhs = self.emit_expr(rhs)?;

                let value = match op {
                    BinaryOp::Add => self.builder.build_int_add(lhs, rhs, "add")?,
                    BinaryOp::Sub => self.builder.build_int_sub(lhs, rhs, "sub")?,
                    BinaryOp::Mul => self.builder.build_int_mul(lhs, rhs, "mul")?,
                    // sdiv is undefined for i64::MIN / -1; x / -1 is a
                    // wrapping negation instead
                    BinaryOp::Div => match divisor {
                        Some(-1) => self.builder.build_int_neg(lhs, "neg")?,
                        Some(_) => self.builder.build_int_signed_div(lhs, rhs, "div")?,
                        None => {
                            let div_zero = self.div_zero_block()?;
                            let div_ok = self.context.append_basic_block(self.main_fn, "div_ok");
                            let is_zero = self.builder.build_int_compare(
                                IntPredicate::EQ,
                                rhs,
                                self.i64_type.const_zero(),
                                "is_zero",
                            )?;
                            self.builder.build_conditional_branch(is_zero, div_zero, div_ok)?;
                            self.builder.position_at_end(div_ok);

                            let minus_one = self.i64_type.const_all_ones();
                            let is_minus_one = self.builder.build_int_compare(
                                IntPredicate::EQ,
                                rhs,
                                minus_one,
                                "is_minus_one",
                            )?;
                            let one = self.i64_type.const_int(1, false);
                            let safe_rhs = self
                                .builder
                                .build_select(is_minus_one, one, rhs, "safe_rhs")?
                                .into_int_value();
                            let quotient = self.builder.build_int_signed_div(lhs, safe_rhs, "div")?;
                            let negated = self.builder.build_int_neg(lhs, "neg")?;
                            self.builder
                                .build_select(is_minus_one, negated, quotient, "quotient")?
                                .into_int_value()
                        }
                    },
                    BinaryOp::Or => {
                        let zero = self.i64_type.const_zero();
                        let lhs = self.builder.build_int_compare(IntPredicate::NE, lhs, zero, "lhs_bool")?;
                        let rhs = self.builder.build_int_compare(IntPredicate::NE, rhs, zero, "rhs_bool")?;
                        let either = self.builder.build_or(lhs, rhs, "or")?;
                        self.builder.build_int_z_extend(either, self.i64_type, "or_ext")?
                    }
                };
                Ok(value)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::lex;
    use crate::limits::CompilerLimits;
    use crate::parser::parse;

    fn compile(source: &str) -> Result<String, CodegenError> {
        let limits = CompilerLimits::default();
        let tokens = lex(source, &limits).unwrap();
        let function = parse(&tokens, &limits).unwrap();
        generate(&function)
    }

    #[test]
    fn test_module_shape() {
        let ir = compile("def f():\n\tx = 4\n\treturn x * 2\n").unwrap();
        assert!(ir.contains("define i32 @main()"));
        assert!(ir.contains("declare i32 @printf(ptr, ...)"));
        assert!(ir.contains("alloca i64"));
        assert!(ir.contains("mul i64"));
        assert!(!ir.contains("div_zero"));
    }

    #[test]
    fn test_runtime_division_check() {
        let ir = compile("def f():\n\td = 0\n\treturn 10 / d\n").unwrap();
        assert!(ir.contains("sdiv i64"));
        assert!(ir.contains("@dprintf"));
        assert!(ir.contains("@exit"));
    }

    #[test]
    fn test_division_by_minus_one_avoids_sdiv() {
        let ir = compile("def f():\n\tx = 5\n\treturn x / -1\n").unwrap();
        assert!(!ir.contains("sdiv"));

        let ir = compile("def f():\n\tx = 5\n\td = -1\n\treturn x / d\n").unwrap();
        assert!(ir.contains("icmp eq i64"));
        assert!(ir.contains("select i1"));
    }

    #[test]
    fn test_conditional_blocks() {
        let source = "def f():\n\tc = 0\n\tif c:\n\t\treturn 1\n\telse:\n\t\treturn 2\n";
        let ir = compile(source).unwrap();
        assert!(ir.contains("icmp ne i64"));
        assert!(ir.contains(".L.else.0"));
        assert!(ir.contains(".L.end.0"));
    }

    #[test]
    fn test_errors_match_assembly_backend() {
        let err = compile("def f():\n\treturn 1 / 0\n").unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::DivisionByZero);

        let err = compile("def f():\n\treturn y\n").unwrap_err();
        assert_eq!(err.kind, CodegenErrorKind::UndefinedVariable);
    }
}
