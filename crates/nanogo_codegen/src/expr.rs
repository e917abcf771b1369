use inkwell::builder::Builder;
use inkwell::values::{BasicMetadataValueEnum, BasicValueEnum, IntValue};
use inkwell::module::Linkage;
use inkwell::IntPredicate;
use tracing::debug;

use nanogo_frontend::ast::{BinaryOp, Expr, ExprKind, Lit, OpClass, Span, UnaryOp};

use crate::builtins::Builtin;
use crate::error::{CodegenErrorKind, Result};
use crate::types::{GoType, ValueType};
use crate::value::Value;
use crate::CodeGenerator;

/// Operators that lower to a single integer instruction.
pub fn is_lowerable(op: BinaryOp) -> bool {
    matches!(
        op,
        BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Or
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Shl
            | BinaryOp::Shr
            | BinaryOp::And
    ) || op.class() == OpClass::Relational
}

/// Reject `%`, `^`, `&^`, `&&` and `||` before any operand is lowered.
pub fn check_binary_op(op: BinaryOp, span: Span) -> Result<()> {
    if is_lowerable(op) {
        Ok(())
    } else {
        Err(CodegenErrorKind::UnsupportedOperator(op.token().to_string()).at(span))
    }
}

/// Instruction-level helpers that need only a builder.
pub struct ExprCodegen;

impl ExprCodegen {
    /// Signed integer predicate for a relational operator.
    pub fn int_predicate(op: BinaryOp) -> Option<IntPredicate> {
        Some(match op {
            BinaryOp::Eq => IntPredicate::EQ,
            BinaryOp::Ne => IntPredicate::NE,
            BinaryOp::Lt => IntPredicate::SLT,
            BinaryOp::Le => IntPredicate::SLE,
            BinaryOp::Gt => IntPredicate::SGT,
            BinaryOp::Ge => IntPredicate::SGE,
            _ => return None,
        })
    }

    /// Emit `lhs op rhs` on two integers of the same width.
    pub fn build_int_binary<'ctx>(
        builder: &Builder<'ctx>,
        op: BinaryOp,
        lhs: IntValue<'ctx>,
        rhs: IntValue<'ctx>,
        span: Span,
    ) -> Result<IntValue<'ctx>> {
        if let Some(pred) = Self::int_predicate(op) {
            return Ok(builder.build_int_compare(pred, lhs, rhs, "cmp")?);
        }
        let value = match op {
            BinaryOp::Add => builder.build_int_add(lhs, rhs, "add")?,
            BinaryOp::Sub => builder.build_int_sub(lhs, rhs, "sub")?,
            BinaryOp::Or => builder.build_or(lhs, rhs, "or")?,
            BinaryOp::Mul => builder.build_int_mul(lhs, rhs, "mul")?,
            BinaryOp::Div => builder.build_int_signed_div(lhs, rhs, "div")?,
            BinaryOp::Shl => builder.build_left_shift(lhs, rhs, "shl")?,
            BinaryOp::Shr => builder.build_right_shift(lhs, rhs, true, "shr")?,
            BinaryOp::And => builder.build_and(lhs, rhs, "and")?,
            other => {
                return Err(
                    CodegenErrorKind::UnsupportedOperator(other.token().to_string()).at(span)
                );
            }
        };
        Ok(value)
    }
}

impl<'ctx> CodeGenerator<'ctx> {
    pub(crate) fn lower_expr(&mut self, expr: &Expr) -> Result<Value<'ctx>> {
        match &expr.kind {
            ExprKind::Ident(name) => self.lower_ident(name, expr.span),
            ExprKind::Lit(lit) => self.lower_literal(lit, expr.span),
            ExprKind::Unary { op, operand } => self.lower_unary(*op, operand, expr.span),
            ExprKind::Binary { op, lhs, rhs } => self.lower_binary(*op, lhs, rhs, expr.span),
            ExprKind::Call { callee, args } => self.lower_call(callee, args, expr.span),
            ExprKind::Unsupported { construct } => {
                Err(CodegenErrorKind::UnknownConstruct(construct.clone()).at(expr.span))
            }
        }
    }

    fn lower_ident(&mut self, name: &str, span: Span) -> Result<Value<'ctx>> {
        let binding = self.scopes.resolve(name, span)?;
        let (ty, cell) = match (binding.ty.as_go(), binding.as_cell()) {
            (Some(ty), Some(cell)) => (ty, cell),
            _ => {
                return Err(CodegenErrorKind::TypeMismatch(format!(
                    "`{name}` is not a storage cell"
                ))
                .at(span));
            }
        };
        let loaded = self
            .builder
            .build_load(self.registry.llvm_type(ty), cell, name)?;
        Ok(Value::new(ty, loaded))
    }

    fn lower_literal(&mut self, lit: &Lit, span: Span) -> Result<Value<'ctx>> {
        match lit {
            Lit::Int(text) => self.lower_int_literal(text, false, span),
            Lit::Str(bytes) => self.lower_string_literal(bytes),
            other => {
                Err(CodegenErrorKind::UnsupportedLiteralKind(other.kind_name().to_string()).at(span))
            }
        }
    }

    /// An `int64` constant. `negative` folds a leading unary minus so that
    /// the most negative value is reachable.
    fn lower_int_literal(&mut self, text: &str, negative: bool, span: Span) -> Result<Value<'ctx>> {
        let value = parse_decimal(text, negative).ok_or_else(|| {
            let sign = if negative { "-" } else { "" };
            CodegenErrorKind::UnsupportedLiteralKind(format!("integer `{sign}{text}`")).at(span)
        })?;
        let constant = self
            .context
            .i64_type()
            .const_int(value as u64, value < 0);
        Ok(Value::new(GoType::Int64, constant.into()))
    }

    /// A fresh `[N+1 x i8]` constant per occurrence, wrapped in a string
    /// record built in a local cell.
    fn lower_string_literal(&mut self, bytes: &[u8]) -> Result<Value<'ctx>> {
        let name = self.names.string();
        let init = self.context.const_string(bytes, true);
        let global = self.module.add_global(init.get_type(), None, &name);
        global.set_initializer(&init);
        global.set_constant(true);
        global.set_linkage(Linkage::Private);
        global.set_unnamed_addr(true);

        let string_ty = self.registry.string_type();
        let cell = self.build_entry_alloca(string_ty.into(), "lit")?;
        let len_ptr = self
            .builder
            .build_struct_gep(string_ty, cell, 0, "lit.len")?;
        let data_ptr = self
            .builder
            .build_struct_gep(string_ty, cell, 1, "lit.data")?;
        let len = self.context.i64_type().const_int(bytes.len() as u64, false);
        self.builder.build_store(len_ptr, len)?;
        self.builder
            .build_store(data_ptr, global.as_pointer_value())?;

        let record = self.builder.build_load(string_ty, cell, &name)?;
        Ok(Value::new(GoType::String, record))
    }

    fn lower_unary(&mut self, op: UnaryOp, operand: &Expr, span: Span) -> Result<Value<'ctx>> {
        if op != UnaryOp::Neg {
            return Err(CodegenErrorKind::UnsupportedOperator(op.token().to_string()).at(span));
        }
        if let ExprKind::Lit(Lit::Int(text)) = &operand.kind {
            return self.lower_int_literal(text, true, span);
        }
        let value = self.lower_expr(operand)?;
        let (ty, repr) = match (value.ty.as_go(), value.repr) {
            (Some(ty), Some(repr)) if ty.is_integer() => (ty, repr.into_int_value()),
            _ => {
                debug!(%op, operand = %value.ty, "negation of non-integer operand");
                return Err(CodegenErrorKind::UnsupportedOperator(op.token().to_string()).at(span));
            }
        };
        let zero = repr.get_type().const_zero();
        let negated = self.builder.build_int_sub(zero, repr, "neg")?;
        Ok(Value::new(ty, negated.into()))
    }

    fn lower_binary(
        &mut self,
        op: BinaryOp,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<Value<'ctx>> {
        check_binary_op(op, span)?;
        let lhs = self.lower_expr(lhs)?;
        let rhs = self.lower_expr(rhs)?;
        self.build_binary_op(op, lhs, rhs, span)
    }

    /// Apply an already-checked operator to two lowered operands.
    pub(crate) fn build_binary_op(
        &mut self,
        op: BinaryOp,
        lhs: Value<'ctx>,
        rhs: Value<'ctx>,
        span: Span,
    ) -> Result<Value<'ctx>> {
        let (l, r, ty) = self.coerce_binary_operands(op, &lhs, &rhs, span)?;
        let result = ExprCodegen::build_int_binary(&self.builder, op, l, r, span)?;
        let result_ty = if op.class() == OpClass::Relational {
            ValueType::Bool
        } else {
            ValueType::Go(ty)
        };
        Ok(Value::new(result_ty, result.into()))
    }

    /// Both operands must be integers; a narrower one is sign-extended to
    /// the wider width.
    fn coerce_binary_operands(
        &mut self,
        op: BinaryOp,
        lhs: &Value<'ctx>,
        rhs: &Value<'ctx>,
        span: Span,
    ) -> Result<(IntValue<'ctx>, IntValue<'ctx>, GoType)> {
        let (lty, l, rty, r) = match (lhs.ty.as_go(), lhs.repr, rhs.ty.as_go(), rhs.repr) {
            (Some(lty), Some(l), Some(rty), Some(r)) if lty.is_integer() && rty.is_integer() => {
                (lty, l.into_int_value(), rty, r.into_int_value())
            }
            _ => {
                debug!(%op, lhs = %lhs.ty, rhs = %rhs.ty, "operator on non-integer operands");
                return Err(CodegenErrorKind::UnsupportedOperator(op.token().to_string()).at(span));
            }
        };
        if lty == rty {
            return Ok((l, r, lty));
        }
        let i64_ty = self.context.i64_type();
        let (l, r) = if lty == GoType::Int32 {
            (self.builder.build_int_s_extend(l, i64_ty, "widen_l")?, r)
        } else {
            (l, self.builder.build_int_s_extend(r, i64_ty, "widen_r")?)
        };
        Ok((l, r, GoType::Int64))
    }

    fn lower_call(&mut self, callee: &Expr, args: &[Expr], span: Span) -> Result<Value<'ctx>> {
        let Some(name) = callee.as_ident() else {
            return Err(
                CodegenErrorKind::UnknownConstruct("call of non-identifier callee".to_string())
                    .at(callee.span),
            );
        };
        if let Some(builtin) = Builtin::from_name(name) {
            return self.lower_builtin_call(builtin, args, span);
        }

        let symbol = self
            .symbols
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenErrorKind::UnboundIdentifier(name.to_string()).at(callee.span))?;
        if symbol.params.len() != args.len() {
            return Err(CodegenErrorKind::ArityMismatch {
                callee: name.to_string(),
                expected: symbol.params.len(),
                found: args.len(),
            }
            .at(span));
        }

        let mut call_args: Vec<BasicMetadataValueEnum<'ctx>> = Vec::with_capacity(args.len());
        for (arg, ty) in args.iter().zip(&symbol.params) {
            let value = self.lower_expr(arg)?;
            call_args.push(self.convert(value, *ty, arg.span)?.into());
        }

        // LLVM rejects names on void-typed results.
        let call_name = if symbol.ret.is_some() || symbol.is_entry { name } else { "" };
        let call = self
            .builder
            .build_call(symbol.function, &call_args, call_name)?;
        match (symbol.ret, call.try_as_basic_value().basic()) {
            (Some(ty), Some(result)) if !symbol.is_entry => Ok(Value::new(ty, result)),
            _ => Ok(Value::void()),
        }
    }

    /// Convert a value for storage in a slot of type `target`.
    pub(crate) fn convert(
        &mut self,
        value: Value<'ctx>,
        target: GoType,
        span: Span,
    ) -> Result<BasicValueEnum<'ctx>> {
        let mismatch = |found: ValueType| {
            CodegenErrorKind::TypeMismatch(format!("cannot use {found} value as {target}")).at(span)
        };
        let Some(repr) = value.repr else {
            return Err(mismatch(value.ty));
        };
        let Some(source) = value.ty.as_go() else {
            return Err(mismatch(value.ty));
        };
        if source == target {
            return Ok(repr);
        }
        if !(source.is_integer() && target.is_integer()) {
            return Err(mismatch(value.ty));
        }
        let int = repr.into_int_value();
        let target_ty = self.registry.llvm_type(target).into_int_type();
        let converted = if source.bit_width() < target.bit_width() {
            self.builder.build_int_s_extend(int, target_ty, "sext")?
        } else {
            self.builder.build_int_truncate(int, target_ty, "trunc")?
        };
        Ok(converted.into())
    }
}

/// Base-10 integer literal, optionally negated; other bases and values
/// outside `i64` are `None`.
fn parse_decimal(text: &str, negative: bool) -> Option<i64> {
    if text.len() > 1 && text.starts_with('0') {
        return None;
    }
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let magnitude: u64 = text.parse().ok()?;
    if negative {
        0i64.checked_sub_unsigned(magnitude)
    } else {
        i64::try_from(magnitude).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_literals_only() {
        assert_eq!(parse_decimal("0", false), Some(0));
        assert_eq!(parse_decimal("42", false), Some(42));
        assert_eq!(parse_decimal("9223372036854775807", false), Some(i64::MAX));
        assert_eq!(parse_decimal("9223372036854775808", false), None);
        assert_eq!(parse_decimal("0x10", false), None);
        assert_eq!(parse_decimal("017", false), None);
        assert_eq!(parse_decimal("1_000", false), None);
        assert_eq!(parse_decimal("", false), None);
    }

    #[test]
    fn negated_literals_reach_i64_min() {
        assert_eq!(parse_decimal("9223372036854775808", true), Some(i64::MIN));
        assert_eq!(parse_decimal("9223372036854775809", true), None);
        assert_eq!(parse_decimal("8", true), Some(-8));
        assert_eq!(parse_decimal("0", true), Some(0));
    }

    #[test]
    fn operator_legality() {
        for op in [BinaryOp::Rem, BinaryOp::Xor, BinaryOp::AndNot, BinaryOp::LogicalAnd] {
            let err = check_binary_op(op, Span::DUMMY).unwrap_err();
            assert!(matches!(err.kind, CodegenErrorKind::UnsupportedOperator(_)));
        }
        for op in [BinaryOp::Add, BinaryOp::Shr, BinaryOp::Le, BinaryOp::Ne] {
            assert!(check_binary_op(op, Span::DUMMY).is_ok());
        }
    }

    #[test]
    fn relational_predicates_are_signed() {
        assert_eq!(ExprCodegen::int_predicate(BinaryOp::Lt), Some(IntPredicate::SLT));
        assert_eq!(ExprCodegen::int_predicate(BinaryOp::Ge), Some(IntPredicate::SGE));
        assert_eq!(ExprCodegen::int_predicate(BinaryOp::Add), None);
    }
}
