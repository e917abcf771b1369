use inkwell::values::{BasicValueEnum, PointerValue};
use tracing::{debug, trace};

use nanogo_frontend::ast::{BinaryOp, Block, Expr, Ident, IncDecOp, Span, Stmt, StmtKind, TypeExpr};

use crate::error::{CodegenError, CodegenErrorKind, Result};
use crate::expr::check_binary_op;
use crate::types::GoType;
use crate::value::Value;
use crate::CodeGenerator;

/// The blank identifier: evaluated for effect, never bound.
const BLANK: &str = "_";

fn unsupported_form(form: &str, span: Span) -> CodegenError {
    CodegenErrorKind::UnsupportedStatementForm(form.to_string()).at(span)
}

impl<'ctx> CodeGenerator<'ctx> {
    /// Lower a block inline. Bindings stay function-scoped.
    pub(crate) fn lower_block(&mut self, block: &Block) -> Result<()> {
        for stmt in &block.stmts {
            self.lower_stmt(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn lower_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        if matches!(stmt.kind, StmtKind::Empty) {
            return Ok(());
        }
        self.ensure_open_block()?;
        trace!(span = %stmt.span, "lowering statement");

        match &stmt.kind {
            StmtKind::ShortVarDecl { names, values } => match (names.as_slice(), values.as_slice()) {
                ([name], [value]) => self.lower_short_var_decl(name, value),
                _ => Err(unsupported_form("multi-value short variable declaration", stmt.span)),
            },
            StmtKind::VarDecl { names, ty, values } => match (names.as_slice(), values.as_slice()) {
                ([name], []) => self.lower_var_decl(name, ty.as_ref(), None, stmt.span),
                ([name], [value]) => self.lower_var_decl(name, ty.as_ref(), Some(value), stmt.span),
                _ => Err(unsupported_form("multi-value variable declaration", stmt.span)),
            },
            StmtKind::Assign {
                targets,
                op,
                values,
            } => match (targets.as_slice(), values.as_slice()) {
                ([target], [value]) => match op {
                    None => self.lower_assign(target, value),
                    Some(op) => self.lower_compound_assign(target, *op, value, stmt.span),
                },
                _ => Err(unsupported_form("tuple assignment", stmt.span)),
            },
            StmtKind::IncDec { target, op } => self.lower_inc_dec(target, *op, stmt.span),
            StmtKind::Return(values) => self.lower_return(values, stmt.span),
            StmtKind::If(if_stmt) => self.lower_if(if_stmt),
            StmtKind::For(for_stmt) => self.lower_for(for_stmt),
            StmtKind::Expr(expr) => {
                self.lower_expr(expr)?;
                Ok(())
            }
            StmtKind::Block(block) => self.lower_block(block),
            StmtKind::Break => Err(
                CodegenErrorKind::UnknownConstruct("break statement".to_string()).at(stmt.span)
            ),
            StmtKind::Continue => Err(
                CodegenErrorKind::UnknownConstruct("continue statement".to_string()).at(stmt.span)
            ),
            StmtKind::Empty => Ok(()),
            StmtKind::Unsupported { construct } => {
                Err(CodegenErrorKind::UnknownConstruct(construct.clone()).at(stmt.span))
            }
        }
    }

    /// `x := e`: a new cell of the initializer's type.
    fn lower_short_var_decl(&mut self, name: &Ident, value: &Expr) -> Result<()> {
        let value = self.lower_expr(value)?;
        if name.name == BLANK {
            return Ok(());
        }
        let Some(ty) = value.ty.as_go() else {
            return Err(CodegenErrorKind::TypeMismatch(format!(
                "cannot declare `{}` from a {} value",
                name.name, value.ty
            ))
            .at(name.span));
        };
        let repr = self.convert(value, ty, name.span)?;
        self.declare_local(name, ty, Some(repr))
    }

    /// `var x T`, `var x T = e`, `var x = e`.
    fn lower_var_decl(
        &mut self,
        name: &Ident,
        ty: Option<&TypeExpr>,
        value: Option<&Expr>,
        span: Span,
    ) -> Result<()> {
        let declared = ty.map(|t| self.registry.lookup(t)).transpose()?;
        match (declared, value) {
            (_, None) if name.name == BLANK => Ok(()),
            (Some(ty), None) => self.declare_local(name, ty, None),
            (Some(ty), Some(value)) => {
                let value_span = value.span;
                let lowered = self.lower_expr(value)?;
                if name.name == BLANK {
                    return Ok(());
                }
                let repr = self.convert(lowered, ty, value_span)?;
                self.declare_local(name, ty, Some(repr))
            }
            (None, Some(value)) => self.lower_short_var_decl(name, value),
            (None, None) => Err(unsupported_form("variable declaration without type or value", span)),
        }
    }

    /// Allocate, initialize and bind a local. Without an initializer the
    /// cell holds the type's zero value.
    fn declare_local(
        &mut self,
        name: &Ident,
        ty: GoType,
        init: Option<BasicValueEnum<'ctx>>,
    ) -> Result<()> {
        let cell = self.build_entry_alloca(self.registry.llvm_type(ty), &name.name)?;
        match init {
            Some(value) => {
                self.builder.build_store(cell, value)?;
            }
            None => self
                .registry
                .build_zero(&self.builder, &self.module, cell, ty)?,
        }
        debug!(name = %name.name, %ty, bytes = ty.size(), "bound local");
        if self.scopes.bind(name.name.clone(), Value::cell(ty, cell)).is_some() {
            debug!(name = %name.name, "rebinding replaces earlier declaration");
        }
        Ok(())
    }

    /// Resolve an assignment target to its cell.
    fn target_cell(
        &self,
        target: &Expr,
        form: &str,
    ) -> Result<(GoType, PointerValue<'ctx>)> {
        let Some(name) = target.as_ident() else {
            return Err(unsupported_form(form, target.span));
        };
        let binding = self.scopes.resolve(name, target.span)?;
        match (binding.ty.as_go(), binding.as_cell()) {
            (Some(ty), Some(cell)) => Ok((ty, cell)),
            _ => Err(unsupported_form(form, target.span)),
        }
    }

    /// `x = e`. No load follows the store.
    fn lower_assign(&mut self, target: &Expr, value: &Expr) -> Result<()> {
        if target.as_ident() == Some(BLANK) {
            self.lower_expr(value)?;
            return Ok(());
        }
        let (ty, cell) = self.target_cell(target, "assignment to non-identifier")?;
        let value = self.lower_expr(value)?;
        let repr = self.convert(value, ty, target.span)?;
        self.builder.build_store(cell, repr)?;
        Ok(())
    }

    /// `x op= e` as load, op, store.
    fn lower_compound_assign(
        &mut self,
        target: &Expr,
        op: BinaryOp,
        value: &Expr,
        span: Span,
    ) -> Result<()> {
        check_binary_op(op, span)?;
        let (ty, cell) = self.target_cell(target, "compound assignment to non-identifier")?;
        let current = self
            .builder
            .build_load(self.registry.llvm_type(ty), cell, "cur")?;
        let rhs = self.lower_expr(value)?;
        let result = self.build_binary_op(op, Value::new(ty, current), rhs, span)?;
        let repr = self.convert(result, ty, span)?;
        self.builder.build_store(cell, repr)?;
        Ok(())
    }

    /// `x++` / `x--`: the step constant has the cell's width.
    fn lower_inc_dec(&mut self, target: &Expr, op: IncDecOp, span: Span) -> Result<()> {
        let (ty, cell) = self.target_cell(target, "increment of non-identifier")?;
        let token = match op {
            IncDecOp::Inc => "++",
            IncDecOp::Dec => "--",
        };
        if !ty.is_integer() {
            return Err(CodegenErrorKind::UnsupportedOperator(token.to_string()).at(span));
        }
        let int_ty = self.registry.llvm_type(ty).into_int_type();
        let current = self.builder.build_load(int_ty, cell, "cur")?.into_int_value();
        let one = int_ty.const_int(1, false);
        let next = match op {
            IncDecOp::Inc => self.builder.build_int_add(current, one, "inc")?,
            IncDecOp::Dec => self.builder.build_int_sub(current, one, "dec")?,
        };
        self.builder.build_store(cell, next)?;
        Ok(())
    }

    fn lower_return(&mut self, values: &[Expr], span: Span) -> Result<()> {
        let state = self.function_state()?;
        match (values, state.ret) {
            ([], _) if state.is_entry => {
                let zero = self.context.i32_type().const_zero();
                self.builder.build_return(Some(&zero))?;
            }
            ([], None) => {
                self.builder.build_return(None)?;
            }
            ([], Some(ty)) => {
                return Err(CodegenErrorKind::TypeMismatch(format!(
                    "missing return value of type {ty}"
                ))
                .at(span));
            }
            ([value], Some(ty)) => {
                let lowered = self.lower_expr(value)?;
                let repr = self.convert(lowered, ty, value.span)?;
                self.builder.build_return(Some(&repr))?;
            }
            ([_], None) => {
                return Err(
                    CodegenErrorKind::TypeMismatch("too many return values".to_string()).at(span)
                );
            }
            _ => return Err(unsupported_form("multi-value return", span)),
        }
        Ok(())
    }
}
