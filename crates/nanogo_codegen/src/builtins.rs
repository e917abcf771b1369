use std::collections::HashMap;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::values::{BasicMetadataValueEnum, FunctionValue, IntValue, PointerValue, StructValue};
use inkwell::AddressSpace;
use tracing::debug;

use nanogo_frontend::ast::{Expr, Span};

use crate::error::{CodegenErrorKind, Result};
use crate::types::{GoType, ValueType};
use crate::value::Value;
use crate::CodeGenerator;

/// Linux x86-64 `write` syscall number.
const SYS_WRITE: u64 = 1;
const STDOUT: u64 = 1;

/// How `Print` reaches the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteStrategy {
    /// Call the C library's `write(int, const void *, size_t)`.
    #[default]
    Libc,
    /// Issue the `syscall` instruction directly (Linux x86-64 only).
    LinuxSyscall,
}

/// Fixed call names intercepted before symbol lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Printf,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Print" => Some(Builtin::Print),
            "Printf" => Some(Builtin::Printf),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Print => "Print",
            Builtin::Printf => "Printf",
        }
    }
}

/// External functions the builtins lower to, declared once per module.
pub struct Builtins<'ctx> {
    context: &'ctx Context,
    strategy: WriteStrategy,
    cache: HashMap<&'static str, FunctionValue<'ctx>>,
}

impl<'ctx> Builtins<'ctx> {
    pub fn new(context: &'ctx Context, strategy: WriteStrategy) -> Self {
        Self {
            context,
            strategy,
            cache: HashMap::new(),
        }
    }

    /// Declare the externals needed by the configured strategy.
    pub fn declare_all(&mut self, module: &Module<'ctx>) {
        if self.strategy == WriteStrategy::Libc {
            self.declare_write(module);
        }
        self.declare_printf(module);
    }

    /// `write(fd, buf, count) -> ssize_t`
    fn declare_write(&mut self, module: &Module<'ctx>) -> FunctionValue<'ctx> {
        if let Some(&f) = self.cache.get("write") {
            return f;
        }
        let i32_ty = self.context.i32_type();
        let i64_ty = self.context.i64_type();
        let ptr_ty = self.context.ptr_type(AddressSpace::default());
        let fn_type = i64_ty.fn_type(&[i32_ty.into(), ptr_ty.into(), i64_ty.into()], false);
        let f = module.add_function("write", fn_type, None);
        self.cache.insert("write", f);
        f
    }

    /// `printf(fmt, ...) -> i32`
    fn declare_printf(&mut self, module: &Module<'ctx>) -> FunctionValue<'ctx> {
        if let Some(&f) = self.cache.get("printf") {
            return f;
        }
        let i32_ty = self.context.i32_type();
        let ptr_ty = self.context.ptr_type(AddressSpace::default());
        let fn_type = i32_ty.fn_type(&[ptr_ty.into()], true);
        let f = module.add_function("printf", fn_type, None);
        self.cache.insert("printf", f);
        f
    }

    /// One write of `len` bytes at `ptr` to stdout.
    pub fn build_write(
        &mut self,
        builder: &Builder<'ctx>,
        module: &Module<'ctx>,
        ptr: PointerValue<'ctx>,
        len: IntValue<'ctx>,
    ) -> Result<()> {
        let i32_ty = self.context.i32_type();
        let i64_ty = self.context.i64_type();
        match self.strategy {
            WriteStrategy::Libc => {
                let write_fn = self.declare_write(module);
                let stdout = i32_ty.const_int(STDOUT, false);
                builder.build_call(write_fn, &[stdout.into(), ptr.into(), len.into()], "")?;
            }
            WriteStrategy::LinuxSyscall => {
                let ptr_ty = self.context.ptr_type(AddressSpace::default());
                let asm_ty = i64_ty.fn_type(
                    &[i64_ty.into(), i64_ty.into(), ptr_ty.into(), i64_ty.into()],
                    false,
                );
                let asm = self.context.create_inline_asm(
                    asm_ty,
                    "syscall".to_string(),
                    "=r,{rax},{rdi},{rsi},{rdx}".to_string(),
                    true,
                    false,
                    None,
                    false,
                );
                let args: [BasicMetadataValueEnum<'ctx>; 4] = [
                    i64_ty.const_int(SYS_WRITE, false).into(),
                    i64_ty.const_int(STDOUT, false).into(),
                    ptr.into(),
                    len.into(),
                ];
                builder.build_indirect_call(asm_ty, asm, &args, "")?;
            }
        }
        Ok(())
    }

    /// Call `printf` with already-lowered arguments.
    pub fn build_printf(
        &mut self,
        builder: &Builder<'ctx>,
        module: &Module<'ctx>,
        args: &[BasicMetadataValueEnum<'ctx>],
    ) -> Result<IntValue<'ctx>> {
        let printf = self.declare_printf(module);
        let call = builder.build_call(printf, args, "printf")?;
        Ok(call
            .try_as_basic_value()
            .basic()
            .map(|v| v.into_int_value())
            .unwrap_or_else(|| self.context.i32_type().const_zero()))
    }
}

impl<'ctx> CodeGenerator<'ctx> {
    pub(crate) fn lower_builtin_call(
        &mut self,
        builtin: Builtin,
        args: &[Expr],
        span: Span,
    ) -> Result<Value<'ctx>> {
        debug!(builtin = builtin.name(), args = args.len(), "lowering builtin call");
        match builtin {
            Builtin::Print => {
                if args.len() != 1 {
                    return Err(CodegenErrorKind::ArityMismatch {
                        callee: builtin.name().to_string(),
                        expected: 1,
                        found: args.len(),
                    }
                    .at(span));
                }
                let record = self.lower_string_arg(&args[0], builtin)?;
                let len = self
                    .builder
                    .build_extract_value(record, 0, "str.len")?
                    .into_int_value();
                let ptr = self.string_ptr(record)?;
                self.builtins
                    .build_write(&self.builder, &self.module, ptr, len)?;
                Ok(Value::void())
            }
            Builtin::Printf => {
                let Some((format, rest)) = args.split_first() else {
                    return Err(CodegenErrorKind::ArityMismatch {
                        callee: builtin.name().to_string(),
                        expected: 1,
                        found: 0,
                    }
                    .at(span));
                };
                // Only the data pointer is forwarded; printf reads up to the NUL.
                let format = self.lower_string_arg(format, builtin)?;
                let format_ptr = self.string_ptr(format)?;
                let mut call_args: Vec<BasicMetadataValueEnum<'ctx>> = vec![format_ptr.into()];
                for arg in rest {
                    call_args.push(self.lower_variadic_arg(arg)?);
                }
                let result = self
                    .builtins
                    .build_printf(&self.builder, &self.module, &call_args)?;
                Ok(Value::new(GoType::Int32, result.into()))
            }
        }
    }

    /// Lower an argument that must be a string record.
    fn lower_string_arg(&mut self, arg: &Expr, builtin: Builtin) -> Result<StructValue<'ctx>> {
        let value = self.lower_expr(arg)?;
        match (value.ty, value.repr) {
            (ValueType::Go(GoType::String), Some(repr)) => Ok(repr.into_struct_value()),
            (ty, _) => Err(CodegenErrorKind::TypeMismatch(format!(
                "`{}` expects a string argument, got {ty}",
                builtin.name()
            ))
            .at(arg.span)),
        }
    }

    fn string_ptr(&self, record: StructValue<'ctx>) -> Result<PointerValue<'ctx>> {
        Ok(self
            .builder
            .build_extract_value(record, 1, "str.ptr")?
            .into_pointer_value())
    }

    fn lower_variadic_arg(&mut self, arg: &Expr) -> Result<BasicMetadataValueEnum<'ctx>> {
        let value = self.lower_expr(arg)?;
        let Some(repr) = value.repr else {
            return Err(CodegenErrorKind::TypeMismatch(
                "void value passed to `Printf`".to_string(),
            )
            .at(arg.span));
        };
        Ok(match value.ty {
            ValueType::Go(GoType::String) => self.string_ptr(repr.into_struct_value())?.into(),
            ValueType::Bool => self
                .builder
                .build_int_z_extend(repr.into_int_value(), self.context.i32_type(), "bool.ext")?
                .into(),
            ty if ty.is_integer() => repr.into(),
            ty => {
                return Err(CodegenErrorKind::TypeMismatch(format!(
                    "cannot pass {ty} value to `Printf`"
                ))
                .at(arg.span));
            }
        })
    }
}
