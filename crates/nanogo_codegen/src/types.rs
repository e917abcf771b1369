use std::fmt;

use inkwell::builder::Builder;
use inkwell::context::Context;
use inkwell::module::{Linkage, Module};
use inkwell::types::{BasicMetadataTypeEnum, BasicType, BasicTypeEnum, FunctionType, StructType};
use inkwell::values::{GlobalValue, PointerValue};
use inkwell::AddressSpace;

use nanogo_frontend::ast::TypeExpr;

use crate::error::{CodegenErrorKind, Result};

/// The fixed catalogue of source-level types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GoType {
    Int32,
    Int64,
    /// Record `{ i64 len, ptr data }`.
    String,
}

impl GoType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "int32" => Some(GoType::Int32),
            "int64" => Some(GoType::Int64),
            "string" => Some(GoType::String),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            GoType::Int32 => "int32",
            GoType::Int64 => "int64",
            GoType::String => "string",
        }
    }

    /// Native size in bytes, as seen by the ABI.
    pub fn size(&self) -> u64 {
        match self {
            GoType::Int32 => 4,
            GoType::Int64 => 8,
            GoType::String => 16,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, GoType::Int32 | GoType::Int64)
    }

    pub fn bit_width(&self) -> Option<u32> {
        match self {
            GoType::Int32 => Some(32),
            GoType::Int64 => Some(64),
            GoType::String => None,
        }
    }
}

impl fmt::Display for GoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type of a lowered value: a catalogue type, or one of the two internal
/// shapes that never appear in a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Go(GoType),
    /// Single-bit comparison result.
    Bool,
    /// Result of a call to a procedure.
    Void,
}

impl ValueType {
    pub fn as_go(&self) -> Option<GoType> {
        match self {
            ValueType::Go(ty) => Some(*ty),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ValueType::Go(ty) if ty.is_integer())
    }
}

impl From<GoType> for ValueType {
    fn from(ty: GoType) -> Self {
        ValueType::Go(ty)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Go(ty) => ty.fmt(f),
            ValueType::Bool => f.write_str("bool"),
            ValueType::Void => f.write_str("void"),
        }
    }
}

/// Registry that maps [`GoType`] values to LLVM types for a given context.
///
/// Created once per module. It also owns the shared empty-string constant
/// used by the string zero value.
pub struct TypeRegistry<'ctx> {
    context: &'ctx Context,
    string_type: StructType<'ctx>,
    empty_string: Option<GlobalValue<'ctx>>,
}

impl<'ctx> TypeRegistry<'ctx> {
    pub fn new(context: &'ctx Context) -> Self {
        let string_type = context.opaque_struct_type("nanogo.string");
        string_type.set_body(
            &[
                context.i64_type().into(),
                context.ptr_type(AddressSpace::default()).into(),
            ],
            false,
        );
        Self {
            context,
            string_type,
            empty_string: None,
        }
    }

    /// Resolve a written type name.
    pub fn lookup(&self, ty: &TypeExpr) -> Result<GoType> {
        GoType::from_name(&ty.name)
            .ok_or_else(|| CodegenErrorKind::UnknownType(ty.name.clone()).at(ty.span))
    }

    pub fn llvm_type(&self, ty: GoType) -> BasicTypeEnum<'ctx> {
        match ty {
            GoType::Int32 => self.context.i32_type().into(),
            GoType::Int64 => self.context.i64_type().into(),
            GoType::String => self.string_type.into(),
        }
    }

    /// Build a function type from a source signature. A missing result is
    /// an LLVM `void` function.
    pub fn fn_type(&self, params: &[GoType], ret: Option<GoType>) -> FunctionType<'ctx> {
        let param_types: Vec<BasicMetadataTypeEnum<'ctx>> =
            params.iter().map(|p| self.llvm_type(*p).into()).collect();
        match ret {
            None => self.context.void_type().fn_type(&param_types, false),
            Some(ret) => self.llvm_type(ret).fn_type(&param_types, false),
        }
    }

    /// String record: length first, then the byte pointer.
    pub fn string_type(&self) -> StructType<'ctx> {
        self.string_type
    }

    /// The shared `""` constant every zero string points at.
    pub fn empty_string(&mut self, module: &Module<'ctx>) -> GlobalValue<'ctx> {
        if let Some(global) = self.empty_string {
            return global;
        }
        let init = self.context.const_string(b"", true);
        let global = module.add_global(init.get_type(), None, "str.empty");
        global.set_initializer(&init);
        global.set_constant(true);
        global.set_linkage(Linkage::Private);
        self.empty_string = Some(global);
        global
    }

    /// Store the zero value of `ty` into the storage cell `cell`.
    pub fn build_zero(
        &mut self,
        builder: &Builder<'ctx>,
        module: &Module<'ctx>,
        cell: PointerValue<'ctx>,
        ty: GoType,
    ) -> Result<()> {
        match ty {
            GoType::Int32 => {
                builder.build_store(cell, self.context.i32_type().const_zero())?;
            }
            GoType::Int64 => {
                builder.build_store(cell, self.context.i64_type().const_zero())?;
            }
            GoType::String => {
                let empty = self.empty_string(module).as_pointer_value();
                let len_ptr = builder.build_struct_gep(self.string_type, cell, 0, "zero.len")?;
                let data_ptr = builder.build_struct_gep(self.string_type, cell, 1, "zero.data")?;
                builder.build_store(len_ptr, self.context.i64_type().const_zero())?;
                builder.build_store(data_ptr, empty)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalogue_lookup() {
        let context = Context::create();
        let registry = TypeRegistry::new(&context);
        assert_eq!(registry.lookup(&TypeExpr::named("int32")).unwrap(), GoType::Int32);
        assert_eq!(registry.lookup(&TypeExpr::named("int64")).unwrap(), GoType::Int64);
        assert_eq!(registry.lookup(&TypeExpr::named("string")).unwrap(), GoType::String);

        let err = registry.lookup(&TypeExpr::named("float64")).unwrap_err();
        assert!(matches!(err.kind, CodegenErrorKind::UnknownType(ref name) if name == "float64"));
        assert!(registry.lookup(&TypeExpr::named("int")).is_err());
    }

    #[test]
    fn native_sizes() {
        assert_eq!(GoType::Int32.size(), 4);
        assert_eq!(GoType::Int64.size(), 8);
        assert_eq!(GoType::String.size(), 16);
    }

    #[test]
    fn string_record_layout() {
        let context = Context::create();
        let registry = TypeRegistry::new(&context);
        let st = registry.string_type();
        assert_eq!(st.count_fields(), 2);
        assert!(st.get_field_type_at_index(0).unwrap().is_int_type());
        assert!(st.get_field_type_at_index(1).unwrap().is_pointer_type());
        assert_eq!(
            st.get_field_type_at_index(0).unwrap().into_int_type().get_bit_width(),
            64
        );
    }

    #[test]
    fn void_result_builds_void_function() {
        let context = Context::create();
        let registry = TypeRegistry::new(&context);
        let fn_ty = registry.fn_type(&[GoType::Int32, GoType::String], None);
        assert!(fn_ty.get_return_type().is_none());
        assert_eq!(fn_ty.count_param_types(), 2);
    }
}
