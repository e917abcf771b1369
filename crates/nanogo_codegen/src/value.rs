use inkwell::values::{BasicValueEnum, PointerValue};

use crate::types::{GoType, ValueType};

/// A typed result of one lowering step.
///
/// Plain values carry the computed IR value in `repr`. Storage cells are
/// `addressable`: `repr` is then the cell's pointer and `ty` the type of what
/// it holds. `components` is reserved for multi-value results and is empty
/// for everything lowered today.
#[derive(Debug, Clone)]
pub struct Value<'ctx> {
    pub ty: ValueType,
    pub repr: Option<BasicValueEnum<'ctx>>,
    pub addressable: bool,
    pub components: Vec<Value<'ctx>>,
}

impl<'ctx> Value<'ctx> {
    pub fn new(ty: impl Into<ValueType>, repr: BasicValueEnum<'ctx>) -> Self {
        Self {
            ty: ty.into(),
            repr: Some(repr),
            addressable: false,
            components: Vec::new(),
        }
    }

    pub fn void() -> Self {
        Self {
            ty: ValueType::Void,
            repr: None,
            addressable: false,
            components: Vec::new(),
        }
    }

    /// A storage cell holding a value of type `ty`.
    pub fn cell(ty: GoType, ptr: PointerValue<'ctx>) -> Self {
        Self {
            ty: ValueType::Go(ty),
            repr: Some(ptr.into()),
            addressable: true,
            components: Vec::new(),
        }
    }

    /// The cell pointer, if this value is addressable.
    pub fn as_cell(&self) -> Option<PointerValue<'ctx>> {
        match self.repr {
            Some(BasicValueEnum::PointerValue(ptr)) if self.addressable => Some(ptr),
            _ => None,
        }
    }
}
