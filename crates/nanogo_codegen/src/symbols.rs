use std::collections::HashMap;

use inkwell::values::FunctionValue;

use crate::types::GoType;

/// A package-level function as seen by call sites.
#[derive(Debug, Clone)]
pub struct FunctionSymbol<'ctx> {
    pub name: String,
    pub function: FunctionValue<'ctx>,
    pub params: Vec<GoType>,
    /// Declared result; `None` for procedures and the entry point.
    pub ret: Option<GoType>,
    /// The entry point returns an `i32` status that callers never see.
    pub is_entry: bool,
}

/// Name → function mapping, filled before any body is lowered and never
/// changed afterwards.
#[derive(Debug, Default)]
pub struct SymbolTable<'ctx> {
    functions: HashMap<String, FunctionSymbol<'ctx>>,
}

impl<'ctx> SymbolTable<'ctx> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a symbol; returns `false` if the name was already taken.
    pub fn declare(&mut self, symbol: FunctionSymbol<'ctx>) -> bool {
        if self.functions.contains_key(&symbol.name) {
            return false;
        }
        self.functions.insert(symbol.name.clone(), symbol);
        true
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSymbol<'ctx>> {
        self.functions.get(name)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}
