use inkwell::basic_block::BasicBlock;
use inkwell::types::BasicTypeEnum;
use inkwell::values::{FunctionValue, PointerValue};
use tracing::debug;

use nanogo_frontend::ast::{FuncDecl, Span};

use crate::builtins::Builtin;
use crate::error::{CodegenErrorKind, Result};
use crate::symbols::FunctionSymbol;
use crate::types::GoType;
use crate::value::Value;
use crate::{CodeGenerator, FunctionState};

/// A block with no predecessors: the join after branches that all returned,
/// the exit of a `for` without condition, or a `dead` block.
fn is_unreachable(block: BasicBlock<'_>, function: FunctionValue<'_>) -> bool {
    function.get_first_basic_block() != Some(block) && block.get_first_use().is_none()
}

impl<'ctx> CodeGenerator<'ctx> {
    /// Declaration pass: resolve the signature, add the LLVM function and
    /// record it in the symbol table.
    pub(crate) fn declare_function(&mut self, decl: &FuncDecl) -> Result<()> {
        let name = &decl.name.name;
        if Builtin::from_name(name).is_some() {
            return Err(CodegenErrorKind::DuplicateFunction(name.clone()).at(decl.name.span));
        }

        let params = decl
            .params
            .iter()
            .map(|p| self.registry.lookup(&p.ty))
            .collect::<Result<Vec<GoType>>>()?;
        let ret = match decl.results.as_slice() {
            [] => None,
            [ty] => Some(self.registry.lookup(ty)?),
            _ => {
                return Err(
                    CodegenErrorKind::UnknownConstruct("multi-value result".to_string())
                        .at(decl.span),
                );
            }
        };

        let is_entry = *name == self.options.entry_point;
        let fn_type = if is_entry {
            if !params.is_empty() || ret.is_some() {
                return Err(CodegenErrorKind::TypeMismatch(format!(
                    "entry point `{name}` must take no parameters and return nothing"
                ))
                .at(decl.span));
            }
            // The C runtime expects `int main(void)`.
            self.context.i32_type().fn_type(&[], false)
        } else {
            self.registry.fn_type(&params, ret)
        };

        if self.symbols.get(name).is_some() {
            return Err(CodegenErrorKind::DuplicateFunction(name.clone()).at(decl.name.span));
        }
        let function = self.module.add_function(name, fn_type, None);
        for (i, param) in decl.params.iter().enumerate() {
            if let Some(value) = function.get_nth_param(i as u32) {
                value.set_name(&param.name.name);
            }
        }

        debug!(function = %name, params = params.len(), ?ret, "declared function");
        self.symbols.declare(FunctionSymbol {
            name: name.clone(),
            function,
            params,
            ret,
            is_entry,
        });
        Ok(())
    }

    /// Body pass for one declared function.
    pub(crate) fn lower_function(&mut self, decl: &FuncDecl) -> Result<()> {
        let name = &decl.name.name;
        let symbol = self
            .symbols
            .get(name)
            .cloned()
            .ok_or_else(|| CodegenErrorKind::UnboundIdentifier(name.clone()).at(decl.name.span))?;
        let function = symbol.function;
        debug!(function = %name, "lowering body");

        let entry = self.context.append_basic_block(function, "entry");
        self.builder.position_at_end(entry);
        self.current = Some(FunctionState {
            function,
            ret: symbol.ret,
            is_entry: symbol.is_entry,
        });
        self.scopes.push();

        // Parameters live in their own cells so they can be reassigned.
        for (i, (param, ty)) in decl.params.iter().zip(&symbol.params).enumerate() {
            let Some(incoming) = function.get_nth_param(i as u32) else {
                continue;
            };
            let cell = self.build_entry_alloca(self.registry.llvm_type(*ty), &param.name.name)?;
            self.builder.build_store(cell, incoming)?;
            self.scopes.bind(param.name.name.clone(), Value::cell(*ty, cell));
        }

        self.lower_block(&decl.body)?;
        self.finish_function(decl.span)?;

        debug!(
            function = %name,
            depth = self.scopes.depth(),
            locals = ?self.scopes.innermost_names().collect::<Vec<_>>(),
            "closing function scope"
        );
        self.scopes.pop();
        self.current = None;
        self.check_terminators(function, decl.span)
    }

    /// Close the final block if the body left it open. A function with a
    /// result may only fall off its end from a block nothing branches to.
    fn finish_function(&mut self, span: Span) -> Result<()> {
        let state = self.function_state()?;
        let Some(block) = self.builder.get_insert_block() else {
            return Ok(());
        };
        if block.get_terminator().is_some() {
            return Ok(());
        }
        if state.is_entry {
            let zero = self.context.i32_type().const_zero();
            self.builder.build_return(Some(&zero))?;
        } else if state.ret.is_none() {
            self.builder.build_return(None)?;
        } else if is_unreachable(block, state.function) {
            self.builder.build_unreachable()?;
        } else {
            return Err(CodegenErrorKind::TypeMismatch("missing return".to_string()).at(span));
        }
        Ok(())
    }

    /// Allocate a cell in the entry block so every alloca dominates its uses
    /// regardless of where the declaration appears.
    pub(crate) fn build_entry_alloca(
        &self,
        ty: BasicTypeEnum<'ctx>,
        name: &str,
    ) -> Result<PointerValue<'ctx>> {
        let function = self.function_state()?.function;
        let builder = self.context.create_builder();
        let entry = function.get_first_basic_block().ok_or_else(|| {
            CodegenErrorKind::UnknownConstruct("function without entry block".to_string())
                .at(Default::default())
        })?;
        match entry.get_first_instruction() {
            Some(first) => builder.position_before(&first),
            None => builder.position_at_end(entry),
        }
        Ok(builder.build_alloca(ty, name)?)
    }

    pub(crate) fn function_state(&self) -> Result<FunctionState<'ctx>> {
        self.current.ok_or_else(|| {
            CodegenErrorKind::UnknownConstruct("statement outside a function".to_string())
                .at(Default::default())
        })
    }
}
