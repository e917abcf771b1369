use std::path::Path;

use inkwell::context::Context;
use inkwell::execution_engine::JitFunction;
use inkwell::targets::{InitializationConfig, Target};
use tracing::info;

use super::compile::{lower_source, module_name_of, CompileError, CompileOptions};

/// Signature of the lowered entry point: `int main(void)`.
type EntryFn = unsafe extern "C" fn() -> i32;

/// Lower `source` and execute its entry point in-process. Output written by
/// the program goes to this process's stdout.
pub fn run_source(
    source: &str,
    module_name: &str,
    options: &CompileOptions,
) -> Result<i32, CompileError> {
    Target::initialize_native(&InitializationConfig::default()).map_err(CompileError::Target)?;

    let context = Context::create();
    let module = lower_source(&context, source, module_name, &options.codegen)?;
    let entry = options.codegen.entry_point.as_str();
    if module.get_function(entry).is_none() {
        return Err(CompileError::MissingEntry(entry.to_string()));
    }

    let engine = module
        .create_jit_execution_engine(options.opt_level)
        .map_err(|e| CompileError::Jit(e.to_string()))?;
    // SAFETY: the entry point is always declared as `i32 ()`.
    let main: JitFunction<'_, EntryFn> = unsafe { engine.get_function(entry) }
        .map_err(|e| CompileError::Jit(e.to_string()))?;

    info!(module = module_name, entry, "running");
    let status = unsafe { main.call() };
    info!(status, "entry point returned");
    Ok(status)
}

pub fn run_file(path: &Path, options: &CompileOptions) -> Result<i32, CompileError> {
    std::fs::read_to_string(path)
        .map_err(CompileError::from)
        .and_then(|source| run_source(&source, &module_name_of(path), options))
        .map_err(|e| CompileError::in_file(path, e))
}
