use std::path::PathBuf;

use inkwell::module::Module;
use inkwell::passes::PassBuilderOptions;
use inkwell::targets::{
    CodeModel, FileType, InitializationConfig, RelocMode, Target, TargetMachine,
};
use inkwell::OptimizationLevel;
use tracing::{debug, info, warn};

use super::compile::{CompileError, CompileOptions, EmitKind};

/// Symbol the C runtime starts a linked binary at.
const C_ENTRY: &str = "main";

/// A target machine for the host.
pub(crate) fn target_machine(opt_level: OptimizationLevel) -> Result<TargetMachine, CompileError> {
    Target::initialize_native(&InitializationConfig::default()).map_err(CompileError::Target)?;

    let target_triple = TargetMachine::get_default_triple();
    let target =
        Target::from_triple(&target_triple).map_err(|e| CompileError::Target(e.to_string()))?;

    let cpu = TargetMachine::get_host_cpu_name();
    let features = TargetMachine::get_host_cpu_features();

    target
        .create_target_machine(
            &target_triple,
            cpu.to_str().unwrap_or("generic"),
            features.to_str().unwrap_or(""),
            opt_level,
            RelocMode::PIC,
            CodeModel::Default,
        )
        .ok_or_else(|| CompileError::Target("failed to create target machine".into()))
}

/// Run LLVM's stock pipeline for `opt_level`. `None` leaves the module untouched.
pub(crate) fn optimize(
    module: &Module<'_>,
    machine: &TargetMachine,
    opt_level: OptimizationLevel,
) -> Result<(), CompileError> {
    let passes = match opt_level {
        OptimizationLevel::None => return Ok(()),
        OptimizationLevel::Less => "default<O1>",
        OptimizationLevel::Default => "default<O2>",
        OptimizationLevel::Aggressive => "default<O3>",
    };
    debug!(passes, "running pass pipeline");
    module
        .run_passes(passes, machine, PassBuilderOptions::create())
        .map_err(|e| CompileError::Emit(e.to_string()))
}

/// Write the artefact selected by `options.emit` to `options.output`.
pub(crate) fn emit(module: &Module<'_>, options: &CompileOptions) -> Result<(), CompileError> {
    let machine = target_machine(options.opt_level)?;
    optimize(module, &machine, options.opt_level)?;

    match options.emit {
        EmitKind::Ir => {
            module
                .print_to_file(&options.output)
                .map_err(|e| CompileError::Emit(e.to_string()))?;
            info!(output = %options.output.display(), "wrote LLVM IR");
        }
        EmitKind::Object => {
            write_object(module, &machine, &options.output)?;
            info!(output = %options.output.display(), "wrote object");
        }
        EmitKind::Binary => {
            let entry = &options.codegen.entry_point;
            if entry != C_ENTRY {
                return Err(CompileError::NonMainEntry(entry.clone()));
            }
            if module.get_function(entry).is_none() {
                return Err(CompileError::MissingEntry(entry.clone()));
            }

            let mut obj_path = options.output.clone().into_os_string();
            obj_path.push(".o");
            let obj_path = PathBuf::from(obj_path);
            write_object(module, &machine, &obj_path)?;

            let linked = crate::linker::link(&obj_path, &options.output);
            if let Err(e) = std::fs::remove_file(&obj_path) {
                warn!(object = %obj_path.display(), "could not remove intermediate object: {e}");
            }
            linked?;
            info!(output = %options.output.display(), "linked binary");
        }
    }
    Ok(())
}

fn write_object(
    module: &Module<'_>,
    machine: &TargetMachine,
    path: &std::path::Path,
) -> Result<(), CompileError> {
    module.set_triple(&machine.get_triple());
    module.set_data_layout(&machine.get_target_data().get_data_layout());
    machine
        .write_to_file(module, FileType::Object, path)
        .map_err(|e| CompileError::Emit(e.to_string()))
}
