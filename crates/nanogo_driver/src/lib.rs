//! Compilation pipeline for nanogo: source text in, LLVM artefacts or a
//! process status out.

pub mod linker;
pub mod pipeline;

pub use pipeline::{
    compile_file, compile_source, emit_ir, lower_source, run_file, run_source, CompileError,
    CompileOptions, EmitKind,
};
