mod compile;
mod emit;
mod jit;

pub use compile::{
    compile_file, compile_source, emit_ir, lower_source, CompileError, CompileOptions, EmitKind,
};
pub use jit::{run_file, run_source};
