use std::path::{Path, PathBuf};

use inkwell::context::Context;
use inkwell::module::Module;
use inkwell::OptimizationLevel;
use thiserror::Error;
use tracing::{debug, info};

use nanogo_codegen::{CodeGenerator, CodegenError, CodegenOptions};
use nanogo_frontend::{parse_source, ParseError};

use super::emit;

/// What the pipeline writes to `CompileOptions::output`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmitKind {
    /// Textual LLVM IR.
    Ir,
    /// A relocatable object for the host target.
    Object,
    /// A native executable linked with `cc`.
    #[default]
    Binary,
}

/// Compilation options.
#[derive(Debug, Clone)]
pub struct CompileOptions {
    /// Optimization level for LLVM passes.
    pub opt_level: OptimizationLevel,
    pub emit: EmitKind,
    /// Output file path.
    pub output: PathBuf,
    pub codegen: CodegenOptions,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            opt_level: OptimizationLevel::Default,
            emit: EmitKind::default(),
            output: PathBuf::from("a.out"),
            codegen: CodegenOptions::default(),
        }
    }
}

/// Errors that can occur during compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("codegen error: {0}")]
    Codegen(#[from] CodegenError),
    #[error("module verification failed: {0}")]
    Verify(String),
    #[error("target error: {0}")]
    Target(String),
    #[error("emit error: {0}")]
    Emit(String),
    #[error("link error: {0}")]
    Link(String),
    #[error("no entry point `{0}`")]
    MissingEntry(String),
    #[error("native binaries start at `main`; entry point `{0}` can only be run or emitted")]
    NonMainEntry(String),
    #[error("JIT error: {0}")]
    Jit(String),
    #[error("{}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<CompileError>,
    },
}

impl CompileError {
    pub(crate) fn in_file(path: &Path, source: CompileError) -> Self {
        CompileError::File {
            path: path.to_path_buf(),
            source: Box::new(source),
        }
    }

    /// The error with any file context peeled off.
    pub fn root(&self) -> &CompileError {
        match self {
            CompileError::File { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Parse, lower and verify one compilation unit.
pub fn lower_source<'ctx>(
    context: &'ctx Context,
    source: &str,
    module_name: &str,
    codegen: &CodegenOptions,
) -> Result<Module<'ctx>, CompileError> {
    let file = parse_source(source)?;
    info!(module = module_name, decls = file.decls.len(), "parsed");

    let module = CodeGenerator::new(context, module_name, codegen.clone()).compile(&file)?;
    module
        .verify()
        .map_err(|e| CompileError::Verify(e.to_string()))?;
    info!(module = module_name, "lowered and verified");
    Ok(module)
}

/// Lower `source` and return its IR text, optimized when `opt_level` asks for it.
pub fn emit_ir(
    source: &str,
    module_name: &str,
    options: &CompileOptions,
) -> Result<String, CompileError> {
    let context = Context::create();
    let module = lower_source(&context, source, module_name, &options.codegen)?;
    if options.opt_level != OptimizationLevel::None {
        let machine = emit::target_machine(options.opt_level)?;
        emit::optimize(&module, &machine, options.opt_level)?;
    }
    Ok(module.print_to_string().to_string())
}

/// Compile source text and write the artefact selected by `options.emit`.
pub fn compile_source(
    source: &str,
    module_name: &str,
    options: &CompileOptions,
) -> Result<(), CompileError> {
    let context = Context::create();
    let module = lower_source(&context, source, module_name, &options.codegen)?;
    emit::emit(&module, options)
}

/// Compile a source file. The module is named after the file stem.
pub fn compile_file(path: &Path, options: &CompileOptions) -> Result<(), CompileError> {
    let module_name = module_name_of(path);
    debug!(path = %path.display(), module = %module_name, "compiling file");
    std::fs::read_to_string(path)
        .map_err(CompileError::from)
        .and_then(|source| compile_source(&source, &module_name, options))
        .map_err(|e| CompileError::in_file(path, e))
}

pub(crate) fn module_name_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "main".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_name_comes_from_stem() {
        assert_eq!(module_name_of(Path::new("dir/hello.go")), "hello");
        assert_eq!(module_name_of(Path::new("")), "main");
    }

    #[test]
    fn file_context_wraps_and_peels() {
        let inner = CompileError::MissingEntry("main".to_string());
        let err = CompileError::in_file(Path::new("prog.go"), inner);
        assert_eq!(err.to_string(), "prog.go: no entry point `main`");
        assert!(matches!(err.root(), CompileError::MissingEntry(name) if name == "main"));
    }

    #[test]
    fn codegen_errors_surface_with_position() {
        let context = Context::create();
        let src = "package main\n\nfunc main() {\n\tx = 1\n}\n";
        let err = lower_source(&context, src, "t", &CodegenOptions::default()).unwrap_err();
        let CompileError::Codegen(inner) = &err else {
            panic!("expected codegen error, got {err}");
        };
        assert_eq!(inner.span.line, 4);
    }
}
