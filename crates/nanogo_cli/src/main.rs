use std::path::{Path, PathBuf};
use std::io::Write;
use std::process;

use clap::Parser;
use inkwell::OptimizationLevel;
use tracing::debug;

use nanogo_codegen::{CodegenOptions, WriteStrategy};
use nanogo_driver::{compile_file, emit_ir, run_file, CompileError, CompileOptions, EmitKind};

#[derive(Parser, Debug)]
#[command(
    name = "nanogo",
    version,
    about = "nanogo: a Go subset compiled to native code via LLVM",
    after_help = "`Print` calls libc `write(1, ptr, len)` by default.\n\
                  --syscall-write emits the raw x86-64 Linux `syscall` instead."
)]
struct Cli {
    /// Input Go source file.
    input: PathBuf,

    /// Output file path.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Optimization level (0-3).
    #[arg(short = 'O', long = "opt-level", default_value = "0")]
    opt_level: u8,

    /// Emit LLVM IR text instead of a binary. Printed to stdout without `-o`.
    #[arg(long, conflicts_with = "emit_obj")]
    emit_ir: bool,

    /// Emit an object file instead of a binary.
    #[arg(long)]
    emit_obj: bool,

    /// Run the program in the JIT instead of writing anything.
    #[arg(short, long, conflicts_with_all = ["emit_ir", "emit_obj", "output"])]
    run: bool,

    /// Name of the function that begins execution. Binaries require `main`.
    #[arg(long, default_value = "main")]
    entry: String,

    /// Lower `Print` to a raw Linux `syscall` instead of libc `write`.
    #[arg(long)]
    syscall_write: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn setup_logging(verbose: u8, quiet: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(match (quiet, verbose) {
            (true, _) => "error",
            (false, 0) => "warn",
            (false, 1) => "debug",
            (false, _) => "trace",
        })
    });

    let formatter = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_level(true);

    tracing_subscriber::registry()
        .with(formatter)
        .with(filter)
        .init();
}

fn opt_level(level: u8) -> OptimizationLevel {
    match level {
        0 => OptimizationLevel::None,
        1 => OptimizationLevel::Less,
        2 => OptimizationLevel::Default,
        _ => OptimizationLevel::Aggressive,
    }
}

/// Explicit `-o`, else `build/<stem>` with an extension matching the artefact.
fn output_path(cli: &Cli, emit: EmitKind) -> Result<PathBuf, CompileError> {
    if let Some(output) = &cli.output {
        return Ok(output.clone());
    }
    let stem = cli
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let build_dir = Path::new("build");
    std::fs::create_dir_all(build_dir)?;
    let path = build_dir.join(stem);
    Ok(match emit {
        EmitKind::Ir => path.with_extension("ll"),
        EmitKind::Object => path.with_extension("o"),
        EmitKind::Binary => path,
    })
}

fn run(cli: &Cli) -> Result<i32, CompileError> {
    let emit = if cli.emit_ir {
        EmitKind::Ir
    } else if cli.emit_obj {
        EmitKind::Object
    } else {
        EmitKind::Binary
    };
    let mut options = CompileOptions {
        opt_level: opt_level(cli.opt_level),
        emit,
        output: PathBuf::new(),
        codegen: CodegenOptions {
            entry_point: cli.entry.clone(),
            write_strategy: if cli.syscall_write {
                WriteStrategy::LinuxSyscall
            } else {
                WriteStrategy::Libc
            },
        },
    };
    debug!(?options, "resolved options");

    if cli.run {
        return run_file(&cli.input, &options);
    }

    if emit == EmitKind::Ir && cli.output.is_none() {
        let source = std::fs::read_to_string(&cli.input)
            .map_err(|e| CompileError::File {
                path: cli.input.clone(),
                source: Box::new(e.into()),
            })?;
        let module_name = cli
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "main".to_string());
        let ir = emit_ir(&source, &module_name, &options)?;
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(ir.as_bytes())?;
        stdout.flush()?;
        return Ok(0);
    }

    options.output = output_path(cli, emit)?;
    compile_file(&cli.input, &options)?;
    eprintln!("compiled to {}", options.output.display());
    Ok(0)
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(status) => process::exit(status),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
