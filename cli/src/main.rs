use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Once};

use anyhow::Context;
use brisk_core::bytecode::asm::{self, Program};
use brisk_core::config::InterpreterFlags;
use brisk_core::{FunctionValue, Interpreter, Runtime};
use clap::{Args, Parser, Subcommand};

static TRACING_INIT: Once = Once::new();
const LOG_ENV: &str = "BRISK_LOG";
const DEFAULT_LOG_FILTER: &str = "warn,brisk::runtime=warn,brisk_cli=info";
const TRACE_LOG_FILTER: &str = "warn,brisk::trace=trace,brisk::dispatch=debug";
/// Native stack granted to each nested interpreted call on the worker thread.
const NATIVE_STACK_PER_CALL: usize = 64 * 1024;
const NATIVE_STACK_BASE: usize = 2 * 1024 * 1024;

#[derive(Debug, Parser)]
#[command(
    name = "brisk",
    author,
    version,
    about = "Assemble and run register bytecode",
    long_about = None
)]
struct CliArgs {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Assemble FILE and run its `main` function.
    Run(RunArgs),
    /// Assemble FILE and print the decoded instructions of every function.
    Disasm {
        #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
        file: PathBuf,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    #[arg(value_name = "FILE", value_parser = parse_sanitized_path)]
    file: PathBuf,

    /// Fire the bytecode Entry/Exit hooks and log them to stderr
    #[arg(long)]
    trace: bool,

    /// Record the Entry/Exit hooks and write them as JSON to this file
    #[arg(long, value_name = "OUT", value_parser = parse_sanitized_path)]
    trace_json: Option<PathBuf>,

    /// Check native stack balance across every call
    #[arg(long)]
    debug_code: bool,

    /// Machine stack size in words
    #[arg(long, value_name = "WORDS")]
    stack_size: Option<usize>,

    /// Maximum number of nested interpreted calls
    #[arg(long, value_name = "N")]
    max_call_depth: Option<usize>,

    /// TOML file with interpreter flags
    #[arg(long, value_name = "FILE", value_parser = parse_sanitized_path)]
    config: Option<PathBuf>,
}

fn read_file_content(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read file '{}'", path.display()))
}

fn sanitize_path(raw: &str) -> anyhow::Result<PathBuf> {
    let p = Path::new(raw);

    for comp in p.components() {
        if matches!(comp, Component::ParentDir) {
            return Err(anyhow::anyhow!(
                "Parent directory components ('..') are not allowed in file paths."
            ));
        }
    }

    Ok(p.to_path_buf())
}

fn parse_sanitized_path(raw: &str) -> Result<PathBuf, String> {
    sanitize_path(raw).map_err(|e| e.to_string())
}

fn init_tracing(trace: bool) {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        use tracing_subscriber::fmt;

        let filter_expr = std::env::var(LOG_ENV).ok().or_else(|| std::env::var("RUST_LOG").ok());

        let builder = fmt().with_writer(std::io::stderr);

        let fallback = if trace { TRACE_LOG_FILTER } else { DEFAULT_LOG_FILTER };
        let builder = match filter_expr.and_then(|expr| EnvFilter::try_new(expr).ok()) {
            Some(filter) => builder.with_env_filter(filter),
            None => builder.with_env_filter(fallback),
        };

        let _ = builder.try_init();
    });
}

/// Config file first, then environment, then command-line switches.
fn resolve_flags(args: &RunArgs) -> anyhow::Result<InterpreterFlags> {
    let mut flags = match &args.config {
        Some(path) => {
            let raw = read_file_content(path)?;
            InterpreterFlags::from_toml_str(&raw).with_context(|| format!("Failed to load config '{}'", path.display()))?
        }
        None => InterpreterFlags::default(),
    };
    flags.apply_env();
    if args.trace || args.trace_json.is_some() {
        flags = flags.with_trace_ignition(true);
    }
    if args.debug_code {
        flags = flags.with_debug_code(true);
    }
    if let Some(size) = args.stack_size {
        let reserve = flags.stack_reserve.min(size / 4);
        flags = flags.with_stack(size, reserve);
    }
    if let Some(depth) = args.max_call_depth {
        flags = flags.with_max_call_depth(depth);
    }
    flags.validate()?;
    Ok(flags)
}

fn load_program(path: &Path, flags: &InterpreterFlags) -> anyhow::Result<Program> {
    let source = read_file_content(path)?;
    asm::assemble(&source, flags.target).with_context(|| format!("Failed to assemble '{}'", path.display()))
}

fn entry_function(program: &Program) -> anyhow::Result<Arc<FunctionValue>> {
    program
        .entry()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("No `{}` function defined", asm::ENTRY_FUNCTION))
}

/// Native stack for the interpreter thread, large enough for the deepest call
/// chain `flags` allows.
fn worker_stack_size(flags: &InterpreterFlags) -> usize {
    flags
        .max_call_depth
        .saturating_mul(NATIVE_STACK_PER_CALL)
        .saturating_add(NATIVE_STACK_BASE)
}

fn run_file(args: &RunArgs) -> anyhow::Result<()> {
    let flags = resolve_flags(args)?;
    let stack_size = worker_stack_size(&flags);
    std::thread::scope(|scope| {
        let worker = std::thread::Builder::new()
            .name("brisk-main".to_string())
            .stack_size(stack_size)
            .spawn_scoped(scope, move || execute_file(args, flags))
            .context("Failed to spawn interpreter thread")?;
        worker
            .join()
            .map_err(|_| anyhow::anyhow!("Interpreter thread panicked"))?
    })
}

fn execute_file(args: &RunArgs, flags: InterpreterFlags) -> anyhow::Result<()> {
    let program = load_program(&args.file, &flags)?;
    let entry = entry_function(&program)?;

    let mut runtime = Runtime::new(flags)?;
    runtime.tracer_mut().set_recording(args.trace_json.is_some());
    tracing::debug!(file = %args.file.display(), functions = program.functions().len(), "running");

    let result = Interpreter::call(&mut runtime, &entry, &[]);

    for line in runtime.take_output() {
        println!("{}", line);
    }
    if let Some(path) = &args.trace_json {
        let json = runtime.tracer().to_json()?;
        fs::write(path, json).with_context(|| format!("Failed to write trace '{}'", path.display()))?;
    }

    let value = result.with_context(|| format!("Execution of '{}' failed", args.file.display()))?;
    println!("{}", value);
    Ok(())
}

fn disasm_file(path: &Path) -> anyhow::Result<()> {
    let flags = InterpreterFlags::from_env();
    let program = load_program(path, &flags)?;
    for function in program.functions() {
        let text = asm::disassemble(function.bytecode(), flags.target)?;
        print!("{}", text);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let CliArgs { command } = CliArgs::parse();

    match command {
        Commands::Run(args) => {
            init_tracing(args.trace);
            run_file(&args)
        }
        Commands::Disasm { file } => {
            init_tracing(false);
            disasm_file(&file)
        }
    }
}

#[cfg(test)]
mod main_test;
