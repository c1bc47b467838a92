//! mlpy CLI - Binary entry point for the compiler frontend.
//!
//! Two subcommands: `compile` (source to target text plus a diagnostic
//! report) and `run` (compile, then execute the result in the sandbox).
//! Exit codes follow the coordinator's stable mapping (spec §6).

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mlpy_engine::{default_sandbox_limits, CancellationToken, CompileOptions, Coordinator, ExitCode as CoordinatorExitCode};
use mlpy_host::HostRegistry;
use mlpy_sandbox::{SandboxExecutor, WorkerSpec};
use mlpy_types::render_report;

#[derive(Parser)]
#[command(name = "mlpy")]
#[command(about = "Compile and run ML source under the capability-based sandbox")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a source file and print the target text plus diagnostics.
    Compile {
        /// ML source file to compile.
        file: PathBuf,
        /// Write the target source to this path instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Compile a source file and execute it in the sandbox worker.
    Run {
        /// ML source file to compile and run.
        file: PathBuf,
        /// Worker program that installs the `mlpy_runtime` shim and
        /// executes the compiled target source (e.g. a Python interpreter).
        #[arg(long)]
        worker: PathBuf,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::try_new("warn").expect("warn filter is valid"));
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(env_filter).init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile { file, output } => {
            tracing::info!(file = %file.display(), "compiling");
            run_compile(&file, output.as_deref())
        }
        Commands::Run { file, worker } => {
            tracing::info!(file = %file.display(), worker = %worker.display(), "compiling and running");
            let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
            runtime.block_on(run_and_execute(&file, &worker))
        }
    }
}

fn read_source(file: &PathBuf) -> Result<String> {
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

fn run_compile(file: &PathBuf, output: Option<&std::path::Path>) -> Result<ExitCode> {
    let source = read_source(file)?;
    let coordinator = Coordinator::new(HostRegistry::new());
    let mut options = CompileOptions::default();
    options.source_name = file.display().to_string();

    let artifact = coordinator.compile(&source, &options, &CancellationToken::new());
    eprintln!("{}", render_report(&artifact.diagnostics));

    match (&artifact.target_source, output) {
        (Some(target), Some(path)) => {
            std::fs::write(path, target).with_context(|| format!("failed to write {}", path.display()))?;
        }
        (Some(target), None) => println!("{target}"),
        (None, _) => {}
    }

    Ok(exit_code_to_process(mlpy_engine::exit_code(&artifact, None)))
}

async fn run_and_execute(file: &PathBuf, worker: &PathBuf) -> Result<ExitCode> {
    let source = read_source(file)?;
    let coordinator = Coordinator::new(HostRegistry::new());
    let mut options = CompileOptions::default();
    options.source_name = file.display().to_string();

    let executor = SandboxExecutor::new(WorkerSpec { program: worker.clone(), args_prefix: Vec::new() });
    let limits = default_sandbox_limits();

    let outcome = coordinator.compile_and_run(&source, &options, &CancellationToken::new(), &executor, &limits).await;
    eprintln!("{}", render_report(&outcome.artifact.diagnostics));

    if let Some(result) = &outcome.sandbox_result {
        print!("{}", result.stdout);
        eprint!("{}", result.stderr);
        if let Some(error) = &result.error {
            eprintln!("sandbox error: {error}");
        }
    }

    Ok(exit_code_to_process(mlpy_engine::exit_code(&outcome.artifact, outcome.sandbox_result.as_ref())))
}

fn exit_code_to_process(code: CoordinatorExitCode) -> ExitCode {
    ExitCode::from(code as u8)
}
