//! Slang CLI
//!
//! Runs Slang programs from files or the command line, and hosts the REPL.

mod config;
mod repl;

use clap::{Args, CommandFactory, Parser as ClapParser, Subcommand};
use clap_complete::{Shell, generate};
use slang_core::{Stack, take_diagnostics};
use slang_runtime::{Interpreter, report};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

#[derive(ClapParser)]
#[command(name = "slang")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Slang - a concatenative language with cooperative processes", long_about = None)]
struct Cli {
    #[command(flatten)]
    runtime: RuntimeArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct RuntimeArgs {
    /// Runtime configuration file (TOML)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Fail on unresolved words instead of pushing nil
    #[arg(long, global = true)]
    strict: bool,

    /// Abort after this many scheduler turns
    #[arg(long, global = true, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    max_turns: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a .slang source file
    Run {
        /// Input source file
        file: PathBuf,
    },

    /// Evaluate a program given on the command line
    Eval {
        /// Program text
        code: String,
    },

    /// Start an interactive session
    Repl,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Diagnostics are printed after each evaluation, so their `warn!` mirror in
/// slang_core is off unless `SLANG_LOG` asks for it.
fn init_logging() {
    let filter = EnvFilter::try_from_env("SLANG_LOG")
        .unwrap_or_else(|_| EnvFilter::new("warn,slang_core=error"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        run_completions(shell);
        return;
    }

    let interp = match build_interpreter(&cli.runtime) {
        Ok(interp) => interp,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let code = match cli.command {
        Commands::Run { file } => run_file(&interp, &file),
        Commands::Eval { code } => run_source(&interp, &code),
        Commands::Repl => match repl::run(interp) {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    report::emit_report();
    process::exit(code);
}

fn build_interpreter(args: &RuntimeArgs) -> Result<Interpreter, String> {
    let overrides = config::Overrides {
        strict: args.strict,
        max_turns: args.max_turns,
    };
    let config = config::resolve(args.config.as_deref(), overrides)?;
    Ok(Interpreter::with_config(config))
}

fn run_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "slang", &mut io::stdout());
}

fn run_file(interp: &Interpreter, path: &Path) -> i32 {
    match fs::read_to_string(path) {
        Ok(source) => run_source(interp, &source),
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            1
        }
    }
}

/// Evaluate, print the final stack, and map the outcome to an exit code
fn run_source(interp: &Interpreter, source: &str) -> i32 {
    let result = interp.eval(source);
    for diagnostic in take_diagnostics() {
        eprintln!("warning: {}", diagnostic);
    }
    match result {
        Ok(stack) => {
            print_final(&stack);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

fn print_final(stack: &Stack) {
    if !stack.is_empty() {
        println!("{}", stack);
    }
}
