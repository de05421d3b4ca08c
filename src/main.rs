//! repo-context command-line entry point.

use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use repo_context::Result;
use repo_context::cli::{Cli, execute};
use tracing_subscriber::EnvFilter;

/// Routes logs to stderr so stdout stays clean for the stdio transport.
fn init_logging(debug: bool) {
    let default = if debug {
        "repo_context=debug,info"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .compact()
        .try_init();
}

/// Writes command output followed by a newline; empty output writes nothing.
fn emit(out: &mut impl Write, output: &str) -> Result<()> {
    if !output.is_empty() {
        writeln!(out, "{output}")?;
        out.flush()?;
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let outcome = execute(&cli).and_then(|output| emit(&mut std::io::stdout().lock(), &output));
    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let _ = writeln!(std::io::stderr().lock(), "Error: {e}");
            ExitCode::FAILURE
        }
    }
}
