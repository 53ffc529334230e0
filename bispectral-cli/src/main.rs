//! CLI entry point for bispectral co-clustering.
//!
//! Parses arguments with clap, runs both clustering passes, writes the JSON
//! results, renders a summary to stdout, and maps errors to exit codes:
//! `2` for rejected parameters, `1` for every other failure.
//! Logging is initialised first so every later step emits structured
//! diagnostics via `tracing`.

use std::io::{self, BufWriter, Write};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use bispectral_cli::{
    cli::{Cli, CliError, render_summary, run_cli},
    logging::{self, LoggingError},
};
use bispectral_core::BispectralError;
use tracing::{error, field};

/// Parse CLI arguments, execute the command, render the summary, and flush the
/// output stream.
fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let summary = run_cli(cli).context("failed to execute command")?;
    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    render_summary(&summary, &mut writer).context("failed to render summary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn main() -> ExitCode {
    if let Err(err) = logging::init_logging() {
        report_logging_init_error(&err);
        return ExitCode::FAILURE;
    }

    let Err(err) = try_main() else {
        return ExitCode::SUCCESS;
    };

    let cli_error = err.downcast_ref::<CliError>();
    let core_error = cli_error.and_then(|error| match error {
        CliError::Core(core) => Some(core),
        _ => None,
    });
    let code_field = core_error.map(|core| field::display(core.code().as_str()));
    let mapping_code_field = core_error
        .and_then(BispectralError::mapping_code)
        .map(|code| field::display(code.as_str()));

    error!(
        error = %format!("{err:#}"),
        code = code_field,
        mapping_code = mapping_code_field,
        "command execution failed"
    );
    ExitCode::from(cli_error.map_or(CliError::FAILURE_EXIT_STATUS, CliError::exit_status))
}

#[expect(
    clippy::print_stderr,
    reason = "Emit one-off diagnostic before tracing is initialized"
)]
fn report_logging_init_error(err: &LoggingError) {
    eprintln!("failed to initialize logging: {err}");
}
