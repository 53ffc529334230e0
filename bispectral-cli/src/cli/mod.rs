//! Command-line interface orchestration for bispectral co-clustering.
//!
//! The `run` command reads user/hashtag interactions from a JSON-lines file,
//! runs both clustering passes with the spectral oracle, and writes each pass
//! to its own JSON file.

mod commands;

pub use commands::{
    Cli, CliError, CollisionArg, Command, ExecutionSummary, FIRST_PASS_FILE, OverflowArg,
    RunCommand, SECOND_PASS_FILE, render_summary, run_cli,
};

#[cfg(test)]
mod test_helpers;
#[cfg(test)]
mod tests;
