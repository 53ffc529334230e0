//! Small helpers shared across CLI tests.
//!
//! The CLI unit tests write temporary JSON-lines inputs and assert error
//! handling. These helpers keep the cases short.

use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use super::commands::run_command;
use super::{Cli, CliError, CollisionArg, OverflowArg, RunCommand, run_cli};

pub(super) fn temp_dir() -> TempDir {
    match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => panic!("failed to create temp dir: {err}"),
    }
}

pub(super) fn create_input_file(dir: &TempDir, name: &str, contents: &str) -> io::Result<PathBuf> {
    let path = dir.path().join(name);
    let mut file = File::create(&path)?;
    file.write_all(contents.as_bytes())?;
    Ok(path)
}

/// One JSON-lines record.
pub(super) fn record(user_id: &str, username: &str, hashtag: &str, weight: u64) -> String {
    format!(
        r#"{{"user_id":"{user_id}","username":"{username}","hashtag":"{hashtag}","weight":{weight}}}"#
    )
}

/// `#c` has a single user and is dropped at `--min-user 2`.
pub(super) fn three_user_input() -> String {
    [
        record("u1", "ada", "#a", 1),
        record("u1", "ada", "#b", 1),
        record("u2", "bob", "#a", 1),
        record("u3", "cy", "#b", 1),
        record("u3", "cy", "#c", 1),
    ]
    .join("\n")
}

/// A `run` command with small defaults writing into `output_dir`.
pub(super) fn run_command_for(input: PathBuf, output_dir: &Path) -> RunCommand {
    RunCommand {
        input,
        min_user: 2,
        clusters: 1,
        seed: 0,
        second_pass_label: None,
        collision: CollisionArg::Overwrite,
        overflow: OverflowArg::Reject,
        max_weight: 65_535,
        output_dir: output_dir.to_path_buf(),
        n_init: 2,
    }
}

pub(super) fn run_cli_expecting_error(cli: Cli, panic_msg: &str) -> CliError {
    match run_cli(cli) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}

pub(super) fn run_command_expecting_error(cmd: RunCommand, panic_msg: &str) -> CliError {
    match run_command(cmd) {
        Ok(_) => panic!("{panic_msg}"),
        Err(err) => err,
    }
}
