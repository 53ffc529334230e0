//! Command implementations and argument parsing for the bispectral CLI.

use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use bispectral_core::{
    BispectralError, ClusterLabel, ClusterResults, CollisionPolicy, Interaction, OverflowPolicy,
    PipelineBuilder, PipelineOutcome, SecondPassSelection, WeightPolicy,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use thiserror::Error;
use tracing::{Span, field, info, instrument};

const DEFAULT_MIN_USER: usize = 10;
const DEFAULT_CLUSTERS: usize = 100;
const DEFAULT_N_INIT: usize = 10;

/// File name of the first-pass results.
pub const FIRST_PASS_FILE: &str = "clustering_results.json";
/// File name of the second-pass results.
pub const SECOND_PASS_FILE: &str = "second_pass_clustering_results.json";

/// Top-level CLI options parsed by [`clap`].
#[derive(Debug, Parser, Clone)]
#[command(
    name = "bispectral",
    about = "Co-cluster users and hashtags with bipartite spectral clustering."
)]
pub struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported CLI commands.
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run both clustering passes over a JSON-lines interaction file.
    Run(RunCommand),
}

/// Options accepted by the `run` command.
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// JSON-lines file with one `{"user_id", "username", "hashtag", "weight"}`
    /// object per line.
    pub input: PathBuf,

    /// Minimum number of distinct users a hashtag needs to be kept.
    #[arg(long = "min-user", default_value_t = DEFAULT_MIN_USER)]
    pub min_user: usize,

    /// Number of clusters for both passes.
    #[arg(long = "clusters", short = 'k', default_value_t = DEFAULT_CLUSTERS)]
    pub clusters: usize,

    /// Seed for the spectral oracle.
    #[arg(long, default_value_t = 0)]
    pub seed: u64,

    /// First-pass label to re-cluster; defaults to the largest cluster.
    #[arg(long = "second-pass-label")]
    pub second_pass_label: Option<u32>,

    /// How repeated user/hashtag pairs combine.
    #[arg(long, value_enum, default_value_t = CollisionArg::Overwrite)]
    pub collision: CollisionArg,

    /// What happens to weights above `--max-weight`.
    #[arg(long, value_enum, default_value_t = OverflowArg::Reject)]
    pub overflow: OverflowArg,

    /// Largest weight a matrix cell may hold.
    #[arg(long = "max-weight", default_value_t = WeightPolicy::DEFAULT_LIMIT)]
    pub max_weight: u32,

    /// Directory receiving the result files.
    #[arg(long = "output-dir", default_value = ".")]
    pub output_dir: PathBuf,

    /// Number of k-means restarts in the spectral oracle.
    #[arg(long = "n-init", default_value_t = DEFAULT_N_INIT)]
    pub n_init: usize,
}

/// Collision policies exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CollisionArg {
    /// Keep the last weight seen for a pair.
    Overwrite,
    /// Sum all weights seen for a pair.
    Accumulate,
}

impl From<CollisionArg> for CollisionPolicy {
    fn from(value: CollisionArg) -> Self {
        match value {
            CollisionArg::Overwrite => Self::Overwrite,
            CollisionArg::Accumulate => Self::Accumulate,
        }
    }
}

/// Overflow policies exposed on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OverflowArg {
    /// Fail the run.
    Reject,
    /// Clamp to the limit with a warning.
    Saturate,
}

impl From<OverflowArg> for OverflowPolicy {
    fn from(value: OverflowArg) -> Self {
        match value {
            OverflowArg::Reject => Self::Reject,
            OverflowArg::Saturate => Self::Saturate,
        }
    }
}

/// Errors surfaced while executing CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// File I/O failed while reading input or writing results.
    #[error("failed to access `{path}`: {source}")]
    Io {
        /// Path that triggered the failure.
        path: PathBuf,
        /// Underlying operating system error.
        #[source]
        source: io::Error,
    },
    /// An input line was not a valid interaction record.
    #[error("`{path}` line {line}: {source}")]
    Parse {
        /// Input file.
        path: PathBuf,
        /// One-based line number.
        line: usize,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// Results could not be serialised.
    #[error("failed to write `{path}`: {source}")]
    Write {
        /// Output file.
        path: PathBuf,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
    /// `--n-init` must be positive.
    #[error("--n-init must be at least 1 (got {got})")]
    InvalidRestarts {
        /// Value supplied on the command line.
        got: usize,
    },
    /// Core pipeline failed.
    #[error(transparent)]
    Core(#[from] BispectralError),
}

impl CliError {
    /// Process exit status for runs rejected by parameter validation.
    pub const CONFIGURATION_EXIT_STATUS: u8 = 2;
    /// Process exit status for every other failure.
    pub const FAILURE_EXIT_STATUS: u8 = 1;

    /// Returns `true` when the run was rejected because of its parameters
    /// rather than its input data or the filesystem.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        match self {
            Self::InvalidRestarts { .. } => true,
            Self::Core(core) => core.is_configuration(),
            Self::Io { .. } | Self::Parse { .. } | Self::Write { .. } => false,
        }
    }

    /// Exit status reported by the `bispectral` binary for this error.
    #[must_use]
    pub const fn exit_status(&self) -> u8 {
        if self.is_configuration() {
            Self::CONFIGURATION_EXIT_STATUS
        } else {
            Self::FAILURE_EXIT_STATUS
        }
    }
}

/// Summarises the outcome of executing a CLI command.
#[derive(Debug, Clone)]
pub struct ExecutionSummary {
    /// Number of interaction records read.
    pub interactions: usize,
    /// Results of both passes.
    pub outcome: PipelineOutcome,
    /// Files written, first pass then second pass.
    pub outputs: Vec<PathBuf>,
}

/// Executes the CLI command represented by `cli`.
///
/// # Errors
/// Returns [`CliError`] when reading, clustering or writing fails.
///
/// # Examples
/// ```
/// # use std::error::Error;
/// # use bispectral_cli::cli::{Cli, CollisionArg, Command, OverflowArg, RunCommand, run_cli};
/// # use tempfile::TempDir;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let dir = TempDir::new()?;
/// let input = dir.path().join("input.jsonl");
/// std::fs::write(
///     &input,
///     concat!(
///         r##"{"user_id":"1","username":"ada","hashtag":"#a","weight":2}"##, "\n",
///         r##"{"user_id":"2","username":"bob","hashtag":"#a","weight":1}"##, "\n",
///     ),
/// )?;
/// let cli = Cli {
///     command: Command::Run(RunCommand {
///         input,
///         min_user: 1,
///         clusters: 1,
///         seed: 0,
///         second_pass_label: None,
///         collision: CollisionArg::Overwrite,
///         overflow: OverflowArg::Reject,
///         max_weight: 65_535,
///         output_dir: dir.path().to_path_buf(),
///         n_init: 1,
///     }),
/// };
/// let summary = run_cli(cli)?;
/// assert_eq!(summary.outcome.first_pass.user_total(), 2);
/// assert!(dir.path().join("clustering_results.json").exists());
/// # Ok(())
/// # }
/// ```
#[instrument(
    name = "cli.run",
    err,
    skip(cli),
    fields(command = field::Empty),
)]
pub fn run_cli(cli: Cli) -> Result<ExecutionSummary, CliError> {
    match cli.command {
        Command::Run(run) => {
            Span::current().record("command", field::display("run"));
            run_command(run)
        }
    }
}

#[instrument(
    name = "cli.execute",
    err,
    skip(command),
    fields(input = field::Empty, k = field::Empty, min_user = field::Empty),
)]
pub(super) fn run_command(command: RunCommand) -> Result<ExecutionSummary, CliError> {
    let span = Span::current();
    span.record("input", field::display(command.input.display()));
    span.record("k", command.clusters);
    span.record("min_user", command.min_user);

    let n_init = NonZeroUsize::new(command.n_init).ok_or(CliError::InvalidRestarts {
        got: command.n_init,
    })?;
    let selection = command
        .second_pass_label
        .map_or(SecondPassSelection::Largest, |label| {
            SecondPassSelection::Label(ClusterLabel::new(label))
        });
    let pipeline = PipelineBuilder::new()
        .with_min_user(command.min_user)
        .with_clusters(command.clusters)
        .with_seed(command.seed)
        .with_second_pass(selection)
        .with_collision_policy(command.collision.into())
        .with_overflow_policy(command.overflow.into())
        .with_weight_limit(command.max_weight)
        .build()?;

    let interactions = read_interactions(&command.input)?;
    let oracle = pipeline.spectral_oracle().with_n_init(n_init);
    let outcome = pipeline.run(&interactions, &oracle)?;

    fs::create_dir_all(&command.output_dir).map_err(|source| CliError::Io {
        path: command.output_dir.clone(),
        source,
    })?;
    let outputs = vec![
        write_results(&command.output_dir.join(FIRST_PASS_FILE), &outcome.first_pass)?,
        write_results(&command.output_dir.join(SECOND_PASS_FILE), &outcome.second_pass)?,
    ];

    info!(
        interactions = interactions.len(),
        selected_label = %outcome.selected_label,
        first_pass_users = outcome.first_pass.user_total(),
        second_pass_users = outcome.second_pass.user_total(),
        "command completed"
    );
    Ok(ExecutionSummary {
        interactions: interactions.len(),
        outcome,
        outputs,
    })
}

/// Reads one [`Interaction`] per non-blank line.
#[instrument(name = "cli.read_interactions", err, fields(records = field::Empty))]
pub(super) fn read_interactions(path: &Path) -> Result<Vec<Interaction>, CliError> {
    let io_error = |source| CliError::Io {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(io_error)?);
    let mut interactions = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(io_error)?;
        if line.trim().is_empty() {
            continue;
        }
        let interaction =
            serde_json::from_str::<Interaction>(&line).map_err(|source| CliError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                source,
            })?;
        interactions.push(interaction);
    }
    Span::current().record("records", interactions.len());
    Ok(interactions)
}

#[instrument(name = "cli.write_results", err, skip(results), fields(clusters = results.k()))]
pub(super) fn write_results(path: &Path, results: &ClusterResults) -> Result<PathBuf, CliError> {
    let file = File::create(path).map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, results).map_err(|source| CliError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    writer
        .write_all(b"\n")
        .and_then(|()| writer.flush())
        .map_err(|source| CliError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(path.to_path_buf())
}

/// Renders `summary` to `writer` in a human-readable text format.
///
/// Only non-empty clusters are listed, one line each with their user and
/// hashtag counts.
///
/// # Errors
/// Returns [`io::Error`] if writing to the supplied writer fails.
pub fn render_summary(summary: &ExecutionSummary, mut writer: impl Write) -> io::Result<()> {
    let outcome = &summary.outcome;
    let stats = &outcome.stats;
    writeln!(writer, "interactions: {}", summary.interactions)?;
    writeln!(
        writer,
        "matrix: {} built, {} after hashtag filter, {} first pass, {} second pass",
        stats.built, stats.hashtag_filtered, stats.first_pass, stats.second_pass
    )?;
    writeln!(writer, "second pass label: {}", outcome.selected_label)?;
    for (pass, results) in [("first", &outcome.first_pass), ("second", &outcome.second_pass)] {
        writeln!(writer, "{pass} pass clusters:")?;
        for (label, cluster) in results.iter().filter(|(_, c)| !c.is_empty()) {
            writeln!(
                writer,
                "{label}\t{} users\t{} hashtags",
                cluster.users.len(),
                cluster.hashtags.len()
            )?;
        }
    }
    for path in &summary.outputs {
        writeln!(writer, "wrote {}", path.display())?;
    }
    Ok(())
}
