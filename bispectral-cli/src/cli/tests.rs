//! Unit tests for the CLI commands and JSON-lines ingestion.

use super::commands::{read_interactions, run_command};
use super::test_helpers::{
    create_input_file, record, run_cli_expecting_error, run_command_expecting_error,
    run_command_for, temp_dir, three_user_input,
};
use super::{
    Cli, CliError, CollisionArg, Command, ExecutionSummary, FIRST_PASS_FILE, OverflowArg,
    SECOND_PASS_FILE, render_summary, run_cli,
};

use std::fs;
use std::path::Path;

use bispectral_core::{BispectralError, PipelineOutcome};
use clap::Parser;
use rstest::rstest;
use serde_json::Value;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

use bispectral_test_support::tracing::RecordingLayer;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn read_json(path: &Path) -> Result<Value, Box<dyn std::error::Error>> {
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[rstest]
fn run_writes_both_passes() -> TestResult {
    let dir = temp_dir();
    let input = create_input_file(&dir, "input.jsonl", &three_user_input())?;
    let out = dir.path().join("out");
    let summary = run_cli(Cli {
        command: Command::Run(run_command_for(input, &out)),
    })?;

    assert_eq!(summary.interactions, 5);
    assert_eq!(
        summary.outputs,
        vec![out.join(FIRST_PASS_FILE), out.join(SECOND_PASS_FILE)]
    );
    let first = read_json(&out.join(FIRST_PASS_FILE))?;
    assert_eq!(
        first["0"]["users"],
        serde_json::json!([
            {"username": "ada", "weight": 2},
            {"username": "bob", "weight": 1},
            {"username": "cy", "weight": 1},
        ])
    );
    assert_eq!(
        first["0"]["hashtags"],
        serde_json::json!([
            {"hashtag": "#a", "weight": 2},
            {"hashtag": "#b", "weight": 2},
        ])
    );
    assert_eq!(read_json(&out.join(SECOND_PASS_FILE))?, first);
    Ok(())
}

#[rstest]
fn identical_runs_write_identical_bytes() -> TestResult {
    let dir = temp_dir();
    let input = create_input_file(&dir, "input.jsonl", &three_user_input())?;
    let (left, right) = (dir.path().join("left"), dir.path().join("right"));
    run_command(run_command_for(input.clone(), &left))?;
    run_command(run_command_for(input, &right))?;
    for name in [FIRST_PASS_FILE, SECOND_PASS_FILE] {
        assert_eq!(fs::read(left.join(name))?, fs::read(right.join(name))?);
    }
    Ok(())
}

#[rstest]
fn blank_lines_are_ignored() -> TestResult {
    let dir = temp_dir();
    let contents = format!(
        "\n{}\n\n   \n{}\n",
        record("u1", "ada", "#a", 1),
        record("u2", "bob", "#a", 4)
    );
    let input = create_input_file(&dir, "input.jsonl", &contents)?;
    let interactions = read_interactions(&input)?;
    assert_eq!(interactions.len(), 2);
    assert_eq!(interactions[1].weight, 4);
    Ok(())
}

#[rstest]
fn malformed_line_reports_its_number() -> TestResult {
    let dir = temp_dir();
    let contents = format!("{}\n{{\"user_id\": 3}}\n", record("u1", "ada", "#a", 1));
    let input = create_input_file(&dir, "input.jsonl", &contents)?;
    let err = run_command_expecting_error(
        run_command_for(input, dir.path()),
        "the second line lacks fields",
    );
    assert!(matches!(err, CliError::Parse { line: 2, .. }));
    Ok(())
}

#[rstest]
fn missing_input_is_an_io_error() {
    let dir = temp_dir();
    let err = run_cli_expecting_error(
        Cli {
            command: Command::Run(run_command_for(
                dir.path().join("absent.jsonl"),
                dir.path(),
            )),
        },
        "missing input must fail",
    );
    assert!(matches!(err, CliError::Io { .. }));
}

#[rstest]
fn zero_restarts_are_rejected() -> TestResult {
    let dir = temp_dir();
    let input = create_input_file(&dir, "input.jsonl", &three_user_input())?;
    let mut command = run_command_for(input, dir.path());
    command.n_init = 0;
    let err = run_command_expecting_error(command, "n_init = 0 must fail");
    assert!(matches!(err, CliError::InvalidRestarts { got: 0 }));
    Ok(())
}

#[rstest]
#[case::zero_clusters(0, None, "BISPECTRAL_INVALID_CLUSTER_COUNT")]
#[case::label_beyond_k(1, Some(1), "BISPECTRAL_UNKNOWN_SELECTED_LABEL")]
#[case::k_above_dimensions(3, None, "BISPECTRAL_CLUSTER_COUNT_EXCEEDS_DIMENSIONS")]
fn core_errors_surface_with_codes(
    #[case] clusters: usize,
    #[case] second_pass_label: Option<u32>,
    #[case] expected: &str,
) -> TestResult {
    let dir = temp_dir();
    let input = create_input_file(&dir, "input.jsonl", &three_user_input())?;
    let mut command = run_command_for(input, dir.path());
    command.clusters = clusters;
    command.second_pass_label = second_pass_label;
    let err = run_command_expecting_error(command, "configuration must be rejected");
    match err {
        CliError::Core(core) => assert_eq!(core.code().as_str(), expected),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!dir.path().join(FIRST_PASS_FILE).exists());
    Ok(())
}

#[rstest]
#[case::reject(OverflowArg::Reject, None)]
#[case::saturate(OverflowArg::Saturate, Some(3))]
fn overflow_policy_is_honoured(
    #[case] overflow: OverflowArg,
    #[case] expected_weight: Option<u64>,
) -> TestResult {
    let dir = temp_dir();
    let contents = [record("u1", "ada", "#a", 9), record("u2", "bob", "#a", 1)].join("\n");
    let input = create_input_file(&dir, "input.jsonl", &contents)?;
    let mut command = run_command_for(input, dir.path());
    command.max_weight = 3;
    command.overflow = overflow;

    match (run_command(command), expected_weight) {
        (Ok(summary), Some(weight)) => {
            let cluster = summary
                .outcome
                .first_pass
                .iter()
                .next()
                .map(|(_, cluster)| cluster.clone())
                .ok_or("first pass has no clusters")?;
            assert_eq!(cluster.users[0].weight, weight);
        }
        (Err(CliError::Core(BispectralError::WeightOverflow { weight, limit, .. })), None) => {
            assert_eq!((weight, limit), (9, 3));
        }
        (other, _) => panic!("unexpected outcome: {other:?}"),
    }
    Ok(())
}

#[rstest]
#[case::overwrite(CollisionArg::Overwrite, 2)]
#[case::accumulate(CollisionArg::Accumulate, 7)]
fn collision_policy_is_honoured(
    #[case] collision: CollisionArg,
    #[case] expected: u64,
) -> TestResult {
    let dir = temp_dir();
    let contents = [
        record("u1", "ada", "#a", 5),
        record("u1", "ada", "#a", 2),
        record("u2", "bob", "#a", 1),
    ]
    .join("\n");
    let input = create_input_file(&dir, "input.jsonl", &contents)?;
    let mut command = run_command_for(input, dir.path());
    command.collision = collision;
    let summary = run_command(command)?;
    let ada = summary
        .outcome
        .first_pass
        .iter()
        .flat_map(|(_, cluster)| cluster.users.iter())
        .find(|user| user.username == "ada")
        .ok_or("ada must be clustered")?;
    assert_eq!(ada.weight, expected);
    Ok(())
}

#[rstest]
fn run_command_records_span_fields() -> TestResult {
    let dir = temp_dir();
    let input = create_input_file(&dir, "input.jsonl", &three_user_input())?;
    let command = run_command_for(input.clone(), dir.path());

    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());
    tracing::subscriber::with_default(subscriber, || run_command(command))?;

    let span = layer.span("cli.execute").ok_or("cli.execute span must exist")?;
    assert_eq!(span.field("input"), Some(input.display().to_string().as_str()));
    assert_eq!(span.field("k"), Some("1"));
    assert_eq!(span.field("min_user"), Some("2"));

    let read = layer
        .span("cli.read_interactions")
        .ok_or("cli.read_interactions span must exist")?;
    assert_eq!(read.field("records"), Some("5"));

    let completed = layer.events_with_message("command completed");
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].level, Level::INFO);
    assert_eq!(completed[0].field("selected_label"), Some("0"));
    Ok(())
}

#[rstest]
fn render_summary_lists_non_empty_clusters() -> TestResult {
    let dir = temp_dir();
    let input = create_input_file(&dir, "input.jsonl", &three_user_input())?;
    let mut command = run_command_for(input, dir.path());
    command.min_user = 1;
    let summary: ExecutionSummary = run_command(command)?;
    let PipelineOutcome { stats, .. } = &summary.outcome;

    let mut buffer = Vec::new();
    render_summary(&summary, &mut buffer)?;
    let text = String::from_utf8(buffer)?;
    assert!(text.contains("interactions: 5"));
    assert!(text.contains(&format!("{} built", stats.built)));
    assert!(text.contains("first pass clusters:"));
    let first = dir.path().join(FIRST_PASS_FILE);
    assert!(text.contains(&format!("wrote {}", first.display())));
    Ok(())
}

#[rstest]
fn clap_applies_documented_defaults() -> TestResult {
    let cli = Cli::try_parse_from(["bispectral", "run", "input.jsonl"])?;
    let Command::Run(run) = cli.command;
    assert_eq!(run.min_user, 10);
    assert_eq!(run.clusters, 100);
    assert_eq!(run.seed, 0);
    assert_eq!(run.second_pass_label, None);
    assert_eq!(run.collision, CollisionArg::Overwrite);
    assert_eq!(run.overflow, OverflowArg::Reject);
    assert_eq!(run.max_weight, 65_535);
    assert_eq!(run.n_init, 10);
    assert_eq!(run.output_dir, Path::new("."));
    Ok(())
}

#[rstest]
fn clap_parses_every_option() -> TestResult {
    let cli = Cli::try_parse_from([
        "bispectral",
        "run",
        "input.jsonl",
        "--min-user",
        "3",
        "-k",
        "8",
        "--seed",
        "42",
        "--second-pass-label",
        "5",
        "--collision",
        "accumulate",
        "--overflow",
        "saturate",
        "--max-weight",
        "1000",
        "--output-dir",
        "results",
        "--n-init",
        "4",
    ])?;
    let Command::Run(run) = cli.command;
    assert_eq!(run.min_user, 3);
    assert_eq!(run.clusters, 8);
    assert_eq!(run.seed, 42);
    assert_eq!(run.second_pass_label, Some(5));
    assert_eq!(run.collision, CollisionArg::Accumulate);
    assert_eq!(run.overflow, OverflowArg::Saturate);
    assert_eq!(run.max_weight, 1000);
    assert_eq!(run.output_dir, Path::new("results"));
    assert_eq!(run.n_init, 4);
    Ok(())
}

#[rstest]
#[case::unknown_collision(&["bispectral", "run", "in.jsonl", "--collision", "merge"])]
#[case::negative_clusters(&["bispectral", "run", "in.jsonl", "--clusters", "-1"])]
#[case::missing_input(&["bispectral", "run"])]
fn clap_rejects_invalid_arguments(#[case] args: &[&str]) {
    assert!(Cli::try_parse_from(args).is_err());
}

fn io_failure() -> CliError {
    CliError::Io {
        path: "absent.jsonl".into(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    }
}

#[rstest]
#[case::zero_restarts(CliError::InvalidRestarts { got: 0 }, true, 2)]
#[case::zero_clusters(CliError::Core(BispectralError::InvalidClusterCount { got: 0 }), true, 2)]
#[case::zero_min_user(CliError::Core(BispectralError::InvalidMinUser { got: 0 }), true, 2)]
#[case::missing_file(io_failure(), false, 1)]
#[case::overflowing_weight(
    CliError::Core(BispectralError::WeightOverflow {
        user_id: "u1".into(),
        hashtag: "#a".into(),
        weight: 9,
        limit: 3,
    }),
    false,
    1
)]
fn exit_status_separates_rejected_parameters(
    #[case] error: CliError,
    #[case] configuration: bool,
    #[case] status: u8,
) {
    assert_eq!(error.is_configuration(), configuration);
    assert_eq!(error.exit_status(), status);
}

#[rstest]
fn zero_restarts_exit_like_other_rejected_parameters() -> TestResult {
    let dir = temp_dir();
    let input = create_input_file(&dir, "input.jsonl", &three_user_input())?;
    let mut restarts = run_command_for(input.clone(), dir.path());
    restarts.n_init = 0;
    let mut clusters = run_command_for(input, dir.path());
    clusters.clusters = 0;

    let restarts_error = run_command_expecting_error(restarts, "n_init = 0 must fail");
    let clusters_error = run_command_expecting_error(clusters, "zero clusters must fail");
    assert_eq!(
        restarts_error.exit_status(),
        CliError::CONFIGURATION_EXIT_STATUS
    );
    assert_eq!(restarts_error.exit_status(), clusters_error.exit_status());
    Ok(())
}
