//! Tests for the two-pass `Pipeline` API.

mod common;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use bispectral_core::{
    BispectralError, ClusterLabel, ClusterResults, FilterStage, Interaction, Pass, Pipeline,
    PipelineBuilder, SecondPassSelection,
};
use bispectral_test_support::tracing::RecordingLayer;
use common::{RoundRobin, proptest_config, two_communities};
use proptest::prelude::*;
use rstest::{fixture, rstest};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;

#[fixture]
fn three_users() -> Vec<Interaction> {
    vec![
        Interaction::new("u1", "ada", "#a", 1),
        Interaction::new("u1", "ada", "#b", 1),
        Interaction::new("u2", "bob", "#a", 1),
        Interaction::new("u3", "cy", "#b", 1),
        Interaction::new("u3", "cy", "#c", 1),
    ]
}

fn pipeline(min_user: usize, k: usize) -> Pipeline {
    PipelineBuilder::new()
        .with_min_user(min_user)
        .with_clusters(k)
        .build()
        .expect("configuration must be valid")
}

fn user_weights(results: &ClusterResults) -> BTreeMap<String, u64> {
    results
        .iter()
        .flat_map(|(_, cluster)| cluster.users.iter())
        .map(|user| (user.username.clone(), user.weight))
        .collect()
}

fn hashtag_weights(results: &ClusterResults) -> BTreeMap<String, u64> {
    results
        .iter()
        .flat_map(|(_, cluster)| cluster.hashtags.iter())
        .map(|tag| (tag.hashtag.clone(), tag.weight))
        .collect()
}

#[rstest]
fn sparse_hashtag_is_dropped_and_weights_follow(three_users: Vec<Interaction>) {
    let outcome = pipeline(2, 1)
        .run(&three_users, &RoundRobin)
        .expect("run must succeed");

    let users = user_weights(&outcome.first_pass);
    assert_eq!(
        users,
        BTreeMap::from([("ada".to_owned(), 2), ("bob".to_owned(), 1), ("cy".to_owned(), 1)])
    );
    let hashtags = hashtag_weights(&outcome.first_pass);
    assert_eq!(
        hashtags,
        BTreeMap::from([("#a".to_owned(), 2), ("#b".to_owned(), 2)])
    );
    assert_eq!(outcome.stats.hashtag_filtered.columns, 2);
    assert_eq!(outcome.selected_label, ClusterLabel::new(0));
    assert_eq!(outcome.second_pass, outcome.first_pass);
}

#[rstest]
fn user_left_without_edges_is_removed() {
    let input = vec![
        Interaction::new("u1", "ada", "#a", 1),
        Interaction::new("u2", "bob", "#a", 2),
        Interaction::new("u3", "cy", "#solo", 9),
    ];
    let outcome = pipeline(2, 1).run(&input, &RoundRobin).expect("run must succeed");
    assert_eq!(outcome.stats.built.rows, 3);
    assert_eq!(outcome.stats.first_pass.rows, 2);
    assert!(!user_weights(&outcome.first_pass).contains_key("cy"));
}

#[rstest]
#[case::first_pass(3, Pass::First)]
fn cluster_count_above_matrix_dimension_is_rejected(
    three_users: Vec<Interaction>,
    #[case] k: usize,
    #[case] expected_pass: Pass,
) {
    let err = pipeline(2, k)
        .run(&three_users, &RoundRobin)
        .expect_err("k exceeds the two surviving hashtags");
    match err {
        BispectralError::ClusterCountExceedsDimensions {
            pass,
            k: requested,
            rows,
            columns,
        } => {
            assert_eq!(pass, expected_pass);
            assert_eq!(requested.get(), k);
            assert_eq!((rows, columns), (3, 2));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[rstest]
fn second_pass_too_small_for_k_is_rejected() {
    // With k = 2 the round-robin oracle sends one user and one hashtag to
    // label 1, which cannot be split into two clusters again.
    let input = vec![
        Interaction::new("u1", "ada", "#a", 1),
        Interaction::new("u2", "bob", "#b", 1),
        Interaction::new("u3", "cy", "#a", 1),
        Interaction::new("u3", "cy", "#b", 1),
    ];
    let err = PipelineBuilder::new()
        .with_min_user(1)
        .with_clusters(2)
        .with_second_pass(SecondPassSelection::Label(ClusterLabel::new(1)))
        .build()
        .expect("configuration must be valid")
        .run(&input, &RoundRobin)
        .expect_err("label 1 holds a single user");
    assert!(matches!(
        err,
        BispectralError::ClusterCountExceedsDimensions {
            pass: Pass::Second,
            rows: 1,
            columns: 1,
            ..
        }
    ));
}

#[rstest]
fn empty_input_is_degenerate() {
    let err = pipeline(1, 1)
        .run(&[], &RoundRobin)
        .expect_err("nothing to cluster");
    assert!(matches!(
        err,
        BispectralError::DegenerateMatrix {
            stage: FilterStage::HashtagDegree,
            rows: 0,
            columns: 0,
        }
    ));
}

#[rstest]
fn run_emits_spans_and_stage_events(three_users: Vec<Interaction>) {
    let pipeline = pipeline(2, 1);
    let layer = RecordingLayer::default();
    let subscriber = tracing_subscriber::registry().with(layer.clone());

    tracing::subscriber::with_default(subscriber, || pipeline.run(&three_users, &RoundRobin))
        .expect("run must succeed");

    let run = layer.span("core.run").expect("core.run span must exist");
    assert_eq!(run.field("interactions"), Some("5"));
    assert_eq!(run.field("oracle"), Some("round-robin"));
    assert_eq!(run.field("min_user"), Some("2"));
    assert_eq!(run.field("second_pass"), Some("largest"));

    let passes: Vec<_> = layer
        .spans()
        .into_iter()
        .filter(|span| span.name == "core.cluster")
        .filter_map(|span| span.field("pass").map(str::to_owned))
        .collect();
    assert_eq!(passes, vec!["first".to_owned(), "second".to_owned()]);

    let filtered = layer.events_with_message("degree filters applied");
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].level, Level::INFO);
    assert_eq!(filtered[0].field("dropped_hashtags"), Some("1"));
}

#[cfg(feature = "spectral")]
#[rstest]
fn spectral_oracle_recovers_planted_communities() {
    let input = two_communities(4);
    let pipeline = PipelineBuilder::new()
        .with_min_user(2)
        .with_clusters(2)
        .with_seed(7)
        .build()
        .expect("configuration must be valid");
    let outcome = pipeline
        .run(&input, &pipeline.spectral_oracle())
        .expect("run must succeed");

    for (_, cluster) in outcome.first_pass.iter() {
        let communities: BTreeSet<char> = cluster
            .users
            .iter()
            .filter_map(|user| user.username.strip_prefix("user-"))
            .filter_map(|id| id.chars().next())
            .collect();
        assert!(communities.len() <= 1, "cluster mixes communities: {cluster:?}");
    }
    let populated = outcome
        .first_pass
        .iter()
        .filter(|(_, cluster)| !cluster.users.is_empty())
        .count();
    assert_eq!(populated, 2);
    assert_eq!(outcome.first_pass.user_total(), 8);
}

#[cfg(feature = "spectral")]
#[rstest]
fn identical_seeds_give_identical_outcomes() {
    let input = two_communities(5);
    let pipeline = PipelineBuilder::new()
        .with_min_user(2)
        .with_clusters(2)
        .with_seed(11)
        .build()
        .expect("configuration must be valid");
    let first = pipeline
        .run(&input, &pipeline.spectral_oracle())
        .expect("run must succeed");
    let second = pipeline
        .run(&input, &pipeline.spectral_oracle())
        .expect("run must succeed");
    assert_eq!(first, second);

    #[cfg(feature = "serde")]
    {
        let bytes = |outcome: &bispectral_core::PipelineOutcome| {
            (
                serde_json::to_vec(&outcome.first_pass).expect("serialises"),
                serde_json::to_vec(&outcome.second_pass).expect("serialises"),
            )
        };
        assert_eq!(bytes(&first), bytes(&second));
    }
}

/// Weights after last-write-wins collision handling, degree filtering and
/// edge filtering, computed without the matrix types.
fn expected_weights(
    input: &[Interaction],
    min_user: usize,
) -> (BTreeMap<String, u64>, BTreeMap<String, u64>) {
    let mut cells: HashMap<(&str, &str), u64> = HashMap::new();
    for entry in input {
        cells.insert((entry.user_id.as_str(), entry.hashtag.as_str()), entry.weight);
    }
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for &(_, hashtag) in cells.keys() {
        *degree.entry(hashtag).or_default() += 1;
    }
    let kept = |hashtag: &str| degree.get(hashtag).copied().unwrap_or(0) >= min_user;

    let mut users: BTreeMap<String, u64> = BTreeMap::new();
    for (&(user, hashtag), &weight) in &cells {
        if kept(hashtag) {
            *users.entry(format!("name-{user}")).or_default() += weight;
        }
    }
    users.retain(|_, weight| *weight > 0);

    // Kept hashtags survive even when every remaining edge weighs zero.
    let mut hashtags: BTreeMap<String, u64> = degree
        .keys()
        .filter(|hashtag| kept(**hashtag))
        .map(|hashtag| ((*hashtag).to_owned(), 0))
        .collect();
    for (&(user, hashtag), &weight) in &cells {
        if kept(hashtag) && users.contains_key(&format!("name-{user}")) {
            *hashtags.entry(hashtag.to_owned()).or_default() += weight;
        }
    }
    (users, hashtags)
}

fn interactions() -> impl Strategy<Value = Vec<Interaction>> {
    proptest::collection::vec((0_u8..8, 0_u8..6, 0_u64..6), 1..48).prop_map(|entries| {
        entries
            .into_iter()
            .map(|(user, tag, weight)| {
                Interaction::new(format!("u{user}"), format!("name-u{user}"), format!("#t{tag}"), weight)
            })
            .collect()
    })
}

proptest! {
    #![proptest_config(proptest_config(64))]

    #[test]
    fn first_pass_covers_every_surviving_entity(
        input in interactions(),
        min_user in 1_usize..4,
        k in 1_usize..3,
    ) {
        let outcome = match pipeline(min_user, k).run(&input, &RoundRobin) {
            Ok(outcome) => outcome,
            Err(
                BispectralError::DegenerateMatrix { .. }
                | BispectralError::ClusterCountExceedsDimensions { .. },
            ) => return Ok(()),
            Err(other) => return Err(TestCaseError::fail(format!("unexpected error: {other}"))),
        };
        let (users, hashtags) = expected_weights(&input, min_user);

        prop_assert_eq!(outcome.first_pass.k(), k);
        prop_assert_eq!(outcome.first_pass.user_total(), outcome.stats.first_pass.rows);
        prop_assert_eq!(outcome.first_pass.hashtag_total(), outcome.stats.first_pass.columns);
        prop_assert_eq!(user_weights(&outcome.first_pass), users);
        prop_assert_eq!(hashtag_weights(&outcome.first_pass), hashtags);
    }

    #[test]
    fn second_pass_stays_inside_the_selected_cluster(
        input in interactions(),
        min_user in 1_usize..3,
    ) {
        let Ok(outcome) = pipeline(min_user, 1).run(&input, &RoundRobin) else {
            return Ok(());
        };
        let selected = outcome
            .first_pass
            .cluster(outcome.selected_label)
            .expect("selected label exists");
        let allowed: BTreeSet<&str> = selected.users.iter().map(|u| u.username.as_str()).collect();
        for user in outcome.second_pass.iter().flat_map(|(_, c)| c.users.iter()) {
            prop_assert!(allowed.contains(user.username.as_str()));
        }
        prop_assert_eq!(outcome.second_pass.user_total(), outcome.stats.second_pass.rows);
    }
}
