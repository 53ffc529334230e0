use std::num::NonZeroUsize;

use bispectral_core::{
    AdjacencyMatrix, ClusterLabel, CoClusterLabels, CoClusterer, Interaction, OracleError,
    check_dimensions,
};
use bispectral_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

/// Oracle assigning `i % k` to row and column `i`.
#[derive(Clone, Copy, Debug, Default)]
pub struct RoundRobin;

fn labels(len: usize, k: NonZeroUsize) -> Vec<ClusterLabel> {
    (0..len)
        .map(|i| ClusterLabel::from_index(i % k.get()).expect("label fits u32"))
        .collect()
}

impl CoClusterer for RoundRobin {
    fn name(&self) -> &str {
        "round-robin"
    }

    fn cocluster(
        &self,
        matrix: &AdjacencyMatrix,
        k: NonZeroUsize,
    ) -> Result<CoClusterLabels, OracleError> {
        check_dimensions(matrix, k)?;
        Ok(CoClusterLabels {
            rows: labels(matrix.rows(), k),
            columns: labels(matrix.columns(), k),
        })
    }
}

#[must_use]
pub fn proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

/// Two communities of `size` users each, sharing no hashtags except a single
/// light bridge from the first user of each.
#[must_use]
pub fn two_communities(size: usize) -> Vec<Interaction> {
    let mut input = Vec::new();
    for (community, tags) in [("a", ["#rust", "#cargo", "#tokio"]), ("b", ["#cats", "#dogs", "#birds"])] {
        for user in 0..size {
            let id = format!("{community}{user}");
            for (offset, tag) in tags.iter().enumerate() {
                let weight = 3 + u64::try_from((user + offset) % 3).expect("small");
                input.push(Interaction::new(&id, &format!("user-{id}"), *tag, weight));
            }
        }
    }
    input.push(Interaction::new("a0", "user-a0", "#cats", 1));
    input.push(Interaction::new("b0", "user-b0", "#rust", 1));
    input
}
