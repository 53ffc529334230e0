//! Shared test utilities for `bispectral-core`.

use bispectral_test_support::ci::property_test_profile::ProptestRunProfile;
use proptest::test_runner::Config as ProptestConfig;

use crate::{
    error::OracleError,
    matrix::AdjacencyMatrix,
    oracle::{CoClusterLabels, CoClusterer, check_dimensions},
    result::ClusterLabel,
};
use std::{
    num::NonZeroUsize,
    sync::atomic::{AtomicUsize, Ordering},
};

/// Builds a standard proptest configuration from the shared CI profile.
///
/// This keeps property suites aligned on the same `PROPTEST_CASES` and
/// `BISPECTRAL_PBT_FORK` interpretation.
#[must_use]
pub(crate) fn suite_proptest_config(default_cases: u32) -> ProptestConfig {
    let profile = ProptestRunProfile::load(default_cases, false);
    ProptestConfig {
        cases: profile.cases(),
        fork: profile.fork(),
        ..ProptestConfig::default()
    }
}

fn round_robin(len: usize, k: NonZeroUsize) -> Vec<ClusterLabel> {
    (0..len)
        .map(|i| ClusterLabel::from_index(i % k.get()).unwrap_or(ClusterLabel::new(0)))
        .collect()
}

/// [`CoClusterer`] assigning `i % k` to row and column `i` and counting calls.
#[derive(Debug, Default)]
pub(crate) struct CountingOracle {
    calls: AtomicUsize,
}

impl CountingOracle {
    /// Number of `cocluster` invocations so far.
    #[must_use]
    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl CoClusterer for CountingOracle {
    fn name(&self) -> &str {
        "counting"
    }

    fn cocluster(
        &self,
        matrix: &AdjacencyMatrix,
        k: NonZeroUsize,
    ) -> Result<CoClusterLabels, OracleError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        check_dimensions(matrix, k)?;
        Ok(CoClusterLabels {
            rows: round_robin(matrix.rows(), k),
            columns: round_robin(matrix.columns(), k),
        })
    }
}

/// [`CoClusterer`] replaying canned labels, one entry per call.
///
/// Calls beyond the script repeat its last entry.
#[derive(Debug)]
pub(crate) struct FixedOracle {
    script: Vec<CoClusterLabels>,
    next: AtomicUsize,
}

impl FixedOracle {
    /// Creates an oracle replaying `script` in order.
    #[must_use]
    pub(crate) fn new(script: Vec<CoClusterLabels>) -> Self {
        Self {
            script,
            next: AtomicUsize::new(0),
        }
    }
}

impl CoClusterer for FixedOracle {
    fn name(&self) -> &str {
        "fixed"
    }

    fn cocluster(
        &self,
        matrix: &AdjacencyMatrix,
        _k: NonZeroUsize,
    ) -> Result<CoClusterLabels, OracleError> {
        let call = self.next.fetch_add(1, Ordering::Relaxed);
        self.script
            .get(call)
            .or_else(|| self.script.last())
            .cloned()
            .ok_or(OracleError::EmptyMatrix {
                rows: matrix.rows(),
                columns: matrix.columns(),
            })
    }
}
