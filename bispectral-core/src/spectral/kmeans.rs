//! Seeded k-means with k-means++ initialisation.

use rand::{Rng, rngs::SmallRng};
use tracing::debug;

/// Tuning for [`kmeans`].
#[derive(Debug, Clone, Copy)]
pub(super) struct KMeansParams {
    /// Number of clusters.
    pub(super) k: usize,
    /// Independent restarts; the lowest inertia wins.
    pub(super) n_init: usize,
    /// Maximum Lloyd iterations per restart.
    pub(super) max_iter: usize,
}

/// Clusters `points` (all of equal dimension) into `params.k` groups and
/// returns one label per point.
///
/// Callers guarantee `1 <= k <= points.len()`.
pub(super) fn kmeans(points: &[Vec<f64>], params: KMeansParams, rng: &mut SmallRng) -> Vec<usize> {
    let mut best: Option<(f64, Vec<usize>)> = None;
    for run in 0..params.n_init.max(1) {
        let centres = seed_centres(points, params.k, rng);
        let (labels, inertia) = lloyd(points, centres, params.max_iter);
        debug!(run, inertia, "k-means restart finished");
        match &best {
            Some((best_inertia, _)) if *best_inertia <= inertia => {}
            _ => best = Some((inertia, labels)),
        }
    }
    best.map(|(_, labels)| labels).unwrap_or_default()
}

#[expect(
    clippy::float_arithmetic,
    reason = "Euclidean distance requires floating-point arithmetic."
)]
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// k-means++: the first centre is uniform, later ones are drawn with
/// probability proportional to the squared distance to the nearest centre.
#[expect(
    clippy::float_arithmetic,
    reason = "Weighted sampling walks a cumulative floating-point total."
)]
fn seed_centres(points: &[Vec<f64>], k: usize, rng: &mut SmallRng) -> Vec<Vec<f64>> {
    if points.is_empty() {
        return Vec::new();
    }
    let mut centres: Vec<Vec<f64>> = Vec::with_capacity(k);
    let Some(first) = points.get(rng.gen_range(0..points.len())) else {
        return centres;
    };
    let mut nearest: Vec<f64> = points.iter().map(|p| squared_distance(p, first)).collect();
    centres.push(first.clone());

    while centres.len() < k {
        let total: f64 = nearest.iter().sum();
        let chosen = if total > 0.0 {
            let mut target = rng.gen_range(0.0..total);
            let mut chosen = points.len() - 1;
            for (index, &weight) in nearest.iter().enumerate() {
                if target < weight {
                    chosen = index;
                    break;
                }
                target -= weight;
            }
            chosen
        } else {
            rng.gen_range(0..points.len())
        };
        let Some(centre) = points.get(chosen).cloned() else {
            break;
        };
        for (slot, point) in nearest.iter_mut().zip(points) {
            *slot = slot.min(squared_distance(point, &centre));
        }
        centres.push(centre);
    }
    centres
}

fn nearest_centre(point: &[f64], centres: &[Vec<f64>]) -> (usize, f64) {
    centres
        .iter()
        .enumerate()
        .map(|(index, centre)| (index, squared_distance(point, centre)))
        .fold((0, f64::INFINITY), |best, candidate| {
            if candidate.1 < best.1 { candidate } else { best }
        })
}

/// Assigns every point to its nearest centre. Ties keep the current
/// assignment. Returns whether any label changed and the per-point distances.
fn assign(points: &[Vec<f64>], centres: &[Vec<f64>], labels: &mut [usize]) -> (bool, Vec<f64>) {
    let mut changed = false;
    let mut distances = Vec::with_capacity(points.len());
    for (label, point) in labels.iter_mut().zip(points) {
        let (mut index, mut distance) = nearest_centre(point, centres);
        if let Some(current) = centres.get(*label) {
            let current_distance = squared_distance(point, current);
            if current_distance <= distance {
                index = *label;
                distance = current_distance;
            }
        }
        if *label != index {
            *label = index;
            changed = true;
        }
        distances.push(distance);
    }
    (changed, distances)
}

/// Gives every empty cluster the point lying farthest from its centre among
/// clusters that can spare one. Returns whether any label moved.
fn refill_empty(labels: &mut [usize], distances: &mut [f64], k: usize) -> bool {
    let mut counts = vec![0_usize; k];
    for &label in labels.iter() {
        if let Some(count) = counts.get_mut(label) {
            *count += 1;
        }
    }

    let mut moved = false;
    for cluster in 0..k {
        if counts.get(cluster).is_some_and(|&count| count > 0) {
            continue;
        }
        let donor = distances
            .iter()
            .zip(labels.iter())
            .enumerate()
            .filter(|&(_, (_, label))| counts.get(*label).is_some_and(|&count| count > 1))
            .fold(None, |best: Option<(usize, f64)>, (index, (&d, _))| match best {
                Some((_, best_d)) if best_d >= d => best,
                _ => Some((index, d)),
            });
        let Some((index, _)) = donor else {
            continue;
        };
        if let Some(label) = labels.get_mut(index) {
            if let Some(count) = counts.get_mut(*label) {
                *count -= 1;
            }
            *label = cluster;
        }
        if let Some(count) = counts.get_mut(cluster) {
            *count += 1;
        }
        if let Some(distance) = distances.get_mut(index) {
            *distance = 0.0;
        }
        moved = true;
    }
    moved
}

/// Moves every centre to the mean of its points; empty clusters keep theirs.
#[expect(
    clippy::float_arithmetic,
    clippy::cast_precision_loss,
    reason = "Centroids are floating-point means over point counts."
)]
fn recentre(points: &[Vec<f64>], labels: &[usize], centres: &mut [Vec<f64>]) {
    let dimension = points.first().map_or(0, Vec::len);
    let mut sums = vec![vec![0.0; dimension]; centres.len()];
    let mut counts = vec![0_usize; centres.len()];
    for (&label, point) in labels.iter().zip(points) {
        let (Some(sum), Some(count)) = (sums.get_mut(label), counts.get_mut(label)) else {
            continue;
        };
        for (slot, &x) in sum.iter_mut().zip(point) {
            *slot += x;
        }
        *count += 1;
    }
    for ((centre, sum), &count) in centres.iter_mut().zip(sums).zip(&counts) {
        if count > 0 {
            let scale = (count as f64).recip();
            *centre = sum.into_iter().map(|x| x * scale).collect();
        }
    }
}

/// Lloyd iterations until assignments stop changing. Returns labels and
/// inertia.
fn lloyd(points: &[Vec<f64>], mut centres: Vec<Vec<f64>>, max_iter: usize) -> (Vec<usize>, f64) {
    let k = centres.len();
    let mut labels = vec![usize::MAX; points.len()];

    for _ in 0..max_iter.max(1) {
        let (assigned, mut distances) = assign(points, &centres, &mut labels);
        let refilled = refill_empty(&mut labels, &mut distances, k);
        recentre(points, &labels, &mut centres);
        if !assigned && !refilled {
            break;
        }
    }

    let inertia = labels
        .iter()
        .zip(points)
        .map(|(&label, point)| {
            centres
                .get(label)
                .map_or(0.0, |centre| squared_distance(point, centre))
        })
        .sum();
    (labels, inertia)
}
