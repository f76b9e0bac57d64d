//! Visiting order of the viewpoints.
//!
//! The tour is an open path: it begins at a fixed start position, visits each
//! viewpoint once and does not return. It is built greedily with
//! nearest-neighbor construction and then refined with 2-opt segment
//! reversals until no reversal shortens the path.

use crate::planning::Viewpoint;
use log::debug;
use nalgebra::Point3;

/// Improvements smaller than this are treated as ties so passes terminate.
const IMPROVEMENT_EPSILON: f64 = 1e-9;

/// Total straight-line length of `start -> positions[order[0]] -> ... -> positions[order[n-1]]`.
pub fn path_length(start: &Point3<f64>, positions: &[Point3<f64>], order: &[usize]) -> f64 {
    let mut current = *start;
    let mut total = 0.0;
    for &idx in order {
        total += (positions[idx] - current).norm();
        current = positions[idx];
    }
    total
}

/// Nearest-neighbor + 2-opt ordering of viewpoints for an open path.
#[derive(Debug, Clone, Copy, Default)]
pub struct TourOptimizer {
    max_passes: Option<usize>,
}

impl TourOptimizer {
    /// `max_passes` caps the number of full 2-opt passes; `None` runs to a local optimum.
    pub fn new(max_passes: Option<usize>) -> Self {
        TourOptimizer { max_passes }
    }

    /// Orders `viewpoints` and returns the visiting order as indices into the slice.
    ///
    /// The result is always a permutation of `0..viewpoints.len()`.
    pub fn optimize(&self, start: &Point3<f64>, viewpoints: &[Viewpoint]) -> Vec<usize> {
        let positions: Vec<Point3<f64>> = viewpoints.iter().map(|v| v.position).collect();
        self.optimize_positions(start, &positions)
    }

    /// Same as [`TourOptimizer::optimize`] on bare positions.
    pub fn optimize_positions(&self, start: &Point3<f64>, positions: &[Point3<f64>]) -> Vec<usize> {
        let mut tour = nearest_neighbor_tour(start, positions);
        if tour.len() < 2 {
            return tour;
        }

        let initial = path_length(start, positions, &tour);
        let passes = self.two_opt(start, positions, &mut tour);
        debug!(
            "2-opt finished after {} pass(es): path length {:.3} -> {:.3}",
            passes,
            initial,
            path_length(start, positions, &tour)
        );
        tour
    }

    /// Applies improving segment reversals in place and returns the number of passes run.
    ///
    /// Node 0 of the path is the fixed start; node `k >= 1` is `positions[tour[k - 1]]`.
    /// Reversing nodes `i+1..=j` replaces edges `(i, i+1)` and `(j, j+1)` by
    /// `(i, j)` and `(i+1, j+1)`. When `j` is the last node there is no edge
    /// after it, because the path does not return to the start, and only the
    /// first edge changes.
    pub fn two_opt(
        &self,
        start: &Point3<f64>,
        positions: &[Point3<f64>],
        tour: &mut [usize],
    ) -> usize {
        let n = tour.len();
        let mut passes = 0;
        loop {
            if self.max_passes.is_some_and(|max| passes >= max) {
                debug!("2-opt stopped at the pass limit of {}", passes);
                break;
            }
            passes += 1;

            let mut improved = false;
            for i in 0..n.saturating_sub(1) {
                for j in (i + 2)..=n {
                    let node = |k: usize, tour: &[usize]| {
                        if k == 0 {
                            *start
                        } else {
                            positions[tour[k - 1]]
                        }
                    };
                    let a = node(i, tour);
                    let b = node(i + 1, tour);
                    let c = node(j, tour);

                    let (before, after) = if j < n {
                        let d = node(j + 1, tour);
                        ((b - a).norm() + (d - c).norm(), (c - a).norm() + (d - b).norm())
                    } else {
                        ((b - a).norm(), (c - a).norm())
                    };

                    if after + IMPROVEMENT_EPSILON < before {
                        tour[i..j].reverse();
                        improved = true;
                    }
                }
            }

            if !improved {
                break;
            }
        }
        passes
    }
}

/// Greedy tour: always fly to the closest unvisited position.
///
/// Ties go to the lowest index, so the result depends only on input order.
pub fn nearest_neighbor_tour(start: &Point3<f64>, positions: &[Point3<f64>]) -> Vec<usize> {
    let mut visited = vec![false; positions.len()];
    let mut tour = Vec::with_capacity(positions.len());
    let mut current = *start;

    for _ in 0..positions.len() {
        let mut best: Option<(usize, f64)> = None;
        for (idx, position) in positions.iter().enumerate() {
            if visited[idx] {
                continue;
            }
            let d = (*position - current).norm();
            if best.map_or(true, |(_, best_d)| d < best_d) {
                best = Some((idx, d));
            }
        }
        if let Some((idx, _)) = best {
            visited[idx] = true;
            tour.push(idx);
            current = positions[idx];
        }
    }
    tour
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn is_permutation(order: &[usize], n: usize) -> bool {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        sorted == (0..n).collect::<Vec<_>>()
    }

    /// Deterministic scatter of points in a 50 m box.
    fn scatter(n: usize, seed: u64) -> Vec<Point3<f64>> {
        let mut state = seed;
        let mut next = || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 * 50.0
        };
        (0..n)
            .map(|_| Point3::new(next(), next(), next() * 0.2))
            .collect()
    }

    #[test]
    fn test_empty_and_single() {
        let optimizer = TourOptimizer::default();
        let start = Point3::origin();
        assert!(optimizer.optimize_positions(&start, &[]).is_empty());
        assert_eq!(
            optimizer.optimize_positions(&start, &[Point3::new(3.0, 0.0, 0.0)]),
            vec![0]
        );
    }

    #[test]
    fn test_nearest_neighbor_tie_breaks_by_index() {
        let positions = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
        ];
        let tour = nearest_neighbor_tour(&Point3::origin(), &positions);
        assert_eq!(tour[0], 0);
    }

    #[test]
    fn test_square_is_visited_along_the_perimeter() {
        let square = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
        ];
        let start = Point3::origin();
        let tour = TourOptimizer::default().optimize_positions(&start, &square);

        assert!(is_permutation(&tour, 4));
        assert_eq!(tour[0], 0);
        assert_eq!(tour[2], 1, "diagonal corner must be third, got {tour:?}");
        assert_relative_eq!(path_length(&start, &square, &tour), 30.0, epsilon = 1e-9);
    }

    #[test]
    fn test_two_opt_untangles_crossing() {
        // The order 0, 1, 2, 3 crosses itself; reversing 1..=2 removes the crossing.
        let positions = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(3.0, 2.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
            Point3::new(5.0, 2.0, 0.0),
        ];
        let start = Point3::origin();
        let mut tour = vec![0, 1, 2, 3];
        let before = path_length(&start, &positions, &tour);

        TourOptimizer::default().two_opt(&start, &positions, &mut tour);

        let after = path_length(&start, &positions, &tour);
        assert!(after < before);
        assert!(is_permutation(&tour, 4));
    }

    #[test]
    fn test_tail_reversal_ignores_return_edge() {
        // As a closed loop both orders have the same length; as an open path the
        // near point must come first.
        let positions = vec![Point3::new(1.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)];
        let start = Point3::origin();
        let mut tour = vec![1, 0];

        TourOptimizer::default().two_opt(&start, &positions, &mut tour);
        assert_eq!(tour, vec![0, 1]);
        assert_relative_eq!(path_length(&start, &positions, &tour), 2.0);
    }

    #[test]
    fn test_two_opt_never_worse_than_nearest_neighbor() {
        let optimizer = TourOptimizer::default();
        let start = Point3::new(0.0, 0.0, 2.0);
        for seed in 1..=20u64 {
            let positions = scatter(5 + seed as usize, seed);
            let greedy = nearest_neighbor_tour(&start, &positions);
            let improved = optimizer.optimize_positions(&start, &positions);

            assert!(is_permutation(&improved, positions.len()));
            assert!(
                path_length(&start, &positions, &improved)
                    <= path_length(&start, &positions, &greedy) + 1e-9
            );
        }
    }

    #[test]
    fn test_pass_limit_is_respected() {
        let positions = scatter(40, 7);
        let start = Point3::origin();
        let mut tour = nearest_neighbor_tour(&start, &positions);

        let passes = TourOptimizer::new(Some(1)).two_opt(&start, &positions, &mut tour);
        assert_eq!(passes, 1);
        assert!(is_permutation(&tour, positions.len()));
    }

    #[test]
    fn test_optimize_is_deterministic() {
        let positions = scatter(25, 3);
        let start = Point3::origin();
        let optimizer = TourOptimizer::default();
        assert_eq!(
            optimizer.optimize_positions(&start, &positions),
            optimizer.optimize_positions(&start, &positions)
        );
    }
}
