//! Density-based clustering (DBSCAN) over 2D metric points.
//!
//! Neighbourhoods are answered by an R-tree. A point is a core point when its
//! eps-neighbourhood, itself included, holds at least `min_samples` points.
//! Clusters grow from core points in input order, so labels are assigned in
//! order of each cluster's first core point. Border points reachable from
//! several clusters keep the first label they receive.

use rstar::primitives::GeomWithData;
use rstar::RTree;

/// Label of points that belong to no cluster.
pub const NOISE: i32 = -1;

type IndexedPoint = GeomWithData<[f64; 2], usize>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dbscan {
    pub eps: f64,
    pub min_samples: usize,
}

impl Dbscan {
    pub fn new(eps: f64, min_samples: usize) -> Self {
        Self { eps, min_samples }
    }

    /// Returns one label per input point: `NOISE` or a cluster id counting up from 0.
    pub fn fit_predict(&self, points: &[[f64; 2]]) -> Vec<i32> {
        let tree = RTree::bulk_load(
            points
                .iter()
                .enumerate()
                .map(|(index, point)| IndexedPoint::new(*point, index))
                .collect(),
        );

        let eps_2 = self.eps * self.eps;
        let neighbourhoods: Vec<Vec<usize>> = points
            .iter()
            .map(|point| {
                let mut neighbours: Vec<usize> = tree
                    .locate_within_distance(*point, eps_2)
                    .map(|neighbour| neighbour.data)
                    .collect();
                // R-tree traversal order is not input order
                neighbours.sort_unstable();
                neighbours
            })
            .collect();

        let is_core: Vec<bool> = neighbourhoods
            .iter()
            .map(|neighbours| neighbours.len() >= self.min_samples)
            .collect();

        let mut labels = vec![NOISE; points.len()];
        let mut next_label = 0;
        let mut stack = Vec::new();

        for start in 0..points.len() {
            if labels[start] != NOISE || !is_core[start] {
                continue;
            }

            labels[start] = next_label;
            stack.push(start);
            while let Some(current) = stack.pop() {
                if !is_core[current] {
                    continue;
                }
                for &neighbour in &neighbourhoods[current] {
                    if labels[neighbour] == NOISE {
                        labels[neighbour] = next_label;
                        stack.push(neighbour);
                    }
                }
            }
            next_label += 1;
        }

        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(origin: [f64; 2], count: usize, spacing: f64) -> Vec<[f64; 2]> {
        (0..count)
            .map(|i| {
                [
                    origin[0] + (i % 5) as f64 * spacing,
                    origin[1] + (i / 5) as f64 * spacing,
                ]
            })
            .collect()
    }

    #[test]
    fn dense_group_is_one_cluster_and_outliers_are_noise() {
        let mut points = grid([0.0, 0.0], 25, 10.0);
        points.push([5_000.0, 5_000.0]);
        points.push([-5_000.0, 5_000.0]);

        let labels = Dbscan::new(250.0, 20).fit_predict(&points);

        assert!(labels[..25].iter().all(|&l| l == 0));
        assert_eq!(&labels[25..], &[NOISE, NOISE]);
    }

    #[test]
    fn too_few_points_is_all_noise() {
        let points = grid([0.0, 0.0], 19, 1.0);
        let labels = Dbscan::new(250.0, 20).fit_predict(&points);
        assert!(labels.iter().all(|&l| l == NOISE));
    }

    #[test]
    fn empty_input_has_no_labels() {
        assert!(Dbscan::new(250.0, 20).fit_predict(&[]).is_empty());
    }

    #[test]
    fn neighbourhood_radius_is_inclusive() {
        // Two points exactly eps apart both become core with min_samples = 2
        let labels = Dbscan::new(250.0, 2).fit_predict(&[[0.0, 0.0], [250.0, 0.0]]);
        assert_eq!(labels, vec![0, 0]);
    }

    #[test]
    fn labels_follow_first_core_point_order() {
        let mut points = grid([10_000.0, 0.0], 20, 10.0);
        points.extend(grid([0.0, 0.0], 20, 10.0));

        let labels = Dbscan::new(250.0, 20).fit_predict(&points);

        assert!(labels[..20].iter().all(|&l| l == 0));
        assert!(labels[20..].iter().all(|&l| l == 1));
    }

    #[test]
    fn chain_of_core_points_expands_transitively() {
        // 60 points on a line 100 m apart span 5.9 km but stay density-connected
        let points: Vec<[f64; 2]> = (0..60).map(|i| [i as f64 * 100.0, 0.0]).collect();
        let labels = Dbscan::new(250.0, 3).fit_predict(&points);
        assert!(labels.iter().all(|&l| l == 0));
    }
}
