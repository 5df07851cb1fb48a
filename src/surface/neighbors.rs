//! Spatial neighbor search over atom centers.

use nalgebra::Point3;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use super::types::AtomSet;

/// An atom center stored in the R*-tree.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AtomPoint {
    pub index: usize,
    pub position: [f64; 3],
}

impl AtomPoint {
    pub fn new(index: usize, position: &Point3<f64>) -> Self {
        Self {
            index,
            position: [position.x, position.y, position.z],
        }
    }
}

impl RTreeObject for AtomPoint {
    type Envelope = AABB<[f64; 3]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position)
    }
}

impl PointDistance for AtomPoint {
    fn distance_2(&self, point: &[f64; 3]) -> f64 {
        let dx = self.position[0] - point[0];
        let dy = self.position[1] - point[1];
        let dz = self.position[2] - point[2];
        dx * dx + dy * dy + dz * dz
    }
}

/// Answers "which atoms lie within r of this point" for one generation pass.
/// Built from the positions of that pass; a new pass builds a new finder.
pub struct NeighborFinder {
    tree: RTree<AtomPoint>,
}

impl NeighborFinder {
    pub fn new(positions: &[Point3<f64>]) -> Self {
        let points: Vec<AtomPoint> = positions
            .iter()
            .enumerate()
            .map(|(i, p)| AtomPoint::new(i, p))
            .collect();
        Self {
            tree: RTree::bulk_load(points),
        }
    }

    /// Indices of every atom whose center lies within `radius` of `center`,
    /// in no particular order. The atom at `center` itself is included.
    pub fn within<'a>(
        &'a self,
        center: &Point3<f64>,
        radius: f64,
    ) -> impl Iterator<Item = usize> + 'a {
        self.tree
            .locate_within_distance([center.x, center.y, center.z], radius * radius)
            .map(|p| p.index)
    }
}

/// One neighbor of the atom being processed.
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub center: Point3<f64>,
    /// Effective radius
    pub radius: f64,
    /// Effective radius plus probe radius
    pub radius_p: f64,
    pub radius_p2: f64,
}

/// The atoms close enough to touch a probe resting on atom `index`, sorted
/// by atom index.
#[derive(Clone, Debug)]
pub struct Neighborhood {
    pub index: usize,
    pub center: Point3<f64>,
    pub radius: f64,
    pub neighbors: Vec<Neighbor>,
}

/// Inputs that stay fixed while neighborhoods are collected.
pub struct NeighborQuery<'a> {
    pub finder: &'a NeighborFinder,
    pub positions: &'a [Point3<f64>],
    pub radii: &'a [f64],
    pub probe_radius: f64,
    pub max_radius: f64,
    /// When set, only these atoms count as neighbors
    pub restrict_to: Option<&'a AtomSet>,
    pub disregard_neighbors: bool,
}

impl NeighborQuery<'_> {
    pub fn neighborhood(&self, index: usize) -> Neighborhood {
        let center = self.positions[index];
        let radius = self.radii[index];
        let mut neighbors = Vec::new();
        if !self.disregard_neighbors {
            let diameter_p = 2.0 * self.probe_radius;
            let search = radius + diameter_p + self.max_radius;
            for j in self.finder.within(&center, search) {
                if j == index {
                    continue;
                }
                if let Some(selected) = self.restrict_to {
                    if !selected.get(j) {
                        continue;
                    }
                }
                let radius_j = self.radii[j];
                if nalgebra::distance(&center, &self.positions[j]) > radius + diameter_p + radius_j
                {
                    continue;
                }
                let radius_p = radius_j + self.probe_radius;
                neighbors.push(Neighbor {
                    index: j,
                    center: self.positions[j],
                    radius: radius_j,
                    radius_p,
                    radius_p2: radius_p * radius_p,
                });
            }
            neighbors.sort_by_key(|n| n.index);
        }
        Neighborhood {
            index,
            center,
            radius,
            neighbors,
        }
    }
}

impl Neighborhood {
    /// True when `probe` is clear of every neighbor other than `skip`.
    pub fn probe_is_clear(&self, probe: &Point3<f64>, skip: &[usize]) -> bool {
        self.neighbors.iter().all(|n| {
            skip.contains(&n.index) || nalgebra::distance_squared(probe, &n.center) >= n.radius_p2
        })
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_of_atoms(n: usize, spacing: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|i| Point3::new(i as f64 * spacing, 0.0, 0.0))
            .collect()
    }

    #[test]
    fn finds_atoms_within_radius() {
        let positions = line_of_atoms(10, 1.0);
        let finder = NeighborFinder::new(&positions);
        let mut found: Vec<usize> = finder.within(&positions[4], 2.5).collect();
        found.sort_unstable();
        assert_eq!(found, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn neighborhood_is_sorted_and_excludes_self() {
        let positions = line_of_atoms(6, 1.5);
        let radii = vec![1.0; positions.len()];
        let finder = NeighborFinder::new(&positions);
        let query = NeighborQuery {
            finder: &finder,
            positions: &positions,
            radii: &radii,
            probe_radius: 0.6,
            max_radius: 1.0,
            restrict_to: None,
            disregard_neighbors: false,
        };
        let hood = query.neighborhood(2);
        let indices: Vec<usize> = hood.neighbors.iter().map(|n| n.index).collect();
        // cutoff 1 + 1.2 + 1 = 3.2 Å
        assert_eq!(indices, vec![0, 1, 3, 4]);
        assert!((hood.neighbors[0].radius_p - 1.6).abs() < 1e-12);
    }

    #[test]
    fn selection_and_isolation_flags() {
        let positions = line_of_atoms(4, 1.0);
        let radii = vec![1.0; positions.len()];
        let finder = NeighborFinder::new(&positions);
        let selected = AtomSet::from_indices(4, [0, 1, 3]);
        let mut query = NeighborQuery {
            finder: &finder,
            positions: &positions,
            radii: &radii,
            probe_radius: 1.4,
            max_radius: 1.0,
            restrict_to: Some(&selected),
            disregard_neighbors: false,
        };
        let indices: Vec<usize> = query
            .neighborhood(1)
            .neighbors
            .iter()
            .map(|n| n.index)
            .collect();
        assert_eq!(indices, vec![0, 3]);

        query.disregard_neighbors = true;
        assert!(query.neighborhood(1).is_empty());
    }
}
