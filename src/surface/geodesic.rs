//! Geodesic spheres built by repeatedly quadrupling the faces of an icosahedron.
//!
//! Every level keeps the vertices of the level below it as a prefix, so a
//! vertex id means the same direction at every level it exists in. Faces are
//! emitted child by child, which keeps the descendants of each of the 20
//! icosahedron faces contiguous: base face `f` owns faces
//! `f * 4^level .. (f + 1) * 4^level`.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::ops::Range;
use std::sync::OnceLock;

use nalgebra::Vector3;

use super::error::SurfaceError;

/// Finest supported subdivision (2562 vertices)
pub const MAX_LEVEL: usize = 4;

/// Faces of the level-0 icosahedron.
pub const ICOSAHEDRON_FACES: [[u16; 3]; 20] = [
    [0, 1, 2],
    [0, 2, 3],
    [0, 3, 4],
    [0, 4, 5],
    [0, 5, 1],
    [1, 6, 2],
    [2, 7, 3],
    [3, 8, 4],
    [4, 9, 5],
    [5, 10, 1],
    [6, 1, 10],
    [7, 2, 6],
    [8, 3, 7],
    [9, 4, 8],
    [10, 5, 9],
    [11, 6, 10],
    [11, 7, 6],
    [11, 8, 7],
    [11, 9, 8],
    [11, 10, 9],
];

/// Number of vertices of the icosahedron; these have 5 neighbors, all later
/// vertices have 6.
pub const BASE_VERTEX_COUNT: usize = 12;

/// One subdivision level of the unit geodesic sphere.
#[derive(Debug)]
pub struct Geodesic {
    level: usize,
    vertices: Vec<Vector3<f64>>,
    faces: Vec<[u16; 3]>,
    neighbors: Vec<Vec<u16>>,
}

static LEVELS: OnceLock<Vec<Geodesic>> = OnceLock::new();

/// Shared geodesic sphere for `level`, built on first use.
pub fn geodesic(level: usize) -> Result<&'static Geodesic, SurfaceError> {
    LEVELS
        .get_or_init(build_levels)
        .get(level)
        .ok_or(SurfaceError::UnsupportedGeodesicLevel {
            level,
            max: MAX_LEVEL,
        })
}

impl Geodesic {
    pub fn level(&self) -> usize {
        self.level
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Unit direction of vertex `v`.
    pub fn vertex(&self, v: usize) -> &Vector3<f64> {
        &self.vertices[v]
    }

    pub fn vertices(&self) -> &[Vector3<f64>] {
        &self.vertices
    }

    pub fn faces(&self) -> &[[u16; 3]] {
        &self.faces
    }

    /// Vertices sharing an edge with `v`.
    pub fn neighbors(&self, v: usize) -> &[u16] {
        &self.neighbors[v]
    }

    /// Faces descended from icosahedron face `base_face`.
    pub fn descendants(&self, base_face: usize) -> Range<usize> {
        let per_base = 4usize.pow(self.level as u32);
        base_face * per_base..(base_face + 1) * per_base
    }

    /// The vertex whose direction is closest (smallest angle) to `direction`.
    pub fn nearest_vertex(&self, direction: &Vector3<f64>) -> u16 {
        let mut champion = 0;
        let mut best = f64::NEG_INFINITY;
        for (v, vertex) in self.vertices.iter().enumerate() {
            let dot = vertex.dot(direction);
            if dot > best {
                best = dot;
                champion = v;
            }
        }
        champion as u16
    }
}

fn icosahedron() -> Geodesic {
    let half_root5 = 0.5 * 5f64.sqrt();
    let one_fifth = 2.0 * PI / 5.0;
    let one_tenth = one_fifth / 2.0;

    let mut vertices = vec![Vector3::zeros(); BASE_VERTEX_COUNT];
    vertices[0] = Vector3::new(0.0, 0.0, half_root5);
    for i in 0..5 {
        let a = i as f64 * one_fifth;
        vertices[i + 1] = Vector3::new(a.cos(), a.sin(), 0.5);
        let b = a + one_tenth;
        vertices[i + 6] = Vector3::new(b.cos(), b.sin(), -0.5);
    }
    vertices[11] = Vector3::new(0.0, 0.0, -half_root5);
    for v in vertices.iter_mut() {
        v.normalize_mut();
    }

    let faces = ICOSAHEDRON_FACES.to_vec();
    let neighbors = neighbors_from_faces(vertices.len(), &faces);
    Geodesic {
        level: 0,
        vertices,
        faces,
        neighbors,
    }
}

fn quadruple(parent: &Geodesic) -> Geodesic {
    let mut vertices = parent.vertices.clone();
    let mut midpoints: HashMap<(u16, u16), u16> = HashMap::new();
    let mut midpoint = |a: u16, b: u16, vertices: &mut Vec<Vector3<f64>>| -> u16 {
        let key = if a < b { (a, b) } else { (b, a) };
        *midpoints.entry(key).or_insert_with(|| {
            let mid = (vertices[a as usize] + vertices[b as usize]).normalize();
            vertices.push(mid);
            (vertices.len() - 1) as u16
        })
    };

    let mut faces = Vec::with_capacity(parent.faces.len() * 4);
    for &[a, b, c] in &parent.faces {
        let ab = midpoint(a, b, &mut vertices);
        let bc = midpoint(b, c, &mut vertices);
        let ca = midpoint(c, a, &mut vertices);
        faces.push([a, ab, ca]);
        faces.push([b, bc, ab]);
        faces.push([c, ca, bc]);
        faces.push([ca, ab, bc]);
    }

    let neighbors = neighbors_from_faces(vertices.len(), &faces);
    Geodesic {
        level: parent.level + 1,
        vertices,
        faces,
        neighbors,
    }
}

fn neighbors_from_faces(vertex_count: usize, faces: &[[u16; 3]]) -> Vec<Vec<u16>> {
    let mut neighbors: Vec<Vec<u16>> = vec![Vec::with_capacity(6); vertex_count];
    let mut link = |a: u16, b: u16| {
        let list = &mut neighbors[a as usize];
        if !list.contains(&b) {
            list.push(b);
        }
    };
    for &[a, b, c] in faces {
        link(a, b);
        link(b, a);
        link(b, c);
        link(c, b);
        link(c, a);
        link(a, c);
    }
    for list in neighbors.iter_mut() {
        list.sort_unstable();
    }
    neighbors
}

fn build_levels() -> Vec<Geodesic> {
    let mut levels = vec![icosahedron()];
    for level in 0..MAX_LEVEL {
        let next = quadruple(&levels[level]);
        levels.push(next);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn vertex_and_face_counts() {
        let expected = [(12, 20), (42, 80), (162, 320), (642, 1280), (2562, 5120)];
        for (level, &(v, f)) in expected.iter().enumerate() {
            let g = geodesic(level).unwrap();
            assert_eq!(g.vertex_count(), v, "vertex count at level {level}");
            assert_eq!(g.face_count(), f, "face count at level {level}");
        }
    }

    #[test]
    fn unsupported_level_is_an_error() {
        assert_eq!(
            geodesic(MAX_LEVEL + 1).unwrap_err(),
            SurfaceError::UnsupportedGeodesicLevel {
                level: MAX_LEVEL + 1,
                max: MAX_LEVEL
            }
        );
    }

    #[test]
    fn vertices_are_unit_vectors() {
        let g = geodesic(3).unwrap();
        for v in g.vertices() {
            assert_relative_eq!(v.norm(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn five_neighbors_at_the_poles_six_elsewhere() {
        let g = geodesic(2).unwrap();
        for v in 0..g.vertex_count() {
            let expected = if v < BASE_VERTEX_COUNT { 5 } else { 6 };
            assert_eq!(g.neighbors(v).len(), expected, "neighbors of vertex {v}");
        }
    }

    #[test]
    fn lower_levels_are_a_prefix() {
        let coarse = geodesic(1).unwrap();
        let fine = geodesic(3).unwrap();
        for v in 0..coarse.vertex_count() {
            assert_relative_eq!(*coarse.vertex(v), *fine.vertex(v), epsilon = 1e-12);
        }
    }

    #[test]
    fn descendants_start_at_the_base_corners() {
        let g = geodesic(2).unwrap();
        for (f, base) in ICOSAHEDRON_FACES.iter().enumerate() {
            let range = g.descendants(f);
            assert_eq!(range.len(), 16);
            // Children 0, 1 and 2 of every split lead with corners A, B and C.
            let step = range.len() / 4;
            for (corner, &expected) in base.iter().enumerate() {
                assert_eq!(g.faces()[range.start + corner * step][0], expected);
            }
        }
    }

    #[test]
    fn nearest_vertex_finds_the_pole() {
        let g = geodesic(3).unwrap();
        assert_eq!(g.nearest_vertex(&Vector3::new(0.01, 0.0, 1.0)), 0);
        assert_eq!(g.nearest_vertex(&Vector3::new(0.0, -0.02, -3.0)), 11);
    }
}
