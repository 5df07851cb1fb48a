//! Convex patches: which geodesic points of an atom's probe-inflated sphere
//! are not buried inside a neighbor's probe-inflated sphere.

use nalgebra::Point3;

use super::bitmap::Bitmap;
use super::geodesic::{Geodesic, ICOSAHEDRON_FACES};
use super::neighbors::{Neighbor, Neighborhood};

/// Vertex visibility map for the atom at the center of `hood`.
///
/// The three corners of each icosahedron face are tested first. When one
/// neighbor buries all three corners and the buried cap is no larger than a
/// hemisphere, the spherical triangle between them is buried as well and its
/// vertices are cleared without testing them one by one.
pub fn visible_vertices(geodesic: &Geodesic, hood: &Neighborhood, probe_radius: f64) -> Bitmap {
    let vertex_count = geodesic.vertex_count();
    let mut visible = Bitmap::full(vertex_count);
    if hood.is_empty() {
        return visible;
    }
    let radius_ip = hood.radius + probe_radius;
    let point = |v: usize| -> Point3<f64> { hood.center + geodesic.vertex(v) * radius_ip };
    let buried_by = |p: &Point3<f64>, n: &Neighbor| -> bool {
        nalgebra::distance_squared(p, &n.center) < n.radius_p2
    };

    let mut tested = Bitmap::new(vertex_count);
    for (base, corners) in ICOSAHEDRON_FACES.iter().enumerate() {
        let corner_points = corners.map(|v| point(v as usize));
        let mut whole_face_buried = false;
        for n in &hood.neighbors {
            let buried = corner_points.map(|p| buried_by(&p, n));
            for (k, &b) in buried.iter().enumerate() {
                if b {
                    visible.clear(corners[k] as usize);
                }
            }
            if buried.iter().all(|&b| b) && cap_within_hemisphere(hood, radius_ip, n) {
                whole_face_buried = true;
                break;
            }
        }

        for face in &geodesic.faces()[geodesic.descendants(base)] {
            for &v in face {
                let v = v as usize;
                if tested.get(v) || !visible.get(v) {
                    continue;
                }
                if whole_face_buried {
                    visible.clear(v);
                } else {
                    let p = point(v);
                    if hood.neighbors.iter().any(|n| buried_by(&p, n)) {
                        visible.clear(v);
                    }
                }
                tested.set(v);
            }
        }
    }
    visible
}

/// Points of sphere I buried by neighbor J form a cap `v·u > c`; the cap is
/// convex on the sphere when `c >= 0`.
fn cap_within_hemisphere(hood: &Neighborhood, radius_ip: f64, n: &Neighbor) -> bool {
    let d2 = nalgebra::distance_squared(&hood.center, &n.center);
    radius_ip * radius_ip + d2 >= n.radius_p2
}

/// Adds the missing vertices of every face that has some, but not all, of
/// its vertices visible. Faces are taken from `geodesic`, which must not be
/// finer than the level `map` was computed on.
pub fn add_incomplete_faces(geodesic: &Geodesic, map: &mut Bitmap) {
    let mut missing = Bitmap::new(map.len());
    for face in geodesic.faces() {
        let ok = face.map(|v| map.get(v as usize));
        let count = ok.iter().filter(|&&b| b).count();
        if count == 0 || count == 3 {
            continue;
        }
        for (k, &v) in face.iter().enumerate() {
            if !ok[k] && (v as usize) < map.len() {
                missing.set(v as usize);
            }
        }
    }
    map.union_with(&missing);
}

/// A face is visible iff all three of its vertices are.
pub fn face_bitmap(geodesic: &Geodesic, vertex_map: &Bitmap) -> Bitmap {
    let mut faces = Bitmap::new(geodesic.face_count());
    for (f, face) in geodesic.faces().iter().enumerate() {
        if face.iter().all(|&v| vertex_map.get(v as usize)) {
            faces.set(f);
        }
    }
    faces
}
