//! Concave patches: probe positions resting on three atoms at once.

use nalgebra::{Point3, Vector3};
use tracing::trace;

use super::geodesic::Geodesic;
use super::math::intersect_planes;
use super::neighbors::{Neighbor, Neighborhood};
use super::torus::torus_center;

/// A probe sphere touching atoms I, J and K (I < J < K).
#[derive(Clone, Debug, PartialEq)]
pub struct Cavity {
    pub atoms: [usize; 3],
    /// The probe sits on the `(J - I) x (K - I)` side of the IJK plane
    pub right_handed: bool,
    pub probe_center: Point3<f64>,
    /// Midpoint between this probe position and its mirror image across the
    /// IJK plane
    pub probe_base: Point3<f64>,
    /// Where the probe touches each atom
    pub contact_points: [Point3<f64>; 3],
    /// Deepest point of the concave patch
    pub bottom_point: Point3<f64>,
    /// Outward surface normal at `bottom_point`
    pub bottom_normal: Vector3<f64>,
    /// Geodesic vertex of each atom nearest to its contact point
    pub nearest_vertices: [u16; 3],
}

impl Cavity {
    fn new(
        atoms: [usize; 3],
        centers: [&Point3<f64>; 3],
        right_handed: bool,
        probe_center: Point3<f64>,
        probe_base: Point3<f64>,
        probe_radius: f64,
        geodesic: &Geodesic,
    ) -> Self {
        let directions = centers.map(|c| (c - probe_center).normalize());
        let contact_points = directions.map(|d| probe_center + d * probe_radius);
        let down = (directions[0] + directions[1] + directions[2]).normalize();
        let nearest_vertices = centers.map(|c| geodesic.nearest_vertex(&(probe_center - c)));
        Self {
            atoms,
            right_handed,
            probe_center,
            probe_base,
            contact_points,
            bottom_point: probe_center + down * probe_radius,
            bottom_normal: -down,
            nearest_vertices,
        }
    }
}

/// Probe height above the IJK plane, or `None` when the probe cannot touch
/// all three atoms at once.
pub fn probe_height(center_i: &Point3<f64>, radius_ip2: f64, probe_base: &Point3<f64>) -> Option<f64> {
    let height2 = radius_ip2 - nalgebra::distance_squared(probe_base, center_i);
    if height2 > 0.0 {
        Some(height2.sqrt())
    } else {
        None
    }
}

/// The 0, 1 or 2 valid probe positions for the triple formed by the center
/// atom of `hood` and neighbors `j` and `k`.
///
/// `torus_center_ij` is the torus center of the pair (I, J); the caller has
/// already checked that all three pairs admit a torus.
pub fn find_cavities(
    hood: &Neighborhood,
    j: &Neighbor,
    k: &Neighbor,
    torus_center_ij: &Point3<f64>,
    probe_radius: f64,
    geodesic: &Geodesic,
) -> Vec<Cavity> {
    let center_i = &hood.center;
    let radius_ip = hood.radius + probe_radius;
    let radius_ip2 = radius_ip * radius_ip;
    let vector_ij = j.center - center_i;
    let vector_ik = k.center - center_i;

    let normal = vector_ij.cross(&vector_ik);
    let length = normal.norm();
    if !(length.is_finite() && length > 0.0) {
        trace!("Atoms {}, {}, {} are collinear", hood.index, j.index, k.index);
        return Vec::new();
    }
    let normal = normal / length;

    let torus_center_ik = torus_center(
        center_i,
        radius_ip2,
        &k.center,
        k.radius_p2,
        vector_ik.norm_squared(),
    );
    let Some(probe_base) = intersect_planes(
        &vector_ij,
        torus_center_ij,
        &vector_ik,
        &torus_center_ik,
        &normal,
        center_i,
    ) else {
        trace!(
            "No plane intersection for atoms {}, {}, {}",
            hood.index,
            j.index,
            k.index
        );
        return Vec::new();
    };
    let Some(height) = probe_height(center_i, radius_ip2, &probe_base) else {
        return Vec::new();
    };

    let atoms = [hood.index, j.index, k.index];
    let centers = [center_i, &j.center, &k.center];
    [-1.0, 1.0]
        .into_iter()
        .filter_map(|side: f64| {
            let probe = probe_base + normal * (side * height);
            if !hood.probe_is_clear(&probe, &atoms) {
                return None;
            }
            Some(Cavity::new(
                atoms,
                centers,
                side > 0.0,
                probe,
                probe_base,
                probe_radius,
                geodesic,
            ))
        })
        .collect()
}
