//! Saddle patches: the ring swept by a probe rolling around an atom pair.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point3, Vector3};

use super::cavity::Cavity;
use super::error::SurfaceError;
use super::math::{angle_in_plane, perpendicular, rotate, rotation};
use super::settings::{INNER_TORUS_STEP_COUNT, OUTER_TORUS_STEP_COUNT};
use super::stitch::Seam;

/// Radius of the circle traced by the probe center around the pair axis, or
/// `None` when the pair admits no torus (`|rA - rB| < d < rA + rB + 2p`
/// fails).
pub fn torus_radius(radius_a: f64, radius_b: f64, probe_radius: f64, d2: f64) -> Option<f64> {
    let sum = radius_a + radius_b + 2.0 * probe_radius;
    let difference = radius_a - radius_b;
    let t2 = sum * sum - d2;
    let t3 = d2 - difference * difference;
    if !(t2 > 0.0 && t3 > 0.0 && d2 > 0.0) {
        return None;
    }
    let radius = 0.5 * t2.sqrt() * t3.sqrt() / d2.sqrt();
    radius.is_finite().then_some(radius)
}

/// Center of the probe circle: the point on AB weighted by the squared
/// probe-inflated radii.
pub fn torus_center(
    center_a: &Point3<f64>,
    radius_ap2: f64,
    center_b: &Point3<f64>,
    radius_bp2: f64,
    d2: f64,
) -> Point3<f64> {
    let t = 0.5 + (radius_ap2 - radius_bp2) / (2.0 * d2);
    center_a + (center_b - center_a) * t
}

/// Which rim of the saddle: `A` touches the lower-index atom, `B` the other.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Edge {
    A,
    B,
}

/// A cavity attached to a torus.
#[derive(Clone, Debug, PartialEq)]
pub struct TorusCavity {
    /// Index into the cavity arena
    pub cavity: usize,
    /// Handedness as seen from this torus
    pub right_handed: bool,
    /// Angle about the torus axis, measured from the reference probe
    pub angle: f64,
}

/// One free arc of a torus, tessellated into strips at fixed angular steps.
#[derive(Clone, Debug, PartialEq)]
pub struct TorusSegment {
    pub start_angle: f64,
    pub step_angle: f64,
    /// Number of strips (one more than the number of steps)
    pub strip_count: usize,
    /// Index of this segment's first strip among all strips of the torus
    pub first_strip: usize,
}

impl TorusSegment {
    fn new(start_angle: f64, end_angle: f64, first_strip: usize) -> Self {
        let step = 2.0 * PI / INNER_TORUS_STEP_COUNT as f64;
        let total = end_angle - start_angle;
        let steps = ((total / step + 1e-9).floor() as usize).max(1);
        Self {
            start_angle,
            step_angle: total / steps as f64,
            strip_count: steps + 1,
            first_strip,
        }
    }

    pub fn end_angle(&self) -> f64 {
        self.start_angle + self.step_angle * (self.strip_count - 1) as f64
    }

    /// Angle of strip `s` about the torus axis.
    pub fn strip_angle(&self, s: usize) -> f64 {
        self.start_angle + self.step_angle * s as f64
    }
}

/// The saddle between atoms `atom_a < atom_b`.
///
/// Created during discovery with center, radius and attached cavities;
/// everything else is filled in by [`Torus::resolve`].
#[derive(Clone, Debug)]
pub struct Torus {
    pub atom_a: usize,
    pub atom_b: usize,
    pub center: Point3<f64>,
    pub radius: f64,
    /// No cavity interrupts the ring
    pub full: bool,
    /// Attached cavities; sorted by angle after resolution
    pub cavities: Vec<TorusCavity>,
    /// Probe center the angles are measured from
    pub reference_probe: Point3<f64>,
    /// Arena index of the reference cavity; `None` for a full torus
    pub reference_cavity: Option<usize>,
    /// Unit vector from atom A toward atom B
    pub axis: Vector3<f64>,
    /// From `center` to the reference probe
    pub radial: Vector3<f64>,
    /// `radial` turned a quarter about the axis
    pub radial90: Vector3<f64>,
    pub tangent: Vector3<f64>,
    /// From the reference probe to its contact point on atom A
    pub outer_radial: Vector3<f64>,
    /// Angle swept across the saddle from atom A's rim to atom B's rim
    pub outer_angle: f64,
    pub segments: Vec<TorusSegment>,
    /// Samples across the saddle per strip
    pub outer_point_count: usize,
    /// Tessellated saddle points, numbered `strip * outer_point_count + j`
    pub points: Vec<Point3<f64>>,
    /// Outward normals, parallel to `points`
    pub normals: Vec<Vector3<f64>>,
    pub seams: Vec<Seam>,
}

impl Torus {
    pub fn new(atom_a: usize, atom_b: usize, center: Point3<f64>, radius: f64, full: bool) -> Self {
        Self {
            atom_a,
            atom_b,
            center,
            radius,
            full,
            cavities: Vec::new(),
            reference_probe: center,
            reference_cavity: None,
            axis: Vector3::zeros(),
            radial: Vector3::zeros(),
            radial90: Vector3::zeros(),
            tangent: Vector3::zeros(),
            outer_radial: Vector3::zeros(),
            outer_angle: 0.0,
            segments: Vec::new(),
            outer_point_count: 0,
            points: Vec::new(),
            normals: Vec::new(),
            seams: Vec::new(),
        }
    }

    pub fn attach(&mut self, cavity: usize, right_handed: bool) {
        self.cavities.push(TorusCavity {
            cavity,
            right_handed,
            angle: 0.0,
        });
    }

    pub fn atom(&self, edge: Edge) -> usize {
        match edge {
            Edge::A => self.atom_a,
            Edge::B => self.atom_b,
        }
    }

    pub fn strip_count(&self) -> usize {
        self.segments.iter().map(|s| s.strip_count).sum()
    }

    /// Index into `points` of the rim point of `segment`'s strip `strip`.
    pub fn edge_point(&self, segment: &TorusSegment, strip: usize, edge: Edge) -> usize {
        let row = (segment.first_strip + strip) * self.outer_point_count;
        match edge {
            Edge::A => row,
            Edge::B => row + self.outer_point_count - 1,
        }
    }

    /// Where the reference probe touches the atom on `edge`.
    pub fn contact_point(&self, atom_center: &Point3<f64>, probe_radius: f64) -> Point3<f64> {
        let toward = atom_center - self.reference_probe;
        self.reference_probe + toward.normalize() * probe_radius
    }

    fn invariant(&self, reason: impl Into<String>) -> SurfaceError {
        SurfaceError::TorusInvariant {
            a: self.atom_a,
            b: self.atom_b,
            reason: reason.into(),
        }
    }

    fn check_attachments(&self) -> Result<(), SurfaceError> {
        let count = self.cavities.len();
        if self.full != (count == 0) {
            return Err(self.invariant(format!(
                "full flag is {} with {count} attached cavities",
                self.full
            )));
        }
        if count % 2 != 0 {
            return Err(self.invariant(format!("odd cavity count {count}")));
        }
        let right_handed = self.cavities.iter().filter(|c| c.right_handed).count();
        if right_handed * 2 != count {
            return Err(self.invariant(format!(
                "{right_handed} of {count} cavities are right handed"
            )));
        }
        Ok(())
    }

    /// Sort the attached cavities by angle, split the ring into segments and
    /// tessellate them.
    pub fn resolve(
        &mut self,
        cavities: &[Cavity],
        center_a: &Point3<f64>,
        center_b: &Point3<f64>,
        probe_radius: f64,
    ) -> Result<(), SurfaceError> {
        self.check_attachments()?;

        let axis = center_b - center_a;
        self.reference_cavity = self
            .cavities
            .iter()
            .filter(|c| c.right_handed)
            .map(|c| c.cavity)
            .min();
        self.reference_probe = match self.reference_cavity {
            Some(id) => {
                let cavity = cavities
                    .get(id)
                    .ok_or_else(|| self.invariant(format!("unknown reference cavity {id}")))?;
                cavity.probe_center
            }
            None => self.center + perpendicular(&axis) * self.radius,
        };

        self.axis = axis.normalize();
        self.radial = self.reference_probe - self.center;
        self.radial90 = rotate(&axis, FRAC_PI_2, &self.radial);
        self.tangent = axis.cross(&self.radial).normalize();
        self.outer_radial = (center_a - self.reference_probe).normalize() * probe_radius;
        self.outer_angle = self.outer_radial.angle(&(center_b - self.reference_probe));

        self.sort_cavities(cavities)?;
        self.build_segments();
        self.tessellate();
        Ok(())
    }

    fn sort_cavities(&mut self, cavities: &[Cavity]) -> Result<(), SurfaceError> {
        for i in 0..self.cavities.len() {
            let id = self.cavities[i].cavity;
            if Some(id) == self.reference_cavity {
                self.cavities[i].angle = 0.0;
                continue;
            }
            let cavity = cavities
                .get(id)
                .ok_or_else(|| self.invariant(format!("unknown cavity {id}")))?;
            let v = cavity.probe_center - self.center;
            self.cavities[i].angle = angle_in_plane(&self.radial, &self.radial90, &v);
        }
        self.cavities.sort_by(|x, y| {
            x.angle
                .total_cmp(&y.angle)
                .then(y.right_handed.cmp(&x.right_handed))
        });

        let count = self.cavities.len();
        for (i, c) in self.cavities.iter().enumerate() {
            if (i % 2 == 0) != c.right_handed {
                return Err(self.invariant(format!(
                    "cavity {} at position {i} has the wrong handedness",
                    c.cavity
                )));
            }
            if i > 0 && i < count - 1 && c.angle <= self.cavities[i - 1].angle {
                return Err(self.invariant(format!(
                    "cavity angles do not increase at position {i}"
                )));
            }
        }
        if let Some(first) = self.cavities.first() {
            if first.angle != 0.0 {
                return Err(self.invariant("reference cavity is not at angle 0"));
            }
        }
        Ok(())
    }

    fn build_segments(&mut self) {
        self.segments.clear();
        if self.full {
            self.segments.push(TorusSegment::new(0.0, 2.0 * PI, 0));
            return;
        }
        let mut first_strip = 0;
        for pair in self.cavities.chunks_exact(2) {
            let segment = TorusSegment::new(pair[0].angle, pair[1].angle, first_strip);
            first_strip += segment.strip_count;
            self.segments.push(segment);
        }
    }

    fn tessellate(&mut self) {
        let mut count = (OUTER_TORUS_STEP_COUNT as f64 * self.outer_angle / PI).floor() as usize;
        if count % 2 == 1 {
            count += 1;
        }
        let count = count.clamp(2, 10);
        self.outer_point_count = count;

        let outer_step = self.outer_angle / (count - 1) as f64;
        let outer: Vec<Vector3<f64>> = (0..count)
            .map(|j| rotate(&self.tangent, j as f64 * outer_step, &self.outer_radial))
            .collect();

        let strips = self.strip_count();
        self.points = Vec::with_capacity(strips * count);
        self.normals = Vec::with_capacity(strips * count);
        for segment in &self.segments {
            for s in 0..segment.strip_count {
                let turn = rotation(&self.axis, segment.strip_angle(s));
                let probe = self.center + turn * self.radial;
                for o in &outer {
                    let v = turn * o;
                    self.points.push(probe + v);
                    self.normals.push(-v.normalize());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::cavity::find_cavities;
    use crate::surface::geodesic::geodesic;
    use crate::surface::neighbors::{Neighbor, Neighborhood};
    use approx::assert_relative_eq;

    #[test]
    fn radius_is_defined_iff_the_probe_fits() {
        let probe = 1.4;
        for &(ra, rb) in &[(1.5f64, 1.5f64), (1.0, 2.0), (0.5, 1.8)] {
            for step in 0..80 {
                // offset keeps d away from the exact boundaries
                let d = step as f64 * 0.1 + 0.03;
                let expected = (ra - rb).abs() < d && d < ra + rb + 2.0 * probe;
                let radius = torus_radius(ra, rb, probe, d * d);
                assert_eq!(radius.is_some(), expected, "ra {ra} rb {rb} d {d}");
                if let Some(r) = radius {
                    assert!(r.is_finite() && r > 0.0);
                }
            }
        }
        assert_eq!(torus_radius(1.0, 1.0, 1.4, 0.0), None);
    }

    #[test]
    fn center_is_where_both_probe_spheres_meet() {
        let a = Point3::origin();
        let b = Point3::new(4.0, 0.0, 0.0);
        let (rap, rbp) = (2.0f64, 3.0f64);
        let center = torus_center(&a, rap * rap, &b, rbp * rbp, 16.0);
        let radius = torus_radius(0.6, 1.6, 1.4, 16.0).unwrap();
        let probe = center + Vector3::y() * radius;
        assert_relative_eq!(nalgebra::distance(&probe, &a), rap, epsilon = 1e-9);
        assert_relative_eq!(nalgebra::distance(&probe, &b), rbp, epsilon = 1e-9);
    }

    fn pair_torus(a: &Point3<f64>, b: &Point3<f64>, r: f64, probe: f64) -> Torus {
        let d2 = nalgebra::distance_squared(a, b);
        let rp2 = (r + probe) * (r + probe);
        let radius = torus_radius(r, r, probe, d2).unwrap();
        Torus::new(0, 1, torus_center(a, rp2, b, rp2, d2), radius, true)
    }

    #[test]
    fn full_torus_rims_lie_on_both_atoms() {
        let a = Point3::origin();
        let b = Point3::new(3.0, 0.0, 0.0);
        let mut torus = pair_torus(&a, &b, 1.5, 1.4);
        torus.resolve(&[], &a, &b, 1.4).unwrap();

        assert_eq!(torus.segments.len(), 1);
        let segment = torus.segments[0].clone();
        assert_eq!(segment.strip_count, INNER_TORUS_STEP_COUNT + 1);
        assert_relative_eq!(segment.end_angle(), 2.0 * PI, epsilon = 1e-12);
        assert_eq!(torus.outer_point_count, 4);
        assert_eq!(torus.points.len(), 13 * 4);
        assert_eq!(torus.normals.len(), torus.points.len());

        for s in 0..segment.strip_count {
            let on_a = torus.points[torus.edge_point(&segment, s, Edge::A)];
            let on_b = torus.points[torus.edge_point(&segment, s, Edge::B)];
            assert_relative_eq!(nalgebra::distance(&on_a, &a), 1.5, epsilon = 1e-9);
            assert_relative_eq!(nalgebra::distance(&on_b, &b), 1.5, epsilon = 1e-9);
        }
        for (p, n) in torus.points.iter().zip(&torus.normals) {
            // normals point from the surface toward the probe circle
            let probe = p + n * 1.4;
            let off_axis = (probe - torus.center) - torus.axis * torus.axis.dot(&(probe - torus.center));
            assert_relative_eq!(off_axis.norm(), torus.radius, epsilon = 1e-9);
        }
    }

    #[test]
    fn cavities_split_the_ring_into_segments() {
        let probe = 1.4;
        let neighbor = |index: usize, center: Point3<f64>| Neighbor {
            index,
            center,
            radius: 1.5,
            radius_p: 2.9,
            radius_p2: 2.9 * 2.9,
        };
        let a = Point3::origin();
        let b = Point3::new(3.0, 0.0, 0.0);
        let k = Point3::new(1.5, 3.0 * 3f64.sqrt() / 2.0, 0.0);
        let hood = Neighborhood {
            index: 0,
            center: a,
            radius: 1.5,
            neighbors: vec![neighbor(1, b), neighbor(2, k)],
        };
        let mut torus = pair_torus(&a, &b, 1.5, probe);
        let cavities = find_cavities(
            &hood,
            &hood.neighbors[0],
            &hood.neighbors[1],
            &torus.center,
            probe,
            geodesic(2).unwrap(),
        );
        assert_eq!(cavities.len(), 2);
        torus.full = false;
        for (id, c) in cavities.iter().enumerate() {
            torus.attach(id, c.right_handed);
        }
        torus.resolve(&cavities, &a, &b, probe).unwrap();

        assert_eq!(torus.reference_cavity, Some(1));
        assert_eq!(torus.cavities[0].cavity, 1);
        assert_eq!(torus.cavities[0].angle, 0.0);
        assert!(torus.cavities[0].right_handed && !torus.cavities[1].right_handed);
        assert_eq!(torus.segments.len(), 1);
        let segment = &torus.segments[0];
        assert_relative_eq!(segment.start_angle, 0.0);
        assert_relative_eq!(segment.end_angle(), torus.cavities[1].angle, epsilon = 1e-9);
        assert!(segment.end_angle() > PI, "the free arc faces away from atom K");
        assert_eq!(torus.points.len(), segment.strip_count * torus.outer_point_count);
    }

    #[test]
    fn inconsistent_attachments_are_invariant_errors() {
        let a = Point3::origin();
        let b = Point3::new(3.0, 0.0, 0.0);

        let mut torus = pair_torus(&a, &b, 1.5, 1.4);
        torus.attach(0, true);
        assert!(matches!(
            torus.resolve(&[], &a, &b, 1.4),
            Err(SurfaceError::TorusInvariant { a: 0, b: 1, .. })
        ));

        let mut torus = pair_torus(&a, &b, 1.5, 1.4);
        torus.full = false;
        torus.attach(0, true);
        let err = torus.resolve(&[], &a, &b, 1.4).unwrap_err();
        assert!(err.to_string().contains("odd cavity count 1"), "got {err}");

        let mut torus = pair_torus(&a, &b, 1.5, 1.4);
        torus.full = false;
        torus.attach(0, true);
        torus.attach(1, true);
        let err = torus.resolve(&[], &a, &b, 1.4).unwrap_err();
        assert!(err.to_string().contains("right handed"), "got {err}");
    }

    #[test]
    fn segment_steps_cover_the_arc() {
        let segment = TorusSegment::new(0.5, 0.5 + PI, 3);
        assert_eq!(segment.strip_count, 7);
        assert_relative_eq!(segment.end_angle(), 0.5 + PI, epsilon = 1e-12);

        let tiny = TorusSegment::new(1.0, 1.1, 0);
        assert_eq!(tiny.strip_count, 2);
        assert_relative_eq!(tiny.step_angle, 0.1, epsilon = 1e-12);
    }
}
