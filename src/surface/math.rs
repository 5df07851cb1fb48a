//! Small geometric helpers shared by the torus, cavity and stitching code.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point3, Rotation3, Unit, Vector3};

/// Right-handed rotation by `angle` radians about `axis`; the identity for a
/// zero axis.
pub fn rotation(axis: &Vector3<f64>, angle: f64) -> Rotation3<f64> {
    match Unit::try_new(*axis, f64::EPSILON) {
        Some(unit) => Rotation3::from_axis_angle(&unit, angle),
        None => Rotation3::identity(),
    }
}

pub fn rotate(axis: &Vector3<f64>, angle: f64, v: &Vector3<f64>) -> Vector3<f64> {
    rotation(axis, angle) * v
}

/// Angle of `v` in the plane spanned by `v0` and `v90`, in `[0, 2π)`.
pub fn angle_in_plane(v0: &Vector3<f64>, v90: &Vector3<f64>, v: &Vector3<f64>) -> f64 {
    let angle = v0.angle(v);
    if v90.angle(v) > FRAC_PI_2 {
        2.0 * PI - angle
    } else {
        angle
    }
}

/// Intersection point of three planes, each given by a normal and a point on
/// it. `None` when the normals are (nearly) linearly dependent.
pub fn intersect_planes(
    n1: &Vector3<f64>,
    p1: &Point3<f64>,
    n2: &Vector3<f64>,
    p2: &Point3<f64>,
    n3: &Vector3<f64>,
    p3: &Point3<f64>,
) -> Option<Point3<f64>> {
    let n2n3 = n2.cross(n3);
    let n3n1 = n3.cross(n1);
    let n1n2 = n1.cross(n2);
    let denominator = n1.dot(&n2n3);
    let scale = n1.norm() * n2.norm() * n3.norm();
    if !denominator.is_finite() || denominator.abs() <= scale * 1e-10 {
        return None;
    }
    let v = (n2n3 * n1.dot(&p1.coords) + n3n1 * n2.dot(&p2.coords) + n1n2 * n3.dot(&p3.coords))
        / denominator;
    if v.iter().all(|c| c.is_finite()) {
        Some(Point3::from(v))
    } else {
        None
    }
}

/// Angle at `b` between `b→a` and `b→c`, for points in a flattened (angle,
/// distance) plane.
pub fn angle_abc(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let (bax, bay) = (a.0 - b.0, a.1 - b.1);
    let (bcx, bcy) = (c.0 - b.0, c.1 - b.1);
    let dot = bax * bcx + bay * bcy;
    let lengths = (bax * bax + bay * bay).sqrt() * (bcx * bcx + bcy * bcy).sqrt();
    if lengths == 0.0 {
        return 0.0;
    }
    (dot / lengths).clamp(-1.0, 1.0).acos()
}

/// An arbitrary unit vector perpendicular to `axis`, preferring a coordinate
/// axis when `axis` has a zero component.
pub fn perpendicular(axis: &Vector3<f64>) -> Vector3<f64> {
    if axis.x == 0.0 {
        Vector3::x()
    } else if axis.y == 0.0 {
        Vector3::y()
    } else if axis.z == 0.0 {
        Vector3::z()
    } else {
        Vector3::new(-axis.y, axis.x, 0.0).normalize()
    }
}
