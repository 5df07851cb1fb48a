//! Joins each torus rim to the boundary of the convex patch it meets.
//!
//! Every torus edge defines a plane through the probe's contact circle on
//! that atom. The atom's vertex map is first clipped against the planes of
//! all its toruses; afterwards the boundary vertices of the clipped map are
//! projected into the torus' angular frame and zipped together with the rim
//! points of each torus segment.

use std::f64::consts::{FRAC_PI_2, PI};

use nalgebra::{Point3, Vector3};

use super::bitmap::Bitmap;
use super::geodesic::Geodesic;
use super::math::{angle_abc, angle_in_plane, rotate};
use super::torus::{Edge, Torus, TorusSegment};

/// One step along a seam.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SeamEntry {
    /// Index into the torus' `points`
    Torus(usize),
    /// Geodesic vertex of the atom on the seam's edge
    Geodesic(u16),
    /// Both sides advanced at once; the seam is not one-to-one here
    Break,
}

/// The seam along one rim of one torus segment.
#[derive(Clone, Debug, PartialEq)]
pub struct Seam {
    pub edge: Edge,
    /// Index into the torus' `segments`
    pub segment: usize,
    pub entries: Vec<SeamEntry>,
}

/// The plane containing a torus' contact circle on one of its atoms.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgePlane {
    /// Reference probe contact point on the atom
    pub contact: Point3<f64>,
    /// Projection of the atom center onto the plane
    pub center: Point3<f64>,
    /// Unit normal pointing to the side the convex patch keeps
    pub normal: Vector3<f64>,
    /// Unit torus axis, A toward B
    pub axis: Vector3<f64>,
}

impl EdgePlane {
    pub fn new(torus: &Torus, edge: Edge, atom_center: &Point3<f64>, probe_radius: f64) -> Self {
        let contact = torus.contact_point(atom_center, probe_radius);
        let axis = torus.axis;
        let center = atom_center - axis * axis.dot(&(atom_center - contact));
        let normal = match edge {
            Edge::A => -axis,
            Edge::B => axis,
        };
        Self {
            contact,
            center,
            normal,
            axis,
        }
    }

    fn keeps(&self, dot_center: f64, radius: f64, direction: &Vector3<f64>) -> bool {
        dot_center + radius * direction.dot(&self.normal) >= 0.0
    }
}

/// Clear the vertices of `map` on the far side of `plane`.
pub fn clip(
    geodesic: &Geodesic,
    map: &mut Bitmap,
    atom_center: &Point3<f64>,
    radius: f64,
    plane: &EdgePlane,
) {
    let dot_center = (atom_center - plane.contact).dot(&plane.normal);
    if dot_center >= radius {
        return;
    }
    if dot_center < -radius {
        map.clear_all();
        return;
    }
    let clipped: Vec<usize> = map
        .ones()
        .filter(|&v| !plane.keeps(dot_center, radius, geodesic.vertex(v)))
        .collect();
    for v in clipped {
        map.clear(v);
    }
}

/// A boundary vertex projected into the torus frame: angle about the axis,
/// and distance from the plane along the axis, in radians of arc.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EdgePoint {
    pub vertex: u16,
    pub angle: f64,
    pub distance: f64,
}

/// Vertices that would border the plane on an otherwise exposed atom
/// (ideal edge) and also border the atom's actual exposed patch.
pub fn edge_vertices(
    geodesic: &Geodesic,
    map: &Bitmap,
    atom_center: &Point3<f64>,
    radius: f64,
    plane: &EdgePlane,
) -> Vec<u16> {
    let dot_center = (atom_center - plane.contact).dot(&plane.normal);
    let kept = |v: usize| plane.keeps(dot_center, radius, geodesic.vertex(v));
    map.ones()
        .filter(|&v| {
            let neighbors = geodesic.neighbors(v);
            let ideal = kept(v) && neighbors.iter().any(|&n| !kept(n as usize));
            ideal && neighbors.iter().any(|&n| !map.get(n as usize))
        })
        .map(|v| v as u16)
        .collect()
}

/// Project `vertices` into the plane's angular frame, sorted by angle.
pub fn project(
    geodesic: &Geodesic,
    vertices: &[u16],
    atom_center: &Point3<f64>,
    radius: f64,
    plane: &EdgePlane,
) -> Vec<EdgePoint> {
    let vector0 = plane.contact - plane.center;
    let vector90 = rotate(&plane.axis, FRAC_PI_2, &vector0);
    let scale = if radius > 0.0 { PI / radius } else { 0.0 };
    let mut points: Vec<EdgePoint> = vertices
        .iter()
        .map(|&vertex| {
            let p = atom_center + geodesic.vertex(vertex as usize) * radius;
            let offset = p - plane.center;
            let along = offset.dot(&plane.normal);
            let in_plane = offset - plane.normal * along;
            EdgePoint {
                vertex,
                angle: angle_in_plane(&vector0, &vector90, &in_plane),
                distance: along * scale,
            }
        })
        .collect();
    points.sort_by(|a, b| a.angle.total_cmp(&b.angle));
    points
}

fn find_ge(points: &[EdgePoint], angle: f64) -> usize {
    points.partition_point(|p| p.angle < angle)
}

fn find_gt(points: &[EdgePoint], angle: f64) -> usize {
    points.partition_point(|p| p.angle <= angle)
}

/// Greedy walk pairing rim angles with boundary points. Returns the visited
/// `(torus, geodesic)` index pairs, starting at `(0, 0)`; each later pair
/// advances exactly one side.
pub fn stitch_em(torus_angles: &[f64], geodesic_points: &[EdgePoint]) -> Vec<(usize, usize)> {
    let (nt, ng) = (torus_angles.len(), geodesic_points.len());
    if nt == 0 || ng == 0 {
        return Vec::new();
    }
    let at = |g: usize| (geodesic_points[g].angle, geodesic_points[g].distance);
    let mut pairs = vec![(0, 0)];
    let (mut t, mut g) = (0, 0);
    while t + 1 < nt && g + 1 < ng {
        let torus_step = angle_abc((torus_angles[t], 0.0), (torus_angles[t + 1], 0.0), at(g));
        let geodesic_step = angle_abc((torus_angles[t], 0.0), at(g + 1), at(g));
        if torus_step > geodesic_step {
            t += 1;
        } else {
            g += 1;
        }
        pairs.push((t, g));
    }
    while t + 1 < nt {
        t += 1;
        pairs.push((t, g));
    }
    while g + 1 < ng {
        g += 1;
        pairs.push((t, g));
    }
    pairs
}

/// Turn walk pairs into seam entries, naming each side only when it changes.
pub fn create_seam(pairs: &[(usize, usize)], torus_points: &[usize], vertices: &[u16]) -> Vec<SeamEntry> {
    let mut entries = Vec::with_capacity(pairs.len() + 1);
    let mut previous: Option<(usize, usize)> = None;
    for &(t, g) in pairs {
        let (torus_moved, geodesic_moved) = match previous {
            None => (true, true),
            Some((pt, pg)) => (t != pt, g != pg),
        };
        if torus_moved && geodesic_moved && previous.is_some() {
            entries.push(SeamEntry::Break);
        }
        if torus_moved {
            entries.push(SeamEntry::Torus(torus_points[t]));
        }
        if geodesic_moved {
            entries.push(SeamEntry::Geodesic(vertices[g]));
        }
        previous = Some((t, g));
    }
    entries
}

fn segment_seam(
    torus: &Torus,
    index: usize,
    segment: &TorusSegment,
    edge: Edge,
    points: &[EdgePoint],
) -> Seam {
    let end = segment.start_angle + segment.step_angle * segment.strip_count as f64;
    let range = find_ge(points, segment.start_angle)..find_gt(points, end);
    let along = &points[range];

    let torus_angles: Vec<f64> = (0..segment.strip_count).map(|s| segment.strip_angle(s)).collect();
    let torus_points: Vec<usize> = (0..segment.strip_count)
        .map(|s| torus.edge_point(segment, s, edge))
        .collect();
    let vertices: Vec<u16> = along.iter().map(|p| p.vertex).collect();

    let pairs = stitch_em(&torus_angles, along);
    Seam {
        edge,
        segment: index,
        entries: create_seam(&pairs, &torus_points, &vertices),
    }
}

/// Seams for both rims of every segment of `torus`. `maps` holds the clipped
/// vertex maps of all atoms; a rim whose atom has no map gets no seam.
pub fn stitch_torus(
    geodesic: &Geodesic,
    torus: &Torus,
    maps: &[Option<Bitmap>],
    centers: &[Point3<f64>],
    radii: &[f64],
    probe_radius: f64,
) -> Vec<Seam> {
    let mut seams = Vec::new();
    for edge in [Edge::A, Edge::B] {
        let atom = torus.atom(edge);
        let Some(map) = maps.get(atom).and_then(Option::as_ref) else {
            continue;
        };
        let (center, radius) = (&centers[atom], radii[atom]);
        let plane = EdgePlane::new(torus, edge, center, probe_radius);
        let vertices = edge_vertices(geodesic, map, center, radius, &plane);
        let mut points = project(geodesic, &vertices, center, radius, &plane);

        let wraps = torus
            .segments
            .iter()
            .any(|s| s.start_angle + s.step_angle * s.strip_count as f64 > 2.0 * PI);
        if torus.full {
            if let Some(&first) = points.first() {
                points.push(EdgePoint {
                    angle: first.angle + 2.0 * PI,
                    ..first
                });
            }
        } else if wraps {
            let shifted: Vec<EdgePoint> = points
                .iter()
                .map(|p| EdgePoint {
                    angle: p.angle + 2.0 * PI,
                    ..*p
                })
                .collect();
            points.extend(shifted);
        }

        for (index, segment) in torus.segments.iter().enumerate() {
            seams.push(segment_seam(torus, index, segment, edge, &points));
        }
    }
    seams
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::convex::visible_vertices;
    use crate::surface::geodesic::geodesic;
    use crate::surface::neighbors::{Neighbor, Neighborhood};
    use crate::surface::torus::{torus_center, torus_radius};

    const PROBE: f64 = 1.4;

    fn two_atoms() -> (Vec<Point3<f64>>, Vec<f64>, Torus) {
        let centers = vec![Point3::origin(), Point3::new(3.0, 0.0, 0.0)];
        let radii = vec![1.5, 1.5];
        let rp2 = 2.9 * 2.9;
        let mut torus = Torus::new(
            0,
            1,
            torus_center(&centers[0], rp2, &centers[1], rp2, 9.0),
            torus_radius(1.5, 1.5, PROBE, 9.0).unwrap(),
            true,
        );
        torus.resolve(&[], &centers[0], &centers[1], PROBE).unwrap();
        (centers, radii, torus)
    }

    fn hood(index: usize, centers: &[Point3<f64>]) -> Neighborhood {
        let other = 1 - index;
        Neighborhood {
            index,
            center: centers[index],
            radius: 1.5,
            neighbors: vec![Neighbor {
                index: other,
                center: centers[other],
                radius: 1.5,
                radius_p: 2.9,
                radius_p2: 2.9 * 2.9,
            }],
        }
    }

    #[test]
    fn clipping_keeps_the_side_away_from_the_partner() {
        let g = geodesic(3).unwrap();
        let (centers, _, torus) = two_atoms();
        let plane = EdgePlane::new(&torus, Edge::A, &centers[0], PROBE);
        let mut map = Bitmap::full(g.vertex_count());
        clip(g, &mut map, &centers[0], 1.5, &plane);
        assert!(map.any() && !map.all());
        for v in map.ones() {
            let p = centers[0] + g.vertex(v) * 1.5;
            assert!(p.x <= plane.contact.x + 1e-9, "vertex {v} at {p} is past the rim");
        }
    }

    #[test]
    fn clipping_early_outs_and_clears() {
        let g = geodesic(1).unwrap();
        let plane = EdgePlane {
            contact: Point3::new(0.0, 0.0, 5.0),
            center: Point3::new(0.0, 0.0, 5.0),
            normal: Vector3::z(),
            axis: Vector3::z(),
        };
        let mut map = Bitmap::full(g.vertex_count());
        clip(g, &mut map, &Point3::new(0.0, 0.0, 7.0), 1.5, &plane);
        assert!(map.all());
        clip(g, &mut map, &Point3::origin(), 1.5, &plane);
        assert!(!map.any());
    }

    #[test]
    fn walk_advances_one_side_at_a_time() {
        let torus_angles = [0.0, 0.5, 1.0, 1.5];
        let points: Vec<EdgePoint> = [0.1, 0.3, 0.9, 1.2, 1.6]
            .iter()
            .enumerate()
            .map(|(i, &angle)| EdgePoint {
                vertex: i as u16 + 40,
                angle,
                distance: 0.05,
            })
            .collect();
        let pairs = stitch_em(&torus_angles, &points);
        assert_eq!(pairs.first(), Some(&(0, 0)));
        assert_eq!(pairs.last(), Some(&(3, 4)));
        assert_eq!(pairs.len(), 4 + 5 - 1);
        for w in pairs.windows(2) {
            let (dt, dg) = (w[1].0 - w[0].0, w[1].1 - w[0].1);
            assert_eq!(dt + dg, 1, "step {:?} -> {:?}", w[0], w[1]);
        }
        assert!(stitch_em(&[], &points).is_empty());
    }

    #[test]
    fn seam_names_each_side_once() {
        let pairs = [(0, 0), (1, 0), (1, 1), (2, 2)];
        let entries = create_seam(&pairs, &[10, 11, 12], &[7, 8, 9]);
        assert_eq!(
            entries,
            vec![
                SeamEntry::Torus(10),
                SeamEntry::Geodesic(7),
                SeamEntry::Torus(11),
                SeamEntry::Geodesic(8),
                SeamEntry::Break,
                SeamEntry::Torus(12),
                SeamEntry::Geodesic(9),
            ]
        );
    }

    #[test]
    fn full_torus_gets_a_seam_on_each_rim() {
        let g = geodesic(3).unwrap();
        let (centers, radii, torus) = two_atoms();
        let mut maps: Vec<Option<Bitmap>> = Vec::new();
        for (atom, edge) in [(0, Edge::A), (1, Edge::B)] {
            let mut map = visible_vertices(g, &hood(atom, &centers), PROBE);
            let plane = EdgePlane::new(&torus, edge, &centers[atom], PROBE);
            clip(g, &mut map, &centers[atom], radii[atom], &plane);
            maps.push(Some(map));
        }

        let seams = stitch_torus(g, &torus, &maps, &centers, &radii, PROBE);
        assert_eq!(seams.len(), 2);
        for seam in &seams {
            let atom = torus.atom(seam.edge);
            let map = maps[atom].as_ref().unwrap();
            let rim: Vec<usize> = (0..torus.segments[0].strip_count)
                .map(|s| torus.edge_point(&torus.segments[0], s, seam.edge))
                .collect();
            assert!(!seam.entries.is_empty());
            for entry in &seam.entries {
                match *entry {
                    SeamEntry::Geodesic(v) => assert!(map.get(v as usize), "vertex {v} hidden"),
                    SeamEntry::Torus(t) => assert!(rim.contains(&t), "point {t} off the rim"),
                    SeamEntry::Break => {}
                }
            }
        }
    }

    #[test]
    fn projection_is_sorted_by_angle() {
        let g = geodesic(2).unwrap();
        let (centers, _, torus) = two_atoms();
        let plane = EdgePlane::new(&torus, Edge::B, &centers[1], PROBE);
        let vertices: Vec<u16> = (0..g.vertex_count() as u16).collect();
        let points = project(g, &vertices, &centers[1], 1.5, &plane);
        assert!(points.windows(2).all(|w| w[0].angle <= w[1].angle));
        assert!(points.iter().all(|p| (0.0..=2.0 * PI).contains(&p.angle)));
    }
}
