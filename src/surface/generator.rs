//! The generation pipeline and its output.
//!
//! One call to [`SurfaceGenerator::generate`] runs these phases, each a
//! barrier for the next:
//!
//! 1. per selected atom: neighborhood, convex visibility map, and the
//!    cavities and torus candidates the atom owns (it is the lowest index of
//!    the pair or triple);
//! 2. merge: cavities into one arena, toruses into a pair-keyed registry;
//! 3. per torus: sort cavities, build and tessellate segments;
//! 4. per atom: clip the vertex map against the planes of its toruses;
//! 5. per torus: stitch both rims to the clipped maps;
//! 6. per atom: grow by incomplete faces and derive the face map.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info, trace};

use super::bitmap::Bitmap;
use super::cavity::{find_cavities, Cavity};
use super::convex::{add_incomplete_faces, face_bitmap, visible_vertices};
use super::error::SurfaceError;
use super::geodesic::{geodesic, Geodesic};
use super::math::perpendicular;
use super::neighbors::{NeighborFinder, NeighborQuery, Neighborhood};
use super::properties::Presentation;
use super::settings::{Mode, Settings, MIN_PAIR_DISTANCE};
use super::stitch::{clip, stitch_torus, EdgePlane};
use super::torus::{torus_center, torus_radius, Edge, Torus};
use super::types::{Atom, AtomSet};

/// Atom pair that admits a torus, found while processing its lower atom.
#[derive(Clone, Debug)]
struct PairCandidate {
    a: usize,
    b: usize,
    center: Point3<f64>,
    radius: f64,
    /// A probe on the torus circle touches nothing but A and B
    full_probe_clear: bool,
}

/// Everything phase 1 produces for one atom.
struct Discovery {
    atom: usize,
    map: Bitmap,
    cavities: Vec<Cavity>,
    pairs: Vec<PairCandidate>,
}

/// Counts summarizing a generated surface.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SurfaceStats {
    pub surface_atoms: usize,
    pub visible_vertices: usize,
    pub visible_faces: usize,
    pub toruses: usize,
    pub cavities: usize,
    pub segments: usize,
    pub seams: usize,
}

/// Result of one generation pass.
#[derive(Clone, Debug)]
pub struct Surface {
    settings: Settings,
    geodesic: &'static Geodesic,
    face_geodesic: &'static Geodesic,
    centers: Vec<Point3<f64>>,
    radii: Vec<f64>,
    vertex_maps: Vec<Option<Bitmap>>,
    face_maps: Vec<Option<Bitmap>>,
    surface_atoms: AtomSet,
    toruses: Vec<Torus>,
    cavities: Vec<Cavity>,
    presentation: Presentation,
}

impl Surface {
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn atom_count(&self) -> usize {
        self.centers.len()
    }

    /// Geodesic the vertex maps are indexed by.
    pub fn geodesic(&self) -> &'static Geodesic {
        self.geodesic
    }

    /// Geodesic the face maps are indexed by.
    pub fn face_geodesic(&self) -> &'static Geodesic {
        self.face_geodesic
    }

    /// Effective radius each atom was sampled with.
    pub fn radius(&self, atom: usize) -> Option<f64> {
        self.radii.get(atom).copied()
    }

    pub fn vertex_map(&self, atom: usize) -> Option<&Bitmap> {
        self.vertex_maps.get(atom).and_then(Option::as_ref)
    }

    pub fn face_map(&self, atom: usize) -> Option<&Bitmap> {
        self.face_maps.get(atom).and_then(Option::as_ref)
    }

    /// Atoms with at least one exposed vertex.
    pub fn surface_atoms(&self) -> &AtomSet {
        &self.surface_atoms
    }

    /// Toruses in ascending `(atom_a, atom_b)` order.
    pub fn toruses(&self) -> &[Torus] {
        &self.toruses
    }

    /// Cavities in ascending `(atoms, right_handed)` order.
    pub fn cavities(&self) -> &[Cavity] {
        &self.cavities
    }

    /// Exposed dots of `atom` on its effective-radius sphere.
    pub fn dot_points(&self, atom: usize) -> Vec<Point3<f64>> {
        let Some(map) = self.vertex_map(atom) else {
            return Vec::new();
        };
        let (center, radius) = (self.centers[atom], self.radii[atom]);
        map.ones()
            .map(|v| center + self.geodesic.vertex(v) * radius)
            .collect()
    }

    pub fn stats(&self) -> SurfaceStats {
        let ones = |maps: &[Option<Bitmap>]| -> usize {
            maps.iter().flatten().map(Bitmap::count_ones).sum()
        };
        SurfaceStats {
            surface_atoms: self.surface_atoms.count_ones(),
            visible_vertices: ones(&self.vertex_maps),
            visible_faces: ones(&self.face_maps),
            toruses: self.toruses.len(),
            cavities: self.cavities.len(),
            segments: self.toruses.iter().map(|t| t.segments.len()).sum(),
            seams: self.toruses.iter().map(|t| t.seams.len()).sum(),
        }
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    /// Update presentation metadata for the patches of `selection`.
    pub fn set_property(
        &mut self,
        name: &str,
        value: &str,
        selection: &AtomSet,
    ) -> Result<(), SurfaceError> {
        self.check_selection(selection)?;
        self.presentation
            .set_property(name, value, selection, &self.toruses, &self.cavities)
    }

    /// Replace the vertex map of `atom` and rederive its face map.
    pub fn set_vertex_bitmap(&mut self, atom: usize, map: Bitmap) -> Result<(), SurfaceError> {
        if atom >= self.atom_count() {
            return Err(SurfaceError::InvalidAtom {
                index: atom,
                reason: format!("surface has {} atoms", self.atom_count()),
            });
        }
        if map.len() != self.geodesic.vertex_count() {
            return Err(SurfaceError::InvalidAtom {
                index: atom,
                reason: format!(
                    "vertex map has {} bits, expected {}",
                    map.len(),
                    self.geodesic.vertex_count()
                ),
            });
        }
        if map.any() {
            self.surface_atoms.set(atom);
        } else {
            self.surface_atoms.clear(atom);
        }
        self.face_maps[atom] = Some(face_bitmap(self.face_geodesic, &map));
        self.vertex_maps[atom] = Some(map);
        Ok(())
    }

    /// Drop the maps of the selected atoms, and every torus and cavity none
    /// of whose atoms keeps a map. Nothing is recomputed.
    pub fn delete_atoms(&mut self, selection: &AtomSet) -> Result<(), SurfaceError> {
        self.check_selection(selection)?;
        for atom in selection.ones() {
            self.vertex_maps[atom] = None;
            self.face_maps[atom] = None;
            self.surface_atoms.clear(atom);
        }
        let has_map = |atom: usize| self.vertex_maps[atom].is_some();
        let keep_torus: Vec<bool> = self
            .toruses
            .iter()
            .map(|t| has_map(t.atom_a) || has_map(t.atom_b))
            .collect();
        let keep_cavity: Vec<bool> = self
            .cavities
            .iter()
            .map(|c| c.atoms.iter().any(|&a| has_map(a)))
            .collect();

        let mut renumber = vec![None; self.cavities.len()];
        let mut next = 0;
        for (old, &keep) in keep_cavity.iter().enumerate() {
            if keep {
                renumber[old] = Some(next);
                next += 1;
            }
        }

        let mut keep = keep_cavity.iter();
        self.cavities.retain(|_| keep.next().copied().unwrap_or(false));
        let mut keep = keep_torus.iter();
        self.toruses.retain(|_| keep.next().copied().unwrap_or(false));
        for torus in &mut self.toruses {
            for tc in &mut torus.cavities {
                if let Some(id) = renumber[tc.cavity] {
                    tc.cavity = id;
                }
            }
            torus.reference_cavity = torus.reference_cavity.and_then(|id| renumber[id]);
        }
        self.presentation.retain(&keep_torus, &keep_cavity);
        Ok(())
    }

    fn check_selection(&self, selection: &AtomSet) -> Result<(), SurfaceError> {
        if selection.len() != self.atom_count() {
            return Err(SurfaceError::SelectionSize {
                expected: self.atom_count(),
                found: selection.len(),
            });
        }
        Ok(())
    }
}

/// Runs generation passes under fixed settings.
///
/// # Example
///
/// ```
/// use connolly::surface::{Atom, AtomSet, Settings, SurfaceGenerator};
/// use nalgebra::Point3;
///
/// let atoms = vec![
///     Atom::new(Point3::new(0.0, 0.0, 0.0), 1.5),
///     Atom::new(Point3::new(3.0, 0.0, 0.0), 1.5),
/// ];
/// let generator = SurfaceGenerator::new(Settings {
///     probe_radius: 1.4,
///     ..Default::default()
/// })
/// .unwrap();
/// let surface = generator.generate(&atoms, &AtomSet::full(2)).unwrap();
/// assert_eq!(surface.toruses().len(), 1);
/// ```
#[derive(Debug)]
pub struct SurfaceGenerator {
    settings: Settings,
    cancel: Arc<AtomicBool>,
}

impl SurfaceGenerator {
    pub fn new(settings: Settings) -> Result<Self, SurfaceError> {
        settings.validate()?;
        Ok(Self {
            settings,
            cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Setting the returned flag makes the running (or next) call return
    /// [`SurfaceError::Cancelled`]; the flag is cleared when it does.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn check_cancelled(&self) -> Result<(), SurfaceError> {
        if self.cancel.load(Ordering::Relaxed) {
            Err(SurfaceError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn run_all<T, R, F>(&self, items: &[T], f: F) -> Result<Vec<R>, SurfaceError>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> Result<R, SurfaceError> + Sync + Send,
    {
        if self.settings.enable_parallel {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }

    /// Compute the surface of the `selection` atoms.
    pub fn generate(&self, atoms: &[Atom], selection: &AtomSet) -> Result<Surface, SurfaceError> {
        let result = self.run(atoms, selection);
        if matches!(result, Err(SurfaceError::Cancelled)) {
            self.cancel.store(false, Ordering::Relaxed);
        }
        result
    }

    fn run(&self, atoms: &[Atom], selection: &AtomSet) -> Result<Surface, SurfaceError> {
        let settings = &self.settings;
        let started = Instant::now();
        let face_geodesic = geodesic(settings.face_level())?;
        let geodesic = geodesic(settings.geodesic_level)?;
        if selection.len() != atoms.len() {
            return Err(SurfaceError::SelectionSize {
                expected: atoms.len(),
                found: selection.len(),
            });
        }

        let mut radii = Vec::with_capacity(atoms.len());
        for (index, atom) in atoms.iter().enumerate() {
            atom.check(index)?;
            let radius = atom.effective_radius(settings);
            if !radius.is_finite() || radius < 0.0 {
                return Err(SurfaceError::InvalidAtom {
                    index,
                    reason: format!("effective radius {radius}"),
                });
            }
            radii.push(radius);
        }
        let centers: Vec<Point3<f64>> = atoms.iter().map(|a| a.position).collect();
        let max_radius = radii.iter().copied().fold(0.0, f64::max);
        let probe = settings.probe_radius;
        let surface_mode = settings.mode == Mode::Surface;
        let with_toruses = surface_mode && probe > 0.0;

        let finder = NeighborFinder::new(&centers);
        let query = NeighborQuery {
            finder: &finder,
            positions: &centers,
            radii: &radii,
            probe_radius: probe,
            max_radius,
            restrict_to: settings.only_selected_neighbors.then_some(selection),
            disregard_neighbors: settings.disregard_neighbors,
        };
        // Toruses and cavities only ever form among distinct selected atoms,
        // so their probes are only blocked by those atoms too.
        let distinct = if with_toruses {
            distinct_atoms(&finder, &centers, selection)
        } else {
            selection.clone()
        };
        let duplicates = selection.count_ones() - distinct.count_ones();
        if duplicates > 0 {
            debug!("{duplicates} near-duplicate atom(s) left out of torus and cavity discovery");
        }
        let distinct_query = NeighborQuery {
            restrict_to: Some(&distinct),
            ..query
        };
        let reuse_hood = settings.only_selected_neighbors && duplicates == 0;
        let selected: Vec<usize> = selection.ones().collect();
        debug!(
            "Generating surface for {} of {} atoms (probe {probe} Å, level {})",
            selected.len(),
            atoms.len(),
            settings.geodesic_level
        );

        // Phase 1: neighborhoods, convex maps, cavities and pair candidates
        let discoveries = self.run_all(&selected, |&atom| {
            self.check_cancelled()?;
            let hood = query.neighborhood(atom);
            let map = visible_vertices(geodesic, &hood, probe);
            let (cavities, pairs) = if with_toruses && reuse_hood {
                discover(&hood, probe, geodesic)
            } else if with_toruses && distinct.get(atom) {
                discover(&distinct_query.neighborhood(atom), probe, geodesic)
            } else {
                (Vec::new(), Vec::new())
            };
            Ok(Discovery {
                atom,
                map,
                cavities,
                pairs,
            })
        })?;
        debug!("Discovery finished in {:?}", started.elapsed());

        // Phase 2: merge into the cavity arena and the torus registry
        let mut vertex_maps: Vec<Option<Bitmap>> = vec![None; atoms.len()];
        let mut cavities = Vec::new();
        let mut pairs = Vec::new();
        for discovery in discoveries {
            vertex_maps[discovery.atom] = Some(discovery.map);
            cavities.extend(discovery.cavities);
            pairs.extend(discovery.pairs);
        }
        let mut toruses = build_toruses(&cavities, &pairs, &centers, &radii, probe)?;

        // Phase 3: resolve toruses
        let resolve = |torus: &mut Torus| {
            let (a, b) = (&centers[torus.atom_a], &centers[torus.atom_b]);
            torus.resolve(&cavities, a, b, probe)
        };
        if settings.enable_parallel {
            toruses.par_iter_mut().try_for_each(resolve)?;
        } else {
            toruses.iter_mut().try_for_each(resolve)?;
        }

        if with_toruses && !toruses.is_empty() {
            // Phase 4: clip every atom against the planes of its toruses
            let mut incident: Vec<Vec<(usize, Edge)>> = vec![Vec::new(); atoms.len()];
            for (t, torus) in toruses.iter().enumerate() {
                incident[torus.atom_a].push((t, Edge::A));
                incident[torus.atom_b].push((t, Edge::B));
            }
            let clip_atom = |(atom, map): (usize, &mut Option<Bitmap>)| -> Result<(), SurfaceError> {
                let Some(map) = map.as_mut() else {
                    return Ok(());
                };
                self.check_cancelled()?;
                for &(t, edge) in &incident[atom] {
                    let plane = EdgePlane::new(&toruses[t], edge, &centers[atom], probe);
                    clip(geodesic, map, &centers[atom], radii[atom], &plane);
                }
                Ok(())
            };
            if settings.enable_parallel {
                vertex_maps.par_iter_mut().enumerate().try_for_each(clip_atom)?;
            } else {
                vertex_maps.iter_mut().enumerate().try_for_each(clip_atom)?;
            }

            // Phase 5: stitch
            let seams = self.run_all(&toruses, |torus| {
                self.check_cancelled()?;
                Ok(stitch_torus(geodesic, torus, &vertex_maps, &centers, &radii, probe))
            })?;
            for (torus, seams) in toruses.iter_mut().zip(seams) {
                torus.seams = seams;
            }
        }

        // Phase 6: margin growth and face maps
        let finish = |map: &mut Option<Bitmap>| -> Option<Bitmap> {
            let map = map.as_mut()?;
            if surface_mode {
                add_incomplete_faces(geodesic, map);
                add_incomplete_faces(geodesic, map);
            }
            Some(face_bitmap(face_geodesic, map))
        };
        let mut face_maps: Vec<Option<Bitmap>> = if settings.enable_parallel {
            vertex_maps.par_iter_mut().map(finish).collect()
        } else {
            vertex_maps.iter_mut().map(finish).collect()
        };

        let surface_atoms = AtomSet::from_indices(
            atoms.len(),
            vertex_maps
                .iter()
                .enumerate()
                .filter(|(_, map)| map.as_ref().is_some_and(Bitmap::any))
                .map(|(atom, _)| atom),
        );
        if settings.mode == Mode::CalcOnly {
            vertex_maps.iter_mut().for_each(|m| *m = None);
            face_maps.iter_mut().for_each(|m| *m = None);
        }

        let presentation = Presentation::new(atoms.len(), toruses.len(), cavities.len());
        let surface = Surface {
            settings: settings.clone(),
            geodesic,
            face_geodesic,
            centers,
            radii,
            vertex_maps,
            face_maps,
            surface_atoms,
            toruses,
            cavities,
            presentation,
        };
        let stats = surface.stats();
        info!(
            "Surface generated in {:?}: {} surface atoms, {} toruses, {} cavities",
            started.elapsed(),
            stats.surface_atoms,
            stats.toruses,
            stats.cavities
        );
        Ok(surface)
    }
}

/// Selected atoms, minus every atom closer than [`MIN_PAIR_DISTANCE`] to a
/// lower-index atom that is kept. Alternate locations of one atom collapse
/// onto the first of them.
fn distinct_atoms(finder: &NeighborFinder, centers: &[Point3<f64>], selection: &AtomSet) -> AtomSet {
    let mut kept = selection.clone();
    for i in selection.ones() {
        let shadowed = finder
            .within(&centers[i], MIN_PAIR_DISTANCE)
            .any(|j| j < i && kept.get(j));
        if shadowed {
            trace!("Atom {i} duplicates a lower-index atom");
            kept.clear(i);
        }
    }
    kept
}

/// Cavities and torus candidates owned by the center atom of `hood`: pairs
/// (I, J) and triples (I, J, K) with I < J < K.
fn discover(
    hood: &Neighborhood,
    probe: f64,
    geodesic: &Geodesic,
) -> (Vec<Cavity>, Vec<PairCandidate>) {
    let i = hood.index;
    let radius_ip2 = (hood.radius + probe) * (hood.radius + probe);
    let min_pair2 = MIN_PAIR_DISTANCE * MIN_PAIR_DISTANCE;
    let mut cavities = Vec::new();
    let mut pairs = Vec::new();

    for (jx, j) in hood.neighbors.iter().enumerate() {
        if j.index <= i {
            continue;
        }
        let d2_ij = nalgebra::distance_squared(&hood.center, &j.center);
        if d2_ij < min_pair2 {
            debug!("Atoms {i} and {} nearly coincide, skipping pair", j.index);
            continue;
        }
        let Some(radius_ij) = torus_radius(hood.radius, j.radius, probe, d2_ij) else {
            trace!("No torus between atoms {i} and {}", j.index);
            continue;
        };
        let center_ij = torus_center(&hood.center, radius_ip2, &j.center, j.radius_p2, d2_ij);

        for k in &hood.neighbors[jx + 1..] {
            let d2_ik = nalgebra::distance_squared(&hood.center, &k.center);
            let d2_jk = nalgebra::distance_squared(&j.center, &k.center);
            if d2_ik < min_pair2 || d2_jk < min_pair2 {
                debug!(
                    "Atom {} nearly coincides with atom {i} or {}, skipping triple",
                    k.index, j.index
                );
                continue;
            }
            let reach = j.radius_p + k.radius_p;
            if d2_jk >= reach * reach {
                continue;
            }
            if torus_radius(hood.radius, k.radius, probe, d2_ik).is_none()
                || torus_radius(j.radius, k.radius, probe, d2_jk).is_none()
            {
                trace!("Triple {i}, {}, {} lacks a torus", j.index, k.index);
                continue;
            }
            cavities.extend(find_cavities(hood, j, k, &center_ij, probe, geodesic));
        }

        let full_probe = center_ij + perpendicular(&(j.center - hood.center)) * radius_ij;
        pairs.push(PairCandidate {
            a: i,
            b: j.index,
            center: center_ij,
            radius: radius_ij,
            full_probe_clear: hood.probe_is_clear(&full_probe, &[i, j.index]),
        });
    }
    (cavities, pairs)
}

/// Register every cavity with its three toruses, then add full toruses for
/// clear pairs without cavities.
fn build_toruses(
    cavities: &[Cavity],
    pairs: &[PairCandidate],
    centers: &[Point3<f64>],
    radii: &[f64],
    probe: f64,
) -> Result<Vec<Torus>, SurfaceError> {
    let mut registry: BTreeMap<(usize, usize), Torus> = BTreeMap::new();
    for (id, cavity) in cavities.iter().enumerate() {
        let [i, j, k] = cavity.atoms;
        let handed = cavity.right_handed;
        for (a, b, right_handed) in [(i, j, handed), (i, k, !handed), (j, k, handed)] {
            let torus = match registry.entry((a, b)) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => entry.insert(pair_torus(a, b, centers, radii, probe)?),
            };
            torus.attach(id, right_handed);
        }
    }
    for pair in pairs {
        if pair.full_probe_clear {
            registry
                .entry((pair.a, pair.b))
                .or_insert_with(|| Torus::new(pair.a, pair.b, pair.center, pair.radius, true));
        }
    }
    Ok(registry.into_values().collect())
}

fn pair_torus(
    a: usize,
    b: usize,
    centers: &[Point3<f64>],
    radii: &[f64],
    probe: f64,
) -> Result<Torus, SurfaceError> {
    let d2 = nalgebra::distance_squared(&centers[a], &centers[b]);
    let radius = torus_radius(radii[a], radii[b], probe, d2).ok_or_else(|| {
        SurfaceError::TorusInvariant {
            a,
            b,
            reason: "cavities attached to a pair without a torus".to_string(),
        }
    })?;
    let rap = radii[a] + probe;
    let rbp = radii[b] + probe;
    let center = torus_center(&centers[a], rap * rap, &centers[b], rbp * rbp, d2);
    Ok(Torus::new(a, b, center, radius, false))
}
