//! Surface input types.

use nalgebra::Point3;

use super::bitmap::Bitmap;
use super::error::SurfaceError;
use super::settings::{RadiusSource, Settings};

/// Selection membership over atom indices.
pub type AtomSet = Bitmap;

/// The per-atom attributes the surface reads. Atoms are addressed by their
/// position in the slice handed to the generator.
#[derive(Clone, Debug, PartialEq)]
pub struct Atom {
    /// Center in Å
    pub position: Point3<f64>,
    /// van der Waals radius in Å
    pub vdw_radius: f64,
    /// Bonding (covalent) radius in Å
    pub bonding_radius: f64,
}

impl Atom {
    pub fn new(position: Point3<f64>, vdw_radius: f64) -> Self {
        Self {
            position,
            vdw_radius,
            bonding_radius: vdw_radius,
        }
    }

    pub fn with_bonding_radius(mut self, bonding_radius: f64) -> Self {
        self.bonding_radius = bonding_radius;
        self
    }

    /// Radius the surface is built on under `settings`.
    pub fn effective_radius(&self, settings: &Settings) -> f64 {
        match settings.radius {
            RadiusSource::VanDerWaals => {
                settings.radius_add + self.vdw_radius * settings.radius_scale
            }
            RadiusSource::Bonding => {
                settings.radius_add + self.bonding_radius * settings.radius_scale
            }
            RadiusSource::Fixed(r) => settings.radius_add + r,
        }
    }

    pub(crate) fn check(&self, index: usize) -> Result<(), SurfaceError> {
        let p = &self.position;
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            return Err(SurfaceError::InvalidAtom {
                index,
                reason: format!("non-finite position {p}"),
            });
        }
        if !self.vdw_radius.is_finite() || self.vdw_radius < 0.0 {
            return Err(SurfaceError::InvalidAtom {
                index,
                reason: format!("van der Waals radius {}", self.vdw_radius),
            });
        }
        if !self.bonding_radius.is_finite() || self.bonding_radius < 0.0 {
            return Err(SurfaceError::InvalidAtom {
                index,
                reason: format!("bonding radius {}", self.bonding_radius),
            });
        }
        Ok(())
    }
}
