//! Surface generation settings.

use super::error::SurfaceError;
use super::geodesic::MAX_LEVEL;

/// Radius of a water probe commonly used for solvent surfaces (Å)
pub const PROBE_RADIUS: f64 = 1.2;
/// Geodesic subdivision level used to sample each atom (642 vertices)
pub const GEODESIC_LEVEL: usize = 3;
/// Atom pairs closer than this are treated as duplicated atoms (Å)
pub const MIN_PAIR_DISTANCE: f64 = 0.2;
/// Strips per full turn of a torus
pub const INNER_TORUS_STEP_COUNT: usize = 12;
/// Outer samples spanning half a turn across the saddle
pub const OUTER_TORUS_STEP_COUNT: usize = 11;

/// What a call to `generate` computes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Mode {
    /// Per-atom dot maps only, no toruses or cavities
    Dots,
    /// Convex, saddle and concave patches, stitched together
    #[default]
    Surface,
    /// Occlusion only; reports which atoms reach the surface and keeps no maps
    CalcOnly,
}

/// Which per-atom radius the surface is built on.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum RadiusSource {
    #[default]
    VanDerWaals,
    Bonding,
    /// The same radius for every atom
    Fixed(f64),
}

#[derive(Clone, Debug)]
pub struct Settings {
    /// Probe (solvent) radius in Å; 0 gives the plain van der Waals surface
    pub probe_radius: f64,
    /// Geodesic level the occlusion tests are run on
    pub geodesic_level: usize,
    /// Geodesic level of the face maps; defaults to `geodesic_level`
    pub render_level: Option<usize>,
    pub mode: Mode,
    /// Unselected atoms neither occlude nor block probes
    pub only_selected_neighbors: bool,
    /// Treat every atom as isolated
    pub disregard_neighbors: bool,
    pub radius: RadiusSource,
    /// Multiplier applied to van der Waals or bonding radii
    pub radius_scale: f64,
    /// Offset added after scaling (Å)
    pub radius_add: f64,
    /// Enable parallel processing
    pub enable_parallel: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            probe_radius: PROBE_RADIUS,
            geodesic_level: GEODESIC_LEVEL,
            render_level: None,
            mode: Mode::default(),
            only_selected_neighbors: true,
            disregard_neighbors: false,
            radius: RadiusSource::default(),
            radius_scale: 1.0,
            radius_add: 0.0,
            enable_parallel: true,
        }
    }
}

impl Settings {
    /// Level the face maps are derived on.
    pub fn face_level(&self) -> usize {
        self.render_level.unwrap_or(self.geodesic_level)
    }

    /// Check everything that can be rejected before any geometry is touched.
    pub fn validate(&self) -> Result<(), SurfaceError> {
        if self.geodesic_level > MAX_LEVEL {
            return Err(SurfaceError::UnsupportedGeodesicLevel {
                level: self.geodesic_level,
                max: MAX_LEVEL,
            });
        }
        if let Some(level) = self.render_level {
            if level > MAX_LEVEL {
                return Err(SurfaceError::UnsupportedGeodesicLevel {
                    level,
                    max: MAX_LEVEL,
                });
            }
            if level > self.geodesic_level {
                return Err(SurfaceError::InvalidSettings(format!(
                    "render level {level} is finer than calculation level {}",
                    self.geodesic_level
                )));
            }
        }
        if !self.probe_radius.is_finite() || self.probe_radius < 0.0 {
            return Err(SurfaceError::InvalidSettings(format!(
                "probe radius must be a non-negative number, got {}",
                self.probe_radius
            )));
        }
        if !self.radius_scale.is_finite() || self.radius_scale < 0.0 {
            return Err(SurfaceError::InvalidSettings(format!(
                "radius scale must be a non-negative number, got {}",
                self.radius_scale
            )));
        }
        if !self.radius_add.is_finite() {
            return Err(SurfaceError::InvalidSettings(format!(
                "radius offset must be finite, got {}",
                self.radius_add
            )));
        }
        if let RadiusSource::Fixed(r) = self.radius {
            if !r.is_finite() || r < 0.0 {
                return Err(SurfaceError::InvalidSettings(format!(
                    "fixed radius must be a non-negative number, got {r}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.face_level(), GEODESIC_LEVEL);
        assert_eq!(settings.mode, Mode::Surface);
    }

    #[test]
    fn rejects_unsupported_levels() {
        let settings = Settings {
            geodesic_level: MAX_LEVEL + 1,
            ..Default::default()
        };
        assert_eq!(
            settings.validate(),
            Err(SurfaceError::UnsupportedGeodesicLevel {
                level: MAX_LEVEL + 1,
                max: MAX_LEVEL
            })
        );

        let settings = Settings {
            geodesic_level: 1,
            render_level: Some(2),
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SurfaceError::InvalidSettings(_))
        ));
    }

    #[test]
    fn rejects_negative_probe() {
        let settings = Settings {
            probe_radius: -1.0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SurfaceError::InvalidSettings(msg)) if msg.contains("probe radius")
        ));
    }
}
