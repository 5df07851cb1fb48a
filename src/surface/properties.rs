//! Presentation metadata carried next to the geometry. Changing it never
//! triggers a recomputation.

use std::str::FromStr;

use super::cavity::Cavity;
use super::error::SurfaceError;
use super::torus::Torus;
use super::types::AtomSet;

const NAMED_COLORS: &[(&str, [u8; 3])] = &[
    ("black", [0, 0, 0]),
    ("white", [255, 255, 255]),
    ("red", [255, 0, 0]),
    ("green", [0, 128, 0]),
    ("blue", [0, 0, 255]),
    ("yellow", [255, 255, 0]),
    ("cyan", [0, 255, 255]),
    ("magenta", [255, 0, 255]),
    ("orange", [255, 165, 0]),
    ("gray", [128, 128, 128]),
    ("grey", [128, 128, 128]),
];

/// A patch color: either concrete, or a palette the renderer resolves per
/// atom (`cpk`, `chain`, ...).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Paint {
    Rgb([u8; 3]),
    Palette(String),
}

impl FromStr for Paint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if let Some(hex) = value.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(format!("expected #rrggbb, got '{value}'"));
            }
            let mut rgb = [0u8; 3];
            for (k, channel) in rgb.iter_mut().enumerate() {
                *channel = u8::from_str_radix(&hex[2 * k..2 * k + 2], 16)
                    .map_err(|e| format!("'{value}': {e}"))?;
            }
            return Ok(Paint::Rgb(rgb));
        }
        if let Some(inner) = value.strip_prefix('[').and_then(|v| v.strip_suffix(']')) {
            let channels = inner
                .split(',')
                .map(|c| c.trim().parse::<u8>().map_err(|e| format!("'{value}': {e}")))
                .collect::<Result<Vec<u8>, String>>()?;
            return match channels.as_slice() {
                &[r, g, b] => Ok(Paint::Rgb([r, g, b])),
                _ => Err(format!("expected [r,g,b], got '{value}'")),
            };
        }
        if value.is_empty() {
            return Err("empty color".to_string());
        }
        let lower = value.to_ascii_lowercase();
        match NAMED_COLORS.iter().find(|(name, _)| *name == lower) {
            Some((_, rgb)) => Ok(Paint::Rgb(*rgb)),
            None => Ok(Paint::Palette(lower)),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchStyle {
    /// `None` leaves the choice to the renderer
    pub color: Option<Paint>,
    pub translucent: bool,
}

/// Styles for every patch of a surface: one per atom (convex), one per torus
/// rim (saddle, `[A, B]`) and one per cavity corner (concave).
#[derive(Clone, Debug, PartialEq)]
pub struct Presentation {
    pub visible: bool,
    pub convex: Vec<PatchStyle>,
    pub saddle: Vec<[PatchStyle; 2]>,
    pub concave: Vec<[PatchStyle; 3]>,
}

#[derive(Copy, Clone)]
enum Patch {
    Convex,
    Saddle,
    Concave,
}

const ALL: &[Patch] = &[Patch::Convex, Patch::Saddle, Patch::Concave];
const CONVEX: &[Patch] = &[Patch::Convex];
const SADDLE: &[Patch] = &[Patch::Saddle];
const CONCAVE: &[Patch] = &[Patch::Concave];

#[derive(Clone)]
enum Change {
    Color(Paint),
    Translucent(bool),
}

impl Presentation {
    pub fn new(atom_count: usize, torus_count: usize, cavity_count: usize) -> Self {
        Self {
            visible: true,
            convex: vec![PatchStyle::default(); atom_count],
            saddle: vec![Default::default(); torus_count],
            concave: vec![Default::default(); cavity_count],
        }
    }

    /// Apply one property. `color` and `translucency` fan out to all three
    /// patch kinds.
    pub fn set_property(
        &mut self,
        name: &str,
        value: &str,
        selection: &AtomSet,
        toruses: &[Torus],
        cavities: &[Cavity],
    ) -> Result<(), SurfaceError> {
        let invalid = || SurfaceError::InvalidPropertyValue {
            name: name.to_string(),
            value: value.to_string(),
        };
        let color = || value.parse::<Paint>().map(Change::Color).map_err(|_| invalid());
        let translucency = || match value.trim().to_ascii_lowercase().as_str() {
            "translucent" => Ok(Change::Translucent(true)),
            "opaque" => Ok(Change::Translucent(false)),
            _ => Err(invalid()),
        };
        let (patches, change) = match name.to_ascii_lowercase().as_str() {
            "on" => {
                self.visible = true;
                return Ok(());
            }
            "off" => {
                self.visible = false;
                return Ok(());
            }
            "color" => (ALL, color()?),
            "colorconvex" => (CONVEX, color()?),
            "colorsaddle" => (SADDLE, color()?),
            "colorconcave" => (CONCAVE, color()?),
            "translucency" => (ALL, translucency()?),
            "translucencyconvex" => (CONVEX, translucency()?),
            "translucencysaddle" => (SADDLE, translucency()?),
            "translucencyconcave" => (CONCAVE, translucency()?),
            _ => return Err(SurfaceError::UnknownProperty(name.to_string())),
        };
        for &patch in patches {
            self.apply(patch, &change, selection, toruses, cavities);
        }
        Ok(())
    }

    fn apply(
        &mut self,
        patch: Patch,
        change: &Change,
        selection: &AtomSet,
        toruses: &[Torus],
        cavities: &[Cavity],
    ) {
        let update = |style: &mut PatchStyle| match change {
            Change::Color(paint) => style.color = Some(paint.clone()),
            Change::Translucent(t) => style.translucent = *t,
        };
        match patch {
            Patch::Convex => {
                for (atom, style) in self.convex.iter_mut().enumerate() {
                    if selection.get(atom) {
                        update(style);
                    }
                }
            }
            Patch::Saddle => {
                for (styles, torus) in self.saddle.iter_mut().zip(toruses) {
                    for (style, atom) in styles.iter_mut().zip([torus.atom_a, torus.atom_b]) {
                        if selection.get(atom) {
                            update(style);
                        }
                    }
                }
            }
            Patch::Concave => {
                for (styles, cavity) in self.concave.iter_mut().zip(cavities) {
                    for (style, &atom) in styles.iter_mut().zip(&cavity.atoms) {
                        if selection.get(atom) {
                            update(style);
                        }
                    }
                }
            }
        }
    }

    /// Keep only the toruses and cavities flagged in `toruses` / `cavities`.
    pub(crate) fn retain(&mut self, toruses: &[bool], cavities: &[bool]) {
        let mut keep = toruses.iter();
        self.saddle.retain(|_| keep.next().copied().unwrap_or(false));
        let mut keep = cavities.iter();
        self.concave.retain(|_| keep.next().copied().unwrap_or(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    #[test]
    fn parses_colors() {
        assert_eq!("#ff8000".parse::<Paint>(), Ok(Paint::Rgb([255, 128, 0])));
        assert_eq!("[1, 2,3]".parse::<Paint>(), Ok(Paint::Rgb([1, 2, 3])));
        assert_eq!("Red".parse::<Paint>(), Ok(Paint::Rgb([255, 0, 0])));
        assert_eq!("cpk".parse::<Paint>(), Ok(Paint::Palette("cpk".to_string())));
        assert!("#ff80".parse::<Paint>().is_err());
        assert!("[1,2]".parse::<Paint>().is_err());
        assert!("[1,2,300]".parse::<Paint>().is_err());
        assert!("".parse::<Paint>().is_err());
    }

    fn two_atom_torus() -> Torus {
        Torus::new(0, 1, Point3::new(1.5, 0.0, 0.0), 2.0, true)
    }

    #[test]
    fn color_fans_out_to_selected_patches() {
        let toruses = vec![two_atom_torus()];
        let mut presentation = Presentation::new(3, 1, 0);
        let selection = AtomSet::from_indices(3, [1]);
        presentation
            .set_property("color", "blue", &selection, &toruses, &[])
            .unwrap();

        let blue = Some(Paint::Rgb([0, 0, 255]));
        assert_eq!(presentation.convex[0].color, None);
        assert_eq!(presentation.convex[1].color, blue);
        assert_eq!(presentation.saddle[0][0].color, None);
        assert_eq!(presentation.saddle[0][1].color, blue);
    }

    #[test]
    fn translucency_and_visibility() {
        let mut presentation = Presentation::new(2, 0, 0);
        let all = AtomSet::full(2);
        presentation
            .set_property("translucencyConvex", "translucent", &all, &[], &[])
            .unwrap();
        assert!(presentation.convex.iter().all(|s| s.translucent));
        presentation.set_property("off", "", &all, &[], &[]).unwrap();
        assert!(!presentation.visible);
        presentation.set_property("on", "", &all, &[], &[]).unwrap();
        assert!(presentation.visible);
    }

    #[test]
    fn rejects_unknown_keys_and_values() {
        let mut presentation = Presentation::new(1, 0, 0);
        let all = AtomSet::full(1);
        assert_eq!(
            presentation.set_property("glow", "1", &all, &[], &[]),
            Err(SurfaceError::UnknownProperty("glow".to_string()))
        );
        assert!(matches!(
            presentation.set_property("translucency", "half", &all, &[], &[]),
            Err(SurfaceError::InvalidPropertyValue { .. })
        ));
        assert!(matches!(
            presentation.set_property("colorSaddle", "#12", &all, &[], &[]),
            Err(SurfaceError::InvalidPropertyValue { .. })
        ));
    }
}
