//! Analytic molecular surface.
//!
//! Atoms are sampled on a geodesic sphere; the exposed part of each atom's
//! probe-inflated sphere forms a convex patch. Where the probe touches two
//! atoms at once it sweeps a torus (saddle patch), and where it rests on
//! three atoms it leaves a cavity (concave patch). Torus rims are stitched
//! to the clipped convex patches so a renderer can close the mesh.

pub mod bitmap;
pub mod cavity;
pub mod convex;
pub mod error;
pub mod generator;
pub mod geodesic;
pub mod math;
pub mod neighbors;
pub mod properties;
pub mod settings;
pub mod stitch;
pub mod torus;
pub mod types;

pub use bitmap::Bitmap;
pub use cavity::Cavity;
pub use error::SurfaceError;
pub use generator::{Surface, SurfaceGenerator, SurfaceStats};
pub use geodesic::{geodesic, Geodesic, MAX_LEVEL};
pub use properties::{Paint, PatchStyle, Presentation};
pub use settings::{Mode, RadiusSource, Settings};
pub use stitch::{Seam, SeamEntry};
pub use torus::{Edge, Torus, TorusCavity, TorusSegment};
pub use types::{Atom, AtomSet};
