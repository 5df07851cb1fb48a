//! Command line front end: load a structure, build its surface, write tables.

pub(crate) mod dots;
pub(crate) mod logging;
pub(crate) mod surface;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use connolly::structure::{atoms_from_pdb, load_model, DataFrameFileType, Molecule};
use connolly::surface::{Mode, RadiusSource, Settings, Surface, SurfaceGenerator};
use tracing::{debug, error, info, trace, warn};

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub(crate) enum CliMode {
    /// Dot maps only
    Dots,
    /// Convex, saddle and concave patches
    Surface,
    /// Surface atoms only
    Calc,
}

impl From<CliMode> for Mode {
    fn from(mode: CliMode) -> Self {
        match mode {
            CliMode::Dots => Mode::Dots,
            CliMode::Surface => Mode::Surface,
            CliMode::Calc => Mode::CalcOnly,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub(crate) enum CliRadius {
    /// Element van der Waals radius
    Vdw,
    /// Element covalent radius
    Bonding,
}

/// Options shared by every subcommand that builds a surface.
#[derive(clap::Args, Debug, Clone)]
pub(crate) struct SurfaceArgs {
    /// Path to the PDB or mmCIF file to be analyzed
    #[arg(short, long)]
    pub input: PathBuf,

    /// Output file path; the extension follows the output format
    #[arg(short, long)]
    pub output: PathBuf,

    /// Output file format
    #[arg(short = 'f', long = "format", value_enum, default_value_t = DataFrameFileType::Csv)]
    pub format: DataFrameFileType,

    /// Probe radius (0 gives the van der Waals surface)
    #[arg(short = 'p', long = "probe-radius", default_value_t = 1.2)]
    pub probe_radius: f64,

    /// Geodesic level used for the occlusion tests (0-4)
    #[arg(short = 'l', long = "level", default_value_t = 3)]
    pub level: usize,

    /// Geodesic level of the face maps; defaults to the calculation level
    #[arg(long = "render-level")]
    pub render_level: Option<usize>,

    /// What to compute
    #[arg(short = 'm', long, value_enum, default_value_t = CliMode::Surface)]
    pub mode: CliMode,

    /// Chains to build the surface for, e.g. A,B (all chains when omitted)
    #[arg(short, long)]
    pub chains: Option<String>,

    /// Let atoms outside the selected chains occlude the surface
    #[arg(long = "all-neighbors")]
    pub all_neighbors: bool,

    /// Treat every atom as isolated
    #[arg(long = "disregard-neighbors")]
    pub disregard_neighbors: bool,

    /// Per-atom radius
    #[arg(long = "radius", value_enum, default_value_t = CliRadius::Vdw)]
    pub radius: CliRadius,

    /// Use this radius for every atom instead
    #[arg(long = "fixed-radius")]
    pub fixed_radius: Option<f64>,

    /// Multiplier for element radii
    #[arg(long = "radius-scale", default_value_t = 1.0)]
    pub radius_scale: f64,

    /// Offset added to the scaled radius
    #[arg(long = "radius-add", default_value_t = 0.0)]
    pub radius_add: f64,

    /// Number of threads to use for parallel processing
    #[arg(short = 'j', long = "num-threads", default_value_t = 0)]
    pub num_threads: usize,
}

impl SurfaceArgs {
    pub fn settings(&self) -> Settings {
        let radius = match (self.fixed_radius, self.radius) {
            (Some(r), _) => RadiusSource::Fixed(r),
            (None, CliRadius::Vdw) => RadiusSource::VanDerWaals,
            (None, CliRadius::Bonding) => RadiusSource::Bonding,
        };
        Settings {
            probe_radius: self.probe_radius,
            geodesic_level: self.level,
            render_level: self.render_level,
            mode: self.mode.into(),
            only_selected_neighbors: !self.all_neighbors,
            disregard_neighbors: self.disregard_neighbors,
            radius,
            radius_scale: self.radius_scale,
            radius_add: self.radius_add,
            ..Default::default()
        }
    }

    /// Comma-separated chain ids; empty selects every chain.
    pub fn chain_set(&self) -> HashSet<String> {
        self.chains
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Where to write the table; directories get `default_name`.
    pub fn output_file(&self, default_name: &str) -> PathBuf {
        if self.output.is_dir() {
            self.output.join(default_name)
        } else {
            self.output.clone()
        }
    }
}

/// Load the structure and generate its surface, logging any failure.
pub(crate) fn build_surface(args: &SurfaceArgs) -> Option<(Molecule, Surface)> {
    trace!("{args:?}");

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(args.num_threads)
        .build_global()
    {
        warn!("Could not configure the thread pool: {e}");
    }
    debug!("Using {} thread(s)", rayon::current_num_threads());

    let input_file = match Path::new(&args.input).canonicalize() {
        Ok(path) => path.to_string_lossy().into_owned(),
        Err(e) => {
            error!("Cannot open {}: {e}", args.input.display());
            return None;
        }
    };

    let (pdb, pdb_warnings) = match load_model(&input_file) {
        Ok(loaded) => loaded,
        Err(e) => {
            error!("{e}");
            return None;
        }
    };
    pdb_warnings.iter().for_each(|e| match e.level() {
        pdbtbx::ErrorLevel::BreakingError => error!("{e}"),
        pdbtbx::ErrorLevel::InvalidatingError => error!("{e}"),
        _ => warn!("{e}"),
    });

    let molecule = match atoms_from_pdb(&pdb) {
        Ok(molecule) => molecule,
        Err(e) => {
            error!("{e}");
            return None;
        }
    };
    let chains = args.chain_set();
    let selection = molecule.select_chains(&chains);
    info!(
        "Loaded {} atoms, {} selected",
        molecule.atoms.len(),
        selection.count_ones()
    );
    if !selection.any() {
        warn!("No atoms on chains {chains:?}");
    }

    let generator = match SurfaceGenerator::new(args.settings()) {
        Ok(generator) => generator,
        Err(e) => {
            error!("{e}");
            return None;
        }
    };
    match generator.generate(&molecule.atoms, &selection) {
        Ok(surface) => Some((molecule, surface)),
        Err(e) => {
            error!("Surface generation failed: {e}");
            None
        }
    }
}
