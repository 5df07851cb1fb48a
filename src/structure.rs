//! Reading atoms from structure files and writing surface tables.

use std::collections::HashSet;
use std::f64::consts::PI;
use std::path::Path;

use nalgebra::Point3;
use pdbtbx::{
    ContainsAtomConformer, ContainsAtomConformerResidue, ContainsAtomConformerResidueChain,
    PDBError, PDB,
};
use polars::prelude::*;
use thiserror::Error;

use crate::surface::{Atom, AtomSet, Mode, Surface};

#[derive(Debug, Error)]
pub enum StructureError {
    #[error("failed to read structure: {0}")]
    Read(String),

    #[error("no {kind} radius for atom {atomn} (serial {atomi})")]
    MissingRadius {
        kind: &'static str,
        atomn: String,
        atomi: usize,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Polars(#[from] PolarsError),
}

/// Open an atomic data file with [`pdbtbx::ReadOptions`] and drop waters.
pub fn load_model(input_file: &str) -> Result<(PDB, Vec<PDBError>), StructureError> {
    let (mut pdb, errors) = pdbtbx::ReadOptions::default()
        .set_only_atomic_coords(true)
        .set_level(pdbtbx::StrictnessLevel::Loose)
        .read(input_file)
        .map_err(|errors| {
            StructureError::Read(
                errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        })?;

    pdb.remove_residues_by(|res| matches!(res.name(), Some("HOH") | Some("WAT")));

    Ok((pdb, errors))
}

/// Where an atom came from in the structure file.
#[derive(Clone, Debug, PartialEq)]
pub struct AtomRecord {
    pub chain: String,
    pub resn: String,
    pub resi: isize,
    pub insertion: String,
    pub altloc: String,
    pub atomn: String,
    pub atomi: usize,
}

/// Surface input built from a structure, with the records parallel to
/// `atoms`.
#[derive(Clone, Debug)]
pub struct Molecule {
    pub atoms: Vec<Atom>,
    pub records: Vec<AtomRecord>,
}

impl Molecule {
    /// Atoms on the given chains; all atoms when `chains` is empty.
    pub fn select_chains(&self, chains: &HashSet<String>) -> AtomSet {
        AtomSet::from_indices(
            self.records.len(),
            self.records
                .iter()
                .enumerate()
                .filter(|(_, r)| chains.is_empty() || chains.contains(&r.chain))
                .map(|(i, _)| i),
        )
    }
}

/// Surface atoms with element van der Waals and covalent radii.
pub fn atoms_from_pdb(pdb: &PDB) -> Result<Molecule, StructureError> {
    let mut atoms = Vec::with_capacity(pdb.atom_count());
    let mut records = Vec::with_capacity(pdb.atom_count());
    for x in pdb.atoms_with_hierarchy() {
        let atom = x.atom();
        let missing = |kind| StructureError::MissingRadius {
            kind,
            atomn: atom.name().to_string(),
            atomi: atom.serial_number(),
        };
        let radii = atom.element().ok_or_else(|| missing("element"))?.atomic_radius();
        let vdw = radii.van_der_waals.ok_or_else(|| missing("van der Waals"))?;
        let (px, py, pz) = atom.pos();
        atoms.push(
            Atom::new(Point3::new(px, py, pz), vdw).with_bonding_radius(radii.covalent_single),
        );

        let (resi, insertion) = x.residue().id();
        records.push(AtomRecord {
            chain: x.chain().id().to_string(),
            resn: x.residue().name().unwrap_or("").to_string(),
            resi,
            insertion: insertion.unwrap_or("").to_string(),
            altloc: x
                .conformer()
                .alternative_location()
                .unwrap_or("")
                .to_string(),
            atomn: atom.name().to_string(),
            atomi: atom.serial_number(),
        });
    }
    Ok(Molecule { atoms, records })
}

fn text_column(
    name: &str,
    records: &[AtomRecord],
    rows: &[usize],
    field: impl Fn(&AtomRecord) -> &str,
) -> Column {
    Column::new(
        name.into(),
        rows.iter()
            .map(|&i| field(&records[i]).to_string())
            .collect::<Vec<String>>(),
    )
}

fn annotation_columns(records: &[AtomRecord], rows: &[usize]) -> Vec<Column> {
    vec![
        text_column("chain", records, rows, |r| r.chain.as_str()),
        text_column("resn", records, rows, |r| r.resn.as_str()),
        Column::new(
            "resi".into(),
            rows.iter().map(|&i| records[i].resi as i64).collect::<Vec<i64>>(),
        ),
        text_column("insertion", records, rows, |r| r.insertion.as_str()),
        text_column("altloc", records, rows, |r| r.altloc.as_str()),
        text_column("atomn", records, rows, |r| r.atomn.as_str()),
        Column::new(
            "atomi".into(),
            rows.iter().map(|&i| records[i].atomi as i64).collect::<Vec<i64>>(),
        ),
    ]
}

/// One row per atom with a vertex map: exposed dots and faces, the
/// solvent-accessible area those dots stand for, and how many toruses and
/// cavities the atom takes part in. A surface generated in
/// [`Mode::CalcOnly`] keeps no maps; it gets one row per surface atom with
/// null dot, face and area columns.
pub fn surface_to_df(surface: &Surface, molecule: &Molecule) -> Result<DataFrame, StructureError> {
    let n = surface.atom_count();
    let mut torus_count = vec![0i64; n];
    let mut cavity_count = vec![0i64; n];
    for torus in surface.toruses() {
        torus_count[torus.atom_a] += 1;
        torus_count[torus.atom_b] += 1;
    }
    for cavity in surface.cavities() {
        for &a in &cavity.atoms {
            cavity_count[a] += 1;
        }
    }

    let rows: Vec<usize> = if surface.settings().mode == Mode::CalcOnly {
        surface.surface_atoms().ones().collect()
    } else {
        (0..n).filter(|&i| surface.vertex_map(i).is_some()).collect()
    };
    let vertex_count = surface.geodesic().vertex_count() as f64;
    let probe = surface.settings().probe_radius;
    let mut dots: Vec<Option<i64>> = Vec::with_capacity(rows.len());
    let mut faces: Vec<Option<i64>> = Vec::with_capacity(rows.len());
    let mut area: Vec<Option<f64>> = Vec::with_capacity(rows.len());
    for &i in &rows {
        let exposed = surface.vertex_map(i).map(|m| m.count_ones());
        let radius = surface.radius(i).unwrap_or(0.0) + probe;
        dots.push(exposed.map(|e| e as i64));
        faces.push(surface.face_map(i).map(|m| m.count_ones() as i64));
        area.push(exposed.map(|e| 4.0 * PI * radius * radius * e as f64 / vertex_count));
    }

    let mut columns = annotation_columns(&molecule.records, &rows);
    columns.extend([
        Column::new("dots".into(), dots),
        Column::new("faces".into(), faces),
        Column::new("sas_area".into(), area),
        Column::new(
            "toruses".into(),
            rows.iter().map(|&i| torus_count[i]).collect::<Vec<i64>>(),
        ),
        Column::new(
            "cavities".into(),
            rows.iter().map(|&i| cavity_count[i]).collect::<Vec<i64>>(),
        ),
    ]);
    Ok(DataFrame::new(columns)?)
}

/// One row per exposed dot.
pub fn dots_to_df(surface: &Surface, molecule: &Molecule) -> Result<DataFrame, StructureError> {
    let mut rows = Vec::new();
    let (mut x, mut y, mut z) = (Vec::new(), Vec::new(), Vec::new());
    for atom in 0..surface.atom_count() {
        for p in surface.dot_points(atom) {
            rows.push(atom);
            x.push(p.x);
            y.push(p.y);
            z.push(p.z);
        }
    }
    let mut columns = annotation_columns(&molecule.records, &rows);
    columns.extend([
        Column::new("x".into(), x),
        Column::new("y".into(), y),
        Column::new("z".into(), z),
    ]);
    Ok(DataFrame::new(columns)?)
}

/// Write a DataFrame next to `file_path`, with the extension of `file_type`.
pub fn write_df_to_file(
    df: &mut DataFrame,
    file_path: &Path,
    file_type: DataFrameFileType,
) -> Result<(), StructureError> {
    let file_suffix = file_type.to_string();
    let mut file = std::fs::File::create(file_path.with_extension(file_suffix))?;
    match file_type {
        DataFrameFileType::Csv => {
            CsvWriter::new(&mut file).finish(df)?;
        }
        DataFrameFileType::Parquet => {
            ParquetWriter::new(&mut file).finish(df)?;
        }
        DataFrameFileType::Json => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::Json)
                .finish(df)?;
        }
        DataFrameFileType::NDJson => {
            JsonWriter::new(&mut file)
                .with_json_format(JsonFormat::JsonLines)
                .finish(df)?;
        }
    }
    Ok(())
}

/// File format for writing DataFrames.
#[derive(clap::ValueEnum, Clone, Debug, Copy)]
pub enum DataFrameFileType {
    /// Comma-separated values
    Csv,
    /// Parquet columnar storage
    Parquet,
    /// Standard JSON
    Json,
    /// Newline-delimited JSON
    NDJson,
}

impl std::fmt::Display for DataFrameFileType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataFrameFileType::Csv => write!(f, "csv"),
            DataFrameFileType::Parquet => write!(f, "parquet"),
            DataFrameFileType::Json => write!(f, "json"),
            DataFrameFileType::NDJson => write!(f, "ndjson"),
        }
    }
}
