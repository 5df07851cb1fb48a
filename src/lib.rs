#![doc = include_str!("../README.md")]

pub mod structure;
pub mod surface;

pub use structure::{
    atoms_from_pdb, dots_to_df, load_model, surface_to_df, write_df_to_file, DataFrameFileType,
    Molecule, StructureError,
};
pub use surface::{Atom, AtomSet, Settings, Surface, SurfaceError, SurfaceGenerator};
