use std::process::ExitCode;

use clap::Parser;
use connolly::structure::{surface_to_df, write_df_to_file};
use tracing::{debug, error, info};

use super::{build_surface, SurfaceArgs};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    #[command(flatten)]
    surface: SurfaceArgs,
}

pub(crate) fn run(args: &Args) -> ExitCode {
    let Some((molecule, surface)) = build_surface(&args.surface) else {
        return ExitCode::FAILURE;
    };

    let stats = surface.stats();
    info!(
        "{} surface atoms, {} toruses, {} cavities, {} seams",
        stats.surface_atoms, stats.toruses, stats.cavities, stats.seams
    );

    let mut df = match surface_to_df(&surface, &molecule) {
        Ok(df) => df,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    debug!("Per-atom surface\n{df}");

    let output_file = args.surface.output_file("surface");
    if let Err(e) = write_df_to_file(&mut df, &output_file, args.surface.format) {
        error!("Cannot write {}: {e}", output_file.display());
        return ExitCode::FAILURE;
    }
    info!(
        "Results saved to {}",
        output_file.with_extension(args.surface.format.to_string()).display()
    );
    ExitCode::SUCCESS
}
