use std::process::ExitCode;

use clap::Parser;
use connolly::structure::{dots_to_df, write_df_to_file};
use tracing::{error, info, warn};

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
    if surface.settings().mode == connolly::surface::Mode::CalcOnly {
        warn!("Calc mode keeps no dot maps; the table will be empty");
    }

    let mut df = match dots_to_df(&surface, &molecule) {
        Ok(df) => df,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };
    info!("{} exposed dots", df.height());

    let output_file = args.surface.output_file("dots");
    if let Err(e) = write_df_to_file(&mut df, &output_file, args.surface.format) {
        error!("Cannot write {}: {e}", output_file.display());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
