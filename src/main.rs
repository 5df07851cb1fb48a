mod cli;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

/// Solvent-accessible and Connolly molecular surfaces
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity of the program:
    /// -v for info, -vv for debug, and -vvv for trace
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-atom surface table: exposed dots, faces, area and patch counts
    Surface(cli::surface::Args),
    /// Coordinates of every exposed surface dot
    Dots(cli::dots::Args),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    cli::logging::init(cli.verbose);

    match &cli.command {
        Commands::Surface(args) => cli::surface::run(args),
        Commands::Dots(args) => cli::dots::run(args),
    }
}
