//! Main entry point for the zipcyr CLI application.
//!
//! Takes one ZIP archive and writes `<name>_transcoded.<ext>` next to it,
//! with every entry name converted to UTF-8.

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use std::path::Path;
use std::process::ExitCode;
use tracing::Level;

use zipcyr::{Cli, rewrite};

/// Application entry point.
///
/// All failures travel back here as errors; this is the only place that
/// prints them and picks the exit status.
#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) if matches!(err.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            err.exit()
        }
        Err(_) => {
            // Usage problems get the full help on stdout
            if let Err(err) = Cli::command().print_help() {
                eprintln!("error: cannot print usage: {err}");
            }
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&cli);

    let destination = cli.destination();
    match rewrite(Path::new(&cli.file), Path::new(&destination)).await {
        Ok(report) => {
            tracing::debug!(
                entries = report.len(),
                renamed = report.renamed(),
                "rewrite finished"
            );
            println!("Done!");
            ExitCode::SUCCESS
        }
        Err(err) => {
            println!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Install the stderr log subscriber at the level the flags ask for.
fn init_tracing(cli: &Cli) {
    let level = if cli.quiet {
        Level::ERROR
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}
