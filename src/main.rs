// Headless entry point: every run is a batch job over the local tools.

use std::process::ExitCode;

use clap::Parser;
use log::LevelFilter;

use visionary::cli::{self, CliArgs};
use visionary::logger;

fn main() -> ExitCode {
    let args = CliArgs::parse();

    // --verbose forces debug output to stderr on top of the session log.
    if args.verbose {
        logger::init_with(LevelFilter::Debug, true);
    } else {
        logger::init();
    }

    cli::run(args)
}
