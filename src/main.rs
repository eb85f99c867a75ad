use clap::Parser;
use std::process::ExitCode;
use tidytree::cli::{Cli, run};
use tidytree::logging::init_logging;
use tidytree::output::OutputFormatter;

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            OutputFormatter::error(&e);
            ExitCode::FAILURE
        }
    }
}
