mod cli;
mod logging;
mod runner;

use std::process::ExitCode;

use clap::Parser;
use offload_logging::offload_error;

fn main() -> ExitCode {
    let cli = cli::Cli::parse();
    logging::initialize(cli.log);

    match runner::run(&cli) {
        Ok(summary) if summary.failed == 0 => ExitCode::SUCCESS,
        Ok(summary) => {
            eprintln!(
                "offload: {} of {} jobs failed",
                summary.failed,
                summary.failed + summary.written.len()
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            offload_error!("{err:#}");
            eprintln!("offload: {err:#}");
            ExitCode::FAILURE
        }
    }
}
