mod app;
mod cache;
mod cli;
mod dispatch;
mod feed;
mod http;
mod logging;
mod paths;

use std::process::ExitCode;

use clap::Parser;

fn main() -> ExitCode {
    let cli = match cli::Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(cli::usage_exit_status(&err));
        }
    };
    logging::init(cli.verbose);

    match app::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
