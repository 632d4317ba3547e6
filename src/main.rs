use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

fn main() -> ExitCode {
    match try_main() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn try_main() -> anyhow::Result<bool> {
    downtrans::logging::init().context("init logging")?;

    let cli = downtrans::cli::Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    downtrans::commands::run(cli)
}
