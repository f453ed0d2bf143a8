use anyhow::{Context, Result};
use clap::Parser;
use formulary_cli::{Cli, FormularyConfig, Runner, init_logging};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing::{error, info, warn};

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %format!("{err:#}"), "command failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = FormularyConfig::load(cli.config.as_deref())
        .context("failed to load configuration")?
        .apply_env()?;

    init_logging(&config.logging, cli.verbose)?;

    match &config.source {
        Some(path) => info!(path = %path.display(), "configuration loaded"),
        None => warn!("configuration file not found, using defaults"),
    }
    info!(version = env!("CARGO_PKG_VERSION"), "starting formulary");

    let runner = Runner::new(&config, cli.format);
    let stdout = io::stdout();
    let mut out = stdout.lock();
    runner.run(cli, &mut out)?;
    out.flush()?;
    Ok(())
}
