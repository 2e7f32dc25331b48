//! sitebuild - a manifest-driven static site generator.
//!
//! Pages are declared in `sitebuild.json` as template fragments plus JSON
//! data; `build` renders them into a directory, `serve` renders them per
//! request.

mod build;
mod cli;
mod config;
mod render;
mod routes;
mod serve;
mod utils;

use anyhow::{Context, Result};
use build::build_site;
use clap::Parser;
use cli::{Cli, Commands};
use config::SiteConfig;
use routes::firebase_rewrites;
use serve::serve_site;
use std::{process::ExitCode, sync::mpsc};
use utils::log::Logger;

fn main() -> ExitCode {
    let cli = Cli::parse();
    let logger = Logger::new(cli.quiet);

    match run(&cli, logger) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log!(logger => "error"; "{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli, logger: Logger) -> Result<()> {
    let config = load_config(cli)?;

    match &cli.command {
        Commands::Build { output, .. } => build_site(&config, output, logger).map(|_| ())?,
        Commands::Serve {
            interface, port, ..
        } => {
            let (shutdown_tx, shutdown_rx) = mpsc::channel();
            ctrlc::set_handler(move || {
                let _ = shutdown_tx.send(());
            })
            .context("Failed to set Ctrl+C handler")?;
            serve_site(&config, *interface, *port, logger, shutdown_rx)?;
        }
        Commands::Routes => println!("{}", firebase_rewrites(&config)?),
    }
    Ok(())
}

/// Load the manifest and apply CLI overrides.
fn load_config(cli: &Cli) -> Result<SiteConfig> {
    let mut config = SiteConfig::from_path(&cli.config)?;
    if let Some(data_dir) = cli.data_dir() {
        config.data_dir = data_dir.clone();
    }
    Ok(config)
}
