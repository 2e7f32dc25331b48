//! Command-line interface definitions.
//!
//! Defines all CLI arguments and subcommands using clap.

use crate::config::defaults;
use clap::{Parser, Subcommand};
use std::{net::IpAddr, path::PathBuf};

/// sitebuild static site generator
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Manifest file describing the pages
    #[arg(short = 'C', long, default_value_os_t = defaults::manifest())]
    pub config: PathBuf,

    /// Only print errors
    #[arg(short, long)]
    pub quiet: bool,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Arguments shared by commands that render pages
#[derive(clap::Args, Debug, Clone)]
pub struct RenderArgs {
    /// Directory data sources are read from (overrides `dataDir`)
    #[arg(long = "data-dir")]
    pub data_dir: Option<PathBuf>,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Deletes the output directory if there is one and rebuilds the site
    Build {
        /// Output directory path
        #[arg(short, long, default_value_os_t = defaults::output())]
        output: PathBuf,

        #[command(flatten)]
        render_args: RenderArgs,
    },

    /// Serve the site, rendering every page on request
    #[command(alias = "server")]
    Serve {
        /// Interface to bind on
        #[arg(short, long, default_value_t = default_interface())]
        interface: IpAddr,

        /// The port to listen on
        #[arg(short, long, default_value_t = defaults::serve::port())]
        port: u16,

        #[command(flatten)]
        render_args: RenderArgs,
    },

    /// Print Firebase Hosting rewrites for every page
    #[command(alias = "genroutes")]
    Routes,
}

fn default_interface() -> IpAddr {
    defaults::serve::interface()
        .parse()
        .unwrap_or(IpAddr::from([127, 0, 0, 1]))
}

impl Cli {
    /// `--data-dir` of the active command, if any.
    pub fn data_dir(&self) -> Option<&PathBuf> {
        match &self.command {
            Commands::Build { render_args, .. } | Commands::Serve { render_args, .. } => {
                render_args.data_dir.as_ref()
            }
            Commands::Routes => None,
        }
    }
}
