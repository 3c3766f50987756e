//! Command-line interface for harvesting ArcGIS map services.
#![forbid(unsafe_code)]

use clap::{Parser, Subcommand};

mod discover;
mod error;
mod harvest;
mod logging;

pub use error::CliError;

use discover::{DiscoverArgs, run_discover};
use harvest::{FetchArgs, HarvestArgs, run_fetch, run_harvest};

pub(crate) const ARG_URL: &str = "url";
pub(crate) const ARG_LAYER_URL: &str = "layer-url";
pub(crate) const ARG_DATABASE: &str = "database";
pub(crate) const ARG_NAME: &str = "name";
pub(crate) const ARG_LEFT: &str = "left";
pub(crate) const ARG_RIGHT: &str = "right";
pub(crate) const ARG_USER_AGENT: &str = "user-agent";
pub(crate) const ARG_TIMEOUT_SECS: &str = "timeout-secs";
pub(crate) const ARG_SPATIALITE_EXTENSION: &str = "spatialite-extension";
pub(crate) const ARG_MULTI_LINESTRING: &str = "multi-linestring";
pub(crate) const ENV_DISCOVER_URL: &str = "MAPHARVEST_CMDS_DISCOVER_URL";
pub(crate) const ENV_HARVEST_URL: &str = "MAPHARVEST_CMDS_HARVEST_URL";
pub(crate) const ENV_HARVEST_DATABASE: &str = "MAPHARVEST_CMDS_HARVEST_DATABASE";
pub(crate) const ENV_FETCH_LAYER_URL: &str = "MAPHARVEST_CMDS_FETCH_LAYER_URL";
pub(crate) const ENV_FETCH_DATABASE: &str = "MAPHARVEST_CMDS_FETCH_DATABASE";

/// Run the CLI with the current process arguments and environment.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    logging::init(logging::level(cli.verbose, cli.debug))?;
    match cli.command {
        Command::Discover(args) => run_discover(args),
        Command::Harvest(args) => run_harvest(args),
        Command::Fetch(args) => run_fetch(args),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "mapharvest",
    about = "Harvest ArcGIS map-service layers into SpatiaLite",
    version
)]
struct Cli {
    /// Enable verbose (INFO level) logging output.
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Enable debug (DEBUG level) logging output.
    #[arg(short, long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the queryable layers of a catalog as JSON lines.
    Discover(DiscoverArgs),
    /// Discover a catalog and write every layer into a database.
    Harvest(HarvestArgs),
    /// Write a single layer, optionally restricted to an object-id range.
    Fetch(FetchArgs),
}

#[cfg(test)]
mod tests;
