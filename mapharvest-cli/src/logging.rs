//! Console logging for the CLI.
//!
//! Library crates log through the `log` facade; the CLI bridges those
//! records into a `tracing` subscriber writing to stderr, so stdout carries
//! only command output.

use tracing::Level;
use tracing_log::LogTracer;
use tracing_subscriber::FmtSubscriber;

use crate::CliError;

/// Level selected by the `--verbose` and `--debug` flags.
pub(crate) fn level(verbose: bool, debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else if verbose {
        Level::INFO
    } else {
        Level::WARN
    }
}

/// Install the `log` bridge and the global subscriber.
pub(crate) fn init(level: Level) -> Result<(), CliError> {
    LogTracer::init()?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
