//! Error types emitted by the CLI.
//!
//! Keep this error type reasonably small, as every CLI helper returns
//! `Result<_, CliError>` and the workspace enables `clippy::result_large_err`.

use std::sync::Arc;

use camino::Utf8PathBuf;
use mapharvest_data::{
    DiscoveryError, LayerError, OpenDatabaseError, SourceBuildError, TransportError,
};
use thiserror::Error;

/// Errors emitted by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Provided arguments failed Clap validation.
    #[error(transparent)]
    ArgumentParsing(#[from] clap::Error),
    /// Configuration layering failed (files, env, CLI).
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] Arc<ortho_config::OrthoError>),
    /// A required option is missing after configuration merging.
    #[error("missing {field} (set --{field} or {env})")]
    MissingArgument {
        field: &'static str,
        env: &'static str,
    },
    /// Only one bound of an object-id range was given.
    #[error("--left and --right must be given together")]
    IncompleteWindow,
    /// The object-id range is empty.
    #[error("object-id range [{left}, {right}] is empty")]
    InvalidWindow { left: u64, right: u64 },
    /// Installing the `log` bridge failed.
    #[error("failed to install log bridge: {0}")]
    LogBridge(#[from] log::SetLoggerError),
    /// Installing the tracing subscriber failed.
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] tracing::subscriber::SetGlobalDefaultError),
    /// Constructing the HTTP catalog source failed.
    #[error("failed to build HTTP client: {0}")]
    BuildSource(#[source] SourceBuildError),
    /// Walking the catalog failed.
    #[error("catalog discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),
    /// Opening the output database failed.
    #[error("failed to open database {path:?}: {source}")]
    OpenDatabase {
        path: Utf8PathBuf,
        #[source]
        source: OpenDatabaseError,
    },
    /// Fetching or writing a single layer failed.
    #[error("failed to harvest layer {url}: {source}")]
    Layer {
        url: String,
        #[source]
        source: LayerError,
    },
    /// Fetching the layer document for its name failed.
    #[error("failed to read layer {url}: {source}")]
    LayerDocument {
        url: String,
        #[source]
        source: TransportError,
    },
    /// The layer document has no `name` to derive a table from.
    #[error("layer {url} has no name; pass --name")]
    UnnamedLayer { url: String },
    /// Some layers of a harvest failed; the rest were written.
    #[error("{failed} of {total} layers failed")]
    HarvestIncomplete { failed: usize, total: usize },
    /// Serialising a layer descriptor failed.
    #[error("failed to serialise layer descriptor: {0}")]
    SerialiseLayer(#[source] serde_json::Error),
    /// Writing command output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),
}
