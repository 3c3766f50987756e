//! `discover` command: list the queryable layers of a catalog.

use std::io::Write;
use std::time::Duration;

use clap::Parser;
use log::warn;
use mapharvest_core::is_arcgis_rest_url;
use mapharvest_data::{
    CatalogSource, HtmlQueryProbe, HttpCatalogSource, HttpCatalogSourceConfig, QueryProbe,
    discover,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

use crate::{ARG_TIMEOUT_SECS, ARG_URL, ARG_USER_AGENT, CliError, ENV_DISCOVER_URL};

/// CLI arguments for the `discover` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Walk an ArcGIS REST catalog and print one JSON object per \
                 queryable feature layer. Each object carries the layer URL, \
                 its resolved table name and its folder path.",
    about = "List the queryable layers of a catalog"
)]
#[ortho_config(prefix = "MAPHARVEST")]
pub(crate) struct DiscoverArgs {
    /// Catalog root, e.g. `http://host/ArcGIS/rest/services`.
    #[arg(value_name = ARG_URL)]
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Request timeout in seconds. Requests wait indefinitely when unset.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl DiscoverArgs {
    pub(crate) fn into_config(self) -> Result<DiscoverConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        DiscoverConfig::try_from(merged)
    }
}

/// Resolved `discover` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct DiscoverConfig {
    /// Catalog root URL.
    pub(crate) url: String,
    /// HTTP client settings.
    pub(crate) source: HttpCatalogSourceConfig,
}

impl TryFrom<DiscoverArgs> for DiscoverConfig {
    type Error = CliError;

    fn try_from(args: DiscoverArgs) -> Result<Self, Self::Error> {
        let url = args.url.ok_or(CliError::MissingArgument {
            field: ARG_URL,
            env: ENV_DISCOVER_URL,
        })?;
        Ok(Self {
            url,
            source: source_config(args.user_agent, args.timeout_secs),
        })
    }
}

/// HTTP settings from the optional user agent and timeout flags.
pub(crate) fn source_config(
    user_agent: Option<String>,
    timeout_secs: Option<u64>,
) -> HttpCatalogSourceConfig {
    let mut config = HttpCatalogSourceConfig::default();
    if let Some(agent) = user_agent {
        config = config.with_user_agent(agent);
    }
    if let Some(secs) = timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config
}

/// Build the HTTP source for a resolved configuration.
pub(crate) fn build_source(config: &HttpCatalogSourceConfig) -> Result<HttpCatalogSource, CliError> {
    HttpCatalogSource::with_config(config.clone()).map_err(CliError::BuildSource)
}

/// Warn when `url` does not look like an ArcGIS REST endpoint.
pub(crate) fn check_rest_url(url: &str) {
    if !is_arcgis_rest_url(url) {
        warn!("{url} does not look like an ArcGIS REST endpoint");
    }
}

pub(crate) fn run_discover(args: DiscoverArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let source = build_source(&config.source)?;
    let probe = HtmlQueryProbe::new(&source);
    let mut stdout = std::io::stdout().lock();
    run_discover_with(&config, &source, &probe, &mut stdout)
}

pub(crate) fn run_discover_with(
    config: &DiscoverConfig,
    source: &dyn CatalogSource,
    probe: &dyn QueryProbe,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    check_rest_url(&config.url);
    let discovery = discover(source, probe, &config.url)?;
    for layer in &discovery.layers {
        let line = serde_json::to_string(layer).map_err(CliError::SerialiseLayer)?;
        writeln!(writer, "{line}").map_err(CliError::WriteOutput)?;
    }
    Ok(())
}
