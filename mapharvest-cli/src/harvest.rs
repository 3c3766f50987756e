//! `harvest` and `fetch` commands: write layers into a SpatiaLite database.

use std::io::Write;

use camino::Utf8PathBuf;
use clap::Parser;
use log::warn;
use mapharvest_core::{PolylineMode, normalise_layer_name};
use mapharvest_data::{
    CatalogSource, HarvestReport, HtmlQueryProbe, HttpCatalogSourceConfig, IngestOptions,
    IngestSummary, ObjectIdWindow, QueryProbe, SpatialDatabase, SpatialiteConfig,
    SpatialiteDatabase, fetch_layer, harvest,
};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::discover::{build_source, check_rest_url, source_config};
use crate::{
    ARG_DATABASE, ARG_LAYER_URL, ARG_LEFT, ARG_MULTI_LINESTRING, ARG_NAME, ARG_RIGHT,
    ARG_SPATIALITE_EXTENSION, ARG_TIMEOUT_SECS, ARG_URL, ARG_USER_AGENT, CliError,
    ENV_FETCH_DATABASE, ENV_FETCH_LAYER_URL, ENV_HARVEST_DATABASE, ENV_HARVEST_URL,
};

/// CLI arguments for the `harvest` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Walk an ArcGIS REST catalog and write every queryable \
                 feature layer into a SpatiaLite database, one table per \
                 layer. A failing layer is reported and skipped; the \
                 command exits non-zero when any layer failed.",
    about = "Harvest every layer of a catalog"
)]
#[ortho_config(prefix = "MAPHARVEST")]
pub(crate) struct HarvestArgs {
    /// Catalog root, e.g. `http://host/ArcGIS/rest/services`.
    #[arg(value_name = ARG_URL)]
    #[serde(default)]
    pub(crate) url: Option<String>,
    /// Output SQLite database; created when missing.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// SpatiaLite extension to load (name or path).
    #[arg(long = ARG_SPATIALITE_EXTENSION, value_name = "name")]
    #[serde(default)]
    pub(crate) spatialite_extension: Option<String>,
    /// Keep polyline paths apart as `MULTILINESTRING`s.
    #[arg(long = ARG_MULTI_LINESTRING)]
    #[serde(default)]
    pub(crate) multi_linestring: bool,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Request timeout in seconds. Requests wait indefinitely when unset.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl HarvestArgs {
    pub(crate) fn into_config(self) -> Result<HarvestConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        HarvestConfig::try_from(merged)
    }
}

/// Output settings shared by `harvest` and `fetch`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputConfig {
    /// Database file.
    pub(crate) database: Utf8PathBuf,
    /// Extension loading settings.
    pub(crate) spatialite: SpatialiteConfig,
    /// Writer options.
    pub(crate) options: IngestOptions,
}

impl OutputConfig {
    fn new(database: Utf8PathBuf, extension: Option<String>, multi_linestring: bool) -> Self {
        let mut spatialite = SpatialiteConfig::default();
        if let Some(extension) = extension {
            spatialite.extension = extension;
        }
        let polyline_mode = if multi_linestring {
            PolylineMode::MultiLineString
        } else {
            PolylineMode::Flatten
        };
        Self {
            database,
            spatialite,
            options: IngestOptions { polyline_mode },
        }
    }

    fn open(&self) -> Result<SpatialiteDatabase, CliError> {
        SpatialiteDatabase::open(&self.database, &self.spatialite).map_err(|source| {
            CliError::OpenDatabase {
                path: self.database.clone(),
                source,
            }
        })
    }
}

/// Resolved `harvest` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct HarvestConfig {
    /// Catalog root URL.
    pub(crate) url: String,
    /// Output settings.
    pub(crate) output: OutputConfig,
    /// HTTP client settings.
    pub(crate) source: HttpCatalogSourceConfig,
}

impl TryFrom<HarvestArgs> for HarvestConfig {
    type Error = CliError;

    fn try_from(args: HarvestArgs) -> Result<Self, Self::Error> {
        let url = args.url.ok_or(CliError::MissingArgument {
            field: ARG_URL,
            env: ENV_HARVEST_URL,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_HARVEST_DATABASE,
        })?;
        Ok(Self {
            url,
            output: OutputConfig::new(database, args.spatialite_extension, args.multi_linestring),
            source: source_config(args.user_agent, args.timeout_secs),
        })
    }
}

/// CLI arguments for the `fetch` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Write one feature layer into a SpatiaLite database. With \
                 --left and --right only that object-id range is requested; \
                 otherwise the layer is paged from its feature count.",
    about = "Harvest a single layer"
)]
#[ortho_config(prefix = "MAPHARVEST")]
pub(crate) struct FetchArgs {
    /// Layer endpoint, e.g. `http://host/.../MapServer/3`.
    #[arg(value_name = ARG_LAYER_URL)]
    #[serde(default)]
    pub(crate) layer_url: Option<String>,
    /// Target table name. Defaults to the layer's own name, normalised.
    #[arg(long = ARG_NAME, value_name = "table")]
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Output SQLite database; created when missing.
    #[arg(long = ARG_DATABASE, value_name = "path")]
    #[serde(default)]
    pub(crate) database: Option<Utf8PathBuf>,
    /// Lowest object id to request, inclusive.
    #[arg(long = ARG_LEFT, value_name = "id")]
    #[serde(default)]
    pub(crate) left: Option<u64>,
    /// Highest object id to request, inclusive.
    #[arg(long = ARG_RIGHT, value_name = "id")]
    #[serde(default)]
    pub(crate) right: Option<u64>,
    /// SpatiaLite extension to load (name or path).
    #[arg(long = ARG_SPATIALITE_EXTENSION, value_name = "name")]
    #[serde(default)]
    pub(crate) spatialite_extension: Option<String>,
    /// Keep polyline paths apart as `MULTILINESTRING`s.
    #[arg(long = ARG_MULTI_LINESTRING)]
    #[serde(default)]
    pub(crate) multi_linestring: bool,
    /// User agent sent with every request.
    #[arg(long = ARG_USER_AGENT, value_name = "agent")]
    #[serde(default)]
    pub(crate) user_agent: Option<String>,
    /// Request timeout in seconds. Requests wait indefinitely when unset.
    #[arg(long = ARG_TIMEOUT_SECS, value_name = "secs")]
    #[serde(default)]
    pub(crate) timeout_secs: Option<u64>,
}

impl FetchArgs {
    pub(crate) fn into_config(self) -> Result<FetchConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        FetchConfig::try_from(merged)
    }
}

/// Resolved `fetch` command configuration.
#[derive(Debug, Clone)]
pub(crate) struct FetchConfig {
    /// Layer endpoint.
    pub(crate) layer_url: String,
    /// Target table; read from the layer document when unset.
    pub(crate) name: Option<String>,
    /// Explicit object-id range, if any.
    pub(crate) window: Option<ObjectIdWindow>,
    /// Output settings.
    pub(crate) output: OutputConfig,
    /// HTTP client settings.
    pub(crate) source: HttpCatalogSourceConfig,
}

impl TryFrom<FetchArgs> for FetchConfig {
    type Error = CliError;

    fn try_from(args: FetchArgs) -> Result<Self, Self::Error> {
        let layer_url = args.layer_url.ok_or(CliError::MissingArgument {
            field: ARG_LAYER_URL,
            env: ENV_FETCH_LAYER_URL,
        })?;
        let database = args.database.ok_or(CliError::MissingArgument {
            field: ARG_DATABASE,
            env: ENV_FETCH_DATABASE,
        })?;
        let window = match (args.left, args.right) {
            (Some(left), Some(right)) if left <= right => Some(ObjectIdWindow::new(left, right)),
            (Some(left), Some(right)) => return Err(CliError::InvalidWindow { left, right }),
            (None, None) => None,
            _ => return Err(CliError::IncompleteWindow),
        };
        Ok(Self {
            layer_url,
            name: args.name,
            window,
            output: OutputConfig::new(database, args.spatialite_extension, args.multi_linestring),
            source: source_config(args.user_agent, args.timeout_secs),
        })
    }
}

pub(crate) fn run_harvest(args: HarvestArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let source = build_source(&config.source)?;
    let probe = HtmlQueryProbe::new(&source);
    let mut database = config.output.open()?;
    let mut stdout = std::io::stdout().lock();
    run_harvest_with(&config, &source, &probe, &mut database, &mut stdout)
}

pub(crate) fn run_harvest_with(
    config: &HarvestConfig,
    source: &dyn CatalogSource,
    probe: &dyn QueryProbe,
    database: &mut dyn SpatialDatabase,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    check_rest_url(&config.url);
    let report = harvest(source, probe, database, &config.url, config.output.options)?;
    write_report(writer, &report)?;
    if report.is_complete() {
        Ok(())
    } else {
        Err(CliError::HarvestIncomplete {
            failed: report.failed.len(),
            total: report.ingested.len() + report.skipped.len() + report.failed.len(),
        })
    }
}

pub(crate) fn run_fetch(args: FetchArgs) -> Result<(), CliError> {
    let config = args.into_config()?;
    let source = build_source(&config.source)?;
    let mut database = config.output.open()?;
    let mut stdout = std::io::stdout().lock();
    run_fetch_with(&config, &source, &mut database, &mut stdout)
}

pub(crate) fn run_fetch_with(
    config: &FetchConfig,
    source: &dyn CatalogSource,
    database: &mut dyn SpatialDatabase,
    writer: &mut dyn Write,
) -> Result<(), CliError> {
    let name = match &config.name {
        Some(name) => name.clone(),
        None => layer_name(source, &config.layer_url)?,
    };
    let outcome = fetch_layer(
        source,
        database,
        &config.layer_url,
        &name,
        config.window,
        config.output.options,
    )
    .map_err(|source| CliError::Layer {
        url: config.layer_url.clone(),
        source,
    })?;
    match outcome {
        Some(summary) => write_summary(writer, &summary),
        None => writeln!(writer, "skipped {name}").map_err(CliError::WriteOutput),
    }
}

/// Table name derived from the `name` of the layer document.
fn layer_name(source: &dyn CatalogSource, layer_url: &str) -> Result<String, CliError> {
    let document = source
        .fetch_json(layer_url, &[])
        .map_err(|source| CliError::LayerDocument {
            url: layer_url.to_owned(),
            source,
        })?;
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| CliError::UnnamedLayer {
            url: layer_url.to_owned(),
        })?;
    Ok(normalise_layer_name(name))
}

fn write_summary(writer: &mut dyn Write, summary: &IngestSummary) -> Result<(), CliError> {
    writeln!(
        writer,
        "ingested {}: {} rows ({}, SRID {})",
        summary.table, summary.rows, summary.geometry_type, summary.srid
    )
    .map_err(CliError::WriteOutput)
}

fn write_report(writer: &mut dyn Write, report: &HarvestReport) -> Result<(), CliError> {
    for summary in &report.ingested {
        write_summary(writer, summary)?;
    }
    for name in &report.skipped {
        writeln!(writer, "skipped {name}").map_err(CliError::WriteOutput)?;
    }
    for failure in &report.failed {
        warn!("{} ({}) failed: {}", failure.name, failure.url, failure.error);
        writeln!(writer, "failed {}: {}", failure.name, failure.error)
            .map_err(CliError::WriteOutput)?;
    }
    Ok(())
}
