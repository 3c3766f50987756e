//! Harvest orchestration: discover, page, ingest.
//!
//! [`harvest`] walks a catalog and writes every queryable layer into the
//! database. Layers are isolated from each other: a layer whose pagination
//! or ingestion fails is recorded in the report and the run moves on. Only a
//! failed catalog walk aborts the harvest.

use log::{info, warn};
use thiserror::Error;

use crate::catalog::{DiscoveryError, discover};
use crate::ingest::{IngestError, IngestOptions, IngestSummary, SpatialDatabase, ingest_layer};
use crate::paginate::{FeaturePaginator, ObjectIdWindow, PaginationError};
use crate::probe::QueryProbe;
use crate::source::CatalogSource;

/// Reasons a single layer could not be harvested.
#[derive(Debug, Error)]
pub enum LayerError {
    /// Fetching the layer's pages failed.
    #[error(transparent)]
    Pagination(#[from] PaginationError),
    /// Writing the layer failed.
    #[error(transparent)]
    Ingest(#[from] IngestError),
}

/// A layer that could not be harvested.
#[derive(Debug)]
pub struct LayerFailure {
    /// Resolved layer name.
    pub name: String,
    /// Layer endpoint.
    pub url: String,
    /// What went wrong.
    pub error: LayerError,
}

/// Outcome of a harvest run.
#[derive(Debug, Default)]
pub struct HarvestReport {
    /// `currentVersion` of the catalog root.
    pub server_version: f64,
    /// Layers written to the database.
    pub ingested: Vec<IngestSummary>,
    /// Layers without a geometry type, or without features.
    pub skipped: Vec<String>,
    /// Layers that failed.
    pub failed: Vec<LayerFailure>,
}

impl HarvestReport {
    /// Whether every discovered layer was ingested or skipped.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Fetch one layer and write it into table `name`.
///
/// With `window` set, only that object-id range is requested and the count
/// query is skipped.
///
/// # Errors
///
/// Returns [`LayerError`] when pagination or ingestion fails.
pub fn fetch_layer<S, D>(
    source: &S,
    database: &mut D,
    layer_url: &str,
    name: &str,
    window: Option<ObjectIdWindow>,
    options: IngestOptions,
) -> Result<Option<IngestSummary>, LayerError>
where
    S: CatalogSource + ?Sized,
    D: SpatialDatabase + ?Sized,
{
    let paginator = FeaturePaginator::new(source);
    let pages = match window {
        Some(window) => paginator.fetch_range(layer_url, window)?,
        None => paginator.fetch_all(layer_url)?,
    };
    Ok(ingest_layer(name, &pages, database, options)?)
}

/// Harvest every queryable layer below `root_url`.
///
/// # Errors
///
/// Returns [`DiscoveryError`] when the catalog walk fails. Per-layer failures
/// are collected in [`HarvestReport::failed`] instead.
pub fn harvest<S, P, D>(
    source: &S,
    probe: &P,
    database: &mut D,
    root_url: &str,
    options: IngestOptions,
) -> Result<HarvestReport, DiscoveryError>
where
    S: CatalogSource + ?Sized,
    P: QueryProbe + ?Sized,
    D: SpatialDatabase + ?Sized,
{
    let discovery = discover(source, probe, root_url)?;
    let mut report = HarvestReport {
        server_version: discovery.server_version,
        ..HarvestReport::default()
    };

    for layer in discovery.layers {
        info!("harvesting {} from {}", layer.name, layer.url);
        match fetch_layer(source, database, &layer.url, &layer.name, None, options) {
            Ok(Some(summary)) => report.ingested.push(summary),
            Ok(None) => report.skipped.push(layer.name),
            Err(error) => {
                warn!("layer {} failed: {error}", layer.name);
                report.failed.push(LayerFailure {
                    name: layer.name,
                    url: layer.url,
                    error,
                });
            }
        }
    }

    info!(
        "harvest finished: {} ingested, {} skipped, {} failed",
        report.ingested.len(),
        report.skipped.len(),
        report.failed.len()
    );
    Ok(report)
}
