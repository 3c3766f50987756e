//! Data access and ingestion for the map-service harvester.
//!
//! Responsibilities:
//! - Fetch catalog, layer and query documents over HTTP.
//! - Walk catalogs, page through layers and write SpatiaLite tables.
//! - Tie the stages together into a per-layer isolated harvest.
//!
//! Boundaries:
//! - Conversion and naming rules live in `mapharvest-core`.
//! - Network and database access sit behind [`CatalogSource`] and
//!   [`SpatialDatabase`] so each stage can be exercised with test doubles.
//!
//! Invariants:
//! - Layer names are unique within one discovery run.
//! - A layer is written inside one transaction or not at all.

#![deny(unsafe_code)]

pub mod catalog;
pub mod ingest;
pub mod paginate;
pub mod pipeline;
pub mod probe;
pub mod source;

#[doc(hidden)]
pub mod test_support;

pub use catalog::{Discovery, DiscoveryError, discover};
pub use ingest::{
    DatabaseError, IngestError, IngestOptions, IngestSummary, OpenDatabaseError, SpatialDatabase,
    SpatialiteConfig, SpatialiteDatabase, ingest_layer,
};
pub use paginate::{FeaturePaginator, ObjectIdWindow, PaginationError, WINDOW_SIZE};
pub use pipeline::{HarvestReport, LayerError, LayerFailure, fetch_layer, harvest};
pub use probe::{HtmlQueryProbe, QueryProbe};
pub use source::{
    CatalogSource, HttpCatalogSource, HttpCatalogSourceConfig, SourceBuildError, TransportError,
};
