//! Facade crate for the mapharvest map-service harvester.
//!
//! This crate re-exports the pure domain types from `mapharvest-core` and,
//! behind the `data` feature, the HTTP discovery and SpatiaLite ingestion
//! adapters from `mapharvest-data`.

#![forbid(unsafe_code)]

pub use mapharvest_core::{
    ColumnType, FeaturePage, FieldDefinition, FieldType, GeometryError, GeometryType,
    LayerDescriptor, LayerNameRegistry, PolylineMode, join_url, normalise_layer_name,
    to_geojson_collection, to_geojson_feature,
};

#[cfg(feature = "data")]
pub use mapharvest_data::{
    CatalogSource, Discovery, FeaturePaginator, HarvestReport, HtmlQueryProbe, HttpCatalogSource,
    QueryProbe, SpatialDatabase, SpatialiteDatabase, discover, fetch_layer, harvest, ingest_layer,
};
