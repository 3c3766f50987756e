//! Core domain logic for harvesting map-service layers.
//!
//! Everything here is pure: no HTTP, no database. The crate covers the
//! pieces of the harvest pipeline with real decisions in them:
//!
//! - [`geometry`] converts Esri JSON geometries to `geo` shapes and WKT.
//! - [`geojson`] renders features and pages as GeoJSON.
//! - [`fields`] maps service field types onto SQLite column types.
//! - [`naming`] normalises and deduplicates layer names.
//! - [`sql`] synthesises the schema and insert statements for a layer.
//! - [`page`] and [`layer`] model the documents flowing between stages.

#![forbid(unsafe_code)]

pub mod fields;
pub mod geojson;
pub mod geometry;
pub mod layer;
pub mod naming;
pub mod page;
pub mod sql;
pub mod url;

pub use fields::{ColumnType, FieldDefinition, FieldType, FieldTypeError};
pub use geojson::{to_geojson_collection, to_geojson_feature};
pub use geometry::{GeometryError, GeometryLiteral, GeometryType, PolylineMode};
pub use layer::LayerDescriptor;
pub use naming::{LayerNameRegistry, normalise_layer_name};
pub use page::{Feature, FeatureCount, FeaturePage, SpatialReference};
pub use sql::{SqlStatement, SqlValue, StatementError};
pub use url::{is_arcgis_rest_url, join_url};
