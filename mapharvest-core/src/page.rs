//! Feature pages returned by a layer `query` endpoint.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::FieldDefinition;

/// Spatial reference attached to a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub struct SpatialReference {
    /// Well-known identifier, usually an EPSG code.
    #[serde(default)]
    pub wkid: Option<i64>,
    /// Current identifier when `wkid` names a deprecated code.
    #[serde(default, rename = "latestWkid")]
    pub latest_wkid: Option<i64>,
}

impl SpatialReference {
    /// SRID to register, preferring `wkid` over `latestWkid`.
    #[must_use]
    pub fn srid(&self) -> Option<i64> {
        self.wkid.or(self.latest_wkid)
    }
}

/// One feature: attribute values plus an encoded geometry.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Feature {
    /// Attribute values keyed by field name.
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Geometry encoded according to the page's geometry type.
    #[serde(default)]
    pub geometry: Option<Value>,
}

/// Response for one object-id window.
///
/// Every key is optional because the service omits `geometryType`,
/// `spatialReference` and `fields` on non-spatial tables.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePage {
    /// Geometry type tag, e.g. `esriGeometryPolygon`.
    #[serde(default)]
    pub geometry_type: Option<String>,
    /// Spatial reference of every geometry in the page.
    #[serde(default)]
    pub spatial_reference: Option<SpatialReference>,
    /// Field definitions shared by the features.
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Features inside the requested window.
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeaturePage {
    /// Whether the page declares a geometry type.
    #[must_use]
    pub fn is_spatial(&self) -> bool {
        self.geometry_type.is_some()
    }
}

/// Response to a `returnCountOnly` query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct FeatureCount {
    /// Number of features matching the query.
    pub count: u64,
}
