//! Render query results as GeoJSON features.
//!
//! Attributes become `properties`. Polylines keep one member per path as a
//! `MultiLineString`, so no path is merged into another.

use geozero::ToJson;
use geozero::error::GeozeroError;
use serde_json::{Value, json};

use crate::geometry::{GeometryError, GeometryType, PolylineMode, to_geometry};
use crate::{Feature, FeaturePage};

/// GeoJSON `Feature` for one service feature.
///
/// A feature without a geometry gets `"geometry": null`.
///
/// # Errors
///
/// Returns [`GeometryError`] when the geometry cannot be decoded for
/// `geometry_type`.
///
/// # Examples
///
/// ```
/// use mapharvest_core::{Feature, GeometryType, to_geojson_feature};
/// use serde_json::json;
///
/// let feature: Feature = serde_json::from_value(json!({
///     "attributes": { "NOME": "Pozzo" },
///     "geometry": { "x": 1.0, "y": 2.0 }
/// }))?;
/// let geojson = to_geojson_feature(GeometryType::Point, &feature)?;
/// assert_eq!(geojson["geometry"]["type"], "Point");
/// assert_eq!(geojson["properties"]["NOME"], "Pozzo");
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn to_geojson_feature(
    geometry_type: GeometryType,
    feature: &Feature,
) -> Result<Value, GeometryError> {
    let geometry = match &feature.geometry {
        Some(encoded) => geojson_geometry(geometry_type, encoded)?,
        None => Value::Null,
    };
    Ok(feature_value(feature, geometry))
}

/// GeoJSON `FeatureCollection` holding every feature of `page`.
///
/// Pages without a geometry type yield features with null geometries.
///
/// # Errors
///
/// Returns [`GeometryError`] when the page's geometry type is unknown or a
/// feature geometry cannot be decoded.
pub fn to_geojson_collection(page: &FeaturePage) -> Result<Value, GeometryError> {
    let geometry_type = page
        .geometry_type
        .as_deref()
        .map(str::parse::<GeometryType>)
        .transpose()?;
    let features = page
        .features
        .iter()
        .map(|feature| match geometry_type {
            Some(geometry_type) => to_geojson_feature(geometry_type, feature),
            None => Ok(feature_value(feature, Value::Null)),
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "type": "FeatureCollection", "features": features }))
}

fn feature_value(feature: &Feature, geometry: Value) -> Value {
    json!({
        "type": "Feature",
        "properties": feature.attributes,
        "geometry": geometry,
    })
}

fn geojson_geometry(geometry_type: GeometryType, encoded: &Value) -> Result<Value, GeometryError> {
    let text = to_geometry(geometry_type, encoded, PolylineMode::MultiLineString)?
        .to_json()
        .map_err(|source| GeometryError::Encode { source })?;
    serde_json::from_str(&text).map_err(|err| GeometryError::Encode {
        source: GeozeroError::Geometry(err.to_string()),
    })
}
