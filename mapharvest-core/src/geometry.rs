//! Convert Esri JSON geometries into `geo` shapes and well-known text.
//!
//! Map services encode every feature geometry according to the page-level
//! `geometryType` tag. The converter reads the encoded object for that tag,
//! builds a [`geo::Geometry`] and renders it as WKT through `geozero`.
//!
//! Polylines are flattened into a single `LINESTRING` by default: every path
//! contributes its points, in order, to one coordinate sequence. Callers that
//! need disjoint paths preserved opt into [`PolylineMode::MultiLineString`].
//!
//! # Examples
//!
//! ```
//! use mapharvest_core::{GeometryType, PolylineMode, geometry::to_wkt};
//! use serde_json::json;
//!
//! let wkt = to_wkt(
//!     GeometryType::Point,
//!     &json!({ "x": 12.5, "y": 43.1 }),
//!     PolylineMode::Flatten,
//! )?;
//! assert_eq!(wkt, "POINT(12.5 43.1)");
//! # Ok::<(), mapharvest_core::GeometryError>(())
//! ```

use std::{fmt, str::FromStr};

use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, Point, Polygon};
use geozero::ToWkt;
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

const ESRI_PREFIX: &str = "esriGeometry";

/// Errors raised while converting an encoded geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The page declared a geometry type the converter does not know.
    #[error("unsupported geometry type {tag:?}")]
    UnsupportedGeometryType {
        /// Tag as reported by the service.
        tag: String,
    },
    /// The encoded geometry did not match the declared geometry type.
    #[error("malformed {geometry_type} geometry: {message}")]
    Malformed {
        /// Declared geometry type.
        geometry_type: GeometryType,
        /// Description of the mismatch.
        message: String,
    },
    /// The encoded geometry carried no coordinates.
    #[error("empty {geometry_type} geometry")]
    Empty {
        /// Declared geometry type.
        geometry_type: GeometryType,
    },
    /// Rendering the geometry as WKT or GeoJSON failed.
    #[error("failed to encode geometry")]
    Encode {
        /// Source error produced by `geozero`.
        #[source]
        source: geozero::error::GeozeroError,
    },
}

/// Geometry families exposed by map-service layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryType {
    /// A single `{x, y}` position.
    Point,
    /// A list of positions under `points`.
    Multipoint,
    /// One or more paths under `paths`.
    Polyline,
    /// One or more rings under `rings`.
    Polygon,
}

/// How polylines with several paths are represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PolylineMode {
    /// Concatenate every path into one `LINESTRING`.
    #[default]
    Flatten,
    /// Keep each path as one member of a `MULTILINESTRING`.
    MultiLineString,
}

impl GeometryType {
    /// Tag used by the service, e.g. `esriGeometryPolyline`.
    #[must_use]
    pub const fn esri_tag(self) -> &'static str {
        match self {
            Self::Point => "esriGeometryPoint",
            Self::Multipoint => "esriGeometryMultipoint",
            Self::Polyline => "esriGeometryPolyline",
            Self::Polygon => "esriGeometryPolygon",
        }
    }

    /// Geometry type name used when registering the SpatiaLite column.
    ///
    /// Polylines register as `LINESTRING`, or `MULTILINESTRING` when paths are
    /// preserved.
    #[must_use]
    pub const fn column_type(self, mode: PolylineMode) -> &'static str {
        match (self, mode) {
            (Self::Point, _) => "POINT",
            (Self::Multipoint, _) => "MULTIPOINT",
            (Self::Polyline, PolylineMode::Flatten) => "LINESTRING",
            (Self::Polyline, PolylineMode::MultiLineString) => "MULTILINESTRING",
            (Self::Polygon, _) => "POLYGON",
        }
    }
}

impl fmt::Display for GeometryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Point => "Point",
            Self::Multipoint => "Multipoint",
            Self::Polyline => "Polyline",
            Self::Polygon => "Polygon",
        };
        f.write_str(name)
    }
}

impl FromStr for GeometryType {
    type Err = GeometryError;

    /// Parse a service tag. The `esriGeometry` prefix is optional and the
    /// remainder is matched case-insensitively.
    fn from_str(tag: &str) -> Result<Self, Self::Err> {
        let bare = tag.strip_prefix(ESRI_PREFIX).unwrap_or(tag);
        match bare.to_ascii_lowercase().as_str() {
            "point" => Ok(Self::Point),
            "multipoint" => Ok(Self::Multipoint),
            "polyline" => Ok(Self::Polyline),
            "polygon" => Ok(Self::Polygon),
            _ => Err(GeometryError::UnsupportedGeometryType {
                tag: tag.to_owned(),
            }),
        }
    }
}

/// WKT plus SRID, ready to be handed to `GeometryFromText`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeometryLiteral {
    /// Well-known text of the geometry.
    pub wkt: String,
    /// Spatial reference identifier.
    pub srid: i64,
}

impl fmt::Display for GeometryLiteral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeometryFromText('{}', {})", self.wkt, self.srid)
    }
}

#[derive(Debug, Deserialize)]
struct EsriPoint {
    x: f64,
    y: f64,
}

#[derive(Debug, Deserialize)]
struct EsriMultipoint {
    points: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct EsriPolyline {
    paths: Vec<Vec<Vec<f64>>>,
}

#[derive(Debug, Deserialize)]
struct EsriPolygon {
    rings: Vec<Vec<Vec<f64>>>,
}

/// Build a [`Geometry`] from an encoded Esri geometry.
///
/// Coordinates keep the order supplied by the service; ring winding is not
/// validated. Positions carrying Z or M values contribute only `x` and `y`.
pub fn to_geometry(
    geometry_type: GeometryType,
    encoded: &Value,
    mode: PolylineMode,
) -> Result<Geometry<f64>, GeometryError> {
    match geometry_type {
        GeometryType::Point => {
            let point: EsriPoint = decode(geometry_type, encoded)?;
            Ok(Geometry::Point(Point::new(point.x, point.y)))
        }
        GeometryType::Multipoint => {
            let multipoint: EsriMultipoint = decode(geometry_type, encoded)?;
            let points = coords(geometry_type, &multipoint.points)?
                .into_iter()
                .map(Point::from)
                .collect::<Vec<_>>();
            non_empty(geometry_type, &points)?;
            Ok(Geometry::MultiPoint(MultiPoint::new(points)))
        }
        GeometryType::Polyline => {
            let polyline: EsriPolyline = decode(geometry_type, encoded)?;
            let paths = polyline
                .paths
                .iter()
                .map(|path| coords(geometry_type, path))
                .collect::<Result<Vec<_>, _>>()?;
            match mode {
                PolylineMode::Flatten => {
                    let flat = paths.into_iter().flatten().collect::<Vec<_>>();
                    non_empty(geometry_type, &flat)?;
                    Ok(Geometry::LineString(LineString::new(flat)))
                }
                PolylineMode::MultiLineString => {
                    non_empty(geometry_type, &paths)?;
                    let lines = paths.into_iter().map(LineString::new).collect();
                    Ok(Geometry::MultiLineString(MultiLineString::new(lines)))
                }
            }
        }
        GeometryType::Polygon => {
            let polygon: EsriPolygon = decode(geometry_type, encoded)?;
            let mut rings = polygon
                .rings
                .iter()
                .map(|ring| coords(geometry_type, ring).map(LineString::new))
                .collect::<Result<Vec<_>, _>>()?
                .into_iter();
            let Some(exterior) = rings.next() else {
                return Err(GeometryError::Empty { geometry_type });
            };
            Ok(Geometry::Polygon(Polygon::new(exterior, rings.collect())))
        }
    }
}

/// Render an encoded Esri geometry as WKT.
pub fn to_wkt(
    geometry_type: GeometryType,
    encoded: &Value,
    mode: PolylineMode,
) -> Result<String, GeometryError> {
    to_geometry(geometry_type, encoded, mode)?
        .to_wkt()
        .map_err(|source| GeometryError::Encode { source })
}

/// Convert an encoded geometry into a literal tagged with `srid`.
pub fn convert(
    geometry_type: GeometryType,
    encoded: &Value,
    srid: i64,
    mode: PolylineMode,
) -> Result<GeometryLiteral, GeometryError> {
    to_wkt(geometry_type, encoded, mode).map(|wkt| GeometryLiteral { wkt, srid })
}

fn decode<T: for<'de> Deserialize<'de>>(
    geometry_type: GeometryType,
    encoded: &Value,
) -> Result<T, GeometryError> {
    T::deserialize(encoded).map_err(|err| GeometryError::Malformed {
        geometry_type,
        message: err.to_string(),
    })
}

fn coords(
    geometry_type: GeometryType,
    positions: &[Vec<f64>],
) -> Result<Vec<Coord<f64>>, GeometryError> {
    positions
        .iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(GeometryError::Malformed {
                geometry_type,
                message: format!("position {position:?} needs at least two ordinates"),
            }),
        })
        .collect()
}

fn non_empty<T>(geometry_type: GeometryType, items: &[T]) -> Result<(), GeometryError> {
    if items.is_empty() {
        Err(GeometryError::Empty { geometry_type })
    } else {
        Ok(())
    }
}
