//! Layer descriptors produced by catalog discovery.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A queryable feature layer found while walking a service catalog.
///
/// `name` is unique across the descriptors of one discovery run and doubles
/// as the target table name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescriptor {
    /// Fully qualified layer endpoint, e.g. `.../Ambiente/MapServer/3`.
    pub url: String,
    /// Resolved, deduplicated identifier.
    pub name: String,
    /// Folder path relative to the catalog root.
    pub folder_path: String,
    /// Whether the layer advertises a `Query` operation.
    pub queryable: bool,
    /// Layer entry exactly as the catalog reported it.
    pub properties: Value,
}

impl LayerDescriptor {
    /// Name the catalog reported for the layer, before normalisation.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        self.properties.get("name").and_then(Value::as_str)
    }

    /// Geometry type tag declared in the catalog entry, if any.
    #[must_use]
    pub fn geometry_type(&self) -> Option<&str> {
        self.properties.get("geometryType").and_then(Value::as_str)
    }
}
