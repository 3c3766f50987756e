//! Canned catalogs shared by the CLI tests.

use mapharvest_data::TransportError;
use mapharvest_data::test_support::StubCatalogSource;
use serde_json::{Value, json};

pub(super) const ROOT: &str = "http://geo.example.it/ArcGIS/rest/services";

pub(super) fn always(_: &str) -> Result<bool, TransportError> {
    Ok(true)
}

pub(super) fn layer_url(id: u32) -> String {
    format!("{ROOT}/Idrografia/MapServer/{id}")
}

pub(super) fn point_page(objectid: i64) -> Value {
    json!({
        "geometryType": "esriGeometryPoint",
        "spatialReference": { "wkid": 3004 },
        "fields": [
            { "name": "OBJECTID", "type": "esriFieldTypeOID" },
            { "name": "NOME", "type": "esriFieldTypeString" }
        ],
        "features": [{
            "attributes": { "OBJECTID": objectid, "NOME": "Sorgente" },
            "geometry": { "x": 2_300_000.0, "y": 4_750_000.0 }
        }]
    })
}

/// Catalog with a `Sorgenti` point layer and a `Fiumi` layer whose query
/// endpoint answers with an ArcGIS error document.
pub(super) fn catalog() -> StubCatalogSource {
    StubCatalogSource::new()
        .respond(
            ROOT,
            json!({
                "currentVersion": 10.05,
                "folders": [],
                "services": [{ "name": "Idrografia", "type": "MapServer" }]
            }),
        )
        .respond(
            &format!("{ROOT}/Idrografia/MapServer/layers"),
            json!({ "layers": [
                { "id": 0, "name": "Sorgenti", "type": "Feature Layer" },
                { "id": 1, "name": "Fiumi", "type": "Feature Layer" }
            ]}),
        )
        .respond_to(
            &format!("{}/query", layer_url(0)),
            &[("where", "1=1"), ("returnCountOnly", "true")],
            json!({ "count": 1 }),
        )
        .respond(&format!("{}/query", layer_url(0)), point_page(1))
        .respond(
            &format!("{}/query", layer_url(1)),
            json!({ "error": { "code": 500, "message": "Error performing query operation" } }),
        )
}
