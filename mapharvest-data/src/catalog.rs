//! Recursive discovery of queryable feature layers.
//!
//! [`discover`] fetches the catalog root, then walks every `MapServer`
//! service and every folder it can reach. Services in a document are visited
//! before its folders, and folders in catalog order, so the resulting layer
//! list is deterministic for a given catalog.

use std::collections::HashSet;

use log::{debug, info, warn};
use mapharvest_core::url::relative_to;
use mapharvest_core::{LayerDescriptor, LayerNameRegistry, join_url};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::probe::QueryProbe;
use crate::source::{CatalogSource, DocumentError, TransportError, fetch_document};

/// Layer entries of this type are candidates for harvesting.
const FEATURE_LAYER: &str = "Feature Layer";

/// Errors raised while walking a catalog.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A catalog document or layer page could not be fetched.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A document did not have the expected shape.
    #[error("malformed catalog document at {url}: {message}")]
    MalformedCatalogDocument {
        /// Document URL.
        url: String,
        /// What was wrong with it.
        message: String,
    },
}

impl From<DocumentError> for DiscoveryError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Transport(source) => Self::Transport(source),
            DocumentError::Malformed { url, message } => {
                Self::MalformedCatalogDocument { url, message }
            }
        }
    }
}

/// Outcome of a catalog walk.
#[derive(Debug, Clone, PartialEq)]
pub struct Discovery {
    /// `currentVersion` reported by the catalog root.
    pub server_version: f64,
    /// Queryable feature layers in discovery order.
    pub layers: Vec<LayerDescriptor>,
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(rename = "currentVersion")]
    current_version: Option<f64>,
    #[serde(default)]
    folders: Vec<String>,
    #[serde(default)]
    services: Vec<ServiceEntry>,
}

#[derive(Debug, Deserialize)]
struct ServiceEntry {
    name: String,
    #[serde(rename = "type")]
    kind: ServiceKind,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
enum ServiceKind {
    MapServer,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct LayersDocument {
    #[serde(default)]
    layers: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct LayerEntry {
    id: i64,
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// Walk the catalog rooted at `root_url`.
///
/// Every `Feature Layer` of every `MapServer` service is checked with
/// `probe`; queryable layers receive a unique name from a registry scoped to
/// this call. A folder URL already visited during the walk is skipped.
///
/// # Errors
///
/// Returns [`DiscoveryError`] on the first fetch, decode or probe failure.
/// A root document without `currentVersion` is reported as
/// [`DiscoveryError::MalformedCatalogDocument`].
///
/// # Examples
///
/// ```
/// use mapharvest_data::{discover, test_support::StubCatalogSource, TransportError};
/// use serde_json::json;
///
/// let root = "http://example.test/arcgis/rest/services";
/// let source = StubCatalogSource::new()
///     .respond(root, json!({ "currentVersion": 10.51, "folders": [], "services": [] }));
/// let probe = |_: &str| -> Result<bool, TransportError> { Ok(true) };
/// let discovery = discover(&source, &probe, root)?;
/// assert!(discovery.layers.is_empty());
/// # Ok::<(), mapharvest_data::DiscoveryError>(())
/// ```
pub fn discover<S, P>(source: &S, probe: &P, root_url: &str) -> Result<Discovery, DiscoveryError>
where
    S: CatalogSource + ?Sized,
    P: QueryProbe + ?Sized,
{
    let root = root_url.trim_end_matches('/');
    let document: CatalogDocument = fetch_document(source, root, &[])?;
    let server_version =
        document
            .current_version
            .ok_or_else(|| DiscoveryError::MalformedCatalogDocument {
                url: root.to_owned(),
                message: "missing currentVersion".to_owned(),
            })?;
    info!("catalog {root} reports version {server_version}");

    let mut walker = CatalogWalker {
        source,
        probe,
        root,
        registry: LayerNameRegistry::new(),
        visited: HashSet::from([root.to_owned()]),
        layers: Vec::new(),
    };
    walker.visit(root, &document)?;
    info!("discovered {} queryable layers", walker.layers.len());
    Ok(Discovery {
        server_version,
        layers: walker.layers,
    })
}

struct CatalogWalker<'a, S: ?Sized, P: ?Sized> {
    source: &'a S,
    probe: &'a P,
    root: &'a str,
    registry: LayerNameRegistry,
    visited: HashSet<String>,
    layers: Vec<LayerDescriptor>,
}

impl<S, P> CatalogWalker<'_, S, P>
where
    S: CatalogSource + ?Sized,
    P: QueryProbe + ?Sized,
{
    fn visit(&mut self, url: &str, document: &CatalogDocument) -> Result<(), DiscoveryError> {
        for service in &document.services {
            if service.kind == ServiceKind::MapServer {
                self.visit_service(url, &service.name)?;
            } else {
                debug!("skipping non-MapServer service {}", service.name);
            }
        }

        for folder in &document.folders {
            let folder_url = join_url([url, folder.as_str()]);
            if !self.visited.insert(folder_url.clone()) {
                warn!("folder {folder_url} already visited; skipping");
                continue;
            }
            debug!("entering folder {folder_url}");
            let child: CatalogDocument = fetch_document(self.source, &folder_url, &[])?;
            self.visit(&folder_url, &child)?;
        }
        Ok(())
    }

    fn visit_service(&mut self, url: &str, service_name: &str) -> Result<(), DiscoveryError> {
        // Service names carry their folder prefix, e.g. `Ambiente/Carta`.
        let short_name = service_name.rsplit('/').next().unwrap_or(service_name);
        let layers_url = join_url([url, short_name, "MapServer", "layers"]);
        let document: LayersDocument = fetch_document(self.source, &layers_url, &[])?;

        for raw in document.layers {
            let entry = LayerEntry::deserialize(&raw).map_err(|err| {
                DiscoveryError::MalformedCatalogDocument {
                    url: layers_url.clone(),
                    message: err.to_string(),
                }
            })?;
            if entry.kind != FEATURE_LAYER {
                continue;
            }

            let layer_url = join_url([url, short_name, "MapServer", &entry.id.to_string()]);
            if !self.probe.is_queryable(&layer_url)? {
                debug!("layer {layer_url} is not queryable");
                continue;
            }

            let name = self.registry.resolve(&entry.name);
            debug!("layer {layer_url} registered as {name}");
            self.layers.push(LayerDescriptor {
                url: layer_url,
                name,
                folder_path: relative_to(url, self.root).to_owned(),
                queryable: true,
                properties: raw,
            });
        }
        Ok(())
    }
}
