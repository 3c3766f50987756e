//! Queryability checks for discovered layers.
//!
//! A layer is harvested only when its HTML page links a `Query` operation.
//! The check sits behind [`QueryProbe`] so callers can supply their own
//! predicate; any `Fn(&str) -> Result<bool, TransportError>` qualifies.

use scraper::{Html, Selector};

use crate::source::{CatalogSource, TransportError};

/// Decides whether a layer endpoint supports `query`.
pub trait QueryProbe {
    /// Whether the layer at `layer_url` can be queried.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the probe cannot reach the layer.
    fn is_queryable(&self, layer_url: &str) -> Result<bool, TransportError>;
}

impl<F> QueryProbe for F
where
    F: Fn(&str) -> Result<bool, TransportError>,
{
    fn is_queryable(&self, layer_url: &str) -> Result<bool, TransportError> {
        self(layer_url)
    }
}

/// Probe that looks for a `Query` anchor in the layer's HTML page.
#[derive(Debug, Clone, Copy)]
pub struct HtmlQueryProbe<'a, S: ?Sized> {
    source: &'a S,
}

impl<'a, S: CatalogSource + ?Sized> HtmlQueryProbe<'a, S> {
    /// Probe layers through `source`.
    #[must_use]
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }
}

impl<S: CatalogSource + ?Sized> QueryProbe for HtmlQueryProbe<'_, S> {
    fn is_queryable(&self, layer_url: &str) -> Result<bool, TransportError> {
        let html = self.source.fetch_html(layer_url)?;
        Ok(has_query_link(&html))
    }
}

/// Whether `html` contains an anchor whose visible text is exactly `Query`.
///
/// Surrounding whitespace inside the anchor is ignored.
#[must_use]
pub fn has_query_link(html: &str) -> bool {
    let document = Html::parse_document(html);
    Selector::parse("a").is_ok_and(|anchors| {
        document
            .select(&anchors)
            .any(|anchor| anchor.text().collect::<String>().trim() == "Query")
    })
}
