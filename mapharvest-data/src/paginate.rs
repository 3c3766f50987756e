//! Object-id windowed retrieval of layer features.
//!
//! A layer is read by first asking the `query` endpoint for its feature
//! count, then requesting consecutive `OBJECTID` ranges of
//! [`WINDOW_SIZE`] ids. Services cap the number of features per response,
//! so each window stays below the usual limit.

use std::fmt;

use log::{debug, info};
use mapharvest_core::{FeatureCount, FeaturePage, join_url};
use thiserror::Error;

use crate::source::{CatalogSource, DocumentError, TransportError, fetch_document};

/// Number of object ids covered by one window.
pub const WINDOW_SIZE: u64 = 1000;

/// Attribute holding the object id in the default configuration.
pub const DEFAULT_OBJECT_ID_FIELD: &str = "OBJECTID";

/// Errors raised while paging through a layer.
#[derive(Debug, Error)]
pub enum PaginationError {
    /// A count or window request failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// A response did not have the expected shape.
    #[error("malformed query response from {url}: {message}")]
    MalformedPage {
        /// Query URL.
        url: String,
        /// What was wrong with it.
        message: String,
    },
}

impl From<DocumentError> for PaginationError {
    fn from(err: DocumentError) -> Self {
        match err {
            DocumentError::Transport(source) => Self::Transport(source),
            DocumentError::Malformed { url, message } => Self::MalformedPage { url, message },
        }
    }
}

/// Inclusive object-id range requested in one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectIdWindow {
    /// Lowest object id, inclusive.
    pub left: u64,
    /// Highest object id, inclusive.
    pub right: u64,
}

impl ObjectIdWindow {
    /// Window covering `left..=right`.
    #[must_use]
    pub const fn new(left: u64, right: u64) -> Self {
        Self { left, right }
    }
}

impl fmt::Display for ObjectIdWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.left, self.right)
    }
}

/// Windows needed to cover `total_count` features.
///
/// Ids are assumed to start at 1. Windows are [`WINDOW_SIZE`] ids wide and
/// start at `1, 1001, 2001, ...` while the start stays below the count, so a
/// layer with sparse ids is still covered up to the end of each window. A
/// count of 1 yields the single window `[1, 2]`.
///
/// # Examples
///
/// ```
/// use mapharvest_data::paginate::{windows, ObjectIdWindow};
///
/// assert_eq!(windows(1), vec![ObjectIdWindow::new(1, 2)]);
/// assert_eq!(windows(3), vec![ObjectIdWindow::new(1, 1000)]);
/// assert_eq!(windows(2500).last(), Some(&ObjectIdWindow::new(2001, 3000)));
/// ```
#[must_use]
pub fn windows(total_count: u64) -> Vec<ObjectIdWindow> {
    if total_count == 1 {
        return vec![ObjectIdWindow::new(1, 2)];
    }
    (1..total_count)
        .step_by(usize::try_from(WINDOW_SIZE).unwrap_or(usize::MAX))
        .map(|left| ObjectIdWindow::new(left, left + WINDOW_SIZE - 1))
        .collect()
}

/// Pages through the `query` endpoint of feature layers.
#[derive(Debug, Clone)]
pub struct FeaturePaginator<'a, S: ?Sized> {
    source: &'a S,
    object_id_field: String,
}

impl<'a, S: CatalogSource + ?Sized> FeaturePaginator<'a, S> {
    /// Paginator issuing requests through `source`.
    #[must_use]
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            object_id_field: DEFAULT_OBJECT_ID_FIELD.to_owned(),
        }
    }

    /// Use `field` instead of `OBJECTID` in window predicates.
    #[must_use]
    pub fn with_object_id_field(mut self, field: impl Into<String>) -> Self {
        self.object_id_field = field.into();
        self
    }

    /// `where` clause selecting the ids inside `window`.
    #[must_use]
    pub fn where_clause(&self, window: ObjectIdWindow) -> String {
        format!(
            "{field}>={} and {field}<={}",
            window.left,
            window.right,
            field = self.object_id_field
        )
    }

    /// Number of features the layer reports.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError`] when the count request fails.
    pub fn count_features(&self, layer_url: &str) -> Result<u64, PaginationError> {
        let query_url = query_url(layer_url);
        let count: FeatureCount = fetch_document(
            self.source,
            &query_url,
            &[("where", "1=1"), ("returnCountOnly", "true")],
        )?;
        debug!("{layer_url} reports {} features", count.count);
        Ok(count.count)
    }

    /// Features whose ids fall inside `window`.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError`] when the request fails or the response is
    /// not a feature page.
    pub fn fetch_window(
        &self,
        layer_url: &str,
        window: ObjectIdWindow,
    ) -> Result<FeaturePage, PaginationError> {
        let query_url = query_url(layer_url);
        let predicate = self.where_clause(window);
        debug!("fetching {layer_url} window {window}");
        let page = fetch_document(
            self.source,
            &query_url,
            &[
                ("where", predicate.as_str()),
                ("returnGeometry", "true"),
                ("outFields", "*"),
            ],
        )?;
        Ok(page)
    }

    /// Every page of the layer, one per window.
    ///
    /// A layer reporting zero features yields no pages.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError`] on the first failed request; pages fetched
    /// before the failure are discarded.
    pub fn fetch_all(&self, layer_url: &str) -> Result<Vec<FeaturePage>, PaginationError> {
        let total = self.count_features(layer_url)?;
        let windows = windows(total);
        info!("{layer_url}: {total} features in {} windows", windows.len());
        windows
            .into_iter()
            .map(|window| self.fetch_window(layer_url, window))
            .collect()
    }

    /// Page for one explicit window, skipping the count request.
    ///
    /// # Errors
    ///
    /// Returns [`PaginationError`] on the first failed request.
    pub fn fetch_range(
        &self,
        layer_url: &str,
        window: ObjectIdWindow,
    ) -> Result<Vec<FeaturePage>, PaginationError> {
        self.fetch_window(layer_url, window).map(|page| vec![page])
    }
}

fn query_url(layer_url: &str) -> String {
    join_url([layer_url, "query"])
}
