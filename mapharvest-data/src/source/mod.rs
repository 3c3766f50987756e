//! Access to ArcGIS REST catalog documents.
//!
//! Every stage of the harvest talks to the service through
//! [`CatalogSource`], a synchronous trait with one method for JSON documents
//! and one for the HTML page of an endpoint. [`HttpCatalogSource`] implements
//! it over `reqwest`; tests substitute
//! [`crate::test_support::StubCatalogSource`].

mod error;
mod http;

use serde::de::DeserializeOwned;
use serde_json::Value;

pub use error::TransportError;
pub use http::{DEFAULT_USER_AGENT, HttpCatalogSource, HttpCatalogSourceConfig, SourceBuildError};

/// Fetches documents from a map service.
///
/// Implementations append `f=pjson` to every JSON request; callers pass only
/// the operation-specific parameters.
pub trait CatalogSource {
    /// Fetch `url` as JSON with the given query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request fails or the body is not
    /// JSON.
    fn fetch_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, TransportError>;

    /// Fetch the HTML representation of `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the request fails.
    fn fetch_html(&self, url: &str) -> Result<String, TransportError>;
}

impl<T: CatalogSource + ?Sized> CatalogSource for &T {
    fn fetch_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        (**self).fetch_json(url, params)
    }

    fn fetch_html(&self, url: &str) -> Result<String, TransportError> {
        (**self).fetch_html(url)
    }
}

/// Failure to obtain a typed document.
#[derive(Debug)]
pub(crate) enum DocumentError {
    Transport(TransportError),
    Malformed { url: String, message: String },
}

/// Fetch `url` and decode it into `T`.
///
/// A body of the form `{"error": {...}}` is reported as
/// [`TransportError::Service`] before decoding is attempted.
pub(crate) fn fetch_document<S, T>(
    source: &S,
    url: &str,
    params: &[(&str, &str)],
) -> Result<T, DocumentError>
where
    S: CatalogSource + ?Sized,
    T: DeserializeOwned,
{
    let value = source
        .fetch_json(url, params)
        .map_err(DocumentError::Transport)?;
    if let Some(error) = value.get("error") {
        return Err(DocumentError::Transport(TransportError::service(url, error)));
    }
    serde_json::from_value(value).map_err(|err| DocumentError::Malformed {
        url: url.to_owned(),
        message: err.to_string(),
    })
}
