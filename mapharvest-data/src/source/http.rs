//! `reqwest`-backed [`CatalogSource`].
//!
//! The trait is synchronous so the walker and paginator stay plain loops.
//! [`HttpCatalogSource`] owns a `current_thread` Tokio runtime and blocks on
//! each request, borrowing the caller's runtime instead when it is already
//! inside a multi-threaded one.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;
use thiserror::Error;
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

use super::{CatalogSource, TransportError};

/// Default user agent for catalog requests.
pub const DEFAULT_USER_AGENT: &str = "mapharvest/0.1";

/// Response format requested from every JSON endpoint.
const FORMAT_PARAM: (&str, &str) = ("f", "pjson");

/// Error type for [`HttpCatalogSource`] construction failures.
#[derive(Debug, Error)]
pub enum SourceBuildError {
    /// Failed to build the HTTP client.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
    /// Failed to build the Tokio runtime.
    #[error("failed to build Tokio runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Configuration for [`HttpCatalogSource`].
#[derive(Debug, Clone)]
pub struct HttpCatalogSourceConfig {
    /// Request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// User agent string for requests.
    pub user_agent: String,
}

impl Default for HttpCatalogSourceConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpCatalogSourceConfig {
    /// Set the request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// HTTP client for ArcGIS REST endpoints.
///
/// When called from within a `current_thread` Tokio runtime the source falls
/// back to its own runtime, which blocks the caller's runtime for the
/// duration of the request.
pub struct HttpCatalogSource {
    client: Client,
    config: HttpCatalogSourceConfig,
    runtime: Runtime,
}

impl std::fmt::Debug for HttpCatalogSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCatalogSource")
            .field("client", &self.client)
            .field("config", &self.config)
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl HttpCatalogSource {
    /// Create a source with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn new() -> Result<Self, SourceBuildError> {
        Self::with_config(HttpCatalogSourceConfig::default())
    }

    /// Create a source with explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client or Tokio runtime fails to build.
    pub fn with_config(config: HttpCatalogSourceConfig) -> Result<Self, SourceBuildError> {
        let mut builder = Client::builder().user_agent(&config.user_agent);
        if let Some(timeout) = config.timeout {
            builder = builder.connect_timeout(timeout).timeout(timeout);
        }
        let client = builder.build().map_err(SourceBuildError::HttpClient)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(SourceBuildError::Runtime)?;
        Ok(Self {
            client,
            config,
            runtime,
        })
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &HttpCatalogSourceConfig {
        &self.config
    }

    async fn get(&self, url: &str, params: &[(&str, &str)]) -> Result<Response, TransportError> {
        self.client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|err| convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| convert_reqwest_error(&err, url))
    }

    async fn fetch_json_async(
        &self,
        url: &str,
        params: &[(&str, &str)],
    ) -> Result<Value, TransportError> {
        let mut query = Vec::with_capacity(params.len() + 1);
        query.push(FORMAT_PARAM);
        query.extend_from_slice(params);
        log::debug!("GET {url} {query:?}");
        self.get(url, &query)
            .await?
            .json()
            .await
            .map_err(|err| TransportError::Decode {
                url: url.to_owned(),
                message: err.to_string(),
            })
    }

    async fn fetch_html_async(&self, url: &str) -> Result<String, TransportError> {
        log::debug!("GET {url} (html)");
        self.get(url, &[])
            .await?
            .text()
            .await
            .map_err(|err| TransportError::Decode {
                url: url.to_owned(),
                message: err.to_string(),
            })
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            _ => self.runtime.block_on(future),
        }
    }
}

fn convert_reqwest_error(error: &reqwest::Error, url: &str) -> TransportError {
    if error.is_timeout() {
        return TransportError::Timeout {
            url: url.to_owned(),
        };
    }

    if let Some(status) = error.status() {
        return TransportError::Http {
            url: url.to_owned(),
            status: status.as_u16(),
            message: error.to_string(),
        };
    }

    TransportError::Network {
        url: url.to_owned(),
        message: error.to_string(),
    }
}

impl CatalogSource for HttpCatalogSource {
    fn fetch_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        self.block_on(self.fetch_json_async(url, params))
    }

    fn fetch_html(&self, url: &str) -> Result<String, TransportError> {
        self.block_on(self.fetch_html_async(url))
    }
}
