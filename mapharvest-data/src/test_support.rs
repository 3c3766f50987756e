//! Deterministic test doubles for the harvest pipeline.
//!
//! [`StubCatalogSource`] serves canned documents and records every request;
//! [`RecordingDatabase`] records the statements a writer issues without
//! touching SQLite.

use std::cell::RefCell;
use std::collections::HashMap;

use mapharvest_core::SqlStatement;
use rusqlite::Error as SqliteError;
use serde_json::Value;

use crate::ingest::{DatabaseError, SpatialDatabase};
use crate::source::{CatalogSource, TransportError};

/// Kind of document a request asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// `fetch_json`.
    Json,
    /// `fetch_html`.
    Html,
}

/// One request seen by [`StubCatalogSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    /// Requested URL.
    pub url: String,
    /// Query parameters, excluding `f=pjson`.
    pub params: Vec<(String, String)>,
    /// Document kind.
    pub kind: RequestKind,
}

impl RecordedRequest {
    /// Value of query parameter `name`, if sent.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone)]
enum Reply {
    Json(Value),
    Status(u16),
}

#[derive(Debug, Clone)]
struct Route {
    url: String,
    params: Option<Vec<(String, String)>>,
    reply: Reply,
}

/// Stub [`CatalogSource`] for testing.
///
/// JSON routes registered with [`StubCatalogSource::respond_to`] match only
/// the exact parameter list and take precedence over routes registered with
/// [`StubCatalogSource::respond`], which match any parameters. Unknown URLs
/// answer with HTTP 404.
///
/// # Example
///
/// ```
/// use mapharvest_data::CatalogSource;
/// use mapharvest_data::test_support::StubCatalogSource;
/// use serde_json::json;
///
/// let source = StubCatalogSource::new()
///     .respond("http://h/query", json!({ "count": 3 }));
/// let body = source.fetch_json("http://h/query", &[("where", "1=1")]).unwrap();
/// assert_eq!(body["count"], 3);
/// assert_eq!(source.requests()[0].param("where"), Some("1=1"));
/// ```
#[derive(Debug, Default)]
pub struct StubCatalogSource {
    routes: Vec<Route>,
    pages: HashMap<String, String>,
    requests: RefCell<Vec<RecordedRequest>>,
}

impl StubCatalogSource {
    /// Source with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url` regardless of parameters.
    #[must_use]
    pub fn respond(mut self, url: &str, body: Value) -> Self {
        self.routes.push(Route {
            url: url.to_owned(),
            params: None,
            reply: Reply::Json(body),
        });
        self
    }

    /// Serve `body` for `url` when exactly `params` are sent.
    #[must_use]
    pub fn respond_to(mut self, url: &str, params: &[(&str, &str)], body: Value) -> Self {
        self.routes.push(Route {
            url: url.to_owned(),
            params: Some(owned_params(params)),
            reply: Reply::Json(body),
        });
        self
    }

    /// Answer JSON requests for `url` with HTTP `status`.
    #[must_use]
    pub fn fail_with_status(mut self, url: &str, status: u16) -> Self {
        self.routes.push(Route {
            url: url.to_owned(),
            params: None,
            reply: Reply::Status(status),
        });
        self
    }

    /// Serve `html` for HTML requests to `url`.
    #[must_use]
    pub fn respond_html(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_owned(), html.to_owned());
        self
    }

    /// Every request received, in order.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.borrow().clone()
    }

    /// URLs of every request received, in order.
    #[must_use]
    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.url.clone())
            .collect()
    }

    fn record(&self, url: &str, params: &[(&str, &str)], kind: RequestKind) {
        self.requests.borrow_mut().push(RecordedRequest {
            url: url.to_owned(),
            params: owned_params(params),
            kind,
        });
    }

    fn route(&self, url: &str, params: &[(String, String)]) -> Option<&Route> {
        let exact = self
            .routes
            .iter()
            .find(|route| route.url == url && route.params.as_deref() == Some(params));
        exact.or_else(|| {
            self.routes
                .iter()
                .find(|route| route.url == url && route.params.is_none())
        })
    }
}

fn owned_params(params: &[(&str, &str)]) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
        .collect()
}

fn not_found(url: &str) -> TransportError {
    TransportError::Http {
        url: url.to_owned(),
        status: 404,
        message: "no stub route".to_owned(),
    }
}

impl CatalogSource for StubCatalogSource {
    fn fetch_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, TransportError> {
        self.record(url, params, RequestKind::Json);
        match self.route(url, &owned_params(params)).map(|route| &route.reply) {
            Some(Reply::Json(body)) => Ok(body.clone()),
            Some(Reply::Status(status)) => Err(TransportError::Http {
                url: url.to_owned(),
                status: *status,
                message: "stubbed failure".to_owned(),
            }),
            None => Err(not_found(url)),
        }
    }

    fn fetch_html(&self, url: &str) -> Result<String, TransportError> {
        self.record(url, &[], RequestKind::Html);
        self.pages.get(url).cloned().ok_or_else(|| not_found(url))
    }
}

/// A call observed by [`RecordingDatabase`].
#[derive(Debug, Clone, PartialEq)]
pub enum DatabaseEvent {
    /// `begin`.
    Begin,
    /// `execute`.
    Execute(SqlStatement),
    /// `query_integer`.
    Query(SqlStatement),
    /// `commit`.
    Commit,
    /// `rollback`.
    Rollback,
}

/// [`SpatialDatabase`] that records calls instead of running them.
///
/// `query_integer` answers `Some(1)`, mirroring a successful
/// `AddGeometryColumn`.
#[derive(Debug, Default)]
pub struct RecordingDatabase {
    events: Vec<DatabaseEvent>,
    fail_on: Option<String>,
    fail_commit: bool,
}

impl RecordingDatabase {
    /// Database accepting every statement.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Database rejecting statements whose SQL contains `fragment`.
    #[must_use]
    pub fn failing_on(fragment: impl Into<String>) -> Self {
        Self {
            fail_on: Some(fragment.into()),
            ..Self::default()
        }
    }

    /// Database whose `commit` fails.
    #[must_use]
    pub fn failing_commit() -> Self {
        Self {
            fail_commit: true,
            ..Self::default()
        }
    }

    /// Calls observed so far.
    #[must_use]
    pub fn events(&self) -> &[DatabaseEvent] {
        &self.events
    }

    /// Statements passed to `execute` or `query_integer`, in order.
    #[must_use]
    pub fn statements(&self) -> Vec<SqlStatement> {
        self.events
            .iter()
            .filter_map(|event| match event {
                DatabaseEvent::Execute(statement) | DatabaseEvent::Query(statement) => {
                    Some(statement.clone())
                }
                _ => None,
            })
            .collect()
    }

    fn check(&self, statement: &SqlStatement) -> Result<(), DatabaseError> {
        match &self.fail_on {
            Some(fragment) if statement.sql.contains(fragment.as_str()) => Err(DatabaseError {
                sql: statement.sql.clone(),
                source: SqliteError::InvalidQuery,
            }),
            _ => Ok(()),
        }
    }
}

impl SpatialDatabase for RecordingDatabase {
    fn begin(&mut self) -> Result<(), DatabaseError> {
        self.events.push(DatabaseEvent::Begin);
        Ok(())
    }

    fn execute(&mut self, statement: &SqlStatement) -> Result<(), DatabaseError> {
        self.events.push(DatabaseEvent::Execute(statement.clone()));
        self.check(statement)
    }

    fn query_integer(&mut self, statement: &SqlStatement) -> Result<Option<i64>, DatabaseError> {
        self.events.push(DatabaseEvent::Query(statement.clone()));
        self.check(statement).map(|()| Some(1))
    }

    fn commit(&mut self) -> Result<(), DatabaseError> {
        self.events.push(DatabaseEvent::Commit);
        if self.fail_commit {
            return Err(DatabaseError {
                sql: "COMMIT".to_owned(),
                source: SqliteError::InvalidQuery,
            });
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.events.push(DatabaseEvent::Rollback);
        Ok(())
    }
}
