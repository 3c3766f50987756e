//! Endpoint construction helpers.

const REST_MARKER: &str = "arcgis/rest";

/// Join URL segments with `/`, trimming trailing slashes from each segment.
///
/// # Examples
///
/// ```
/// use mapharvest_core::join_url;
///
/// assert_eq!(
///     join_url(["http://example.test/rest/services/", "Ambiente", "MapServer"]),
///     "http://example.test/rest/services/Ambiente/MapServer"
/// );
/// ```
#[must_use]
pub fn join_url<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .map(|segment| segment.as_ref().trim_end_matches('/').to_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Path of `url` relative to `root`, or `url` itself when it lies elsewhere.
#[must_use]
pub fn relative_to<'a>(url: &'a str, root: &str) -> &'a str {
    url.strip_prefix(root.trim_end_matches('/')).unwrap_or(url)
}

/// Whether `url` looks like an ArcGIS REST services endpoint.
#[must_use]
pub fn is_arcgis_rest_url(url: &str) -> bool {
    url.to_ascii_lowercase().contains(REST_MARKER)
}
