//! Forward-target construction.
//!
//! The first path segment names the gateway mount point and is dropped;
//! everything after it is grafted onto the upstream base URL. A path
//! with fewer than two segments degenerates to the upstream root.

use axum::http::Uri;

/// Build the fully-qualified forward target for an inbound request URI.
///
/// `/iip/foo/bar` against base `http://localhost` becomes
/// `http://localhost/foo/bar`; `/foo` becomes `http://localhost/`.
/// Interior empty segments and a trailing slash survive the rewrite,
/// and the query string is carried over untouched.
#[must_use]
pub fn forward_target(base: &str, uri: &Uri) -> String {
    let mut target = format!(
        "{}/{}",
        base.trim_end_matches('/'),
        strip_first_segment(uri.path())
    );
    if let Some(query) = uri.query() {
        target.push('?');
        target.push_str(query);
    }
    target
}

/// Drop the leading empty segment and the first real segment of a
/// request path, rejoining the rest with `/`.
fn strip_first_segment(path: &str) -> String {
    path.split('/').skip(2).collect::<Vec<_>>().join("/")
}
