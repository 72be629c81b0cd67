//! Package-URL canonicalization.

use url::Url;

/// Canonicalize a package URL.
///
/// Scheme-qualified URLs must parse and are replaced by their canonical
/// serialization. Bare names (no scheme) are how runners and well-known
/// packages are addressed; they canonicalize to themselves, trimmed.
/// Returns `None` for empty or unparseable input; the caller logs and drops
/// the request.
#[must_use]
pub fn canonicalize_url(url: &str) -> Option<String> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        return Url::parse(trimmed).ok().map(|parsed| parsed.to_string());
    }
    Some(trimmed.to_string())
}
