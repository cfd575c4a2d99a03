//! URL resolution for page-supplied request targets.

use url::Url;

/// Error type for URL resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty URL")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a URL as a page would, relative to the site origin.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Resolve relative references (`/about`, `styles.css`) against `origin`
/// 3. Require http or https
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(input: &str, origin: &Url) -> Result<Url, UrlError> {
    let trimmed = input.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = origin.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Url {
        Url::parse("https://clinic.example").unwrap()
    }

    #[test]
    fn test_resolve_absolute() {
        let url = resolve("https://cdn.example/app.js", &origin()).unwrap();
        assert_eq!(url.as_str(), "https://cdn.example/app.js");
    }

    #[test]
    fn test_resolve_root_relative() {
        let url = resolve("/services/dental", &origin()).unwrap();
        assert_eq!(url.as_str(), "https://clinic.example/services/dental");
    }

    #[test]
    fn test_resolve_lowercase_host() {
        let url = resolve("https://CLINIC.EXAMPLE/About", &origin()).unwrap();
        assert_eq!(url.host_str(), Some("clinic.example"));
        assert_eq!(url.path(), "/About");
    }

    #[test]
    fn test_resolve_remove_fragment() {
        let url = resolve("/blog#latest", &origin()).unwrap();
        assert_eq!(url.fragment(), None);
        assert_eq!(url.path(), "/blog");
    }

    #[test]
    fn test_resolve_preserve_query() {
        let url = resolve("/api/slots?b=2&a=1", &origin()).unwrap();
        assert_eq!(url.query(), Some("b=2&a=1"));
    }

    #[test]
    fn test_resolve_trim_whitespace() {
        let url = resolve("  /contact  ", &origin()).unwrap();
        assert_eq!(url.as_str(), "https://clinic.example/contact");
    }

    #[test]
    fn test_resolve_unsupported_scheme() {
        let result = resolve("file:///etc/passwd", &origin());
        assert!(matches!(result, Err(UrlError::UnsupportedScheme(_))));
    }

    #[test]
    fn test_resolve_empty() {
        assert!(matches!(resolve("", &origin()), Err(UrlError::Empty)));
        assert!(matches!(resolve("   ", &origin()), Err(UrlError::Empty)));
    }
}
