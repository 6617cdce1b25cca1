//! Canonical URL handling.
//!
//! A listing's identity is its URL with tracking/query parameters stripped;
//! every URL crossing the harvest boundary goes through [`canonical_url`]
//! before dedup checks or persistence.

use url::Url;

/// Strip query string and fragment, yielding the canonical identity form.
///
/// Relative or otherwise unparseable inputs are trimmed textually so the
/// caller still gets a stable key.
pub fn canonical_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => {
            let without_fragment = raw.split('#').next().unwrap_or(raw);
            without_fragment
                .split('?')
                .next()
                .unwrap_or(without_fragment)
                .to_string()
        }
    }
}

/// Resolve an href against a base URL, returning an absolute URL string.
pub fn absolutize(base: &str, href: &str) -> Option<String> {
    if href.starts_with("http://") || href.starts_with("https://") {
        return Some(href.to_string());
    }
    let base = Url::parse(base).ok()?;
    base.join(href).ok().map(|u| u.to_string())
}
