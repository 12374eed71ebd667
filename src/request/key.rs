//! Cache key derivation for requests.
//!
//! A request's key is its URL path followed by its query parameters, merged,
//! filtered and sorted, so the same logical request always maps to the same
//! entry whatever order the parameters arrived in.

use std::collections::BTreeMap;

/// Query parameters, kept sorted by name.
pub type Params = BTreeMap<String, String>;

/// Parameters that never take part in a cache key.
pub const DEFAULT_SKIPPED_PARAMS: &[&str] = &["callback", "token", "ctoken", "t", "_"];

/// Marker for caller-private parameters, dropped from keys.
const PRIVATE_MARKER: &str = "__";

/// Drops private parameters and those named in `skipped`.
pub fn strip_params(params: &Params, skipped: &[String]) -> Params {
    params
        .iter()
        .filter(|(name, _)| !name.contains(PRIVATE_MARKER) && !skipped.iter().any(|s| s == *name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Appends `params` to `url`, after any query it already has and before its fragment.
pub fn append_params(url: &str, params: &Params) -> String {
    let (base, fragment) = split_fragment(url);
    let mut out = base.to_string();
    for (name, value) in params {
        out.push(if out.contains('?') { '&' } else { '?' });
        out.push_str(name);
        out.push('=');
        out.push_str(value);
    }
    out.push_str(fragment);
    out
}

/// Derives the cache key for `url` requested with `params`.
///
/// Parameters already in the URL's query are merged in; on a name clash the
/// explicit `params` value wins.
pub fn cache_key(url: &str, params: &Params, skipped: &[String]) -> String {
    let (base, fragment) = split_fragment(url);
    let (path, query) = base.split_once('?').unwrap_or((base, ""));

    let mut merged = params.clone();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (name, value) = pair.split_once('=').unwrap_or((pair, ""));
        merged
            .entry(name.to_string())
            .or_insert_with(|| value.to_string());
    }

    let mut key = append_params(path, &strip_params(&merged, skipped));
    key.push_str(fragment);
    key
}

fn split_fragment(url: &str) -> (&str, &str) {
    match url.find('#') {
        Some(at) => url.split_at(at),
        None => (url, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn default_skipped() -> Vec<String> {
        DEFAULT_SKIPPED_PARAMS.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_strip_params_drops_private_and_skipped() {
        let stripped = strip_params(
            &params(&[("b", "2"), ("a", "1"), ("__fallback", "1"), ("x__y", "z"), ("token", "s")]),
            &default_skipped(),
        );
        assert_eq!(stripped, params(&[("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_append_params() {
        assert_eq!(append_params("/api", &params(&[("a", "1")])), "/api?a=1");
        assert_eq!(
            append_params("/api?x=0#top", &params(&[("a", "1"), ("b", "2")])),
            "/api?x=0&a=1&b=2#top"
        );
        assert_eq!(append_params("/api", &Params::new()), "/api");
    }

    #[test]
    fn test_cache_key_sorts_params() {
        let key = cache_key("/api/list", &params(&[("z", "1"), ("a", "2")]), &default_skipped());
        assert_eq!(key, "/api/list?a=2&z=1");
    }

    #[test]
    fn test_cache_key_merges_url_query() {
        let key = cache_key(
            "/api/list?page=2&size=10&_=12345",
            &params(&[("size", "20"), ("q", "rust")]),
            &default_skipped(),
        );
        assert_eq!(key, "/api/list?page=2&q=rust&size=20");
    }

    #[test]
    fn test_cache_key_is_order_independent() {
        let skipped = default_skipped();
        let a = cache_key("/r?b=2&a=1", &Params::new(), &skipped);
        let b = cache_key("/r", &params(&[("a", "1"), ("b", "2")]), &skipped);
        assert_eq!(a, b);
    }

    #[test]
    fn test_cache_key_keeps_fragment() {
        let key = cache_key("/page?b=1#section", &params(&[("a", "0")]), &default_skipped());
        assert_eq!(key, "/page?a=0&b=1#section");
    }

    #[test]
    fn test_cache_key_flag_without_value() {
        let key = cache_key("/r?debug", &Params::new(), &default_skipped());
        assert_eq!(key, "/r?debug=");
    }
}
