//! Connection-event metadata and the preprocessing step that derives
//! routing metadata from it.
//!
//! [`preprocess`] is a pure function over a [`Scope`]: it folds header
//! names to lower-case, decodes values, accumulates repeatable headers in
//! arrival order, and extracts the request subdomain. It runs exactly once
//! per request, before the request model is constructed.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str;

use bytes::Bytes;
use http::Method;

use crate::error::DecodeError;

/// Host and port of one side of the connection, as reported by the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostPort {
    pub host: String,
    pub port: u16,
}

/// Per-request connection metadata handed over by the server gateway.
///
/// The transport owns the values; this core only reads them. Header pairs
/// are kept as raw bytes until [`preprocess`] decodes them.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub method: Method,
    pub path: String,
    pub query_string: Bytes,
    pub headers: Vec<(Bytes, Bytes)>,
    pub server: Option<HostPort>,
    pub client: Option<HostPort>,
}

impl Scope {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), ..Self::default() }
    }

    /// An empty scope, used when a request's backing scope is cleared.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_query(mut self, query_string: impl Into<Bytes>) -> Self {
        self.query_string = query_string.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<Bytes>, value: impl Into<Bytes>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_server(mut self, host: impl Into<String>, port: u16) -> Self {
        self.server = Some(HostPort { host: host.into(), port });
        self
    }
}

/// A normalized header value.
///
/// Names on the repeatable allow-list accumulate into `Many` in arrival
/// order, a single occurrence included; all other names are last-wins
/// `Single`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderEntry {
    Single(String),
    Many(Vec<String>),
}

impl HeaderEntry {
    pub fn as_single(&self) -> Option<&str> {
        match self {
            HeaderEntry::Single(value) => Some(value),
            HeaderEntry::Many(_) => None,
        }
    }

    /// All values of this entry, in arrival order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            HeaderEntry::Single(value) => vec![value.as_str()],
            HeaderEntry::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

/// Lower-cased header name to normalized entry.
pub type HeaderMap = HashMap<String, HeaderEntry>;

/// Header names whose values may legitimately repeat within one request.
const REPEATABLE: &[&str] = &["set-cookie", "cookie"];

/// The (subdomain, normalized headers) pair derived once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    pub subdomain: String,
    pub headers: HeaderMap,
}

/// Derives routing metadata from a raw scope.
///
/// Pure and deterministic; malformed header encoding is surfaced as a
/// [`DecodeError`], never swallowed.
pub fn preprocess(scope: &Scope) -> Result<Metadata, DecodeError> {
    let mut headers: HeaderMap = HashMap::new();

    for (raw_name, raw_value) in &scope.headers {
        let name = str::from_utf8(raw_name)
            .map_err(|e| DecodeError::invalid_header("<header name>", e))?
            .to_ascii_lowercase();
        let value = str::from_utf8(raw_value)
            .map_err(|e| DecodeError::invalid_header(&name, e))?
            .to_string();

        let repeatable = REPEATABLE.contains(&name.as_str());
        match headers.entry(name) {
            Entry::Vacant(slot) => {
                slot.insert(if repeatable {
                    HeaderEntry::Many(vec![value])
                } else {
                    HeaderEntry::Single(value)
                });
            }
            Entry::Occupied(mut slot) => {
                if let HeaderEntry::Many(values) = slot.get_mut() {
                    values.push(value);
                } else {
                    // last-wins for non-repeatable names
                    slot.insert(HeaderEntry::Single(value));
                }
            }
        }
    }

    let subdomain = subdomain_of(scope, &headers);
    Ok(Metadata { subdomain, headers })
}

/// The leading host component: `host` header first, server name as the
/// fallback. A bare single-segment host is its own subdomain.
fn subdomain_of(scope: &Scope, headers: &HeaderMap) -> String {
    let host = match headers.get("host") {
        Some(entry) => entry.values().first().map(|v| (*v).to_string()).unwrap_or_default(),
        None => scope.server.as_ref().map(|s| s.host.clone()).unwrap_or_default(),
    };
    let host = host.split(':').next().unwrap_or("");
    host.split('.').next().unwrap_or("").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scope() -> Scope {
        Scope::new(Method::GET, "/customers/23/orders")
            .with_header("Host", "api.example.com:8000")
            .with_header("Set-Cookie", "first=1")
            .with_header("Set-Cookie", "second=2")
            .with_header("Accept", "text/html")
            .with_header("Accept", "*/*")
    }

    #[test]
    fn preprocess_is_pure() {
        let scope = scope();
        let first = preprocess(&scope).unwrap();
        let second = preprocess(&scope).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn names_are_folded_to_lowercase() {
        let metadata = preprocess(&scope()).unwrap();
        assert!(metadata.headers.contains_key("host"));
        assert!(!metadata.headers.contains_key("Host"));
    }

    #[test]
    fn repeatable_headers_accumulate_in_order() {
        let metadata = preprocess(&scope()).unwrap();
        let entry = metadata.headers.get("set-cookie").unwrap();
        assert_eq!(entry, &HeaderEntry::Many(vec!["first=1".to_string(), "second=2".to_string()]));
    }

    #[test]
    fn single_occurrence_of_repeatable_header_is_still_a_sequence() {
        let scope = Scope::new(Method::GET, "/").with_header("set-cookie", "only=1");
        let metadata = preprocess(&scope).unwrap();
        assert_eq!(metadata.headers.get("set-cookie").unwrap().values(), vec!["only=1"]);
    }

    #[test]
    fn non_repeatable_headers_are_last_wins() {
        let metadata = preprocess(&scope()).unwrap();
        assert_eq!(metadata.headers.get("accept").unwrap().as_single(), Some("*/*"));
    }

    #[test]
    fn subdomain_comes_from_host_header() {
        let metadata = preprocess(&scope()).unwrap();
        assert_eq!(metadata.subdomain, "api");
    }

    #[test]
    fn bare_host_is_its_own_subdomain() {
        let scope = Scope::new(Method::GET, "/").with_header("host", "host");
        let metadata = preprocess(&scope).unwrap();
        assert_eq!(metadata.subdomain, "host");
    }

    #[test]
    fn subdomain_falls_back_to_server_name() {
        let scope = Scope::new(Method::GET, "/").with_server("internal.example.com", 80);
        let metadata = preprocess(&scope).unwrap();
        assert_eq!(metadata.subdomain, "internal");
    }

    #[test]
    fn port_is_stripped_before_subdomain_extraction() {
        let scope = Scope::new(Method::GET, "/").with_header("host", "localhost:8000");
        let metadata = preprocess(&scope).unwrap();
        assert_eq!(metadata.subdomain, "localhost");
    }

    #[test]
    fn malformed_header_value_is_a_decode_error() {
        let scope = Scope::new(Method::GET, "/").with_header("host", Bytes::from(vec![0xff, 0xfe]));
        assert!(matches!(preprocess(&scope), Err(DecodeError::InvalidHeader { .. })));
    }
}
