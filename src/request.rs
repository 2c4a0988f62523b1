//! The per-request model: lazily computed, cached views over the raw scope.
//!
//! Headers, cookies, query parameters and the body are parsed on first
//! access and cached per field. Each cache is an explicit state machine —
//! uncomputed, computed (possibly empty), or invalidated — so an explicit
//! `invalidate_*` call forces recomputation on the next read and stale
//! data is never served after one.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::str;

use bytes::Bytes;
use http::Method;

use crate::body::BodySource;
use crate::error::{BodyError, DecodeError};
use crate::scope::{HeaderMap, Metadata, Scope};

/// Cache state for one lazily computed field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Cache<T> {
    #[default]
    Uncomputed,
    Computed(T),
    Invalidated,
}

impl<T> Cache<T> {
    fn invalidate(&mut self) {
        *self = Cache::Invalidated;
    }

    fn get_or_compute(&mut self, compute: impl FnOnce() -> T) -> &T {
        if !matches!(self, Cache::Computed(_)) {
            *self = Cache::Computed(compute());
        }
        match self {
            Cache::Computed(value) => value,
            _ => unreachable!(),
        }
    }

    fn get_or_try_compute<E>(&mut self, compute: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        if !matches!(self, Cache::Computed(_)) {
            *self = Cache::Computed(compute()?);
        }
        match self {
            Cache::Computed(value) => Ok(value),
            _ => unreachable!(),
        }
    }
}

/// A query or path parameter value.
///
/// Repeated query keys collapse into `Multi` in arrival order; handler
/// overlays may also assign booleans.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
    Flag(bool),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Single(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_slice(&self) -> Option<&[String]> {
        match self {
            ParamValue::Multi(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Flag(value) => Some(*value),
            _ => None,
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Single(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Single(value)
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Flag(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(values: Vec<String>) -> Self {
        ParamValue::Multi(values)
    }
}

/// Query parameters merged with route-derived path captures and handler
/// assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    values: HashMap<String, ParamValue>,
}

impl Params {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    /// Merges a value under the key.
    ///
    /// Absent keys are plain inserts. A `Single` assigned onto an existing
    /// string value appends into a `Multi`, preserving multi-value query
    /// semantics; `Flag` and `Multi` assignments replace outright.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        let value = value.into();
        match self.values.entry(key.into()) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(mut slot) => {
                let current = slot.get_mut();
                match value {
                    ParamValue::Single(new) => match current {
                        ParamValue::Single(prev) => {
                            let prev = std::mem::take(prev);
                            *current = ParamValue::Multi(vec![prev, new]);
                        }
                        ParamValue::Multi(values) => values.push(new),
                        ParamValue::Flag(_) => *current = ParamValue::Single(new),
                    },
                    replacement => *current = replacement,
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Percent-decodes a query string into parameters, collapsing repeated
    /// keys into ordered sequences.
    fn from_query(raw: &str) -> Self {
        let mut params = Params::default();
        if raw.is_empty() {
            return params;
        }
        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            params.set(key.into_owned(), ParamValue::Single(value.into_owned()));
        }
        params
    }
}

/// One in-flight request: the raw scope, its body source, and the
/// preprocessed metadata, with cached views on top.
pub struct HttpRequest {
    scope: Scope,
    body: BodySource,
    metadata: Metadata,
    cached_body: Cache<Bytes>,
    cached_headers: Cache<HeaderMap>,
    cached_cookies: Cache<HashMap<String, String>>,
    cached_params: Cache<Params>,
}

impl HttpRequest {
    pub fn new(scope: Scope, body: BodySource, metadata: Metadata) -> Self {
        Self {
            scope,
            body,
            metadata,
            cached_body: Cache::Uncomputed,
            cached_headers: Cache::Uncomputed,
            cached_cookies: Cache::Uncomputed,
            cached_params: Cache::Uncomputed,
        }
    }

    pub fn method(&self) -> &Method {
        &self.scope.method
    }

    /// The normalized path component, query string excluded.
    pub fn path(&self) -> &str {
        self.scope.path.split('?').next().unwrap_or("")
    }

    /// Alias for [`path`](Self::path).
    pub fn url(&self) -> &str {
        self.path()
    }

    pub fn query_string(&self) -> Result<&str, DecodeError> {
        str::from_utf8(&self.scope.query_string).map_err(DecodeError::invalid_query)
    }

    pub fn subdomain(&self) -> &str {
        &self.metadata.subdomain
    }

    /// The full request body, awaited from the receive channel when not
    /// pre-materialized and cached after first assembly.
    pub async fn body(&mut self) -> Result<Bytes, BodyError> {
        if let Cache::Computed(bytes) = &self.cached_body {
            return Ok(bytes.clone());
        }
        let bytes = self.body.read_full().await?;
        self.cached_body = Cache::Computed(bytes.clone());
        Ok(bytes)
    }

    /// Streaming access to a chunked body; bypasses the body cache.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, BodyError> {
        self.body.next_chunk().await
    }

    /// The normalized headers, materialized from the preprocessed metadata
    /// on first access. After invalidation this recomputes, falling back
    /// to an empty map when the metadata is gone.
    pub fn headers(&mut self) -> &HeaderMap {
        let metadata = &self.metadata;
        self.cached_headers.get_or_compute(|| metadata.headers.clone())
    }

    pub fn invalidate_headers(&mut self) {
        self.cached_headers.invalidate();
    }

    /// Cookies parsed on demand from the `cookie` header entries.
    /// Duplicate names are last-wins.
    pub fn cookies(&mut self) -> &HashMap<String, String> {
        let metadata = &self.metadata;
        self.cached_cookies.get_or_compute(|| parse_cookies(&metadata.headers))
    }

    pub fn invalidate_cookies(&mut self) {
        self.cached_cookies.invalidate();
    }

    /// Query parameters parsed on demand, overlaid with route captures and
    /// handler assignments via [`set_param`](Self::set_param).
    pub fn params(&mut self) -> Result<&Params, DecodeError> {
        let scope = &self.scope;
        self.cached_params.get_or_try_compute(|| {
            let raw = str::from_utf8(&scope.query_string).map_err(DecodeError::invalid_query)?;
            Ok(Params::from_query(raw))
        })
    }

    /// Overlays a parameter onto the (materialized-if-needed) query
    /// mapping, following the [`Params::set`] merge rules.
    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Result<(), DecodeError> {
        self.params()?;
        if let Cache::Computed(params) = &mut self.cached_params {
            params.set(key, value);
        }
        Ok(())
    }

    pub fn invalidate_params(&mut self) {
        self.cached_params.invalidate();
    }

    /// Replaces the backing scope with an empty one. Invalidated caches
    /// recompute against the empty scope on next read.
    pub fn clear_scope(&mut self) {
        self.scope = Scope::empty();
    }

    /// Drops the preprocessed metadata. Header and cookie reads after an
    /// invalidation then yield empty mappings rather than erroring.
    pub fn clear_metadata(&mut self) {
        self.metadata = Metadata::default();
    }
}

fn parse_cookies(headers: &HeaderMap) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    if let Some(entry) = headers.get("cookie") {
        for header_value in entry.values() {
            for pair in header_value.split(';') {
                if let Some((name, value)) = pair.split_once('=') {
                    cookies.insert(name.trim().to_string(), value.trim().to_string());
                }
            }
        }
    }
    cookies
}
