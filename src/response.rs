//! Accumulates the response for one request.
//!
//! Handlers and middleware mutate a [`ResponseWriter`] freely; nothing is
//! validated or encoded until the dispatch loop flushes it to the send
//! channel in one pass.

use http::StatusCode;

use crate::body::Content;
use crate::error::FlushError;
use crate::gateway::SendEvent;

pub struct ResponseWriter {
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Content,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self { status: StatusCode::OK, headers: Vec::new(), body: Content::Empty }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Appends a header; duplicates are kept in insertion order.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.push((name.into(), value.into()));
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn body(&self) -> &Content {
        &self.body
    }

    /// Assigns the body content. No schema is enforced here; encoding and
    /// its failures belong to the flush step.
    pub fn set_body(&mut self, content: impl Into<Content>) {
        self.body = content.into();
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    /// Encodes the response into the transport's event sequence: one start
    /// event, then the terminal body chunk. Content-type (when the body
    /// implies one) and content-length are filled in if the handler set
    /// neither.
    pub fn into_events(self) -> Result<Vec<SendEvent>, FlushError> {
        let add_content_type = !self.has_header("content-type");
        let add_content_length = !self.has_header("content-length");

        let Self { status, mut headers, body } = self;
        let (data, default_type) = body.encode()?;

        if add_content_type {
            if let Some(mime) = default_type {
                headers.push(("content-type".to_string(), mime.to_string()));
            }
        }
        if add_content_length {
            headers.push(("content-length".to_string(), data.len().to_string()));
        }

        Ok(vec![SendEvent::Start { status, headers }, SendEvent::Body { data, more: false }])
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResponseWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseWriter")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body)
            .finish()
    }
}
