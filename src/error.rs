use thiserror::Error;

/// Failures while handling one request at the chain boundary.
///
/// Handlers and middleware report errors as boxed trait objects; the router
/// converts them into a server-error response instead of propagating them
/// to the event loop.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while decoding transport-supplied text: header values,
/// query strings, cookie pairs. Surfaced at the point of lazy computation
/// and never retried.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("invalid header encoding for `{name}`: {reason}")]
    InvalidHeader { name: String, reason: String },

    #[error("invalid query string: {reason}")]
    InvalidQuery { reason: String },
}

impl DecodeError {
    pub fn invalid_header<N: ToString, S: ToString>(name: N, reason: S) -> Self {
        Self::InvalidHeader { name: name.to_string(), reason: reason.to_string() }
    }

    pub fn invalid_query<S: ToString>(reason: S) -> Self {
        Self::InvalidQuery { reason: reason.to_string() }
    }
}

/// Terminal states of a body read that are distinct from a successful
/// empty body.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum BodyError {
    /// The client signalled disconnect before the final chunk arrived.
    #[error("client disconnected during body delivery")]
    Disconnected,

    /// The transport dropped the receive channel, cancelling the request.
    #[error("body delivery cancelled by transport")]
    Cancelled,
}

/// Route registration errors, reported when the route table is built.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("conflicting parameter names at the same position: `{existing}` vs `{given}`")]
    ConflictingParam { existing: String, given: String },
}

impl RouteError {
    pub fn invalid_pattern<P: ToString, S: ToString>(pattern: P, reason: S) -> Self {
        Self::InvalidPattern { pattern: pattern.to_string(), reason: reason.to_string() }
    }

    pub fn conflicting_param<E: ToString, G: ToString>(existing: E, given: G) -> Self {
        Self::ConflictingParam { existing: existing.to_string(), given: given.to_string() }
    }
}

/// Errors while flushing an assembled response to the send channel.
#[derive(Error, Debug)]
pub enum FlushError {
    #[error("response body encoding failed: {source}")]
    Encode {
        #[from]
        source: serde_json::Error,
    },

    #[error("send channel closed before response was flushed")]
    ChannelClosed,
}
