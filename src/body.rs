//! Request body sources and response body content.
//!
//! A request body is either pre-materialized by the transport or delivered
//! chunk-by-chunk over the receive channel; [`BodySource`] hides the
//! difference behind one awaitable surface. Response [`Content`] accepts
//! anything a handler assigns and defers encoding to the flush step.

use bytes::{Bytes, BytesMut};
use serde::Serialize;

use crate::error::BodyError;
use crate::gateway::{BodyReceiver, ReceiveEvent};

/// Where a request body comes from.
pub enum BodySource {
    /// No body, or an already fully consumed one.
    Empty,
    /// Pre-materialized payload.
    Eager(Bytes),
    /// Chunked delivery over the transport's receive channel.
    Channel(BodyReceiver),
}

impl BodySource {
    /// Awaits the full body, concatenating chunks in arrival order until
    /// the final chunk.
    ///
    /// A transport disconnect or a dropped receive channel resolves to a
    /// [`BodyError`] rather than hanging, and both are distinguishable
    /// from a successful empty body.
    pub async fn read_full(&mut self) -> Result<Bytes, BodyError> {
        match self {
            BodySource::Empty => Ok(Bytes::new()),
            BodySource::Eager(bytes) => Ok(bytes.clone()),
            BodySource::Channel(receiver) => {
                let mut assembled = BytesMut::new();
                loop {
                    match receiver.recv().await {
                        Some(ReceiveEvent::Chunk { data, more }) => {
                            assembled.extend_from_slice(&data);
                            if !more {
                                return Ok(assembled.freeze());
                            }
                        }
                        Some(ReceiveEvent::Disconnect) => return Err(BodyError::Disconnected),
                        None => return Err(BodyError::Cancelled),
                    }
                }
            }
        }
    }

    /// Yields the next chunk of a streamed body; `Ok(None)` once the body
    /// is exhausted.
    pub async fn next_chunk(&mut self) -> Result<Option<Bytes>, BodyError> {
        let event = match self {
            BodySource::Empty => return Ok(None),
            BodySource::Eager(bytes) => {
                let data = std::mem::take(bytes);
                *self = BodySource::Empty;
                return Ok(if data.is_empty() { None } else { Some(data) });
            }
            BodySource::Channel(receiver) => receiver.recv().await,
        };

        match event {
            Some(ReceiveEvent::Chunk { data, more }) => {
                if !more {
                    *self = BodySource::Empty;
                }
                Ok(Some(data))
            }
            Some(ReceiveEvent::Disconnect) => Err(BodyError::Disconnected),
            None => Err(BodyError::Cancelled),
        }
    }
}

/// Response body content assigned by handler code.
///
/// No validation happens at assignment; [`Content::encode`] runs once at
/// flush and reports JSON serialization failures there.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Content {
    #[default]
    Empty,
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
}

impl Content {
    /// Captures any serializable value as JSON content.
    pub fn json<T: Serialize>(value: T) -> Result<Self, serde_json::Error> {
        Ok(Content::Json(serde_json::to_value(value)?))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Content::Empty)
    }

    /// Encodes the content to bytes plus the content type to default to
    /// when the handler set none.
    pub(crate) fn encode(self) -> Result<(Bytes, Option<mime::Mime>), serde_json::Error> {
        match self {
            Content::Empty => Ok((Bytes::new(), None)),
            Content::Text(text) => Ok((Bytes::from(text), Some(mime::TEXT_PLAIN_UTF_8))),
            Content::Bytes(bytes) => Ok((bytes, Some(mime::APPLICATION_OCTET_STREAM))),
            Content::Json(value) => Ok((Bytes::from(serde_json::to_vec(&value)?), Some(mime::APPLICATION_JSON))),
        }
    }
}

impl From<String> for Content {
    fn from(value: String) -> Self {
        Content::Text(value)
    }
}

impl From<&str> for Content {
    fn from(value: &str) -> Self {
        Content::Text(value.to_string())
    }
}

impl From<Bytes> for Content {
    fn from(value: Bytes) -> Self {
        Content::Bytes(value)
    }
}

impl From<serde_json::Value> for Content {
    fn from(value: serde_json::Value) -> Self {
        Content::Json(value)
    }
}

impl From<()> for Content {
    fn from(_: ()) -> Self {
        Content::Empty
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::body_channel;

    #[tokio::test]
    async fn chunks_are_concatenated_in_arrival_order() {
        let (sender, receiver) = body_channel(4);
        sender.send(ReceiveEvent::Chunk { data: Bytes::from("hello "), more: true }).await.unwrap();
        sender.send(ReceiveEvent::Chunk { data: Bytes::from("world"), more: false }).await.unwrap();

        let mut source = BodySource::Channel(receiver);
        assert_eq!(source.read_full().await.unwrap(), Bytes::from("hello world"));
    }

    #[tokio::test]
    async fn disconnect_is_distinct_from_empty_body() {
        let (sender, receiver) = body_channel(4);
        sender.send(ReceiveEvent::Disconnect).await.unwrap();

        let mut source = BodySource::Channel(receiver);
        assert_eq!(source.read_full().await, Err(BodyError::Disconnected));

        let mut empty = BodySource::Empty;
        assert_eq!(empty.read_full().await.unwrap(), Bytes::new());
    }

    #[tokio::test]
    async fn dropped_channel_resolves_to_cancelled() {
        let (sender, receiver) = body_channel(4);
        drop(sender);

        let mut source = BodySource::Channel(receiver);
        assert_eq!(source.read_full().await, Err(BodyError::Cancelled));
    }

    #[tokio::test]
    async fn streaming_accessor_yields_chunks_then_none() {
        let (sender, receiver) = body_channel(4);
        sender.send(ReceiveEvent::Chunk { data: Bytes::from("a"), more: true }).await.unwrap();
        sender.send(ReceiveEvent::Chunk { data: Bytes::from("b"), more: false }).await.unwrap();

        let mut source = BodySource::Channel(receiver);
        assert_eq!(source.next_chunk().await.unwrap(), Some(Bytes::from("a")));
        assert_eq!(source.next_chunk().await.unwrap(), Some(Bytes::from("b")));
        assert_eq!(source.next_chunk().await.unwrap(), None);
    }

    #[test]
    fn json_content_defers_encoding_to_flush() {
        let content = Content::json(serde_json::json!({"ok": true})).unwrap();
        let (bytes, default_type) = content.encode().unwrap();
        assert_eq!(bytes, Bytes::from(r#"{"ok":true}"#));
        assert_eq!(default_type, Some(mime::APPLICATION_JSON));
    }
}
