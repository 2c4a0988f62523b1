//! The contract with the server-gateway collaborator.
//!
//! The transport hands this core a [`Scope`](crate::Scope) per request plus
//! two channels: a receive channel delivering body chunks, and a send
//! channel accepting a start-response event followed by body chunks. The
//! core never touches the socket itself.

use bytes::Bytes;
use http::StatusCode;
use tokio::sync::mpsc;

use crate::error::FlushError;
use crate::response::ResponseWriter;

/// Body-delivery event produced by the transport's receive channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiveEvent {
    /// A body chunk; `more` signals whether further chunks follow.
    Chunk { data: Bytes, more: bool },
    /// The client went away before the body completed.
    Disconnect,
}

/// Response event accepted by the transport's send channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendEvent {
    Start { status: StatusCode, headers: Vec<(String, String)> },
    Body { data: Bytes, more: bool },
}

pub type BodyReceiver = mpsc::Receiver<ReceiveEvent>;
pub type ResponseSender = mpsc::Sender<SendEvent>;

/// Creates the receive channel pair for one request's body delivery.
pub fn body_channel(capacity: usize) -> (mpsc::Sender<ReceiveEvent>, BodyReceiver) {
    mpsc::channel(capacity)
}

/// Creates the send channel pair for one request's response events.
pub fn response_channel(capacity: usize) -> (ResponseSender, mpsc::Receiver<SendEvent>) {
    mpsc::channel(capacity)
}

/// Encodes the accumulated response and pushes its events into the send
/// channel. Encoding happens here, once, not at assignment time.
pub async fn flush(writer: ResponseWriter, sender: &ResponseSender) -> Result<(), FlushError> {
    for event in writer.into_events()? {
        sender.send(event).await.map_err(|_| FlushError::ChannelClosed)?;
    }
    Ok(())
}
