//! Transport Adapter
//!
//! A bidirectional, ordered channel of [`PeerMessage`]s. Two implementations:
//! an in-memory pair over tokio `mpsc` and a WebSocket stream. Both carry
//! JSON text, so the in-memory pair exercises the same encoding as the wire.

use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::debug;

use crate::error::ProtocolError;
use crate::network::protocol::PeerMessage;

/// Transport failures.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Socket I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// WebSocket protocol error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Peer sent something that is not a valid message.
    #[error("undecodable message: {0}")]
    Codec(#[from] serde_json::Error),

    /// No peer connected within the connect window.
    #[error("no peer connected within {0} seconds")]
    ConnectWindowElapsed(u64),

    /// The other side has gone away.
    #[error("connection closed")]
    Closed,
}

impl From<TransportError> for ProtocolError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Closed => ProtocolError::Disconnected,
            other => ProtocolError::Transport(other.to_string()),
        }
    }
}

/// Ordered message channel to the other party.
///
/// Delivery is FIFO per direction and nothing is dropped, so the channel's
/// own receive queue holds any message that arrives before the handshake or
/// session is ready for it. `recv` must be cancel-safe: the session loop
/// polls it inside `tokio::select!`.
#[allow(async_fn_in_trait)]
pub trait Transport {
    /// Send one message.
    async fn send(&mut self, message: &PeerMessage) -> Result<(), TransportError>;

    /// Next message, or `None` once the peer has closed the channel.
    async fn recv(&mut self) -> Result<Option<PeerMessage>, TransportError>;

    /// Close the channel. Errors while closing are ignored.
    async fn close(&mut self);

    /// Next message; a closed channel is [`ProtocolError::Disconnected`].
    async fn next_message(&mut self) -> Result<PeerMessage, ProtocolError> {
        match self.recv().await? {
            Some(message) => Ok(message),
            None => Err(ProtocolError::Disconnected),
        }
    }
}

// =============================================================================
// IN-MEMORY
// =============================================================================

/// One end of an in-memory transport pair.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: Option<mpsc::UnboundedSender<String>>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Two connected ends.
    pub fn pair() -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::unbounded_channel();
        let (b_tx, a_rx) = mpsc::unbounded_channel();
        (
            Self { tx: Some(a_tx), rx: a_rx },
            Self { tx: Some(b_tx), rx: b_rx },
        )
    }

    /// Push raw text to the other end, bypassing encoding.
    pub fn send_raw(&mut self, text: impl Into<String>) -> Result<(), TransportError> {
        let tx = self.tx.as_ref().ok_or(TransportError::Closed)?;
        tx.send(text.into()).map_err(|_| TransportError::Closed)
    }
}

impl Transport for ChannelTransport {
    async fn send(&mut self, message: &PeerMessage) -> Result<(), TransportError> {
        let text = message.to_json()?;
        self.send_raw(text)
    }

    async fn recv(&mut self) -> Result<Option<PeerMessage>, TransportError> {
        match self.rx.recv().await {
            Some(text) => Ok(Some(PeerMessage::from_json(&text)?)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) {
        self.tx = None;
        self.rx.close();
    }
}

// =============================================================================
// WEBSOCKET
// =============================================================================

/// WebSocket transport, one JSON text frame per message.
pub struct WsTransport<S> {
    stream: WebSocketStream<S>,
}

impl<S> WsTransport<S> {
    /// Wrap an established WebSocket.
    pub fn new(stream: WebSocketStream<S>) -> Self {
        Self { stream }
    }
}

impl<S> Transport for WsTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    async fn send(&mut self, message: &PeerMessage) -> Result<(), TransportError> {
        let text = message.to_json()?;
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<PeerMessage>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(PeerMessage::from_json(&text)?)),
                Some(Ok(Message::Binary(data))) => {
                    return Ok(Some(serde_json::from_slice(&data)?));
                }
                Some(Ok(Message::Close(_))) | None => {
                    debug!("Peer closed the WebSocket");
                    return Ok(None);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(e.into()),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.stream.close(None).await;
    }
}
