use std::{
    fmt::Debug,
    pin::Pin,
    task,
};

use futures_util::{
    Sink,
    SinkExt,
    Stream,
    StreamExt,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use crate::core::{
    error::RouterError,
    message::Message,
};

/// A duplex stream of [`Message`]s, abstracting over the underlying transport.
///
/// The router loop (see [`crate::router`]) only ever talks to this trait, never to a concrete
/// WebSocket type, so the same dispatch code runs over a real socket or an in-process pair of
/// channels (see [`DirectMessageStream`], used by the test suite and by any future same-process
/// integration).
pub trait MessageStream:
    Stream<Item = Result<Message, RouterError>> + Sink<Message, Error = RouterError> + Send + Unpin
{
    /// The stream's type name, for logging.
    fn stream_type(&self) -> &'static str;
}

/// A message stream layered over a WebSocket connection, encoding frames as JSON text messages.
///
/// This is the only built-in wire [`MessageStream`]; the listener's packet-format selector has
/// exactly one built-in value (JSON), matching this crate's single built-in
/// [`crate::core::message::Message`] shape.
pub struct WebSocketMessageStream<S> {
    inner: tokio_tungstenite::WebSocketStream<S>,
}

impl<S> WebSocketMessageStream<S> {
    pub fn new(inner: tokio_tungstenite::WebSocketStream<S>) -> Self {
        Self { inner }
    }
}

impl<S> Debug for WebSocketMessageStream<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WebSocketMessageStream")
    }
}

impl<S> MessageStream for WebSocketMessageStream<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    fn stream_type(&self) -> &'static str {
        "WebSocketMessageStream"
    }
}

impl<S> Stream for WebSocketMessageStream<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    type Item = Result<Message, RouterError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        loop {
            return match futures_util::ready!(self.inner.poll_next_unpin(cx)) {
                Some(Ok(tungstenite::Message::Text(text))) => task::Poll::Ready(Some(
                    serde_json::from_str(&text)
                        .map_err(|err| RouterError::Decode(err.to_string())),
                )),
                Some(Ok(tungstenite::Message::Binary(data))) => task::Poll::Ready(Some(
                    serde_json::from_slice(&data)
                        .map_err(|err| RouterError::Decode(err.to_string())),
                )),
                // Pings, pongs, and close frames are handled transparently by tungstenite; skip
                // them and poll again rather than surfacing them as decode errors.
                Some(Ok(_)) => continue,
                Some(Err(err)) => {
                    task::Poll::Ready(Some(Err(RouterError::Transport(err.to_string()))))
                }
                None => task::Poll::Ready(None),
            };
        }
    }
}

impl<S> Sink<Message> for WebSocketMessageStream<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    type Error = RouterError;

    fn poll_ready(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready_unpin(cx)
            .map_err(|err| RouterError::Transport(err.to_string()))
    }

    fn start_send(mut self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        let text =
            serde_json::to_string(&item).map_err(|err| RouterError::Decode(err.to_string()))?;
        self.inner
            .start_send_unpin(tungstenite::Message::Text(text.into()))
            .map_err(|err| RouterError::Transport(err.to_string()))
    }

    fn poll_flush(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        self.inner
            .poll_flush_unpin(cx)
            .map_err(|err| RouterError::Transport(err.to_string()))
    }

    fn poll_close(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        self.inner
            .poll_close_unpin(cx)
            .map_err(|err| RouterError::Transport(err.to_string()))
    }
}

/// A message stream backed by a pair of in-process channels.
///
/// Used by the test suite to exercise the full router/listener without binding a socket, and
/// available to embedders that want to drive a peer directly from the same process.
pub struct DirectMessageStream {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: mpsc::UnboundedReceiver<Message>,
}

impl DirectMessageStream {
    pub fn new(
        outbound: mpsc::UnboundedSender<Message>,
        inbound: mpsc::UnboundedReceiver<Message>,
    ) -> Self {
        Self { outbound, inbound }
    }

    /// Creates a connected pair: `(server_side, peer_side)`.
    pub fn pair() -> (Self, Self) {
        let (to_peer_tx, to_peer_rx) = mpsc::unbounded_channel();
        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
        (
            Self::new(to_peer_tx, to_server_rx),
            Self::new(to_server_tx, to_peer_rx),
        )
    }
}

impl Debug for DirectMessageStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("DirectMessageStream")
    }
}

impl MessageStream for DirectMessageStream {
    fn stream_type(&self) -> &'static str {
        "DirectMessageStream"
    }
}

impl Stream for DirectMessageStream {
    type Item = Result<Message, RouterError>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        cx: &mut task::Context<'_>,
    ) -> task::Poll<Option<Self::Item>> {
        self.inbound.poll_recv(cx).map(|item| item.map(Ok))
    }
}

impl Sink<Message> for DirectMessageStream {
    type Error = RouterError;

    fn poll_ready(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        self.outbound.send(item).map_err(|_| RouterError::SinkClosed)
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }

    fn poll_close(
        self: Pin<&mut Self>,
        _cx: &mut task::Context<'_>,
    ) -> task::Poll<Result<(), Self::Error>> {
        task::Poll::Ready(Ok(()))
    }
}
