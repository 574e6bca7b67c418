//! A WebSocket transport adapter, binding a TCP listener and handing each accepted connection to
//! an [`super::Acceptor`].
//!
//! Grounded in the teacher's `WebSocketAcceptor`/`accept_hdr_async` pattern, simplified since this
//! crate has exactly one built-in wire format (self-describing JSON) and so has no protocol list
//! to negotiate — only the upgrade path is checked.

use std::sync::Arc;

use tokio::net::{
    TcpListener,
    TcpStream,
};
use tokio_tungstenite::tungstenite::{
    handshake::server::{
        Callback,
        ErrorResponse,
        Request,
        Response,
    },
    http::StatusCode,
};

use super::Acceptor;
use crate::core::stream::{
    MessageStream,
    WebSocketMessageStream,
};

struct PathCheck {
    expected: String,
}

impl Callback for PathCheck {
    fn on_request(self, request: &Request, response: Response) -> Result<Response, ErrorResponse> {
        if request.uri().path().trim_start_matches('/') == self.expected {
            Ok(response)
        } else {
            let mut rejection = ErrorResponse::new(Some("unexpected upgrade path".to_owned()));
            *rejection.status_mut() = StatusCode::NOT_FOUND;
            Err(rejection)
        }
    }
}

/// Binds `address:port` and serves WebSocket upgrades at `websocket_path` until the acceptor
/// reports it has closed.
///
/// Every accepted connection is handed off to its own task so a slow or stalled handshake never
/// delays other peers' connections — there is no cross-peer shared state besides the peer table.
pub async fn serve<A>(
    acceptor: Arc<A>,
    address: &str,
    port: u16,
    websocket_path: &str,
    closed: impl std::future::Future<Output = ()>,
) -> std::io::Result<()>
where
    A: Acceptor + 'static,
{
    let listener = TcpListener::bind((address, port)).await?;
    let path = websocket_path.trim_start_matches('/').to_owned();
    tokio::pin!(closed);
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, _) = accepted?;
                let acceptor = acceptor.clone();
                let path = path.clone();
                tokio::spawn(async move {
                    if let Err(err) = accept_connection(acceptor, stream, path).await {
                        log::warn!("websocket handshake failed: {err}");
                    }
                });
            }
            _ = &mut closed => return Ok(()),
        }
    }
}

async fn accept_connection<A>(
    acceptor: Arc<A>,
    stream: TcpStream,
    path: String,
) -> anyhow::Result<()>
where
    A: Acceptor,
{
    let origin = stream.peer_addr().ok().map(|addr| addr.to_string());
    let upgraded = tokio_tungstenite::accept_hdr_async(stream, PathCheck { expected: path }).await?;
    let message_stream: Box<dyn MessageStream> = Box::new(WebSocketMessageStream::new(upgraded));
    acceptor.accept(message_stream, origin).await?;
    Ok(())
}
