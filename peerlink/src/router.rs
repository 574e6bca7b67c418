//! The router loop: the per-peer consumer that reads inbound frames, classifies them, and
//! dispatches them through the interceptor chain.

use std::sync::Arc;

use futures_util::{
    Stream,
    StreamExt,
};

use crate::{
    core::{
        error::RouterError,
        message::Message,
    },
    interceptor::{
        self,
        Context,
        Interceptor,
        ResponseWriter,
    },
    listener::OnDisconnect,
    peer::{
        PeerId,
        PeerTable,
    },
    registry::Api,
};

/// Starts the router loop for one peer and returns immediately; the loop itself runs on a spawned
/// task until end-of-stream, a transport error, or an external disconnect.
///
/// `stream` is the read half of the peer's transport (see
/// [`crate::listener::Listener::accept`], which splits the full-duplex [`crate::core::stream::MessageStream`]
/// so that the write half can be driven independently by the peer record's outbound sink task).
///
/// Inbound frames are read strictly one at a time and in order, but each frame's interceptor
/// chain runs on its own spawned task rather than being awaited in line: the loop never blocks on
/// a handler's own await (an RPC's future, a stalled sink write) before reading the next frame.
/// This means responses for one peer's RPCs can land on the sink in a different order than the
/// requests were received, since a later request's chain may finish before an earlier one's.
pub fn start<St>(
    mut stream: St,
    api: Arc<Api>,
    peers: Arc<PeerTable>,
    peer_id: PeerId,
    middleware: Arc<Vec<Arc<dyn Interceptor>>>,
    response_writer: Arc<dyn ResponseWriter>,
    on_disconnect: Option<OnDisconnect>,
) -> tokio::task::JoinHandle<()>
where
    St: Stream<Item = Result<Message, RouterError>> + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut implicit_termination = false;
        loop {
            let frame = match stream.next().await {
                Some(Ok(frame)) => frame,
                Some(Err(err)) => {
                    log::warn!("peer {peer_id} transport error, disconnecting: {err}");
                    implicit_termination = true;
                    break;
                }
                None => {
                    log::debug!("peer {peer_id} stream closed");
                    implicit_termination = true;
                    break;
                }
            };
            let peer = match peers.get(&peer_id) {
                // The peer record can disappear mid-read if this loop was already marked for
                // disconnect by the listener; stop quietly rather than dispatching into nothing.
                Some(peer) => peer,
                None => break,
            };
            let mut ctx = Context::new(
                api.clone(),
                peers.clone(),
                peer_id.clone(),
                peer.sink.clone(),
                frame,
            );
            let middleware = middleware.clone();
            let response_writer = response_writer.clone();
            tokio::spawn(async move {
                interceptor::run(&mut ctx, &middleware, response_writer.as_ref()).await;
            });
        }
        // On nil frame or a frame carrying a transport error, run on-disconnect (if supplied)
        // then tear the peer down. An explicit disconnect (the loop broke because the peer
        // record was already gone) already ran on_disconnect from `Listener::disconnect`, so
        // only run it here for the implicit case.
        if implicit_termination {
            if let (Some(on_disconnect), Some(peer)) = (&on_disconnect, peers.get(&peer_id)) {
                on_disconnect(peer);
            }
        }
        disconnect(&peers, &peer_id).await;
    })
}

/// Tears down one peer: removes the peer record and, for every subscription it held, invokes its
/// stop hook and aborts its forwarding task.
///
/// Idempotent: disconnecting a peer id that is no longer present (because this is the router
/// loop's own exit racing a concurrent explicit disconnect) is a no-op.
pub async fn disconnect(peers: &PeerTable, peer_id: &PeerId) {
    if let Some(peer) = peers.remove(peer_id) {
        if let Some(router) = peer.router.lock().await.take() {
            router.abort();
        }
        let mut subscriptions = peer.subscriptions.lock().await;
        for (_, handle) in subscriptions.drain() {
            handle.close();
        }
    }
}

/// Disconnects every currently connected peer.
pub async fn disconnect_all(peers: &PeerTable) {
    for peer_id in peers.ids() {
        disconnect(peers, &peer_id).await;
    }
}
