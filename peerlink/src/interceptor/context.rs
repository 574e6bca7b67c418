use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{
    core::{
        error::RouterError,
        message::Message,
    },
    peer::{
        PeerId,
        PeerTable,
    },
    registry::Api,
};

/// The mutable request envelope threaded through the interceptor chain.
///
/// Carries the handler dictionary snapshot, the peer table, the originating peer's id and
/// outbound sink, the inbound request, and the response/error slots the chain fills in as it
/// runs. Borrowed by the chain for the duration of processing a single inbound message and
/// dropped on exit — there is no per-peer persistent context, only the per-peer [`PeerTable`]
/// entry and subscription table outlive a single dispatch.
pub struct Context {
    /// The handler dictionary snapshot taken once for this request, so a reload mid-dispatch
    /// never changes which handler this request resolves against.
    pub api: Arc<Api>,
    pub peers: Arc<PeerTable>,
    pub peer_id: PeerId,
    pub sink: mpsc::Sender<Message>,
    pub request: Message,
    pub response: Option<Message>,
    pub error: Option<RouterError>,
}

impl Context {
    pub fn new(
        api: Arc<Api>,
        peers: Arc<PeerTable>,
        peer_id: PeerId,
        sink: mpsc::Sender<Message>,
        request: Message,
    ) -> Self {
        Self {
            api,
            peers,
            peer_id,
            sink,
            request,
            response: None,
            error: None,
        }
    }
}

/// A single stage in the interceptor chain: an enter/leave/error triple threaded with a shared
/// [`Context`].
///
/// The chain's executor threads one mutable context through every stage's `enter` in order, then
/// back through `leave` in reverse (onion-style). An error raised anywhere skips the remaining
/// `enter`/`leave` calls and instead unwinds through each stage's `error`, giving every stage a
/// chance to handle or rewrite it; the default implementation below passes it through unchanged,
/// which is how a stage opts out of handling errors.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn enter(&self, _ctx: &mut Context) -> Result<(), RouterError> {
        Ok(())
    }

    async fn leave(&self, _ctx: &mut Context) -> Result<(), RouterError> {
        Ok(())
    }

    async fn error(&self, _ctx: &mut Context, err: RouterError) -> RouterError {
        err
    }
}
