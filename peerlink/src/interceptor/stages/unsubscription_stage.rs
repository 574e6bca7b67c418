use crate::{
    core::error::RouterError,
    interceptor::context::Context,
};

/// The unsubscription stage: removes `peers[peer-id].subscriptions[request.id]` atomically and
/// tears it down.
///
/// Idempotent: a repeated unsubscription for an id that is no longer present is simply a no-op,
/// not an error — the peer table's `Mutex` guarantees only one caller ever observes the entry
/// present and removes it, so `close` runs at most once per subscription regardless of how many
/// unsubscription frames arrive for the same id.
pub async fn dispatch(ctx: &mut Context) -> Result<(), RouterError> {
    let id = match ctx.request.id.clone() {
        Some(id) => id,
        None => return Ok(()),
    };
    let peer = match ctx.peers.get(&ctx.peer_id) {
        Some(peer) => peer,
        None => return Ok(()),
    };
    let handle = {
        let mut subscriptions = peer.subscriptions.lock().await;
        subscriptions.remove(&id)
    };
    if let Some(handle) = handle {
        handle.close();
    }
    Ok(())
}
