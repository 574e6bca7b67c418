use crate::{
    core::{
        error::{
            last_error,
            RouterError,
        },
        message::Message,
    },
    interceptor::context::Context,
    registry::SubscriptionOutput,
    subscription::{
        StopHook,
        SubscriptionHandle,
    },
};

/// The subscription stage: looks up `api.subscription[request.fn]`, invokes it, and wires its
/// producer to a forwarding task that republishes every value to the peer as a `publication`
/// tagged with the subscription id the peer chose.
///
/// The forwarding task's [`tokio::task::AbortHandle`] and the handler's own stop hook are
/// recorded together as one [`SubscriptionHandle`] under `peers[peer-id].subscriptions[id]`, so a
/// later unsubscription (or peer disconnect) can tear down both with one call. The forwarding
/// task also tears itself down the same way when its producer runs dry or the sink closes out
/// from under it, so a subscription that nobody explicitly unsubscribes still gets removed from
/// the table and has its stop hook invoked.
pub async fn dispatch(ctx: &mut Context) -> Result<(), RouterError> {
    let name = match &ctx.request.function {
        Some(name) => name.clone(),
        None => String::new(),
    };
    let id = match ctx.request.id.clone() {
        Some(id) => id,
        None => {
            return Err(RouterError::UnknownHandler {
                kind: "subscription",
                name,
            });
        }
    };
    let descriptor = match ctx.api.subscription(&name) {
        Some(descriptor) => descriptor,
        None => {
            return Err(RouterError::UnknownHandler {
                kind: "subscription",
                name,
            });
        }
    };
    let args = descriptor
        .arity
        .resolve(ctx.request.args.clone())
        .map_err(|got| RouterError::ArityMismatch {
            kind: "subscription",
            name: descriptor.name.clone(),
            got,
        })?;

    let SubscriptionOutput { mut producer, stop } = match (descriptor.handler)(args).await {
        Ok(output) => output,
        Err(err) => {
            let err = RouterError::HandlerException(err);
            last_error().record(&err);
            return Err(err);
        }
    };

    let peer = match ctx.peers.get(&ctx.peer_id) {
        Some(peer) => peer,
        None => return Err(RouterError::SinkClosed),
    };

    let stop = StopHook::new(stop);
    let sink = peer.sink.clone();
    let sub_id = id.clone();
    let forwarder_peer = peer.clone();
    let forwarder_id = id.clone();
    let forwarder_stop = stop.clone();
    let join = tokio::spawn(async move {
        while let Some(value) = producer.recv().await {
            if sink
                .send(Message::publication(sub_id.clone(), value))
                .await
                .is_err()
            {
                break;
            }
        }
        // The producer ran dry, or the sink closed mid-forward. Either way this subscription is
        // finished: remove it from the table and run its stop hook, exactly as an explicit
        // unsubscription would, so nothing lingers waiting for a disconnect that may never come.
        forwarder_peer
            .subscriptions
            .lock()
            .await
            .remove(&forwarder_id);
        forwarder_stop.invoke();
    });
    let handle = SubscriptionHandle::new(join.abort_handle(), stop);

    {
        let mut subscriptions = peer.subscriptions.lock().await;
        if let Some(previous) = subscriptions.insert(id, handle) {
            previous.close();
        }
    }

    Ok(())
}
