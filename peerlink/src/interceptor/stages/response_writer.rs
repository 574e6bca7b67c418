use crate::{
    core::{
        error::RouterError,
        message::Message,
    },
    interceptor::context::Context,
};

/// The outermost stage of the chain: writes whatever `ctx.response` holds to `ctx.sink`, and on a
/// chain error, synthesizes the `rpc-response` error frame itself.
///
/// Only a request that carried an `id` gets an error frame written back. A bare `event` request
/// has no `id` to correlate an error against, so a failure there is logged via
/// [`crate::core::error::last_error`] (already recorded by the stage that raised it) and
/// otherwise swallowed.
pub async fn write(ctx: &mut Context, error: Option<RouterError>) {
    if let Some(err) = error {
        if let Some(id) = ctx.request.id.clone() {
            let response = Message::rpc_response_err(id, err.to_string());
            let _ = ctx.sink.send(response.clone()).await;
            ctx.response = Some(response);
        } else {
            log::warn!("unhandled {:?} request on peer {}: {err}", ctx.request.event, ctx.peer_id);
        }
        ctx.error = Some(err);
        return;
    }

    if let Some(response) = ctx.response.clone() {
        let _ = ctx.sink.send(response).await;
    }
}
