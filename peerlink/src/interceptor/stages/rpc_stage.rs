use crate::{
    core::{
        error::{
            last_error,
            RouterError,
        },
        message::Message,
    },
    interceptor::context::Context,
};

/// The RPC stage: looks up `api.rpc[request.fn]`, invokes it, and constructs the `rpc-response`
/// on success.
///
/// The handler is an `async fn`, so awaiting its future covers both an immediately-ready value
/// and one that resolves later — there is no separate stream-of-one wrapper to unwrap.
pub async fn dispatch(ctx: &mut Context) -> Result<(), RouterError> {
    let name = match &ctx.request.function {
        Some(name) => name.clone(),
        None => String::new(),
    };
    let id = match ctx.request.id.clone() {
        Some(id) => id,
        None => {
            return Err(RouterError::UnknownHandler {
                kind: "rpc",
                name,
            });
        }
    };
    let descriptor = match ctx.api.rpc(&name) {
        Some(descriptor) => descriptor,
        None => {
            return Err(RouterError::UnknownHandler {
                kind: "rpc",
                name,
            });
        }
    };
    let args = descriptor
        .arity
        .resolve(ctx.request.args.clone())
        .map_err(|got| RouterError::ArityMismatch {
            kind: "rpc",
            name: descriptor.name.clone(),
            got,
        })?;

    let result = match (descriptor.handler)(args).await {
        Ok(value) => value,
        Err(err) => {
            let err = RouterError::HandlerException(err);
            last_error().record(&err);
            return Err(err);
        }
    };

    ctx.response = Some(Message::rpc_response_ok(id, result));
    Ok(())
}
