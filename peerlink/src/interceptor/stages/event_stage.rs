use crate::{
    core::error::RouterError,
    interceptor::context::Context,
};

/// The event stage: looks up `api.event[request.event]`, invokes it with the positional args,
/// and ignores the return value.
pub async fn dispatch(ctx: &mut Context) -> Result<(), RouterError> {
    let name = ctx
        .request
        .event
        .as_ref()
        .map(|tag| tag.as_str().to_owned())
        .unwrap_or_default();
    let descriptor = match ctx.api.event(&name) {
        Some(descriptor) => descriptor,
        None => {
            return Err(RouterError::UnknownHandler {
                kind: "event",
                name,
            });
        }
    };
    let args = descriptor
        .arity
        .resolve(ctx.request.args.clone())
        .map_err(|got| RouterError::ArityMismatch {
            kind: "event",
            name: descriptor.name.clone(),
            got,
        })?;
    (descriptor.handler)(args).await;
    Ok(())
}
