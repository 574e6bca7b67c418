use crate::{
    core::{
        error::RouterError,
        message::EventTag,
    },
    interceptor::{
        context::Context,
        stages::{
            event_stage,
            rpc_stage,
            subscription_stage,
            unsubscription_stage,
        },
    },
};

/// The classification / API router stage: the first chain stage after middleware.
///
/// Reads `request.event` and routes to the matching downstream stage. Any tag not among the
/// three reserved request kinds defaults to the event stage — including a reserved kind with no
/// registered handler, which still routes to the right stage and lets that stage raise
/// "unhandled" itself.
pub async fn classify_and_dispatch(ctx: &mut Context) -> Result<(), RouterError> {
    let tag = ctx
        .request
        .event
        .clone()
        .unwrap_or_else(|| EventTag::from(""));
    match tag.as_str() {
        EventTag::RPC => rpc_stage::dispatch(ctx).await,
        EventTag::SUBSCRIPTION => subscription_stage::dispatch(ctx).await,
        EventTag::UNSUBSCRIPTION => unsubscription_stage::dispatch(ctx).await,
        _ => event_stage::dispatch(ctx).await,
    }
}
