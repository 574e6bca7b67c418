//! The interceptor chain: middleware, classification/dispatch, and the response writer.
//!
//! An explicit onion-model executor: middleware stages run their `enter` callbacks forward, the
//! classify/dispatch stage runs once as the core, and then only the stages that entered
//! successfully run their `leave` (or `error`) callbacks in reverse, finishing with the response
//! writer as the outermost stage.

pub mod classify;
pub mod context;
pub mod stages;

use std::sync::Arc;

use async_trait::async_trait;
pub use context::{
    Context,
    Interceptor,
};

use crate::core::error::RouterError;

/// The outermost stage of the chain: writes the final response or error to the peer's sink.
///
/// A listener's `custom-rpc-responder` option replaces this stage wholesale;
/// [`DefaultResponseWriter`] is what a [`crate::listener::Listener`] installs when no replacement
/// is supplied.
#[async_trait]
pub trait ResponseWriter: Send + Sync {
    async fn write(&self, ctx: &mut Context, error: Option<RouterError>);
}

/// The built-in response writer.
pub struct DefaultResponseWriter;

#[async_trait]
impl ResponseWriter for DefaultResponseWriter {
    async fn write(&self, ctx: &mut Context, error: Option<RouterError>) {
        stages::response_writer::write(ctx, error).await;
    }
}

/// Runs one inbound request through the full chain: middleware enter, classify/dispatch, and
/// then leave/error on the way back out, finishing with the response writer.
///
/// Middleware stages wrap the classify/dispatch core the way an onion's layers wrap its center. A
/// middleware stage that fails `enter` never runs its `leave`, only its `error` (and only if it
/// is among the stages still in scope at the time the error surfaces); a stage that never entered
/// never observes anything from this request.
pub async fn run(
    ctx: &mut Context,
    middleware: &[Arc<dyn Interceptor>],
    response_writer: &dyn ResponseWriter,
) {
    let mut entered = 0;
    let mut error: Option<RouterError> = None;

    for stage in middleware {
        match stage.enter(ctx).await {
            Ok(()) => entered += 1,
            Err(err) => {
                error = Some(err);
                break;
            }
        }
    }

    if error.is_none() {
        if let Err(err) = classify::classify_and_dispatch(ctx).await {
            error = Some(err);
        }
    }

    for stage in middleware[..entered].iter().rev() {
        error = match error {
            Some(err) => Some(stage.error(ctx, err).await),
            None => match stage.leave(ctx).await {
                Ok(()) => None,
                Err(err) => Some(err),
            },
        };
    }

    response_writer.write(ctx, error).await;
}
