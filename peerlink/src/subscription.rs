//! A named, peer-owned producer pipeline with a cancel hook.

use std::sync::{
    Arc,
    Mutex,
};

use tokio::task::AbortHandle;

/// A stop hook shared between a subscription's forwarding task and its [`SubscriptionHandle`],
/// so whichever of them tears the subscription down first — the forwarding task on producer
/// exhaustion, or an explicit unsubscription/disconnect — invokes it, and the other is a no-op.
///
/// Taking the `Option` out of the mutex is what makes "exactly once" hold under the race: only
/// the caller that observes `Some` ever runs the closure.
#[derive(Clone)]
pub struct StopHook(Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>);

impl StopHook {
    pub fn new(stop: Option<Box<dyn FnOnce() + Send>>) -> Self {
        Self(Arc::new(Mutex::new(stop)))
    }

    pub fn invoke(&self) {
        let stop = self.0.lock().unwrap().take();
        if let Some(stop) = stop {
            stop();
        }
    }
}

/// A handle to an active subscription pipeline.
///
/// Created when a subscription handler returns successfully (see
/// [`crate::interceptor::stages::subscription_stage`]); destroyed on explicit unsubscription, on
/// peer disconnect, or on producer exhaustion. Holds only the producer's forwarding task and its
/// shared stop hook — nothing about the handler or its arguments survives past registration.
pub struct SubscriptionHandle {
    forwarder: AbortHandle,
    stop: StopHook,
}

impl SubscriptionHandle {
    pub fn new(forwarder: AbortHandle, stop: StopHook) -> Self {
        Self { forwarder, stop }
    }

    /// Tears down the subscription: aborts the forwarding task (which drops the producer
    /// receiver, so the producer observes its consumer gone), then invokes the stop hook, if it
    /// hasn't already run.
    pub fn close(self) {
        self.forwarder.abort();
        self.stop.invoke();
    }
}
