//! A per-peer message router and subscription engine.
//!
//! A [`Listener`] accepts connections from peers and exposes a user-supplied [`Api`] dictionary
//! of named event, RPC, and subscription handlers. Each peer gets its own router loop that
//! demultiplexes inbound frames into handler invocations and routes handler output back onto the
//! peer's outbound sink, correlated by id.
//!
//! The wire framing, HTTP routing, and REST shim are collaborators, not part of this crate; see
//! `peerlink-rest` for the latter.

pub mod config;
pub mod core;
pub mod interceptor;
pub mod listener;
pub mod peer;
pub mod registry;
pub mod router;
pub mod subscription;
pub mod transport;

pub use config::Config;
pub use core::{
    error::RouterError,
    id::Id,
    message::{
        EventTag,
        Message,
    },
};
pub use listener::{
    Listener,
    ListenerConfig,
    ListenerHandle,
};
pub use peer::{
    PeerId,
    PeerRecord,
};
pub use registry::{
    Api,
    ApiBuilder,
    Arity,
};
