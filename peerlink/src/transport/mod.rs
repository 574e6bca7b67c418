//! Transport adapters: collaborators that hand a framed duplex connection to a [`crate::Listener`].
//!
//! Spec.md treats wire encoding/decoding and HTTP routing as "external collaborators" to the
//! router/subscription core; this module is the thin seam between them and [`crate::listener::Listener::accept`].

pub mod web_socket;

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    core::{
        error::RouterError,
        stream::MessageStream,
    },
    peer::PeerRecord,
};

/// Anything that can hand off a newly-established framed connection for handshake and acceptance.
///
/// Implemented by [`crate::listener::ListenerHandle`]; kept as a trait rather than a bare method so
/// a transport adapter (like [`web_socket::serve`]) doesn't need to depend on the concrete
/// [`crate::listener::Listener`] type.
#[async_trait]
pub trait Acceptor: Send + Sync {
    async fn accept(
        &self,
        stream: Box<dyn MessageStream>,
        origin: Option<String>,
    ) -> Result<Arc<PeerRecord>, RouterError>;
}
