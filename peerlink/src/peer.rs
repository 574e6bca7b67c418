//! The peer record: a live connection's identity, outbound sink, and subscription table.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{
    mpsc,
    Mutex,
};

pub use crate::core::id::PeerId;
use crate::{
    core::{
        id::Id,
        message::Message,
    },
    subscription::SubscriptionHandle,
};

/// A live connection's state: identity, outbound sink, subscription table, and origin.
///
/// Created on successful handshake (see [`crate::listener::Listener::accept`]), destroyed on
/// disconnect (see [`crate::router::disconnect`]). The listener owns peer records by id;
/// subscriptions hold only their own producer and stop hook, not a reference back to the peer
/// record, so a subscription and the peer it belongs to can be torn down independently.
pub struct PeerRecord {
    pub peer_id: PeerId,
    /// The outbound half of the peer's framed channel. A capability handed to subscription
    /// pipelines, not owned by them. Bounded: a write that would overflow it suspends the writer
    /// rather than growing memory without limit.
    pub sink: mpsc::Sender<Message>,
    pub subscriptions: Mutex<ahash::HashMap<Id, SubscriptionHandle>>,
    /// Opaque origin metadata (e.g. the originating HTTP upgrade request), retained only for
    /// logging and user callbacks.
    pub origin: Option<String>,
    /// The router fiber reading this peer's inbound stream, set once the loop is spawned.
    ///
    /// Present so that [`crate::listener::Listener`] can force a router loop to stop on an
    /// explicit disconnect even when the transport itself gives no other way to interrupt an
    /// in-progress read.
    pub router: Mutex<Option<tokio::task::AbortHandle>>,
}

impl PeerRecord {
    pub fn new(peer_id: PeerId, sink: mpsc::Sender<Message>, origin: Option<String>) -> Self {
        Self {
            peer_id,
            sink,
            subscriptions: Mutex::new(ahash::HashMap::default()),
            origin,
            router: Mutex::new(None),
        }
    }

    /// Queues a message for delivery, suspending if the outbound buffer is full.
    pub async fn send(&self, message: Message) -> Result<(), crate::core::error::RouterError> {
        self.sink
            .send(message)
            .await
            .map_err(|_| crate::core::error::RouterError::SinkClosed)
    }
}

/// The listener's table of connected peers, keyed by self-declared [`PeerId`].
///
/// Invariant: at most one peer record per `peer-id`; later connections displace earlier ones by
/// replacement, which does *not* implicitly disconnect the prior connection. Backed by
/// [`DashMap`] for lock-free, per-key concurrent access.
#[derive(Default)]
pub struct PeerTable {
    peers: DashMap<PeerId, Arc<PeerRecord>, ahash::RandomState>,
}

impl PeerTable {
    /// Installs a peer record, replacing (without tearing down) any existing record for the id.
    pub fn insert(&self, peer: Arc<PeerRecord>) -> Option<Arc<PeerRecord>> {
        self.peers.insert(peer.peer_id.clone(), peer)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<Arc<PeerRecord>> {
        self.peers.get(peer_id).map(|entry| entry.value().clone())
    }

    /// Atomically removes and returns the peer record, if present.
    pub fn remove(&self, peer_id: &PeerId) -> Option<Arc<PeerRecord>> {
        self.peers.remove(peer_id).map(|(_, peer)| peer)
    }

    pub fn ids(&self) -> Vec<PeerId> {
        self.peers.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
