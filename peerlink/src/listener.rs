//! The listener: owns the peer table, the registry snapshot, middleware, and lifecycle
//! callbacks; accepts new connections and performs the handshake.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures_util::{
    SinkExt,
    StreamExt,
};
use tokio::sync::{
    mpsc,
    Notify,
};

use crate::{
    core::{
        error::RouterError,
        message::Message,
        stream::MessageStream,
    },
    interceptor::{
        DefaultResponseWriter,
        Interceptor,
        ResponseWriter,
    },
    peer::{
        PeerId,
        PeerRecord,
        PeerTable,
    },
    registry::Api,
    router,
};

pub type OnConnect = Arc<dyn Fn(Arc<PeerRecord>) + Send + Sync>;
pub type OnDisconnect = Arc<dyn Fn(Arc<PeerRecord>) + Send + Sync>;
pub type OnError = Arc<dyn Fn(&RouterError) + Send + Sync>;

/// Configuration recognized when constructing a [`Listener`].
pub struct ListenerConfig {
    pub api: Api,
    pub middleware: Vec<Arc<dyn Interceptor>>,
    pub on_connect: Option<OnConnect>,
    pub on_disconnect: Option<OnDisconnect>,
    pub on_error: Option<OnError>,
    /// Replaces the built-in [`DefaultResponseWriter`].
    pub response_writer: Option<Arc<dyn ResponseWriter>>,
    /// Capacity of each peer's outbound channel. A slow peer eventually makes its handlers'
    /// sends block rather than growing memory without limit.
    pub outbound_buffer: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            api: Api::default(),
            middleware: Vec::new(),
            on_connect: None,
            on_disconnect: None,
            on_error: None,
            response_writer: None,
            outbound_buffer: 64,
        }
    }
}

/// The listener: owns the peer table, the registry reference, middleware, and lifecycle
/// callbacks.
///
/// The handler dictionary is held behind an [`ArcSwap`] so that [`Listener::swap_api`] can publish
/// a new dictionary atomically: each inbound request resolves against exactly one snapshot, never
/// a mix of old and new handlers, since [`Listener::accept`] and every router loop it starts take
/// their own `Arc<Api>` via [`ArcSwap::load_full`] once, up front, rather than dereferencing the
/// swap on every dispatch.
pub struct Listener {
    api: ArcSwap<Api>,
    peers: Arc<PeerTable>,
    middleware: Arc<Vec<Arc<dyn Interceptor>>>,
    response_writer: Arc<dyn ResponseWriter>,
    on_connect: Option<OnConnect>,
    on_disconnect: Option<OnDisconnect>,
    on_error: Option<OnError>,
    outbound_buffer: usize,
    closing: Notify,
}

impl Listener {
    pub fn new(config: ListenerConfig) -> Arc<Self> {
        Arc::new(Self {
            api: ArcSwap::from_pointee(config.api),
            peers: Arc::new(PeerTable::default()),
            middleware: Arc::new(config.middleware),
            response_writer: config
                .response_writer
                .unwrap_or_else(|| Arc::new(DefaultResponseWriter)),
            on_connect: config.on_connect,
            on_disconnect: config.on_disconnect,
            on_error: config.on_error,
            outbound_buffer: config.outbound_buffer,
            closing: Notify::new(),
        })
    }

    /// Publishes a new handler dictionary, visible to every request dispatched from this point
    /// on. In-flight requests keep the snapshot they already took.
    pub fn swap_api(&self, api: Api) {
        self.api.store(Arc::new(api));
    }

    pub fn peers(&self) -> &PeerTable {
        &self.peers
    }

    /// Takes a snapshot of the current handler dictionary, for callers (like the REST shim) that
    /// dispatch outside the router loop and so need their own `Arc<Api>`.
    pub fn api_snapshot(&self) -> Arc<Api> {
        self.api.load_full()
    }

    fn report_error(&self, err: &RouterError) {
        match &self.on_error {
            Some(callback) => callback(err),
            None => log::error!("{err}"),
        }
    }

    /// Performs the handshake and accepts a new connection.
    ///
    /// Splits the duplex `stream` into independent read/write halves: the write half is driven by
    /// a dedicated forwarding task fed from an unbounded-arrival, bounded-capacity channel (the
    /// peer record's `sink`); the read half is handed to the router loop. This is the Rust-native
    /// expression of "one logical router fiber per peer" — reads and writes never contend for the
    /// same lock, and a stalled write never blocks the router loop from observing a concurrent
    /// disconnect.
    pub async fn accept(
        self: &Arc<Self>,
        stream: Box<dyn MessageStream>,
        origin: Option<String>,
    ) -> Result<Arc<PeerRecord>, RouterError> {
        let (mut write_half, mut read_half) = stream.split();

        let handshake = match read_half.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(err)) => {
                self.report_error(&err);
                return Err(err);
            }
            None => {
                let err = RouterError::Transport("connection closed before handshake".to_owned());
                self.report_error(&err);
                return Err(err);
            }
        };
        let peer_id: PeerId = match handshake.peer_id {
            Some(peer_id) => peer_id,
            None => {
                let err = RouterError::Decode("handshake frame missing peer-id".to_owned());
                self.report_error(&err);
                return Err(err);
            }
        };

        let (outbound_tx, mut outbound_rx) = mpsc::channel::<Message>(self.outbound_buffer);
        tokio::spawn(async move {
            while let Some(message) = outbound_rx.recv().await {
                if write_half.send(message).await.is_err() {
                    break;
                }
            }
            let _ = write_half.close().await;
        });

        let peer = Arc::new(PeerRecord::new(peer_id.clone(), outbound_tx, origin));
        // Replaces (without disconnecting) any existing record for this id.
        self.peers.insert(peer.clone());

        let join = router::start(
            read_half,
            self.api.load_full(),
            self.peers.clone(),
            peer_id.clone(),
            self.middleware.clone(),
            self.response_writer.clone(),
            self.on_disconnect.clone(),
        );
        *peer.router.lock().await = Some(join.abort_handle());

        peer.send(Message::connect_reply()).await?;

        if let Some(on_connect) = &self.on_connect {
            on_connect(peer.clone());
        }

        Ok(peer)
    }

    /// Disconnects one peer, invoking `on-disconnect` first if supplied.
    pub async fn disconnect(&self, peer_id: &PeerId) {
        if let Some(on_disconnect) = &self.on_disconnect {
            if let Some(peer) = self.peers.get(peer_id) {
                on_disconnect(peer);
            }
        }
        router::disconnect(&self.peers, peer_id).await;
    }

    /// Disconnects every connected peer and stops accepting new connections.
    pub async fn close(&self) {
        for peer_id in self.peers.ids() {
            self.disconnect(&peer_id).await;
        }
        self.closing.notify_waiters();
    }

    /// Resolves once [`Listener::close`] has been called.
    pub async fn closed(&self) {
        self.closing.notified().await;
    }
}

/// A cheaply cloneable reference to a running [`Listener`].
///
/// Exists so embedders can hand out a handle to accept loops and lifecycle callers without
/// exposing the listener's own `Arc` construction, matching the teacher's `RouterHandle` /
/// `Router` split.
#[derive(Clone)]
pub struct ListenerHandle(Arc<Listener>);

impl ListenerHandle {
    pub fn new(listener: Arc<Listener>) -> Self {
        Self(listener)
    }
}

impl std::ops::Deref for ListenerHandle {
    type Target = Listener;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[async_trait]
impl crate::transport::Acceptor for ListenerHandle {
    async fn accept(
        &self,
        stream: Box<dyn MessageStream>,
        origin: Option<String>,
    ) -> Result<Arc<PeerRecord>, RouterError> {
        Listener::accept(&self.0, stream, origin).await
    }
}
