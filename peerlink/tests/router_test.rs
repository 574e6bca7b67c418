//! End-to-end scenarios over an in-process duplex transport, exercising the listener, router
//! loop, and interceptor chain together without binding a real socket.

use std::{
    sync::{
        atomic::{
            AtomicUsize,
            Ordering,
        },
        Arc,
    },
    time::Duration,
};

use futures_util::{
    SinkExt,
    StreamExt,
};
use async_trait::async_trait;
use peerlink::{
    core::{
        error::RouterError,
        stream::{
            DirectMessageStream,
            MessageStream,
        },
    },
    interceptor::{
        Context,
        Interceptor,
    },
    listener::ListenerConfig,
    Api,
    Arity,
    Id,
    Listener,
    Message,
};
use serde_json::json;
use tokio::sync::mpsc;

/// Connects a peer over an in-process duplex pair, completing the handshake, and returns the
/// peer-side stream positioned right after the `connect-reply`.
async fn connect(listener: &Arc<Listener>, peer_id: &str) -> DirectMessageStream {
    let (server_side, mut peer_side) = DirectMessageStream::pair();
    let listener = listener.clone();
    let peer_id = peer_id.to_owned();
    tokio::spawn(async move {
        let stream: Box<dyn MessageStream> = Box::new(server_side);
        listener.accept(stream, None).await.unwrap();
    });
    peer_side
        .send(Message {
            peer_id: Some(peer_id.into()),
            ..Default::default()
        })
        .await
        .unwrap();
    let reply = peer_side.next().await.unwrap().unwrap();
    assert_eq!(reply.kind, Some("connect-reply"));
    assert_eq!(reply.success, Some(true));
    peer_side
}

#[tokio::test]
async fn s1_ping_event_invokes_handler_with_no_outbound_frame() {
    let calls: Arc<std::sync::Mutex<Vec<serde_json::Value>>> = Arc::default();
    let recorded = calls.clone();
    let api = Api::builder()
        .event("ping", Arity::exact(1), move |args| {
            let recorded = recorded.clone();
            async move {
                recorded.lock().unwrap().push(args[0].clone());
            }
        })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-1").await;

    peer.send(Message {
        event: Some("ping".into()),
        args: vec![json!(42)],
        ..Default::default()
    })
    .await
    .unwrap();

    // No outbound frame: a subsequent frame sent immediately after should be the only thing on
    // the wire once the handler has run, so assert by timing out on a recv.
    let next = tokio::time::timeout(Duration::from_millis(50), peer.next()).await;
    assert!(next.is_err(), "expected no outbound frame for an event");
    assert_eq!(*calls.lock().unwrap(), vec![json!(42)]);
}

#[tokio::test]
async fn s2_add_rpc_returns_result() {
    let api = Api::builder()
        .rpc("add-two", Arity::exact(2), |args| async move {
            let a = args[0].as_i64().unwrap_or_default();
            let b = args[1].as_i64().unwrap_or_default();
            Ok(json!(a + b))
        })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-2").await;

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("add-two".to_owned()),
        args: vec![json!(2), json!(3)],
        id: Some(Id::from("r1")),
        ..Default::default()
    })
    .await
    .unwrap();

    let response = peer.next().await.unwrap().unwrap();
    assert_eq!(response.event, Some("rpc-response".into()));
    assert_eq!(response.id, Some(Id::from("r1")));
    assert_eq!(response.result, Some(json!(5)));
    assert_eq!(response.error, None);
}

#[tokio::test]
async fn s3_unknown_rpc_reports_error() {
    let listener = Listener::new(ListenerConfig::default());
    let mut peer = connect(&listener, "peer-3").await;

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("nope".to_owned()),
        args: vec![],
        id: Some(Id::from("r2")),
        ..Default::default()
    })
    .await
    .unwrap();

    let response = peer.next().await.unwrap().unwrap();
    assert_eq!(response.event, Some("rpc-response".into()));
    assert_eq!(response.id, Some(Id::from("r2")));
    assert!(response.error.unwrap().contains("Unhandled rpc-request"));
    assert_eq!(response.result, None);
}

#[tokio::test]
async fn s4_counting_subscription_streams_in_order_then_unsubscribes() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let stop_count = stopped.clone();
    let api = Api::builder()
        .subscription("counter", Arity::exact(0), move |_| {
            let stop_count = stop_count.clone();
            async move {
                let (tx, rx) = mpsc::channel(8);
                tokio::spawn(async move {
                    for value in [10, 20, 30] {
                        if tx.send(json!(value)).await.is_err() {
                            break;
                        }
                    }
                });
                Ok(peerlink::registry::SubscriptionOutput::with_stop(rx, move || {
                    stop_count.fetch_add(1, Ordering::SeqCst);
                }))
            }
        })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-4").await;

    peer.send(Message {
        event: Some("subscription".into()),
        function: Some("counter".to_owned()),
        args: vec![],
        id: Some(Id::from("s1")),
        ..Default::default()
    })
    .await
    .unwrap();

    for expected in [10, 20, 30] {
        let publication = peer.next().await.unwrap().unwrap();
        assert_eq!(publication.event, Some("publication".into()));
        assert_eq!(publication.id, Some(Id::from("s1")));
        assert_eq!(publication.value, Some(json!(expected)));
    }

    peer.send(Message {
        event: Some("unsubscription".into()),
        id: Some(Id::from("s1")),
        ..Default::default()
    })
    .await
    .unwrap();

    // Give the unsubscription stage a moment to run before asserting.
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert!(listener.peers().get(&"peer-4".into()).unwrap().subscriptions.lock().await.is_empty());
}

#[tokio::test]
async fn s5_disconnect_tears_down_all_subscriptions() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let stopped_a = stopped.clone();
    let stopped_b = stopped.clone();
    let api = Api::builder()
        .subscription("a", Arity::exact(0), move |_args| {
            let stopped = stopped_a.clone();
            async move {
                let (_tx, rx) = mpsc::channel(1);
                Ok(peerlink::registry::SubscriptionOutput::with_stop(rx, move || {
                    stopped.fetch_add(1, Ordering::SeqCst);
                }))
            }
        })
        .unwrap()
        .subscription("b", Arity::exact(0), move |_args| {
            let stopped = stopped_b.clone();
            async move {
                let (_tx, rx) = mpsc::channel(1);
                Ok(peerlink::registry::SubscriptionOutput::with_stop(rx, move || {
                    stopped.fetch_add(1, Ordering::SeqCst);
                }))
            }
        })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-5").await;

    for (name, id) in [("a", "a"), ("b", "b")] {
        peer.send(Message {
            event: Some("subscription".into()),
            function: Some(name.to_owned()),
            args: vec![],
            id: Some(Id::from(id)),
            ..Default::default()
        })
        .await
        .unwrap();
    }

    // Let both subscription registrations land before dropping the connection.
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(peer);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(stopped.load(Ordering::SeqCst), 2);
    assert!(listener.peers().get(&"peer-5".into()).is_none());
}

#[tokio::test]
async fn s6_handler_throws_then_peer_recovers() {
    let api = Api::builder()
        .rpc("boom", Arity::exact(0), |_| async move {
            anyhow::bail!("handler exploded")
        })
        .unwrap()
        .rpc("echo", Arity::exact(1), |args| async move { Ok(args[0].clone()) })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-6").await;

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("boom".to_owned()),
        args: vec![],
        id: Some(Id::from("r1")),
        ..Default::default()
    })
    .await
    .unwrap();
    let failure = peer.next().await.unwrap().unwrap();
    assert!(failure.error.unwrap().contains("handler exploded"));

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("echo".to_owned()),
        args: vec![json!("still alive")],
        id: Some(Id::from("r2")),
        ..Default::default()
    })
    .await
    .unwrap();
    let success = peer.next().await.unwrap().unwrap();
    assert_eq!(success.result, Some(json!("still alive")));
}

#[tokio::test]
async fn law5_dictionary_swap_is_snapshot_consistent_per_request() {
    let api = Api::builder()
        .rpc("version", Arity::exact(0), |_| async move { Ok(json!("v1")) })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-7").await;

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("version".to_owned()),
        args: vec![],
        id: Some(Id::from("r1")),
        ..Default::default()
    })
    .await
    .unwrap();
    let first = peer.next().await.unwrap().unwrap();
    assert_eq!(first.result, Some(json!("v1")));

    let v2 = Api::builder()
        .rpc("version", Arity::exact(0), |_| async move { Ok(json!("v2")) })
        .unwrap()
        .build();
    listener.swap_api(v2);

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("version".to_owned()),
        args: vec![],
        id: Some(Id::from("r2")),
        ..Default::default()
    })
    .await
    .unwrap();
    let second = peer.next().await.unwrap().unwrap();
    assert_eq!(second.result, Some(json!("v2")));
}

#[tokio::test]
async fn law4_unsubscription_is_idempotent() {
    let stopped = Arc::new(AtomicUsize::new(0));
    let stop_count = stopped.clone();
    let api = Api::builder()
        .subscription("counter", Arity::exact(0), move |_| {
            let stop_count = stop_count.clone();
            async move {
                let (_tx, rx) = mpsc::channel(1);
                Ok(peerlink::registry::SubscriptionOutput::with_stop(rx, move || {
                    stop_count.fetch_add(1, Ordering::SeqCst);
                }))
            }
        })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-8").await;

    peer.send(Message {
        event: Some("subscription".into()),
        function: Some("counter".to_owned()),
        args: vec![],
        id: Some(Id::from("s1")),
        ..Default::default()
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    for _ in 0..2 {
        peer.send(Message {
            event: Some("unsubscription".into()),
            id: Some(Id::from("s1")),
            ..Default::default()
        })
        .await
        .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(stopped.load(Ordering::SeqCst), 1);
    assert!(
        listener
            .peers()
            .get(&"peer-8".into())
            .unwrap()
            .subscriptions
            .lock()
            .await
            .is_empty()
    );
}

/// A middleware stage that records which of its callbacks ran, for asserting onion-model order.
struct RecordingMiddleware {
    log: Arc<std::sync::Mutex<Vec<&'static str>>>,
}

#[async_trait]
impl Interceptor for RecordingMiddleware {
    async fn enter(&self, _ctx: &mut Context) -> Result<(), RouterError> {
        self.log.lock().unwrap().push("enter");
        Ok(())
    }

    async fn leave(&self, _ctx: &mut Context) -> Result<(), RouterError> {
        self.log.lock().unwrap().push("leave");
        Ok(())
    }
}

/// A middleware stage that always fails `enter`, short-circuiting the chain before classification.
struct RejectingMiddleware;

#[async_trait]
impl Interceptor for RejectingMiddleware {
    async fn enter(&self, _ctx: &mut Context) -> Result<(), RouterError> {
        Err(RouterError::Decode("rejected by middleware".to_owned()))
    }
}

#[tokio::test]
async fn middleware_wraps_dispatch_in_enter_then_leave_order() {
    let log = Arc::new(std::sync::Mutex::new(Vec::new()));
    let api = Api::builder()
        .rpc("noop", Arity::exact(0), |_| async move { Ok(json!(null)) })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        middleware: vec![Arc::new(RecordingMiddleware { log: log.clone() })],
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-9").await;

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("noop".to_owned()),
        args: vec![],
        id: Some(Id::from("r1")),
        ..Default::default()
    })
    .await
    .unwrap();
    let response = peer.next().await.unwrap().unwrap();
    assert_eq!(response.result, Some(json!(null)));
    assert_eq!(*log.lock().unwrap(), vec!["enter", "leave"]);
}

#[tokio::test]
async fn middleware_enter_failure_short_circuits_before_classification() {
    let invoked = Arc::new(AtomicUsize::new(0));
    let invoked_handler = invoked.clone();
    let api = Api::builder()
        .rpc("never", Arity::exact(0), move |_| {
            let invoked = invoked_handler.clone();
            async move {
                invoked.fetch_add(1, Ordering::SeqCst);
                Ok(json!(null))
            }
        })
        .unwrap()
        .build();
    let listener = Listener::new(ListenerConfig {
        api,
        middleware: vec![Arc::new(RejectingMiddleware)],
        ..Default::default()
    });
    let mut peer = connect(&listener, "peer-10").await;

    peer.send(Message {
        event: Some("rpc".into()),
        function: Some("never".to_owned()),
        args: vec![],
        id: Some(Id::from("r1")),
        ..Default::default()
    })
    .await
    .unwrap();
    let response = peer.next().await.unwrap().unwrap();
    assert!(response.error.unwrap().contains("rejected by middleware"));
    assert_eq!(invoked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn on_disconnect_fires_for_implicit_stream_closure() {
    let seen = Arc::new(std::sync::Mutex::new(None));
    let seen_callback = seen.clone();
    let listener = Listener::new(ListenerConfig {
        on_disconnect: Some(Arc::new(move |peer| {
            *seen_callback.lock().unwrap() = Some(peer.peer_id.clone());
        })),
        ..Default::default()
    });
    let peer = connect(&listener, "peer-11").await;

    // Dropping the peer side closes the in-process duplex pair, which the router loop observes as
    // end-of-stream — an implicit termination, not an explicit `Listener::disconnect` call.
    drop(peer);
    tokio::time::sleep(Duration::from_millis(20)).await;

    assert_eq!(seen.lock().unwrap().as_ref(), Some(&peerlink::PeerId::from("peer-11")));
    assert!(listener.peers().get(&"peer-11".into()).is_none());
}
