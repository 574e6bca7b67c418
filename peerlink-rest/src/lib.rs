//! A thin HTTP/REST shim over a [`peerlink::Listener`].
//!
//! Maps `POST /api/v{major}/{category}/{fn}` directly onto the listener's current handler
//! dictionary, prepending an opaque transport-request marker to the supplied `args` and returning
//! either `{event: "rpc-response", id, result}` (200) or `{error: <message>}` (500). This path is
//! synchronous and bypasses the router/interceptor chain entirely.
//!
//! Content negotiation recognizes `application/json` only — this crate's sole built-in wire
//! format — so a request with any other `Content-Type` is rejected with `415` before its body is
//! read.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        Path,
        State,
    },
    http::{
        header,
        HeaderMap,
        StatusCode,
    },
    response::{
        IntoResponse,
        Response,
    },
    routing::post,
    Json,
    Router,
};
use peerlink::{
    Id,
    Listener,
};
use serde::Deserialize;
use serde_json::{
    json,
    Value,
};

/// The REST request body shape: `{id, args?}`.
#[derive(Debug, Deserialize)]
struct RestRequest {
    id: Id,
    #[serde(default)]
    args: Vec<Value>,
}

/// Builds the REST shim's router over `listener`'s live handler dictionary.
///
/// Merge this into a larger `axum::Router` (alongside static-asset serving, HTML templating, and
/// API-documentation rendering — all out of scope here).
pub fn router(listener: Arc<Listener>) -> Router {
    Router::new()
        .route("/api/:version/:category/:name", post(dispatch))
        .with_state(listener)
}

async fn dispatch(
    State(listener): State<Arc<Listener>>,
    Path((_version, category, name)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
    {
        Some(value) if value.starts_with("application/json") => {}
        _ => {
            return (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "expected application/json",
            )
                .into_response();
        }
    }

    let request: RestRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    };

    let api = listener.api_snapshot();
    let mut args = request.args;
    // Prepends a transport-request marker to args. There is no live connection here, so the
    // marker is a static placeholder rather than a real peer/session reference.
    args.insert(0, json!({"transport": "http"}));

    match category.as_str() {
        "rpc" => match api.rpc(&name) {
            Some(descriptor) => match descriptor.arity.resolve(args) {
                Ok(args) => match (descriptor.handler)(args).await {
                    Ok(result) => {
                        Json(json!({"event": "rpc-response", "id": request.id, "result": result}))
                            .into_response()
                    }
                    Err(err) => (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": err.to_string()})),
                    )
                        .into_response(),
                },
                Err(got) => arity_error(&category, &name, got),
            },
            None => unhandled(&category, &name),
        },
        "event" => match api.event(&name) {
            Some(descriptor) => match descriptor.arity.resolve(args) {
                Ok(args) => {
                    (descriptor.handler)(args).await;
                    StatusCode::OK.into_response()
                }
                Err(got) => arity_error(&category, &name, got),
            },
            None => unhandled(&category, &name),
        },
        // Subscriptions are long-lived server-push pipelines; a single HTTP request/response has
        // nowhere to deliver values after the first, so this category is out of scope for the
        // synchronous shim.
        "subscription" => (
            StatusCode::NOT_IMPLEMENTED,
            Json(json!({"error": "subscriptions require a persistent connection"})),
        )
            .into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("unknown category: {category}")})),
        )
            .into_response(),
    }
}

fn unhandled(category: &str, name: &str) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": format!("Unhandled {category}-request: {name}")})),
    )
        .into_response()
}

fn arity_error(category: &str, name: &str, got: usize) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": format!("arity mismatch for {category} handler {name}: got {got} args"),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod rest_test {
    use peerlink::{
        listener::ListenerConfig,
        Api,
        Arity,
        Listener,
    };
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::router;

    async fn call(listener: std::sync::Arc<Listener>, body: serde_json::Value) -> (u16, serde_json::Value) {
        use axum::body::Body;
        use http::Request;
        use tower::ServiceExt;

        let app = router(listener);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/rpc/add-two")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status().as_u16();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn dispatches_rpc_and_prepends_transport_marker() {
        let api = Api::builder()
            .rpc("add-two", Arity::exact(3), |args| async move {
                // args[0] is the transport marker this shim prepends.
                let a = args[1].as_i64().unwrap_or_default();
                let b = args[2].as_i64().unwrap_or_default();
                Ok(json!(a + b))
            })
            .unwrap()
            .build();
        let listener = Listener::new(ListenerConfig {
            api,
            ..Default::default()
        });
        let (status, body) = call(listener, json!({"id": "r1", "args": [2, 3]})).await;
        assert_eq!(status, 200);
        assert_eq!(body["result"], json!(5));
    }

    #[tokio::test]
    async fn unknown_rpc_returns_500_with_message() {
        let listener = Listener::new(ListenerConfig::default());
        let (status, body) = call(listener, json!({"id": "r1", "args": []})).await;
        assert_eq!(status, 500);
        assert!(body["error"].as_str().unwrap().contains("Unhandled rpc-request"));
    }
}
