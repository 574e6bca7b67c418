use thiserror::Error;

/// The taxonomy of errors the router can produce while dispatching a single message.
///
/// These are kinds, not a generic catch-all: each variant is handled uniformly by the response
/// writer stage (see [`crate::interceptor::response_writer`]), and several are surfaced directly
/// to the peer as the `error` field of an `rpc-response`.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Classification located no handler for a reserved event/RPC/subscription tag.
    #[error("Unhandled {kind}-request: {name}")]
    UnknownHandler { kind: &'static str, name: String },

    /// A handler exists, but none of its declared arities accept the supplied argument count.
    #[error("arity mismatch for {kind} handler {name}: got {got} args")]
    ArityMismatch {
        kind: &'static str,
        name: String,
        got: usize,
    },

    /// The handler itself returned an error or panicked.
    #[error("handler error: {0:#}")]
    HandlerException(#[source] anyhow::Error),

    /// The inbound frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The transport failed or reached end-of-stream.
    #[error("transport error: {0}")]
    Transport(String),

    /// The outbound sink could not accept a write (closed or broken).
    #[error("sink closed")]
    SinkClosed,
}

/// A process-wide latch holding the most recently observed [`RouterError`], for diagnostics only.
///
/// Never read by routing logic; exists purely so an operator (or a test) can ask "what was the
/// last handler exception anywhere in this process" without plumbing a channel through every
/// handler. Observable, but never load-bearing for routing decisions.
#[derive(Default)]
pub struct LastError {
    message: std::sync::Mutex<Option<String>>,
}

impl LastError {
    pub fn record(&self, err: &RouterError) {
        if let Ok(mut slot) = self.message.lock() {
            *slot = Some(err.to_string());
        }
    }

    pub fn snapshot(&self) -> Option<String> {
        self.message.lock().ok().and_then(|slot| slot.clone())
    }
}

static LAST_ERROR: std::sync::OnceLock<LastError> = std::sync::OnceLock::new();

/// The process-wide last-error cell.
pub fn last_error() -> &'static LastError {
    LAST_ERROR.get_or_init(LastError::default)
}
