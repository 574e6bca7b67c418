use std::fmt::Display;

use serde::{
    Deserialize,
    Serialize,
};

/// A peer-chosen correlation identifier.
///
/// Ids are opaque to the router: they are never allocated, interpreted, or ordered by the server.
/// A peer chooses an id for each `rpc` or `subscription` request, and the router echoes it back
/// on the matching `rpc-response` or `publication` frames. Since peers may reasonably pick either
/// a string or a number (most JSON-RPC-flavored clients do both), [`Id`] accepts either on the
/// wire and compares by value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Id {
    String(String),
    Number(i64),
}

impl Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

impl From<i64> for Id {
    fn from(value: i64) -> Self {
        Self::Number(value)
    }
}

/// A peer's self-assigned identifier, supplied on the handshake frame.
///
/// Distinct from [`Id`] (which correlates individual requests): a [`PeerId`] identifies the
/// connection itself for the lifetime of the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}
