use serde::{
    Deserialize,
    Serialize,
};
use serde_json::Value;

use crate::core::id::{
    Id,
    PeerId,
};

/// The `event` tag naming a message's kind.
///
/// The six reserved kinds are given associated constants so classification (see
/// [`crate::interceptor::classify`]) matches against typed values instead of bare string
/// literals sprinkled through the router. Any other value is a user event, which is why this
/// wraps a plain `String` rather than being a closed enum.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventTag(pub String);

impl EventTag {
    pub const RPC: &'static str = "rpc";
    pub const SUBSCRIPTION: &'static str = "subscription";
    pub const UNSUBSCRIPTION: &'static str = "unsubscription";
    pub const RPC_RESPONSE: &'static str = "rpc-response";
    pub const PUBLICATION: &'static str = "publication";
    pub const CONNECT_REPLY: &'static str = "connect-reply";

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn rpc() -> Self {
        Self(Self::RPC.to_owned())
    }

    pub fn subscription() -> Self {
        Self(Self::SUBSCRIPTION.to_owned())
    }

    pub fn unsubscription() -> Self {
        Self(Self::UNSUBSCRIPTION.to_owned())
    }

    pub fn rpc_response() -> Self {
        Self(Self::RPC_RESPONSE.to_owned())
    }

    pub fn publication() -> Self {
        Self(Self::PUBLICATION.to_owned())
    }
}

impl From<&str> for EventTag {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for EventTag {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl PartialEq<str> for EventTag {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

/// A tagged message, inbound or outbound.
///
/// Unknown fields round-trip through `extra` untouched: preserved through middleware but
/// otherwise ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<EventTag>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Id>,
    #[serde(rename = "fn", skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(rename = "peer-id", skip_serializing_if = "Option::is_none")]
    pub peer_id: Option<PeerId>,
    /// Present only on the handshake reply, whose wire shape uses `type` rather than `event`:
    /// `{type: "connect-reply", success: true}`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Message {
    /// Constructs an outbound `rpc-response` message carrying a successful result.
    pub fn rpc_response_ok(id: Id, result: Value) -> Self {
        Self {
            event: Some(EventTag::rpc_response()),
            id: Some(id),
            result: Some(result),
            ..Default::default()
        }
    }

    /// Constructs an outbound `rpc-response` message carrying an error.
    pub fn rpc_response_err(id: Id, error: String) -> Self {
        Self {
            event: Some(EventTag::rpc_response()),
            id: Some(id),
            error: Some(error),
            ..Default::default()
        }
    }

    /// Constructs an outbound `publication` message carrying one subscription value.
    pub fn publication(id: Id, value: Value) -> Self {
        Self {
            event: Some(EventTag::publication()),
            id: Some(id),
            value: Some(value),
            ..Default::default()
        }
    }

    /// Constructs the handshake reply, sent once per connection immediately after acceptance.
    pub fn connect_reply() -> Self {
        Self {
            kind: Some(EventTag::CONNECT_REPLY),
            success: Some(true),
            ..Default::default()
        }
    }
}
