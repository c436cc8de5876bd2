//! Wire-format envelopes carried between client and server.
//!
//! A [`RequestEnvelope`] travels client→server as an HTTP POST body and
//! server→client as a WebSocket push. A [`ResponseEnvelope`] answers the
//! HTTP path only; pushes are fire-and-forget. Field names are camelCase on
//! the wire and absent optional fields are omitted entirely.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Pseudo interface name used by the socket-authorization handshake.
pub const SOCKET_INTERFACE: &str = "$WebSocket";

/// Pseudo method name used by the socket-authorization handshake.
pub const SOCKET_AUTHORIZE: &str = "$authorize";

/// An invocation of `interfaceName.methodName` with positional args.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestEnvelope {
    /// Registered interface name.
    pub interface_name: String,
    /// Declared method name within the interface.
    pub method_name: String,
    /// Positional arguments, in declaration order.
    pub args: Vec<Value>,
    /// Session identifier; empty on a client's first call.
    #[serde(default)]
    pub session_id: String,
}

/// The answer to a [`RequestEnvelope`] on the HTTP path.
///
/// Exactly one of `data` / `exception` is meaningful per response.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    /// Method return value (absent on fault).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Error message from the method body (absent on success).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
    /// Optional out-of-band payload delivered to a registered listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cargo: Option<Value>,
    /// Session identifier, possibly newly minted by the server.
    #[serde(default)]
    pub session_id: String,
}

impl RequestEnvelope {
    /// Build a request envelope.
    pub fn new(
        interface_name: impl Into<String>,
        method_name: impl Into<String>,
        args: Vec<Value>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            interface_name: interface_name.into(),
            method_name: method_name.into(),
            args,
            session_id: session_id.into(),
        }
    }

    /// Build the socket-authorization handshake pseudo-call.
    pub fn handshake(session_id: impl Into<String>) -> Self {
        Self::new(SOCKET_INTERFACE, SOCKET_AUTHORIZE, Vec::new(), session_id)
    }

    /// `interfaceName.methodName`, the routing key for handlers and logs.
    pub fn method_key(&self) -> String {
        format!("{}.{}", self.interface_name, self.method_name)
    }

    /// Whether this envelope is the socket-authorization handshake.
    pub fn is_handshake(&self) -> bool {
        self.interface_name == SOCKET_INTERFACE && self.method_name == SOCKET_AUTHORIZE
    }
}

impl ResponseEnvelope {
    /// Build a success response.
    pub fn success(data: Option<Value>, session_id: impl Into<String>) -> Self {
        Self {
            data,
            exception: None,
            cargo: None,
            session_id: session_id.into(),
        }
    }

    /// Build a fault response carrying the method body's error message.
    pub fn fault(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            data: None,
            exception: Some(message.into()),
            cargo: None,
            session_id: session_id.into(),
        }
    }
}
