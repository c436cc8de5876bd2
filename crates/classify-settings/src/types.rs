//! Settings types with compiled defaults.

use serde::{Deserialize, Serialize};

/// Root settings object.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassifySettings {
    /// Server-side (dispatcher/gateway) settings.
    pub server: ServerSettings,
    /// Client-side settings.
    pub client: ClientSettings,
}

/// Server-side settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Managed socket endpoint base (host[/stage]) used when online.
    pub socket_endpoint: String,
    /// Whether to hand out the local offline socket endpoint instead of the
    /// managed one.
    pub offline: bool,
    /// Bind address for the offline host.
    pub host: String,
    /// Port for the offline host (`0` = auto-assign).
    pub port: u16,
    /// Session time-to-live in minutes.
    pub session_expiry_minutes: i64,
    /// Minimum interval between persistence writes for an otherwise
    /// unchanged session, in minutes.
    pub debounce_minutes: i64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            socket_endpoint: String::new(),
            offline: true,
            host: "127.0.0.1".to_string(),
            port: 0,
            session_expiry_minutes: 60 * 24,
            debounce_minutes: 10,
        }
    }
}

impl ServerSettings {
    /// The socket URL handed to clients by the authorization handshake.
    ///
    /// Offline mode points at the local host's `/ws` route; online mode at
    /// the managed gateway endpoint.
    pub fn socket_url(&self) -> String {
        if self.offline {
            format!("ws://{}:{}/ws", self.host, self.port)
        } else {
            format!("wss://{}", self.socket_endpoint)
        }
    }
}

/// Client-side settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientSettings {
    /// URL the client posts request envelopes to.
    pub dispatch_url: String,
    /// Bound on waiting for the socket open acknowledgment, in milliseconds.
    pub open_timeout_ms: u64,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            dispatch_url: "/api/dispatch".to_string(),
            open_timeout_ms: 5000,
        }
    }
}
