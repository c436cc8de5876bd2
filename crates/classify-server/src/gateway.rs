//! The connection-gateway collaborator seam.
//!
//! The gateway physically delivers push payloads to open sockets. Online,
//! that is the managed WebSocket gateway's management endpoint; offline it
//! is the in-process [`LocalGateway`] the offline host feeds.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use classify_core::ids::ConnectionId;

/// Error surfaced by a gateway implementation.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The connection id no longer maps to an open socket.
    #[error("connection '{0}' is gone")]
    Gone(String),
    /// The gateway could not be reached.
    #[error("gateway transport error: {0}")]
    Transport(String),
}

impl GatewayError {
    /// Map a delivery failure into the framework taxonomy: a gone
    /// connection is `DeliveryFailed`; everything else stays transport.
    pub fn into_classify(self, connection_id: &ConnectionId) -> classify_core::ClassifyError {
        match self {
            Self::Gone(id) => classify_core::ClassifyError::DeliveryFailed {
                connection_id: connection_id.as_str().to_owned(),
                message: format!("connection '{id}' is gone"),
            },
            Self::Transport(message) => classify_core::ClassifyError::Transport { message },
        }
    }
}

/// Delivery of serialized envelopes to physical connections.
#[async_trait]
pub trait ConnectionGateway: Send + Sync {
    /// Post `payload` to the socket behind `connection_id`.
    async fn post_to_connection(
        &self,
        connection_id: &ConnectionId,
        payload: &str,
    ) -> Result<(), GatewayError>;
}

/// In-process gateway used by the offline host and tests.
///
/// Each open socket registers an mpsc sender; posting forwards the payload
/// to the socket's write task.
#[derive(Default)]
pub struct LocalGateway {
    senders: RwLock<HashMap<String, mpsc::Sender<String>>>,
}

impl LocalGateway {
    /// Create an empty gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the write channel for a newly opened connection.
    ///
    /// A reconnect under the same id replaces the previous channel.
    pub async fn register(&self, connection_id: ConnectionId, tx: mpsc::Sender<String>) {
        debug!(connection_id = %connection_id, "gateway connection registered");
        let mut senders = self.senders.write().await;
        let _ = senders.insert(connection_id.into_inner(), tx);
    }

    /// Drop the write channel for a closed connection.
    pub async fn unregister(&self, connection_id: &ConnectionId) {
        debug!(connection_id = %connection_id, "gateway connection unregistered");
        let mut senders = self.senders.write().await;
        let _ = senders.remove(connection_id.as_str());
    }

    /// Number of currently registered connections.
    pub async fn connection_count(&self) -> usize {
        self.senders.read().await.len()
    }
}

#[async_trait]
impl ConnectionGateway for LocalGateway {
    async fn post_to_connection(
        &self,
        connection_id: &ConnectionId,
        payload: &str,
    ) -> Result<(), GatewayError> {
        let tx = {
            let senders = self.senders.read().await;
            senders.get(connection_id.as_str()).cloned()
        };
        let Some(tx) = tx else {
            return Err(GatewayError::Gone(connection_id.as_str().to_owned()));
        };
        tx.send(payload.to_owned())
            .await
            .map_err(|_| GatewayError::Gone(connection_id.as_str().to_owned()))
    }
}

/// Gateway adapter posting to a management endpoint over HTTP.
///
/// Targets the `POST {endpoint}/@connections/{connectionId}` shape the
/// managed gateway (and its offline emulation) exposes. A `410 Gone`
/// answer means the socket has closed.
pub struct HttpGateway {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGateway {
    /// Create a gateway adapter for `endpoint` (scheme + authority + stage).
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ConnectionGateway for HttpGateway {
    async fn post_to_connection(
        &self,
        connection_id: &ConnectionId,
        payload: &str,
    ) -> Result<(), GatewayError> {
        let url = format!(
            "{}/@connections/{}",
            self.endpoint.trim_end_matches('/'),
            connection_id
        );
        let response = self
            .client
            .post(&url)
            .body(payload.to_owned())
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::GONE => {
                warn!(connection_id = %connection_id, "gateway reports connection gone");
                Err(GatewayError::Gone(connection_id.as_str().to_owned()))
            }
            status => Err(GatewayError::Transport(format!(
                "gateway answered {status} for {url}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn post_to_registered_connection_delivers() {
        let gw = LocalGateway::new();
        let (tx, mut rx) = mpsc::channel(8);
        gw.register(ConnectionId::from("c1"), tx).await;

        gw.post_to_connection(&ConnectionId::from("c1"), "hello")
            .await
            .unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn post_to_unknown_connection_is_gone() {
        let gw = LocalGateway::new();
        let err = gw
            .post_to_connection(&ConnectionId::from("ghost"), "hello")
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::Gone(id) if id == "ghost");
    }

    #[tokio::test]
    async fn post_after_receiver_dropped_is_gone() {
        let gw = LocalGateway::new();
        let (tx, rx) = mpsc::channel(8);
        gw.register(ConnectionId::from("c1"), tx).await;
        drop(rx);

        let err = gw
            .post_to_connection(&ConnectionId::from("c1"), "hello")
            .await
            .unwrap_err();
        assert_matches!(err, GatewayError::Gone(_));
    }

    #[tokio::test]
    async fn unregister_removes_connection() {
        let gw = LocalGateway::new();
        let (tx, _rx) = mpsc::channel(8);
        gw.register(ConnectionId::from("c1"), tx).await;
        assert_eq!(gw.connection_count().await, 1);

        gw.unregister(&ConnectionId::from("c1")).await;
        assert_eq!(gw.connection_count().await, 0);
    }

    #[tokio::test]
    async fn reregister_replaces_channel() {
        let gw = LocalGateway::new();
        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, mut rx2) = mpsc::channel(8);
        gw.register(ConnectionId::from("c1"), tx1).await;
        gw.register(ConnectionId::from("c1"), tx2).await;
        assert_eq!(gw.connection_count().await, 1);

        gw.post_to_connection(&ConnectionId::from("c1"), "x")
            .await
            .unwrap();
        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.recv().await.unwrap(), "x");
    }
}
