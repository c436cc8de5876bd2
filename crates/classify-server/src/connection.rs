//! Session ↔ connection binding and push delivery.
//!
//! Per session the binding moves UNBOUND → CONNECTED on socket connect and
//! back to UNBOUND on disconnect; a reconnect under a new connection id
//! simply overwrites the old binding.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use classify_core::envelope::RequestEnvelope;
use classify_core::errors::ClassifyError;
use classify_core::ids::{ConnectionId, SessionId};
use classify_store::SessionPatch;

use crate::gateway::ConnectionGateway;
use crate::session::SessionManager;

/// Binds sessions to physical connections and forwards pushes.
pub struct ConnectionManager {
    sessions: Arc<SessionManager>,
    gateway: Arc<dyn ConnectionGateway>,
}

impl ConnectionManager {
    /// Create a manager over the lifecycle manager and gateway.
    pub fn new(sessions: Arc<SessionManager>, gateway: Arc<dyn ConnectionGateway>) -> Self {
        Self { sessions, gateway }
    }

    /// The gateway pushes are delivered through.
    pub fn gateway(&self) -> &Arc<dyn ConnectionGateway> {
        &self.gateway
    }

    /// Bind `connection_id` to `session_id` on socket connect.
    ///
    /// The session must already exist (created by the authorization
    /// handshake); an unknown id rejects the upgrade with `InvalidSession`.
    #[instrument(skip(self), fields(session_id = %session_id, connection_id = %connection_id))]
    pub async fn on_connect(
        &self,
        session_id: &SessionId,
        connection_id: ConnectionId,
    ) -> Result<(), ClassifyError> {
        if self.sessions.get_meta(session_id).await?.is_none() {
            warn!("socket connect with invalid session");
            return Err(ClassifyError::InvalidSession {
                session_id: session_id.as_str().to_owned(),
            });
        }
        let _ = self
            .sessions
            .save(SessionPatch::new(session_id.clone()).with_connection(connection_id))
            .await?;
        debug!("connection bound");
        Ok(())
    }

    /// Unbind the session's connection on socket disconnect. Best-effort:
    /// a session that no longer exists is left alone.
    #[instrument(skip(self), fields(session_id = %session_id))]
    pub async fn on_disconnect(&self, session_id: &SessionId) {
        match self.sessions.get_meta(session_id).await {
            Ok(Some(_)) => {
                if let Err(err) = self
                    .sessions
                    .save(SessionPatch::new(session_id.clone()).with_connection_cleared())
                    .await
                {
                    warn!(error = %err, "failed to clear connection binding");
                } else {
                    debug!("connection unbound");
                }
            }
            Ok(None) => debug!("disconnect for unknown session, ignoring"),
            Err(err) => warn!(error = %err, "failed to look up session on disconnect"),
        }
    }

    /// The connection currently bound to `session_id`.
    ///
    /// `InvalidSession` when the session does not resolve,
    /// `HandshakeNotEstablished` when it exists without a bound socket.
    pub async fn connection_for(
        &self,
        session_id: &SessionId,
    ) -> Result<ConnectionId, ClassifyError> {
        let row = self.sessions.get_meta(session_id).await?.ok_or_else(|| {
            ClassifyError::InvalidSession {
                session_id: session_id.as_str().to_owned(),
            }
        })?;
        row.connection_id
            .ok_or_else(|| ClassifyError::HandshakeNotEstablished {
                session_id: session_id.as_str().to_owned(),
            })
    }

    /// Serialize `envelope` and deliver it to the session's connection.
    ///
    /// No retry: a gone connection surfaces as `DeliveryFailed` and the
    /// caller decides what to do.
    #[instrument(skip(self, envelope), fields(session_id = %session_id, method_key = %envelope.method_key()))]
    pub async fn push(
        &self,
        session_id: &SessionId,
        envelope: &RequestEnvelope,
    ) -> Result<(), ClassifyError> {
        let connection_id = self.connection_for(session_id).await?;
        let payload = serde_json::to_string(envelope)?;
        debug!(connection_id = %connection_id, "pushing envelope");
        self.gateway
            .post_to_connection(&connection_id, &payload)
            .await
            .map_err(|err| err.into_classify(&connection_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::LocalGateway;
    use classify_settings::ServerSettings;
    use classify_store::MemorySessionStore;
    use serde_json::json;
    use tokio::sync::mpsc;

    struct Fixture {
        manager: ConnectionManager,
        sessions: Arc<SessionManager>,
        gateway: Arc<LocalGateway>,
    }

    fn fixture() -> Fixture {
        let sessions = Arc::new(SessionManager::new(
            Arc::new(MemorySessionStore::new()),
            &ServerSettings::default(),
        ));
        let gateway = Arc::new(LocalGateway::new());
        let manager = ConnectionManager::new(sessions.clone(), gateway.clone());
        Fixture {
            manager,
            sessions,
            gateway,
        }
    }

    async fn seed_session(sessions: &SessionManager, id: &str) -> SessionId {
        let sid = SessionId::from(id);
        let _ = sessions.save(SessionPatch::new(sid.clone())).await.unwrap();
        sid
    }

    #[tokio::test]
    async fn connect_binds_connection() {
        let f = fixture();
        let sid = seed_session(&f.sessions, "s1").await;
        f.manager
            .on_connect(&sid, ConnectionId::from("c1"))
            .await
            .unwrap();
        let bound = f.manager.connection_for(&sid).await.unwrap();
        assert_eq!(bound.as_str(), "c1");
    }

    #[tokio::test]
    async fn connect_with_unknown_session_rejected() {
        let f = fixture();
        let err = f
            .manager
            .on_connect(&SessionId::from("ghost"), ConnectionId::from("c1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), classify_core::errors::INVALID_SESSION);
    }

    #[tokio::test]
    async fn reconnect_overwrites_binding() {
        let f = fixture();
        let sid = seed_session(&f.sessions, "s1").await;
        f.manager
            .on_connect(&sid, ConnectionId::from("c1"))
            .await
            .unwrap();
        f.manager
            .on_connect(&sid, ConnectionId::from("c2"))
            .await
            .unwrap();
        let bound = f.manager.connection_for(&sid).await.unwrap();
        assert_eq!(bound.as_str(), "c2");
    }

    #[tokio::test]
    async fn disconnect_unbinds() {
        let f = fixture();
        let sid = seed_session(&f.sessions, "s1").await;
        f.manager
            .on_connect(&sid, ConnectionId::from("c1"))
            .await
            .unwrap();
        f.manager.on_disconnect(&sid).await;

        let err = f.manager.connection_for(&sid).await.unwrap_err();
        assert_eq!(
            err.code(),
            classify_core::errors::HANDSHAKE_NOT_ESTABLISHED
        );
    }

    #[tokio::test]
    async fn disconnect_for_unknown_session_is_silent() {
        let f = fixture();
        f.manager.on_disconnect(&SessionId::from("ghost")).await;
        // No row was created as a side effect
        assert!(f.sessions.sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_delivers_serialized_envelope() {
        let f = fixture();
        let sid = seed_session(&f.sessions, "s1").await;
        f.manager
            .on_connect(&sid, ConnectionId::from("c1"))
            .await
            .unwrap();

        let (tx, mut rx) = mpsc::channel(8);
        f.gateway.register(ConnectionId::from("c1"), tx).await;

        let envelope =
            RequestEnvelope::new("Mirror", "setCount", vec![json!(3)], sid.as_str());
        f.manager.push(&sid, &envelope).await.unwrap();

        let payload = rx.recv().await.unwrap();
        let back: RequestEnvelope = serde_json::from_str(&payload).unwrap();
        assert_eq!(back.method_key(), "Mirror.setCount");
        assert_eq!(back.args[0], 3);
    }

    #[tokio::test]
    async fn push_without_binding_fails() {
        let f = fixture();
        let sid = seed_session(&f.sessions, "s1").await;
        let envelope = RequestEnvelope::new("Mirror", "setCount", vec![], sid.as_str());
        let err = f.manager.push(&sid, &envelope).await.unwrap_err();
        assert_eq!(
            err.code(),
            classify_core::errors::HANDSHAKE_NOT_ESTABLISHED
        );
    }

    #[tokio::test]
    async fn push_to_gone_connection_is_delivery_failed() {
        let f = fixture();
        let sid = seed_session(&f.sessions, "s1").await;
        f.manager
            .on_connect(&sid, ConnectionId::from("c1"))
            .await
            .unwrap();
        // Connection bound in the store but never registered with the gateway

        let envelope = RequestEnvelope::new("Mirror", "setCount", vec![], sid.as_str());
        let err = f.manager.push(&sid, &envelope).await.unwrap_err();
        assert_eq!(err.code(), classify_core::errors::DELIVERY_FAILED);
    }
}
