//! Process-wide server context and per-call provenance.

use std::sync::Arc;

use parking_lot::RwLock;

use classify_core::errors::ClassifyError;
use classify_core::ids::{ConnectionId, RequestId, SessionId, UserId};
use classify_core::interface::InterfaceDescriptor;
use classify_settings::ServerSettings;
use classify_store::SessionStore;

use crate::connection::ConnectionManager;
use crate::gateway::ConnectionGateway;
use crate::registry::InterfaceRegistry;
use crate::session::SessionManager;
use crate::stub::PushStub;

/// Everything the server side shares across invocations.
///
/// Constructed once at startup and passed explicitly into the dispatcher,
/// the connection manager, and the offline host. There are no module-level
/// singletons.
pub struct ServerContext {
    registry: InterfaceRegistry,
    sessions: Arc<SessionManager>,
    connections: Arc<ConnectionManager>,
    settings: ServerSettings,
    socket_url: RwLock<String>,
}

impl ServerContext {
    /// Assemble the context from its collaborators.
    pub fn new(
        registry: InterfaceRegistry,
        store: Arc<dyn SessionStore>,
        gateway: Arc<dyn ConnectionGateway>,
        settings: ServerSettings,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(store, &settings));
        let connections = Arc::new(ConnectionManager::new(sessions.clone(), gateway));
        let socket_url = RwLock::new(settings.socket_url());
        Self {
            registry,
            sessions,
            connections,
            settings,
            socket_url,
        }
    }

    /// The interface registry.
    pub fn registry(&self) -> &InterfaceRegistry {
        &self.registry
    }

    /// The session lifecycle manager.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// The connection manager.
    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    /// Server settings.
    pub fn settings(&self) -> &ServerSettings {
        &self.settings
    }

    /// The socket URL handed out by the authorization handshake.
    pub fn socket_url(&self) -> String {
        self.socket_url.read().clone()
    }

    /// Replace the advertised socket URL (set by the offline host once the
    /// actual port is bound).
    pub fn set_socket_url(&self, url: impl Into<String>) {
        *self.socket_url.write() = url.into();
    }
}

/// Identity of one hosting-platform invocation.
///
/// The request id seeds newly minted session ids, mirroring the platform's
/// per-invocation unique identifier.
#[derive(Clone, Debug)]
pub struct InvocationContext {
    request_id: RequestId,
}

impl InvocationContext {
    /// Wrap the platform's unique request identifier.
    pub fn new(request_id: RequestId) -> Self {
        Self { request_id }
    }

    /// The invocation's unique request identifier.
    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }
}

/// Per-call provenance handed to a responder method body.
///
/// Carries the hydrated session's identifiers (kept outside the serialized
/// business state) plus the handles needed to reach other sessions and to
/// build push stubs.
pub struct CallContext {
    session_id: SessionId,
    connection_id: Option<ConnectionId>,
    user_id: Option<UserId>,
    sessions: Arc<SessionManager>,
    connections: Arc<ConnectionManager>,
}

impl CallContext {
    pub(crate) fn new(
        session_id: SessionId,
        connection_id: Option<ConnectionId>,
        user_id: Option<UserId>,
        sessions: Arc<SessionManager>,
        connections: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            session_id,
            connection_id,
            user_id,
            sessions,
            connections,
        }
    }

    /// The session this call is hydrated under.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The socket connection bound to this session, if any.
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// The user this session is tagged with, if any.
    pub fn user_id(&self) -> Option<&UserId> {
        self.user_id.as_ref()
    }

    /// Tag the session with a user id; persisted with the post-invocation
    /// state write.
    pub fn set_user_id(&mut self, user_id: UserId) {
        self.user_id = Some(user_id);
    }

    /// The session lifecycle manager, for user queries and bulk deletes.
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Build a push stub back to this call's own session.
    ///
    /// Fails when the session has no bound socket connection.
    pub fn push_stub(&self, descriptor: &InterfaceDescriptor) -> Result<PushStub, ClassifyError> {
        let connection_id = self.connection_id.clone().ok_or_else(|| {
            ClassifyError::HandshakeNotEstablished {
                session_id: self.session_id.as_str().to_owned(),
            }
        })?;
        Ok(PushStub::new(
            descriptor.clone(),
            self.session_id.clone(),
            connection_id,
            self.connections.gateway().clone(),
        ))
    }

    /// Build a push stub targeting another session, resolving its bound
    /// connection from the store.
    pub async fn push_stub_for_session(
        &self,
        descriptor: &InterfaceDescriptor,
        session_id: &SessionId,
    ) -> Result<PushStub, ClassifyError> {
        let connection_id = self.connections.connection_for(session_id).await?;
        Ok(PushStub::new(
            descriptor.clone(),
            session_id.clone(),
            connection_id,
            self.connections.gateway().clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{make_call_context, make_server_context};
    use classify_core::interface::InterfaceDescriptor;

    #[test]
    fn socket_url_defaults_from_settings() {
        let ctx = make_server_context();
        assert!(ctx.socket_url().starts_with("ws://"));
    }

    #[test]
    fn set_socket_url_overrides() {
        let ctx = make_server_context();
        ctx.set_socket_url("ws://127.0.0.1:9999/ws");
        assert_eq!(ctx.socket_url(), "ws://127.0.0.1:9999/ws");
    }

    #[test]
    fn push_stub_without_connection_fails() {
        let cx = make_call_context("sess_1");
        let descriptor = InterfaceDescriptor::new("Mirror", ["setCount"]);
        let err = cx.push_stub(&descriptor).unwrap_err();
        assert_eq!(err.code(), classify_core::errors::HANDSHAKE_NOT_ESTABLISHED);
    }

    #[test]
    fn set_user_id_is_visible() {
        let mut cx = make_call_context("sess_1");
        assert!(cx.user_id().is_none());
        cx.set_user_id(UserId::from("u1"));
        assert_eq!(cx.user_id().unwrap().as_str(), "u1");
    }

    #[tokio::test]
    async fn push_stub_for_unknown_session_fails() {
        let cx = make_call_context("sess_1");
        let descriptor = InterfaceDescriptor::new("Mirror", ["setCount"]);
        let err = cx
            .push_stub_for_session(&descriptor, &SessionId::from("ghost"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), classify_core::errors::INVALID_SESSION);
    }
}
