//! Server-side push stubs: call a client's interface over its open socket.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument};

use classify_core::envelope::RequestEnvelope;
use classify_core::errors::ClassifyError;
use classify_core::ids::{ConnectionId, SessionId};
use classify_core::interface::InterfaceDescriptor;

use crate::gateway::ConnectionGateway;

/// A callable proxy for one client interface, bound to a session and its
/// socket connection.
///
/// Built via [`crate::CallContext::push_stub`] or
/// [`crate::CallContext::push_stub_for_session`]; construction already
/// guarantees a bound connection. Pushes are fire-and-forget: there is no
/// response envelope to await.
pub struct PushStub {
    descriptor: InterfaceDescriptor,
    session_id: SessionId,
    connection_id: ConnectionId,
    gateway: Arc<dyn ConnectionGateway>,
}

impl std::fmt::Debug for PushStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushStub")
            .field("descriptor", &self.descriptor)
            .field("session_id", &self.session_id)
            .field("connection_id", &self.connection_id)
            .finish_non_exhaustive()
    }
}

impl PushStub {
    pub(crate) fn new(
        descriptor: InterfaceDescriptor,
        session_id: SessionId,
        connection_id: ConnectionId,
        gateway: Arc<dyn ConnectionGateway>,
    ) -> Self {
        Self {
            descriptor,
            session_id,
            connection_id,
            gateway,
        }
    }

    /// The session this stub pushes to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The physical connection this stub pushes through.
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    /// Marshal `args` into a push envelope and deliver it.
    #[instrument(skip(self, args), fields(interface = %self.descriptor.name, method))]
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<(), ClassifyError> {
        if !self.descriptor.has_method(method) {
            return Err(ClassifyError::UnknownMethod {
                interface: self.descriptor.name.clone(),
                method: method.to_owned(),
            });
        }
        let envelope = RequestEnvelope::new(
            self.descriptor.name.clone(),
            method,
            args,
            self.session_id.as_str(),
        );
        let payload = serde_json::to_string(&envelope)?;
        debug!(connection_id = %self.connection_id, "pushing to client");
        self.gateway
            .post_to_connection(&self.connection_id, &payload)
            .await
            .map_err(|err| err.into_classify(&self.connection_id))
    }
}
