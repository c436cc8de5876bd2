//! Client-side request stubs.

use std::sync::Arc;

use serde_json::Value;
use tracing::instrument;

use classify_core::envelope::RequestEnvelope;
use classify_core::errors::ClassifyError;
use classify_core::interface::InterfaceDescriptor;

use crate::client::ClientInner;

/// A callable proxy for one server interface.
///
/// Each call marshals its args into a request envelope carrying the
/// client's current session id, POSTs it, and unmarshals the response. A
/// response's `exception` re-raises as `RemoteInvocation`; transport
/// failures propagate unchanged; there is no retry.
pub struct RequestStub {
    descriptor: InterfaceDescriptor,
    client: Arc<ClientInner>,
}

impl RequestStub {
    pub(crate) fn new(descriptor: InterfaceDescriptor, client: Arc<ClientInner>) -> Self {
        Self { descriptor, client }
    }

    /// The interface this stub proxies.
    pub fn descriptor(&self) -> &InterfaceDescriptor {
        &self.descriptor
    }

    /// Invoke `method` with `args` over HTTP.
    #[instrument(skip(self, args), fields(interface = %self.descriptor.name, method))]
    pub async fn call(&self, method: &str, args: Vec<Value>) -> Result<Value, ClassifyError> {
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
            self.client.session_id(),
        );
        self.client.post_envelope(&envelope).await
    }
}
