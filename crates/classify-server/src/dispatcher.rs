//! Request dispatch: decode, route, authorize, hydrate, invoke, persist.
//!
//! One `dispatch` call is one hosting-platform invocation. Routing and
//! authorization failures abort the call and surface to the hosting layer;
//! method-body faults are captured into the response envelope instead.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use classify_core::envelope::{RequestEnvelope, ResponseEnvelope};
use classify_core::errors::ClassifyError;
use classify_core::ids::SessionId;
use classify_store::SessionPatch;

use crate::context::{CallContext, InvocationContext, ServerContext};

/// Entry point for inbound HTTP invocations.
pub struct RequestDispatcher {
    ctx: Arc<ServerContext>,
}

impl RequestDispatcher {
    /// Create a dispatcher over the process-wide context.
    pub fn new(ctx: Arc<ServerContext>) -> Self {
        Self { ctx }
    }

    /// Dispatch one raw request envelope; returns the raw response envelope.
    ///
    /// The flow: decode, handshake special case, resolve interface and
    /// method, authorize, hydrate session state, invoke, capture faults,
    /// persist under the debounce policy, encode.
    #[instrument(skip_all, fields(method_key))]
    pub async fn dispatch(
        &self,
        body: &str,
        invocation: &InvocationContext,
    ) -> Result<String, ClassifyError> {
        let envelope: RequestEnvelope = serde_json::from_str(body)?;
        let method_key = envelope.method_key();
        let _ = tracing::Span::current().record("method_key", method_key.as_str());
        counter!("dispatch_requests_total", "method" => method_key.clone()).increment(1);

        // Pseudo-call that trades a session id for the socket endpoint,
        // ahead of the WebSocket connect.
        if envelope.is_handshake() {
            return self.authorize_socket(&envelope, invocation).await;
        }

        let entry = self
            .ctx
            .registry()
            .get(&envelope.interface_name)
            .ok_or_else(|| {
                counter!("dispatch_errors_total", "method" => method_key.clone(), "error_type" => "unknown_interface").increment(1);
                ClassifyError::UnknownInterface {
                    interface: envelope.interface_name.clone(),
                }
            })?;
        if !entry.descriptor().has_method(&envelope.method_name) {
            counter!("dispatch_errors_total", "method" => method_key.clone(), "error_type" => "unknown_method").increment(1);
            return Err(ClassifyError::UnknownMethod {
                interface: envelope.interface_name.clone(),
                method: envelope.method_name.clone(),
            });
        }

        if let Some(authorizer) = entry.authorizer() {
            let allowed = authorizer
                .authorize(&envelope.interface_name, &envelope.method_name, &envelope.args)
                .await;
            if !allowed {
                warn!("call not authorized");
                counter!("dispatch_errors_total", "method" => method_key.clone(), "error_type" => "not_authorized").increment(1);
                return Err(ClassifyError::NotAuthorized {
                    interface: envelope.interface_name.clone(),
                    method: envelope.method_name.clone(),
                });
            }
        }

        // Hydration: an unresolved session id (expired, bogus, or empty)
        // silently becomes a fresh session keyed by the invocation's
        // request id.
        let mut session_id = SessionId::from(envelope.session_id.as_str());
        let prior = self
            .ctx
            .sessions()
            .get(&session_id, &envelope.interface_name)
            .await?;
        if prior.is_none() {
            session_id = SessionId::from(invocation.request_id().as_str());
        }
        let prior_blob = prior
            .as_ref()
            .and_then(|row| row.blob(&envelope.interface_name).map(ToOwned::to_owned));
        let mut object = entry.hydrate(prior_blob.as_deref())?;
        let mut cx = CallContext::new(
            session_id.clone(),
            prior.as_ref().and_then(|row| row.connection_id.clone()),
            prior.as_ref().and_then(|row| row.user_id.clone()),
            self.ctx.sessions().clone(),
            self.ctx.connections().clone(),
        );

        debug!("invoking");
        let started = Instant::now();
        let outcome = object
            .invoke(&envelope.method_name, &envelope.args, &mut cx)
            .await;
        histogram!("dispatch_duration_seconds", "method" => method_key.clone())
            .record(started.elapsed().as_secs_f64());

        let response = match outcome {
            Err(fault) => {
                warn!(error = %fault, "method body raised");
                counter!("dispatch_faults_total", "method" => method_key.clone()).increment(1);
                ResponseEnvelope::fault(fault.message, session_id.as_str())
            }
            Ok(data) => {
                let new_blob = object.snapshot()?;
                if self
                    .ctx
                    .sessions()
                    .needs_write(prior.as_ref(), prior_blob.as_deref(), &new_blob)
                {
                    let mut patch = SessionPatch::new(session_id.clone())
                        .with_blob(envelope.interface_name.clone(), new_blob)
                        .with_ttl_minutes(self.ctx.sessions().expiry_minutes());
                    if let Some(user_id) = cx.user_id() {
                        patch = patch.with_user(user_id.clone());
                    }
                    session_id = self.ctx.sessions().save(patch).await?;
                } else {
                    debug!("persist skipped by debounce");
                }
                let data = (data != Value::Null).then_some(data);
                ResponseEnvelope::success(data, session_id.as_str())
            }
        };

        Ok(serde_json::to_string(&response)?)
    }

    /// Handle `$WebSocket.$authorize`: ensure a session row exists and hand
    /// back the socket endpoint plus the session id the client must present
    /// as its sub-protocol token on connect.
    async fn authorize_socket(
        &self,
        envelope: &RequestEnvelope,
        invocation: &InvocationContext,
    ) -> Result<String, ClassifyError> {
        let mut session_id = SessionId::from(envelope.session_id.as_str());
        let existing = self.ctx.sessions().get_meta(&session_id).await?;
        if existing.is_none() {
            session_id = SessionId::from(invocation.request_id().as_str());
            let _ = self
                .ctx
                .sessions()
                .save(
                    SessionPatch::new(session_id.clone())
                        .with_ttl_minutes(self.ctx.sessions().expiry_minutes()),
                )
                .await?;
            debug!(session_id = %session_id, "minted session for socket handshake");
        }
        let response = ResponseEnvelope::success(
            Some(Value::String(self.ctx.socket_url())),
            session_id.as_str(),
        );
        Ok(serde_json::to_string(&response)?)
    }
}
