//! Client facade: HTTP envelope transport, session affinity, handler
//! table, and side-channel listeners.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, warn};

use classify_core::envelope::{RequestEnvelope, ResponseEnvelope};
use classify_core::errors::ClassifyError;
use classify_core::interface::InterfaceDescriptor;
use classify_settings::ClientSettings;

use crate::handlers::PushHandler;
use crate::socket::SocketPhase;
use crate::stub::RequestStub;

/// Client construction options.
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// URL request envelopes are POSTed to.
    pub dispatch_url: String,
    /// Bound on waiting for the socket open acknowledgment.
    pub open_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from(&ClientSettings::default())
    }
}

impl From<&ClientSettings> for ClientConfig {
    fn from(settings: &ClientSettings) -> Self {
        Self {
            dispatch_url: settings.dispatch_url.clone(),
            open_timeout: Duration::from_millis(settings.open_timeout_ms),
        }
    }
}

type Callback = Arc<dyn Fn() + Send + Sync>;
type CargoListener = Arc<dyn Fn(Value) + Send + Sync>;

pub(crate) struct ClientInner {
    http: reqwest::Client,
    dispatch_url: String,
    pub(crate) open_timeout: Duration,
    session_id: Mutex<String>,
    handlers: RwLock<HashMap<String, Arc<dyn PushHandler>>>,
    cargo_listener: Mutex<Option<CargoListener>>,
    pub(crate) connect_cb: Mutex<Option<Callback>>,
    pub(crate) disconnect_cb: Mutex<Option<Callback>>,
    pub(crate) phase: Mutex<SocketPhase>,
}

/// A classify client: one session, one optional socket, any number of
/// request stubs. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ClassifyClient {
    pub(crate) inner: Arc<ClientInner>,
}

impl ClassifyClient {
    /// Create a client posting to `config.dispatch_url`.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                http: reqwest::Client::new(),
                dispatch_url: config.dispatch_url,
                open_timeout: config.open_timeout,
                session_id: Mutex::new(String::new()),
                handlers: RwLock::new(HashMap::new()),
                cargo_listener: Mutex::new(None),
                connect_cb: Mutex::new(None),
                disconnect_cb: Mutex::new(None),
                phase: Mutex::new(SocketPhase::Closed),
            }),
        }
    }

    /// The current session id (empty until the server assigns one).
    pub fn session_id(&self) -> String {
        self.inner.session_id.lock().clone()
    }

    /// Seed the session id (e.g. restored from the embedding app's storage).
    pub fn set_session_id(&self, session_id: impl Into<String>) {
        *self.inner.session_id.lock() = session_id.into();
    }

    /// Build a request stub for `descriptor`.
    pub fn request_stub(&self, descriptor: InterfaceDescriptor) -> RequestStub {
        RequestStub::new(descriptor, self.inner.clone())
    }

    /// Install `handler` for every method `descriptor` declares.
    ///
    /// Inbound pushes route by `interfaceName.methodName`; only declared
    /// methods are installed, so undeclared pushes are dropped.
    pub fn register_response(
        &self,
        descriptor: &InterfaceDescriptor,
        handler: impl PushHandler + 'static,
    ) {
        let handler: Arc<dyn PushHandler> = Arc::new(handler);
        let mut table = self.inner.handlers.write();
        for method in &descriptor.methods {
            debug!(key = descriptor.method_key(method), "push handler installed");
            let _ = table.insert(descriptor.method_key(method), handler.clone());
        }
    }

    /// Receive `cargo` side-channel payloads from responses.
    pub fn set_cargo_listener(&self, listener: impl Fn(Value) + Send + Sync + 'static) {
        *self.inner.cargo_listener.lock() = Some(Arc::new(listener));
    }

    /// Run `callback` when the socket opens.
    pub fn on_connect(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.inner.connect_cb.lock() = Some(Arc::new(callback));
    }

    /// Run `callback` when the socket errors or closes.
    pub fn on_disconnect(&self, callback: impl Fn() + Send + Sync + 'static) {
        *self.inner.disconnect_cb.lock() = Some(Arc::new(callback));
    }

    /// Whether the socket is currently open.
    pub fn is_open(&self) -> bool {
        *self.inner.phase.lock() == SocketPhase::Open
    }
}

impl ClientInner {
    /// POST an envelope and decode the response.
    ///
    /// Applies the shared stub behavior: session affinity (a response's
    /// session id replaces the local one), `exception` → verbatim
    /// `RemoteInvocation`, and `cargo` delivery before returning.
    pub(crate) async fn post_envelope(
        &self,
        envelope: &RequestEnvelope,
    ) -> Result<Value, ClassifyError> {
        let body = serde_json::to_string(envelope)?;
        debug!(method_key = envelope.method_key(), "posting request");

        let raw = self
            .http
            .post(&self.dispatch_url)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|err| ClassifyError::Transport {
                message: err.to_string(),
            })?;
        let text = raw.text().await.map_err(|err| ClassifyError::Transport {
            message: err.to_string(),
        })?;
        let response: ResponseEnvelope = serde_json::from_str(&text)?;

        if !response.session_id.is_empty() {
            *self.session_id.lock() = response.session_id.clone();
        }

        if let Some(exception) = response.exception {
            debug!(method_key = envelope.method_key(), "response carried exception");
            return Err(ClassifyError::RemoteInvocation { message: exception });
        }

        if let Some(cargo) = response.cargo {
            let listener = self.cargo_listener.lock().clone();
            if let Some(listener) = listener {
                listener(cargo);
            }
        }

        Ok(response.data.unwrap_or(Value::Null))
    }

    /// The current session id.
    pub(crate) fn session_id(&self) -> String {
        self.session_id.lock().clone()
    }

    /// Route one inbound push payload. Unparseable payloads and unknown
    /// method keys are logged and dropped, never raised.
    pub(crate) async fn dispatch_push(&self, payload: &str) {
        let envelope: RequestEnvelope = match serde_json::from_str(payload) {
            Ok(envelope) => envelope,
            Err(err) => {
                warn!(error = %err, "dropping unparseable push");
                return;
            }
        };
        let key = envelope.method_key();
        let handler = self.handlers.read().get(&key).cloned();
        match handler {
            Some(handler) => {
                debug!(key, "push dispatched");
                handler.handle(&envelope.method_name, &envelope.args).await;
            }
            None => debug!(key, "unknown push, dropping"),
        }
    }
}
