//! Local Axum host standing in for the hosted HTTP and WebSocket gateways.
//!
//! Mirrors the deployed wiring: `POST /api/dispatch` plays the HTTP
//! invocation route in front of the [`RequestDispatcher`], and `GET /ws`
//! plays the WebSocket gateway: the session id arrives as the
//! `sec-websocket-protocol` token, is validated against the store, and is
//! echoed back in the accept. Pushes flow through the [`LocalGateway`] into
//! each socket's write task.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use classify_core::envelope::ResponseEnvelope;
use classify_core::ids::{ConnectionId, RequestId, SessionId};
use classify_settings::ServerSettings;
use classify_store::SessionStore;

use crate::connection::ConnectionManager;
use crate::context::{InvocationContext, ServerContext};
use crate::dispatcher::RequestDispatcher;
use crate::gateway::LocalGateway;
use crate::registry::InterfaceRegistry;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
struct AppState {
    dispatcher: Arc<RequestDispatcher>,
    connections: Arc<ConnectionManager>,
    gateway: Arc<LocalGateway>,
}

/// The offline server host.
pub struct OfflineHost {
    ctx: Arc<ServerContext>,
    gateway: Arc<LocalGateway>,
    dispatcher: Arc<RequestDispatcher>,
}

impl OfflineHost {
    /// Assemble a host from a populated registry, a store, and settings.
    pub fn new(
        registry: InterfaceRegistry,
        store: Arc<dyn SessionStore>,
        settings: ServerSettings,
    ) -> Self {
        let gateway = Arc::new(LocalGateway::new());
        let ctx = Arc::new(ServerContext::new(
            registry,
            store,
            gateway.clone(),
            settings,
        ));
        let dispatcher = Arc::new(RequestDispatcher::new(ctx.clone()));
        Self {
            ctx,
            gateway,
            dispatcher,
        }
    }

    /// The process-wide context this host serves.
    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: self.dispatcher.clone(),
            connections: self.ctx.connections().clone(),
            gateway: self.gateway.clone(),
        };

        Router::new()
            .route("/api/dispatch", post(dispatch_handler))
            .route("/ws", get(ws_handler))
            .with_state(state)
    }

    /// Bind the configured host/port (port `0` auto-assigns) and serve.
    ///
    /// Updates the context's advertised socket URL to the bound address so
    /// the authorization handshake hands out a reachable endpoint.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
        let settings = self.ctx.settings();
        let listener =
            tokio::net::TcpListener::bind(format!("{}:{}", settings.host, settings.port)).await?;
        let addr = listener.local_addr()?;
        self.ctx.set_socket_url(format!("ws://{addr}/ws"));
        debug!(%addr, "offline host listening");

        let app = self.router();
        let handle = tokio::spawn(async move {
            if let Err(err) = axum::serve(listener, app).await {
                error!(error = %err, "offline host stopped");
            }
        });
        Ok((addr, handle))
    }
}

/// POST /api/dispatch — the HTTP invocation route.
///
/// Always answers 200 with a response envelope; top-level dispatch errors
/// (routing, authorization, store) are encoded as an internal-error
/// envelope the way the hosted wrapper does it.
async fn dispatch_handler(State(state): State<AppState>, body: String) -> String {
    let invocation = InvocationContext::new(RequestId::new());
    match state.dispatcher.dispatch(&body, &invocation).await {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, code = err.code(), "dispatch failed");
            let response = ResponseEnvelope::fault(format!("Internal Server Error ({err})"), "");
            serde_json::to_string(&response).unwrap_or_else(|e| {
                error!(error = %e, "failed to serialize error envelope");
                String::new()
            })
        }
    }
}

/// GET /ws — the WebSocket gateway route.
///
/// The session id travels in the `sec-websocket-protocol` header and must
/// be echoed back for the browser handshake to complete. An id that does
/// not resolve to a session rejects the upgrade.
async fn ws_handler(
    State(state): State<AppState>,
    ws: WebSocketUpgrade,
    headers: HeaderMap,
) -> Response {
    let Some(token) = headers
        .get("sec-websocket-protocol")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    else {
        warn!("socket connect without session token");
        return (StatusCode::BAD_REQUEST, "missing sec-websocket-protocol").into_response();
    };

    let session_id = SessionId::from(token);
    let connection_id = ConnectionId::new();
    if let Err(err) = state
        .connections
        .on_connect(&session_id, connection_id.clone())
        .await
    {
        warn!(error = %err, "rejecting socket upgrade");
        return (StatusCode::INTERNAL_SERVER_ERROR, "invalid session").into_response();
    }

    // Register the write channel before answering the upgrade so a push
    // issued right after the client sees the open ack cannot outrun it.
    let (tx, rx) = mpsc::channel::<String>(32);
    state.gateway.register(connection_id.clone(), tx).await;

    let protocol = token.to_owned();
    ws.protocols([protocol])
        .on_upgrade(move |socket| handle_socket(socket, state, session_id, connection_id, rx))
}

/// Pump pushes into the socket and watch for close.
async fn handle_socket(
    socket: WebSocket,
    state: AppState,
    session_id: SessionId,
    connection_id: ConnectionId,
    mut rx: mpsc::Receiver<String>,
) {
    debug!(session_id = %session_id, connection_id = %connection_id, "socket open");

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            payload = rx.recv() => match payload {
                Some(payload) => {
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            inbound = stream.next() => match inbound {
                // Inbound frames are not part of the protocol; pushes are
                // one-way and requests travel over HTTP.
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    state.gateway.unregister(&connection_id).await;
    state.connections.on_disconnect(&session_id).await;
    debug!(session_id = %session_id, connection_id = %connection_id, "socket closed");
}
