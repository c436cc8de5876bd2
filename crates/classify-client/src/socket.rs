//! Client socket manager.
//!
//! `connect` runs the `$WebSocket.$authorize` pseudo-call over the HTTP
//! path to obtain the socket endpoint and session id, then opens a
//! WebSocket presenting the session id as the sub-protocol token. The open
//! wait is bounded; on timeout the state stays CLOSED and the caller may
//! retry. Inbound pushes are handled one at a time.

use futures::StreamExt;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::Message;
use tracing::{debug, warn};

use classify_core::envelope::RequestEnvelope;
use classify_core::errors::ClassifyError;

use crate::client::ClassifyClient;

/// Socket lifecycle state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SocketPhase {
    /// No socket; `connect` may be issued.
    Closed,
    /// Handshake or socket open in flight.
    Handshaking,
    /// Socket open and reading.
    Open,
}

fn transport(err: impl std::fmt::Display) -> ClassifyError {
    ClassifyError::Transport {
        message: err.to_string(),
    }
}

impl ClassifyClient {
    /// Establish the push channel.
    ///
    /// No-op when a socket is already open or a connect is in flight. On
    /// any failure the state returns to CLOSED and a fresh `connect` must
    /// be issued by the caller.
    pub async fn connect(&self) -> Result<(), ClassifyError> {
        {
            let mut phase = self.inner.phase.lock();
            if *phase != SocketPhase::Closed {
                debug!(?phase, "connect is a no-op");
                return Ok(());
            }
            *phase = SocketPhase::Handshaking;
        }

        match self.connect_inner().await {
            Ok(()) => Ok(()),
            Err(err) => {
                *self.inner.phase.lock() = SocketPhase::Closed;
                Err(err)
            }
        }
    }

    async fn connect_inner(&self) -> Result<(), ClassifyError> {
        // Handshake: trade the (possibly empty) session id for the socket
        // endpoint and a server-assigned session id.
        let handshake = RequestEnvelope::handshake(self.inner.session_id());
        let data = self.inner.post_envelope(&handshake).await?;
        let socket_url = data
            .as_str()
            .ok_or_else(|| transport("handshake returned no socket endpoint"))?
            .to_owned();
        let session_id = self.inner.session_id();
        debug!(socket_url, session_id, "handshake complete, opening socket");

        let mut request = socket_url
            .as_str()
            .into_client_request()
            .map_err(transport)?;
        let _ = request.headers_mut().insert(
            "sec-websocket-protocol",
            HeaderValue::from_str(&session_id).map_err(transport)?,
        );

        let connect = connect_async(request);
        let (socket, _response) = tokio::time::timeout(self.inner.open_timeout, connect)
            .await
            .map_err(|_| ClassifyError::HandshakeTimeout)?
            .map_err(transport)?;

        *self.inner.phase.lock() = SocketPhase::Open;
        let connected = self.inner.connect_cb.lock().clone();
        if let Some(callback) = connected {
            callback();
        }

        // Reader task: one message at a time, push routing via the handler
        // table; error or close drops to CLOSED and fires the disconnect
        // callback.
        let inner = self.inner.clone();
        let mut socket = socket;
        let _ = tokio::spawn(async move {
            while let Some(message) = socket.next().await {
                match message {
                    Ok(Message::Text(text)) => inner.dispatch_push(&text).await,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(err) => {
                        warn!(error = %err, "socket read failed");
                        break;
                    }
                }
            }
            *inner.phase.lock() = SocketPhase::Closed;
            debug!("socket closed");
            let disconnected = inner.disconnect_cb.lock().clone();
            if let Some(callback) = disconnected {
                callback();
            }
        });

        Ok(())
    }
}
