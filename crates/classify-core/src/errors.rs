//! Error taxonomy with stable machine-readable code strings.

use thiserror::Error;

// ── Error code constants ────────────────────────────────────────────

/// Interface name not present in the registry.
pub const UNKNOWN_INTERFACE: &str = "UNKNOWN_INTERFACE";
/// Method not declared on the resolved interface.
pub const UNKNOWN_METHOD: &str = "UNKNOWN_METHOD";
/// The interface's authorizer rejected the call.
pub const NOT_AUTHORIZED: &str = "NOT_AUTHORIZED";
/// Session id did not resolve against the store.
pub const INVALID_SESSION: &str = "INVALID_SESSION";
/// Session exists but no socket connection is bound to it.
pub const HANDSHAKE_NOT_ESTABLISHED: &str = "HANDSHAKE_NOT_ESTABLISHED";
/// The remote method body raised; message forwarded verbatim.
pub const REMOTE_INVOCATION: &str = "REMOTE_INVOCATION";
/// The gateway could not reach the bound connection.
pub const DELIVERY_FAILED: &str = "DELIVERY_FAILED";
/// The socket open acknowledgment did not arrive in time.
pub const HANDSHAKE_TIMEOUT: &str = "HANDSHAKE_TIMEOUT";
/// Envelope could not be encoded or decoded.
pub const CODEC: &str = "CODEC";
/// Network-level failure, propagated unchanged.
pub const TRANSPORT: &str = "TRANSPORT";
/// The session store collaborator failed.
pub const STORE: &str = "STORE";

/// Errors raised by the classify framework.
///
/// Routing and authorization failures abort a dispatch call outright;
/// method-body failures travel in the response envelope and surface on the
/// calling stub as [`ClassifyError::RemoteInvocation`].
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// No interface registered under this name.
    #[error("no interface registered for '{interface}'")]
    UnknownInterface {
        /// The unresolved interface name.
        interface: String,
    },

    /// Method not declared on the interface.
    #[error("'{method}' not declared on interface '{interface}'")]
    UnknownMethod {
        /// The resolved interface name.
        interface: String,
        /// The undeclared method name.
        method: String,
    },

    /// The configured authorizer returned `false`; the method never ran.
    #[error("not authorized: {interface}.{method}")]
    NotAuthorized {
        /// Interface of the rejected call.
        interface: String,
        /// Method of the rejected call.
        method: String,
    },

    /// A valid session was required but the id did not resolve.
    #[error("invalid session id '{session_id}'")]
    InvalidSession {
        /// The unresolved session id.
        session_id: String,
    },

    /// The session exists but no socket connection is bound to it.
    #[error("websocket handshake not established for session '{session_id}'")]
    HandshakeNotEstablished {
        /// The session without a bound connection.
        session_id: String,
    },

    /// The remote method body raised; message carried verbatim.
    #[error("{message}")]
    RemoteInvocation {
        /// The remote error message.
        message: String,
    },

    /// The gateway reported the bound connection gone or unreachable.
    #[error("delivery failed for connection '{connection_id}': {message}")]
    DeliveryFailed {
        /// The stale connection id.
        connection_id: String,
        /// Gateway failure detail.
        message: String,
    },

    /// The socket open acknowledgment did not arrive within the bound.
    #[error("websocket open timed out")]
    HandshakeTimeout,

    /// Envelope encode/decode failure.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),

    /// Network-level failure, propagated unchanged.
    #[error("transport error: {message}")]
    Transport {
        /// Underlying transport detail.
        message: String,
    },

    /// The session store collaborator failed.
    #[error("store error: {message}")]
    Store {
        /// Underlying store detail.
        message: String,
    },
}

impl ClassifyError {
    /// Machine-readable error code for this variant.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnknownInterface { .. } => UNKNOWN_INTERFACE,
            Self::UnknownMethod { .. } => UNKNOWN_METHOD,
            Self::NotAuthorized { .. } => NOT_AUTHORIZED,
            Self::InvalidSession { .. } => INVALID_SESSION,
            Self::HandshakeNotEstablished { .. } => HANDSHAKE_NOT_ESTABLISHED,
            Self::RemoteInvocation { .. } => REMOTE_INVOCATION,
            Self::DeliveryFailed { .. } => DELIVERY_FAILED,
            Self::HandshakeTimeout => HANDSHAKE_TIMEOUT,
            Self::Codec(_) => CODEC,
            Self::Transport { .. } => TRANSPORT,
            Self::Store { .. } => STORE,
        }
    }
}
