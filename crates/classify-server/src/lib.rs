//! # classify-server
//!
//! Server half of the classify RPC framework.
//!
//! - **Interface registry**: explicit descriptors mapped to responder
//!   factories and optional authorizers, populated once at startup
//! - **Request dispatcher**: envelope decode, socket-authorization
//!   handshake, routing, authorization, session hydration, fault capture,
//!   debounced persistence
//! - **Session lifecycle manager**: get/save/query/delete over the store
//!   seam plus the write-debounce policy
//! - **Connection manager**: binds sessions to gateway connections and
//!   forwards push envelopes
//! - **Push stubs**: server→client calls over an established socket
//! - **Offline host**: local Axum stand-in for the HTTP and WebSocket
//!   gateways, mirroring the hosted wiring for development and tests

#![deny(unsafe_code)]

pub mod connection;
pub mod context;
pub mod dispatcher;
pub mod gateway;
pub mod offline;
pub mod registry;
pub mod session;
pub mod stub;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::ConnectionManager;
pub use context::{CallContext, InvocationContext, ServerContext};
pub use dispatcher::RequestDispatcher;
pub use gateway::{ConnectionGateway, GatewayError, HttpGateway, LocalGateway};
pub use offline::OfflineHost;
pub use registry::{Authorizer, Fault, InterfaceRegistry, Responder};
pub use session::SessionManager;
pub use stub::PushStub;
