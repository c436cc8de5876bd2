//! # classify-client
//!
//! Client half of the classify RPC framework.
//!
//! - **Request stubs**: descriptor-built proxies that marshal calls into
//!   request envelopes, POST them to the dispatch endpoint, and unmarshal
//!   the response, tracking the server-assigned session id
//! - **Response stubs**: a pending-handler table keyed
//!   `interfaceName.methodName`, routing inbound pushes to locally
//!   registered handlers
//! - **Socket manager**: the `$WebSocket.$authorize` handshake followed by
//!   a native WebSocket connect presenting the session id as the
//!   sub-protocol token, with a bounded open wait

#![deny(unsafe_code)]

pub mod client;
pub mod handlers;
pub mod socket;
pub mod stub;

pub use client::{ClassifyClient, ClientConfig};
pub use handlers::PushHandler;
pub use stub::RequestStub;
