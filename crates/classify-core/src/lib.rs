//! # classify-core
//!
//! Foundation types for the classify RPC framework.
//!
//! This crate provides the shared vocabulary the server and client crates
//! depend on:
//!
//! - **Branded IDs**: `SessionId`, `ConnectionId`, `RequestId`, `UserId` as
//!   newtypes for type safety
//! - **Envelopes**: `RequestEnvelope` / `ResponseEnvelope`, the bit-exact
//!   wire contract carried over HTTP and WebSocket pushes
//! - **Descriptors**: `InterfaceDescriptor` declaring an interface's name
//!   and ordered method set
//! - **Errors**: `ClassifyError` hierarchy via `thiserror`, with stable
//!   machine-readable code strings
//! - **Logging**: tracing-subscriber initialization helper

#![deny(unsafe_code)]

pub mod constants;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod interface;
pub mod logging;

pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use errors::ClassifyError;
pub use ids::{ConnectionId, RequestId, SessionId, UserId};
pub use interface::InterfaceDescriptor;
