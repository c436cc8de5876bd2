//! # classify-store
//!
//! The durable session store is an external collaborator; this crate owns
//! the seam: the row and patch model, the [`SessionStore`] trait the server
//! consumes, and an in-memory implementation used by offline mode and
//! tests.
//!
//! A row is keyed by session id and carries one opaque serialized blob per
//! interface, the currently bound connection id, the owning user id, the
//! last-write timestamp, and the expiry. Rows are read, enriched per
//! interface, and written back via partial updates; they are never deleted
//! except through the explicit bulk-delete operations.

#![deny(unsafe_code)]

pub mod memory;
pub mod row;
pub mod store;

pub use memory::MemorySessionStore;
pub use row::{SessionPatch, SessionRow};
pub use store::{SessionStore, StoreError};
