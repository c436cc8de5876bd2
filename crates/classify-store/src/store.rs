//! The session-store collaborator seam.

use async_trait::async_trait;
use thiserror::Error;

use classify_core::ids::{SessionId, UserId};

use crate::row::{SessionPatch, SessionRow};

/// Error surfaced by a store implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store failed (connectivity, throttling, schema).
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Durable keyed session storage.
///
/// The production implementation is external to this workspace; the server
/// consumes this trait. Point reads are strongly consistent. `update` is a
/// blind partial upsert; last writer wins.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Point lookup by session id.
    ///
    /// `interface = Some(name)` projects the row down to that interface's
    /// blob; `None` returns row metadata with no blobs. Expired rows read
    /// as absent. An empty session id reads as absent.
    async fn get(
        &self,
        session_id: &SessionId,
        interface: Option<&str>,
    ) -> Result<Option<SessionRow>, StoreError>;

    /// Apply a partial update, creating the row if absent.
    async fn update(&self, patch: SessionPatch) -> Result<(), StoreError>;

    /// Session ids tagged with `user_id`, via the secondary index.
    async fn query_by_user(&self, user_id: &UserId) -> Result<Vec<SessionId>, StoreError>;

    /// All session ids (scan; test and maintenance support).
    async fn list_all(&self) -> Result<Vec<SessionId>, StoreError>;

    /// Delete the given rows. Unknown keys are ignored.
    async fn delete_by_keys(&self, keys: &[SessionId]) -> Result<(), StoreError>;
}
