//! In-memory session store for offline mode and tests.

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use classify_core::ids::{SessionId, UserId};

use crate::row::{SessionPatch, SessionRow};
use crate::store::{SessionStore, StoreError};

/// `DashMap`-backed [`SessionStore`].
///
/// Mirrors the external store's observable behavior: blind partial
/// upserts, last-writer-wins, and expired rows reading as absent.
#[derive(Default)]
pub struct MemorySessionStore {
    rows: DashMap<String, SessionRow>,
}

impl MemorySessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live rows (expired rows still count until deleted).
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn now_ms() -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn is_expired(row: &SessionRow) -> bool {
        row.expires
            .is_some_and(|expires| expires <= chrono::Utc::now().timestamp())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(
        &self,
        session_id: &SessionId,
        interface: Option<&str>,
    ) -> Result<Option<SessionRow>, StoreError> {
        if session_id.as_str().is_empty() {
            return Ok(None);
        }
        let Some(row) = self.rows.get(session_id.as_str()) else {
            return Ok(None);
        };
        if Self::is_expired(&row) {
            debug!(session_id = %session_id, "row expired, reading as absent");
            return Ok(None);
        }
        let mut projected = row.clone();
        projected.interfaces = match interface {
            Some(name) => row
                .interfaces
                .get(name)
                .map(|blob| {
                    let mut one = std::collections::HashMap::new();
                    let _ = one.insert(name.to_owned(), blob.clone());
                    one
                })
                .unwrap_or_default(),
            None => std::collections::HashMap::new(),
        };
        Ok(Some(projected))
    }

    async fn update(&self, patch: SessionPatch) -> Result<(), StoreError> {
        let now = Self::now_ms();
        let mut row = self
            .rows
            .entry(patch.session_id.as_str().to_owned())
            .or_insert_with(|| SessionRow::empty(patch.session_id.clone(), now));
        row.updated = now;
        if let Some((interface, blob)) = patch.interface_blob {
            let _ = row.interfaces.insert(interface, blob);
        }
        if let Some(connection_id) = patch.connection_id {
            row.connection_id = Some(connection_id);
        } else if patch.clear_connection {
            row.connection_id = None;
        }
        if let Some(user_id) = patch.user_id {
            row.user_id = Some(user_id);
        }
        if let Some(minutes) = patch.ttl_minutes {
            row.expires = Some(chrono::Utc::now().timestamp() + minutes * 60);
        }
        Ok(())
    }

    async fn query_by_user(&self, user_id: &UserId) -> Result<Vec<SessionId>, StoreError> {
        Ok(self
            .rows
            .iter()
            .filter(|entry| entry.user_id.as_ref() == Some(user_id))
            .map(|entry| entry.session_id.clone())
            .collect())
    }

    async fn list_all(&self) -> Result<Vec<SessionId>, StoreError> {
        Ok(self
            .rows
            .iter()
            .map(|entry| entry.session_id.clone())
            .collect())
    }

    async fn delete_by_keys(&self, keys: &[SessionId]) -> Result<(), StoreError> {
        for key in keys {
            let _ = self.rows.remove(key.as_str());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use classify_core::ids::ConnectionId;

    fn store() -> MemorySessionStore {
        MemorySessionStore::new()
    }

    #[tokio::test]
    async fn get_unknown_session_is_absent() {
        let s = store();
        let row = s.get(&SessionId::from("nope"), None).await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn get_empty_session_id_is_absent() {
        let s = store();
        s.update(SessionPatch::new(SessionId::from("real")))
            .await
            .unwrap();
        let row = s.get(&SessionId::from(""), None).await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn save_then_get_round_trips_blob() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(
            SessionPatch::new(sid.clone()).with_blob("Counter", r#"{"count":5}"#),
        )
        .await
        .unwrap();

        let row = s.get(&sid, Some("Counter")).await.unwrap().unwrap();
        assert_eq!(row.blob("Counter"), Some(r#"{"count":5}"#));
    }

    #[tokio::test]
    async fn projection_hides_other_interfaces() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(SessionPatch::new(sid.clone()).with_blob("Counter", "{}"))
            .await
            .unwrap();
        s.update(SessionPatch::new(sid.clone()).with_blob("Chat", "{}"))
            .await
            .unwrap();

        let row = s.get(&sid, Some("Counter")).await.unwrap().unwrap();
        assert!(row.blob("Counter").is_some());
        assert!(row.blob("Chat").is_none());

        let meta = s.get(&sid, None).await.unwrap().unwrap();
        assert!(meta.interfaces.is_empty());
    }

    #[tokio::test]
    async fn update_creates_row_when_absent() {
        let s = store();
        s.update(SessionPatch::new(SessionId::from("fresh")))
            .await
            .unwrap();
        assert_eq!(s.len(), 1);
    }

    #[tokio::test]
    async fn partial_update_preserves_other_fields() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(
            SessionPatch::new(sid.clone())
                .with_blob("Counter", "{}")
                .with_user(UserId::from("u1")),
        )
        .await
        .unwrap();

        // A connection-only patch must not clobber blob or user
        s.update(SessionPatch::new(sid.clone()).with_connection(ConnectionId::from("c9")))
            .await
            .unwrap();

        let row = s.get(&sid, Some("Counter")).await.unwrap().unwrap();
        assert_eq!(row.blob("Counter"), Some("{}"));
        assert_eq!(row.user_id.as_ref().unwrap().as_str(), "u1");
        assert_eq!(row.connection_id.as_ref().unwrap().as_str(), "c9");
    }

    #[tokio::test]
    async fn update_refreshes_updated_timestamp() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(SessionPatch::new(sid.clone())).await.unwrap();
        let first = s.get(&sid, None).await.unwrap().unwrap().updated;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        s.update(SessionPatch::new(sid.clone())).await.unwrap();
        let second = s.get(&sid, None).await.unwrap().unwrap().updated;
        assert!(second >= first);
    }

    #[tokio::test]
    async fn ttl_sets_expiry_in_the_future() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(SessionPatch::new(sid.clone()).with_ttl_minutes(60))
            .await
            .unwrap();
        let row = s.get(&sid, None).await.unwrap().unwrap();
        let expires = row.expires.unwrap();
        assert!(expires > chrono::Utc::now().timestamp());
    }

    #[tokio::test]
    async fn expired_row_reads_as_absent() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(SessionPatch::new(sid.clone()).with_ttl_minutes(0))
            .await
            .unwrap();
        let row = s.get(&sid, None).await.unwrap();
        assert!(row.is_none());
    }

    #[tokio::test]
    async fn query_by_user_returns_tagged_sessions_only() {
        let s = store();
        s.update(SessionPatch::new(SessionId::from("a")).with_user(UserId::from("x")))
            .await
            .unwrap();
        s.update(SessionPatch::new(SessionId::from("b")).with_user(UserId::from("x")))
            .await
            .unwrap();
        s.update(SessionPatch::new(SessionId::from("c")).with_user(UserId::from("y")))
            .await
            .unwrap();

        let mut ids: Vec<String> = s
            .query_by_user(&UserId::from("x"))
            .await
            .unwrap()
            .into_iter()
            .map(Into::into)
            .collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn list_all_and_delete_by_keys() {
        let s = store();
        s.update(SessionPatch::new(SessionId::from("a"))).await.unwrap();
        s.update(SessionPatch::new(SessionId::from("b"))).await.unwrap();
        assert_eq!(s.list_all().await.unwrap().len(), 2);

        s.delete_by_keys(&[SessionId::from("a")]).await.unwrap();
        let remaining = s.list_all().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].as_str(), "b");
    }

    #[tokio::test]
    async fn delete_unknown_keys_is_a_noop() {
        let s = store();
        s.delete_by_keys(&[SessionId::from("ghost")]).await.unwrap();
        assert!(s.is_empty());
    }

    #[tokio::test]
    async fn clearing_connection_unbinds_it() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(SessionPatch::new(sid.clone()).with_connection(ConnectionId::from("c1")))
            .await
            .unwrap();
        s.update(SessionPatch::new(sid.clone()).with_connection_cleared())
            .await
            .unwrap();
        let row = s.get(&sid, None).await.unwrap().unwrap();
        assert!(row.connection_id.is_none());
    }

    #[tokio::test]
    async fn reconnect_overwrites_connection() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(SessionPatch::new(sid.clone()).with_connection(ConnectionId::from("c1")))
            .await
            .unwrap();
        s.update(SessionPatch::new(sid.clone()).with_connection(ConnectionId::from("c2")))
            .await
            .unwrap();
        let row = s.get(&sid, None).await.unwrap().unwrap();
        assert_eq!(row.connection_id.unwrap().as_str(), "c2");
    }

    #[tokio::test]
    async fn last_writer_wins_on_same_field() {
        let s = store();
        let sid = SessionId::from("s1");
        s.update(SessionPatch::new(sid.clone()).with_blob("Counter", "first"))
            .await
            .unwrap();
        s.update(SessionPatch::new(sid.clone()).with_blob("Counter", "second"))
            .await
            .unwrap();
        let row = s.get(&sid, Some("Counter")).await.unwrap().unwrap();
        assert_eq!(row.blob("Counter"), Some("second"));
    }
}
