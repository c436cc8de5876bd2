//! Session lifecycle: hydration reads, debounced persistence, and bulk
//! maintenance over the store seam.

use std::sync::Arc;

use tracing::{debug, instrument};

use classify_core::errors::ClassifyError;
use classify_core::ids::{SessionId, UserId};
use classify_settings::ServerSettings;
use classify_store::{SessionPatch, SessionRow, SessionStore, StoreError};

fn store_err(err: StoreError) -> ClassifyError {
    ClassifyError::Store {
        message: err.to_string(),
    }
}

/// Owns get/hydrate/persist of per-interface session state.
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    expiry_minutes: i64,
    debounce_minutes: i64,
}

impl SessionManager {
    /// Create a manager over `store` with the configured expiry/debounce.
    pub fn new(store: Arc<dyn SessionStore>, settings: &ServerSettings) -> Self {
        Self {
            store,
            expiry_minutes: settings.session_expiry_minutes,
            debounce_minutes: settings.debounce_minutes,
        }
    }

    /// Configured session time-to-live in minutes.
    pub fn expiry_minutes(&self) -> i64 {
        self.expiry_minutes
    }

    /// Point lookup projected to one interface's blob.
    pub async fn get(
        &self,
        session_id: &SessionId,
        interface: &str,
    ) -> Result<Option<SessionRow>, ClassifyError> {
        self.store
            .get(session_id, Some(interface))
            .await
            .map_err(store_err)
    }

    /// Point lookup of row metadata only (no interface blobs).
    pub async fn get_meta(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<SessionRow>, ClassifyError> {
        self.store.get(session_id, None).await.map_err(store_err)
    }

    /// Apply a partial update; returns the session id written.
    #[instrument(skip_all, fields(session_id = %patch.session_id))]
    pub async fn save(&self, patch: SessionPatch) -> Result<SessionId, ClassifyError> {
        let session_id = patch.session_id.clone();
        self.store.update(patch).await.map_err(store_err)?;
        debug!("session saved");
        Ok(session_id)
    }

    /// The write-debounce predicate.
    ///
    /// A post-invocation persist happens only when there was no prior row,
    /// the serialized state changed, or the row's last write is older than
    /// the debounce window (so long-lived read-mostly sessions still get
    /// periodic expiry extension).
    pub fn needs_write(
        &self,
        prior: Option<&SessionRow>,
        prior_blob: Option<&str>,
        new_blob: &str,
    ) -> bool {
        let Some(row) = prior else {
            return true;
        };
        if prior_blob != Some(new_blob) {
            return true;
        }
        let debounce_ms = self.debounce_minutes * 60 * 1000;
        chrono::Utc::now().timestamp_millis() > row.updated + debounce_ms
    }

    /// Session ids tagged with `user_id`.
    pub async fn sessions_for_user(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<SessionId>, ClassifyError> {
        if user_id.as_str().is_empty() {
            return Ok(Vec::new());
        }
        self.store.query_by_user(user_id).await.map_err(store_err)
    }

    /// All session ids.
    pub async fn sessions(&self) -> Result<Vec<SessionId>, ClassifyError> {
        self.store.list_all().await.map_err(store_err)
    }

    /// Delete the given sessions.
    pub async fn delete_by_keys(&self, keys: &[SessionId]) -> Result<(), ClassifyError> {
        self.store.delete_by_keys(keys).await.map_err(store_err)
    }

    /// Delete every session tagged with `user_id`.
    pub async fn delete_sessions_for_user(&self, user_id: &UserId) -> Result<(), ClassifyError> {
        let keys = self.sessions_for_user(user_id).await?;
        self.delete_by_keys(&keys).await
    }

    /// Delete every session.
    pub async fn delete_sessions(&self) -> Result<(), ClassifyError> {
        let keys = self.sessions().await?;
        self.delete_by_keys(&keys).await
    }
}
