//! Session rows and partial-update patches.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use classify_core::ids::{ConnectionId, SessionId, UserId};

/// One persisted session record.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRow {
    /// Primary key.
    pub session_id: SessionId,
    /// Opaque serialized state, one blob per interface name.
    pub interfaces: HashMap<String, String>,
    /// Currently bound socket connection, if any.
    pub connection_id: Option<ConnectionId>,
    /// Owning user for secondary-index queries, if tagged.
    pub user_id: Option<UserId>,
    /// Last write, epoch milliseconds.
    pub updated: i64,
    /// Expiry, epoch seconds; rows past this read as absent.
    pub expires: Option<i64>,
}

impl SessionRow {
    /// An empty row for a freshly minted session.
    pub fn empty(session_id: SessionId, now_ms: i64) -> Self {
        Self {
            session_id,
            interfaces: HashMap::new(),
            connection_id: None,
            user_id: None,
            updated: now_ms,
            expires: None,
        }
    }

    /// The serialized state blob for `interface`, if present.
    pub fn blob(&self, interface: &str) -> Option<&str> {
        self.interfaces.get(interface).map(String::as_str)
    }
}

/// A partial update to a session row.
///
/// Only supplied fields are written; every applied patch refreshes the
/// row's `updated` timestamp, and a supplied TTL recomputes `expires`.
/// Applying a patch to an unknown session id creates the row.
#[derive(Clone, Debug)]
pub struct SessionPatch {
    /// Target session id.
    pub session_id: SessionId,
    /// Replace this interface's state blob.
    pub interface_blob: Option<(String, String)>,
    /// Bind this connection id.
    pub connection_id: Option<ConnectionId>,
    /// Unbind whatever connection id is currently stored.
    pub clear_connection: bool,
    /// Tag the session with this user id.
    pub user_id: Option<UserId>,
    /// Extend expiry to now + this many minutes.
    pub ttl_minutes: Option<i64>,
}

impl SessionPatch {
    /// Start an empty patch for `session_id`.
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            interface_blob: None,
            connection_id: None,
            clear_connection: false,
            user_id: None,
            ttl_minutes: None,
        }
    }

    /// Replace `interface`'s state blob.
    #[must_use]
    pub fn with_blob(mut self, interface: impl Into<String>, blob: impl Into<String>) -> Self {
        self.interface_blob = Some((interface.into(), blob.into()));
        self
    }

    /// Bind a connection id.
    #[must_use]
    pub fn with_connection(mut self, connection_id: ConnectionId) -> Self {
        self.connection_id = Some(connection_id);
        self
    }

    /// Unbind the stored connection id.
    #[must_use]
    pub fn with_connection_cleared(mut self) -> Self {
        self.clear_connection = true;
        self
    }

    /// Tag an owning user.
    #[must_use]
    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Extend expiry by `minutes` from now.
    #[must_use]
    pub fn with_ttl_minutes(mut self, minutes: i64) -> Self {
        self.ttl_minutes = Some(minutes);
        self
    }
}
