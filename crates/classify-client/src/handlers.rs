//! Inbound push routing.

use serde_json::Value;

use async_trait::async_trait;

/// Handler for pushes on one client interface.
///
/// Invoked with the declared method name and the envelope's positional
/// args. Any result is discarded; pushes are fire-and-forget from the
/// recipient's side.
#[async_trait]
pub trait PushHandler: Send + Sync {
    /// Handle one inbound push.
    async fn handle(&self, method: &str, args: &[Value]);
}
