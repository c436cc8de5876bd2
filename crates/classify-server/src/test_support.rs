//! Shared fixtures for in-crate tests.

use std::sync::Arc;

use classify_core::ids::SessionId;
use classify_settings::ServerSettings;
use classify_store::MemorySessionStore;

use crate::context::{CallContext, ServerContext};
use crate::gateway::LocalGateway;
use crate::registry::InterfaceRegistry;

pub(crate) fn make_server_context() -> Arc<ServerContext> {
    Arc::new(ServerContext::new(
        InterfaceRegistry::new(),
        Arc::new(MemorySessionStore::new()),
        Arc::new(LocalGateway::new()),
        ServerSettings::default(),
    ))
}

pub(crate) fn make_call_context(session_id: &str) -> CallContext {
    let ctx = make_server_context();
    CallContext::new(
        SessionId::from(session_id),
        None,
        None,
        ctx.sessions().clone(),
        ctx.connections().clone(),
    )
}
