//! Interface registry and the responder model.
//!
//! An interface is registered once at startup as an explicit
//! [`InterfaceDescriptor`] plus a responder type. The registry stores a
//! hydration factory per interface: given the session's serialized blob it
//! produces a fresh instance of the implementation type with the prior
//! state deserialized in, or a default instance when the session is new.
//! Provenance (session, connection, user) never passes through the codec;
//! it travels in the [`CallContext`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use classify_core::interface::InterfaceDescriptor;

use crate::context::CallContext;

/// An error raised inside a responder method body.
///
/// The message is carried verbatim in the response envelope's `exception`
/// field and re-raised on the calling stub.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Fault {
    /// Error message forwarded to the caller.
    pub message: String,
}

impl Fault {
    /// Build a fault from a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Build a fault from any displayable error.
    pub fn wrap(err: impl std::fmt::Display) -> Self {
        Self::new(err.to_string())
    }
}

impl From<String> for Fault {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for Fault {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// A server-side interface implementation.
///
/// `invoke` is the interface's dispatch table: match on the declared method
/// name and apply the positional args. State mutated on `self` is
/// serialized back to the session store after the call returns.
#[async_trait]
pub trait Responder: Send {
    /// Invoke `method` with `args` in declaration order.
    async fn invoke(
        &mut self,
        method: &str,
        args: &[Value],
        cx: &mut CallContext,
    ) -> Result<Value, Fault>;
}

/// Authorization hook consulted before a method body runs.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Whether the call may proceed. `false` fails the call with
    /// `NotAuthorized` and the method body never runs.
    async fn authorize(&self, interface: &str, method: &str, args: &[Value]) -> bool;
}

/// Object-safe view over a hydrated responder: invocation plus snapshot.
#[async_trait]
pub(crate) trait SessionObject: Send {
    /// Forward to the responder's dispatch table.
    async fn invoke(
        &mut self,
        method: &str,
        args: &[Value],
        cx: &mut CallContext,
    ) -> Result<Value, Fault>;

    /// Serialize the current business state.
    fn snapshot(&self) -> Result<String, serde_json::Error>;
}

struct Hydrated<T>(T);

#[async_trait]
impl<T> SessionObject for Hydrated<T>
where
    T: Responder + Serialize + Send,
{
    async fn invoke(
        &mut self,
        method: &str,
        args: &[Value],
        cx: &mut CallContext,
    ) -> Result<Value, Fault> {
        self.0.invoke(method, args, cx).await
    }

    fn snapshot(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.0)
    }
}

type HydrateFn =
    Box<dyn Fn(Option<&str>) -> Result<Box<dyn SessionObject>, serde_json::Error> + Send + Sync>;

/// One registered interface: descriptor, optional authorizer, hydration
/// factory.
pub struct InterfaceEntry {
    descriptor: InterfaceDescriptor,
    authorizer: Option<Arc<dyn Authorizer>>,
    factory: HydrateFn,
}

impl InterfaceEntry {
    /// The interface's descriptor.
    pub fn descriptor(&self) -> &InterfaceDescriptor {
        &self.descriptor
    }

    /// The configured authorizer, if any.
    pub fn authorizer(&self) -> Option<&Arc<dyn Authorizer>> {
        self.authorizer.as_ref()
    }

    /// Construct an instance with `blob` deserialized in, or defaults.
    pub(crate) fn hydrate(
        &self,
        blob: Option<&str>,
    ) -> Result<Box<dyn SessionObject>, serde_json::Error> {
        (self.factory)(blob)
    }
}

/// Mapping from interface name to registered entry.
///
/// Populated once at startup and never mutated afterward; the dispatcher
/// holds it behind the process-wide [`crate::ServerContext`].
#[derive(Default)]
pub struct InterfaceRegistry {
    entries: HashMap<String, InterfaceEntry>,
}

impl InterfaceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `T` as the implementation of `descriptor`, no authorizer.
    pub fn register<T>(&mut self, descriptor: InterfaceDescriptor)
    where
        T: Responder + Default + Serialize + DeserializeOwned + Send + 'static,
    {
        self.insert::<T>(descriptor, None);
    }

    /// Register `T` guarded by `authorizer`.
    pub fn register_with_authorizer<T>(
        &mut self,
        descriptor: InterfaceDescriptor,
        authorizer: impl Authorizer + 'static,
    ) where
        T: Responder + Default + Serialize + DeserializeOwned + Send + 'static,
    {
        self.insert::<T>(descriptor, Some(Arc::new(authorizer)));
    }

    fn insert<T>(&mut self, descriptor: InterfaceDescriptor, authorizer: Option<Arc<dyn Authorizer>>)
    where
        T: Responder + Default + Serialize + DeserializeOwned + Send + 'static,
    {
        let factory: HydrateFn = Box::new(|blob| {
            let state = match blob {
                Some(blob) => serde_json::from_str::<T>(blob)?,
                None => T::default(),
            };
            Ok(Box::new(Hydrated(state)) as Box<dyn SessionObject>)
        });
        debug!(interface = descriptor.name, "interface registered");
        let _ = self.entries.insert(
            descriptor.name.clone(),
            InterfaceEntry {
                descriptor,
                authorizer,
                factory,
            },
        );
    }

    /// Look up a registered interface.
    pub fn get(&self, interface: &str) -> Option<&InterfaceEntry> {
        self.entries.get(interface)
    }

    /// Whether `interface` is registered.
    pub fn has_interface(&self, interface: &str) -> bool {
        self.entries.contains_key(interface)
    }

    /// All registered interface names (sorted).
    pub fn interfaces(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().cloned().collect();
        names.sort();
        names
    }
}
