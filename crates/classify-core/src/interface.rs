//! Interface descriptors.
//!
//! A descriptor declares an interface's name and its client-visible method
//! set. Stubs on both sides are built from descriptors at registration
//! time; there is no runtime type introspection.

use serde::{Deserialize, Serialize};

/// Declaration of an interface: unique name plus ordered method names.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Unique interface name (e.g. `"Counter"`).
    pub name: String,
    /// Declared method names, in declaration order.
    pub methods: Vec<String>,
}

impl InterfaceDescriptor {
    /// Build a descriptor from a name and method list.
    pub fn new<I, S>(name: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            methods: methods.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `method` is declared on this interface.
    pub fn has_method(&self, method: &str) -> bool {
        self.methods.iter().any(|m| m == method)
    }

    /// `interfaceName.methodName` routing key for a declared method.
    pub fn method_key(&self, method: &str) -> String {
        format!("{}.{method}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> InterfaceDescriptor {
        InterfaceDescriptor::new("Counter", ["setCount", "getCount", "sendCount"])
    }

    #[test]
    fn declared_methods_found() {
        let d = counter();
        assert!(d.has_method("setCount"));
        assert!(d.has_method("getCount"));
    }

    #[test]
    fn undeclared_method_not_found() {
        let d = counter();
        assert!(!d.has_method("resetCount"));
        assert!(!d.has_method(""));
    }

    #[test]
    fn method_order_preserved() {
        let d = counter();
        assert_eq!(d.methods, vec!["setCount", "getCount", "sendCount"]);
    }

    #[test]
    fn method_key() {
        let d = counter();
        assert_eq!(d.method_key("setCount"), "Counter.setCount");
    }

    #[test]
    fn serde_roundtrip() {
        let d = counter();
        let json = serde_json::to_string(&d).unwrap();
        let back: InterfaceDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
