//! Backend endpoint addressing.

use std::fmt;

/// One logical backend endpoint: a server base address plus a namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    base: String,
    namespace: String,
}

impl Endpoint {
    /// Creates an endpoint. A namespace without a leading `/` gets one.
    pub fn new(base: impl Into<String>, namespace: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        let namespace = namespace.into();
        let namespace = if namespace.starts_with('/') {
            namespace
        } else {
            format!("/{namespace}")
        };
        Self { base, namespace }
    }

    /// Server base address, without a trailing slash.
    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the same server with a different namespace.
    #[must_use]
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self::new(self.base.clone(), namespace)
    }

    /// Full address the transport connects to.
    pub fn address(&self) -> String {
        format!("{}{}", self.base, self.namespace)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.base, self.namespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_joins_base_and_namespace() {
        let ep = Endpoint::new("ws://localhost:5000/", "/shell");
        assert_eq!(ep.address(), "ws://localhost:5000/shell");
        assert_eq!(ep.base(), "ws://localhost:5000");
        assert_eq!(ep.namespace(), "/shell");
    }

    #[test]
    fn namespace_gets_leading_slash() {
        let ep = Endpoint::new("ws://h", "apps/clock");
        assert_eq!(ep.namespace(), "/apps/clock");
        assert_eq!(ep.to_string(), "ws://h/apps/clock");
    }

    #[test]
    fn with_namespace_keeps_base() {
        let ep = Endpoint::new("ws://h:1", "/shell").with_namespace("/app/a1");
        assert_eq!(ep.address(), "ws://h:1/app/a1");
    }
}
