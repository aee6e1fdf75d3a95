//! Capability registry

use crate::handlers::{Handler, NoopHandler, PingHandler};
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_proto::message::GET_TASK_METHOD;
use tracing::{debug, warn};

/// Immutable mapping from lower-cased method name to handler.
///
/// Built once with [`RegistryBuilder`] and shared read-only afterwards.
pub struct CapabilityRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl CapabilityRegistry {
    /// Start building a registry
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Look up a handler by method name, case-insensitively
    pub fn lookup(&self, method: &str) -> Option<Arc<dyn Handler>> {
        self.handlers.get(&method.to_lowercase()).cloned()
    }

    /// Registered method names, sorted
    pub fn methods(&self) -> Vec<&str> {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        methods
    }

    /// Number of registered capabilities
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if no capabilities are registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Startup-time builder for [`CapabilityRegistry`]
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl RegistryBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the built-in `ping` and `noop` capabilities
    pub fn with_builtins(self) -> Self {
        self.register("ping", Arc::new(PingHandler))
            .register("noop", Arc::new(NoopHandler))
    }

    /// Register a handler. A later registration under the same name wins.
    pub fn register(mut self, name: &str, handler: Arc<dyn Handler>) -> Self {
        let name = name.to_lowercase();
        if name == GET_TASK_METHOD {
            warn!("Capability {} shares its name with the built-in status poll; both will run", name);
        }
        if self.handlers.insert(name.clone(), handler).is_some() {
            warn!("Replaced existing handler for method: {}", name);
        } else {
            debug!("Registered handler for method: {}", name);
        }
        self
    }

    /// Freeze the registry
    pub fn build(self) -> CapabilityRegistry {
        CapabilityRegistry { handlers: self.handlers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use proptest::prelude::*;
    use serde_json::Value;
    use switchboard_proto::Arguments;

    struct ConstHandler(&'static str);

    #[async_trait]
    impl Handler for ConstHandler {
        async fn process(&self, _arguments: Arguments) -> Result<Value> {
            Ok(Value::from(self.0))
        }
    }

    #[test]
    fn test_builtins_registered() {
        let registry = CapabilityRegistry::builder().with_builtins().build();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.methods(), vec!["noop", "ping"]);
        assert!(registry.lookup("ping").is_some());
        assert!(registry.lookup("noop").is_some());
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = CapabilityRegistry::builder()
            .register("Apply", Arc::new(ConstHandler("applied")))
            .build();

        assert!(registry.lookup("apply").is_some());
        assert!(registry.lookup("APPLY").is_some());
        assert!(registry.lookup("Apply").is_some());
        assert_eq!(registry.methods(), vec!["apply"]);
    }

    #[test]
    fn test_lookup_is_exact() {
        let registry = CapabilityRegistry::builder().with_builtins().build();

        assert!(registry.lookup("pin").is_none());
        assert!(registry.lookup("pings").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let registry = CapabilityRegistry::builder()
            .register("state", Arc::new(ConstHandler("first")))
            .register("STATE", Arc::new(ConstHandler("second")))
            .build();

        assert_eq!(registry.len(), 1);
        let handler = registry.lookup("state").unwrap();
        let value = handler.process(Arguments::new()).await.unwrap();
        assert_eq!(value, Value::from("second"));
    }

    #[test]
    fn test_empty_registry() {
        let registry = RegistryBuilder::new().build();
        assert!(registry.is_empty());
        assert!(registry.lookup("ping").is_none());
    }

    proptest! {
        #[test]
        fn test_any_casing_resolves(method in "[a-z_]{1,16}", mask in prop::collection::vec(any::<bool>(), 16)) {
            let registry = CapabilityRegistry::builder()
                .register(&method, Arc::new(ConstHandler("x")))
                .build();

            let mixed: String = method
                .chars()
                .zip(mask.iter())
                .map(|(c, upper)| if *upper { c.to_ascii_uppercase() } else { c })
                .collect();

            prop_assert!(registry.lookup(&mixed).is_some());
        }
    }
}
