//! Plugin entry point
//!
//! The hosting process builds the plugin once at startup and calls
//! [`AuthorizationPlugin::register`] to hand its callback to the broker's
//! authorization pipeline.

use std::sync::Arc;
use tracing::info;

use crate::cache::Clock;
use crate::callback::{AuthorizationCallback, ClientSubtreeAuthorization};
use crate::config::AuthzConfig;
use crate::error::Result;
use crate::registry::CallbackRegistry;

/// Client-subtree authorization plugin
pub struct AuthorizationPlugin {
    callback: Arc<ClientSubtreeAuthorization>,
}

impl AuthorizationPlugin {
    /// Create the plugin with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(&AuthzConfig::default())
    }

    /// Create the plugin with the given configuration
    pub fn with_config(config: &AuthzConfig) -> Result<Self> {
        Ok(Self {
            callback: Arc::new(ClientSubtreeAuthorization::new(config)?),
        })
    }

    /// Create the plugin with an explicit cache clock
    pub fn with_clock(config: &AuthzConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            callback: Arc::new(ClientSubtreeAuthorization::with_clock(config, clock)?),
        })
    }

    /// Make the callback known to the broker
    pub fn register(&self, registry: &mut CallbackRegistry) {
        registry.add_callback(self.callback.clone());
        info!(
            callback = %self.callback.name(),
            priority = ?self.callback.priority(),
            on_no_match = ?self.callback.behaviour_on_no_match(),
            "Authorization callback registered"
        );
    }

    pub fn callback(&self) -> &Arc<ClientSubtreeAuthorization> {
        &self.callback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientData;

    #[test]
    fn test_register_adds_callback() {
        let plugin = AuthorizationPlugin::new().unwrap();
        let mut registry = CallbackRegistry::default();

        plugin.register(&mut registry);

        assert_eq!(registry.callback_count(), 1);
        assert_eq!(registry.callback_names(), vec!["client-subtree"]);
    }

    #[test]
    fn test_registered_callback_shares_cache() {
        let plugin = AuthorizationPlugin::new().unwrap();
        let mut registry = CallbackRegistry::default();
        plugin.register(&mut registry);

        let client = ClientData::new("device42");
        assert!(registry.can_publish(&client, "device42/a", 0).allowed);
        assert!(registry.can_publish(&client, "device42/b", 0).allowed);

        let stats = plugin.callback().cache().stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
    }
}
