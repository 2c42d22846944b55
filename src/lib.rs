//! Client-subtree MQTT authorization
//!
//! An authorization callback for MQTT brokers that grants every connecting
//! client full publish and subscribe rights on the topic subtree rooted at its
//! own client identifier (`<client-id>/#`) and abstains for everything else.
//!
//! - **Evaluation**: [`ClientSubtreeEvaluator`] builds the permission set from
//!   a validated client identifier; unusable identifiers get nothing
//! - **Caching**: [`PermissionCache`] memoizes permission sets per client for a
//!   time-to-live (five minutes by default) with a bounded, LRU-evicted size
//! - **Registration**: [`AuthorizationPlugin`] registers the callback with a
//!   [`CallbackRegistry`] at critical priority, deferring to the next callback
//!   when no permission applies
//!
//! # Example Configuration
//!
//! ```json
//! {
//!   "identity": { "max-client-id-length": 64 },
//!   "cache": { "enabled": true, "ttl-secs": 300, "max-entries": 10000 },
//!   "registration": { "priority": "critical", "on-no-match": "next" },
//!   "pipeline": { "fallback": "deny" }
//! }
//! ```
//!
//! # Example
//!
//! ```
//! use sentinel_agent_mqtt_authz::{AuthorizationPlugin, CallbackRegistry, ClientData};
//!
//! let plugin = AuthorizationPlugin::new().unwrap();
//! let mut registry = CallbackRegistry::default();
//! plugin.register(&mut registry);
//!
//! let client = ClientData::new("device42");
//! assert!(registry.can_publish(&client, "device42/temperature", 1).allowed);
//! assert!(!registry.can_publish(&client, "device43/temperature", 1).allowed);
//! ```

pub mod cache;
pub mod callback;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod identity;
pub mod mqtt;
pub mod permission;
pub mod plugin;
pub mod registry;

// Re-export main types
pub use cache::PermissionCache;
pub use callback::{AuthorizationCallback, ClientSubtreeAuthorization};
pub use config::{AuthzConfig, ClientData};
pub use error::{AuthzError, Result};
pub use evaluator::{ClientSubtreeEvaluator, PermissionEvaluator};
pub use permission::{PermissionSet, TopicPermission};
pub use plugin::AuthorizationPlugin;
pub use registry::{AuthorizationDecision, CallbackRegistry};
