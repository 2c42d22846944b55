//! Configuration types for the authorization module
//!
//! Provides JSON-serializable configuration for client identity validation,
//! the permission cache, callback registration, and the host pipeline fallback.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::permission::PermissionDecision;

/// Authorization module configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct AuthzConfig {
    /// Client identifier validation
    pub identity: IdentityConfig,

    /// Permission cache settings
    pub cache: CacheConfig,

    /// How the callback announces itself to the broker
    pub registration: RegistrationConfig,

    /// Host pipeline behaviour when every callback abstains
    pub pipeline: PipelineConfig,
}

// ============================================================================
// Identity Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct IdentityConfig {
    /// Client ID validation regex pattern
    pub client_id_pattern: Option<String>,

    /// Maximum client ID length
    pub max_client_id_length: usize,

    /// Accept `/` inside client IDs (subtrees of distinct clients may then nest)
    pub allow_level_separator: bool,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            client_id_pattern: None,
            max_client_id_length: default_max_client_id_len(),
            allow_level_separator: false,
        }
    }
}

// ============================================================================
// Cache Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    /// Memoize permission sets per client
    pub enabled: bool,

    /// Time-to-live of a cached permission set in seconds
    pub ttl_secs: u64,

    /// Maximum number of cached clients (least recently used are evicted)
    pub max_entries: usize,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl(),
            max_entries: default_cache_entries(),
        }
    }
}

// ============================================================================
// Registration Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct RegistrationConfig {
    /// Evaluation order among authorization callbacks
    pub priority: CallbackPriority,

    /// Outcome when no permission of this callback matches a request
    pub on_no_match: AuthorizationBehaviour,
}

/// Callback evaluation order. Variants are declared highest first, so the
/// derived ordering sorts the first-consulted priority lowest.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CallbackPriority {
    #[default]
    Critical,
    VeryHigh,
    High,
    Medium,
    Low,
    VeryLow,
}

/// What a callback declares when it has no matching permission
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationBehaviour {
    Allow,
    Deny,
    /// Abstain and let the next callback decide
    #[default]
    Next,
}

// ============================================================================
// Pipeline Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", default)]
pub struct PipelineConfig {
    /// Decision when every callback abstains
    pub fallback: PermissionDecision,
}

/// MQTT operation being authorized
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MqttAction {
    Publish,
    Subscribe,
}

// ============================================================================
// Client Data (runtime state per connection)
// ============================================================================

/// Client information the broker surfaces for an authorization check
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientData {
    /// Client ID from CONNECT
    pub client_id: String,
    /// Username from CONNECT (if provided)
    pub username: Option<String>,
    /// Remote address of the connection
    pub client_ip: Option<String>,
    /// Whether an authentication callback accepted the client
    pub authenticated: bool,
}

impl ClientData {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_max_client_id_len() -> usize {
    128
}

fn default_cache_ttl() -> u64 {
    5 * 60
}

fn default_cache_entries() -> usize {
    10_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AuthzConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl(), Duration::from_secs(300));
        assert_eq!(config.registration.priority, CallbackPriority::Critical);
        assert_eq!(config.registration.on_no_match, AuthorizationBehaviour::Next);
        assert_eq!(config.pipeline.fallback, PermissionDecision::Deny);
        assert!(!config.identity.allow_level_separator);
    }

    #[test]
    fn test_deserialize_config() {
        let json = r#"{
            "identity": {
                "client-id-pattern": "^device[0-9]+$",
                "max-client-id-length": 32
            },
            "cache": {
                "ttl-secs": 60,
                "max-entries": 500
            },
            "registration": {
                "priority": "high",
                "on-no-match": "deny"
            }
        }"#;

        let config: AuthzConfig = serde_json::from_str(json).expect("Failed to parse");
        assert_eq!(config.identity.client_id_pattern.as_deref(), Some("^device[0-9]+$"));
        assert_eq!(config.identity.max_client_id_length, 32);
        assert!(config.cache.enabled);
        assert_eq!(config.cache.ttl_secs, 60);
        assert_eq!(config.cache.max_entries, 500);
        assert_eq!(config.registration.priority, CallbackPriority::High);
        assert_eq!(config.registration.on_no_match, AuthorizationBehaviour::Deny);
        assert_eq!(config.pipeline.fallback, PermissionDecision::Deny);
    }

    #[test]
    fn test_priority_order() {
        assert!(CallbackPriority::Critical < CallbackPriority::High);
        assert!(CallbackPriority::Low < CallbackPriority::VeryLow);

        let mut priorities = vec![
            CallbackPriority::VeryLow,
            CallbackPriority::Medium,
            CallbackPriority::Critical,
            CallbackPriority::High,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![
                CallbackPriority::Critical,
                CallbackPriority::High,
                CallbackPriority::Medium,
                CallbackPriority::VeryLow,
            ]
        );
    }
}
