//! Client identity validation
//!
//! A client identifier roots a topic subtree, so it must be a single, literal,
//! non-system topic level before any permission is built from it.

use regex::Regex;
use std::fmt;
use tracing::warn;

use crate::config::IdentityConfig;
use crate::error::{AuthzError, Result};

/// A client identifier that is safe to use as a subtree root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientIdentity(String);

impl ClientIdentity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ClientIdentity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compiled identity rules
#[derive(Debug, Clone)]
pub struct IdentityPolicy {
    pattern: Option<Regex>,
    max_length: usize,
    allow_level_separator: bool,
}

impl IdentityPolicy {
    /// Compile a policy from configuration
    pub fn from_config(config: &IdentityConfig) -> Result<Self> {
        let pattern = config
            .client_id_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| AuthzError::Config(format!("Invalid client-id-pattern: {}", e)))?;

        if config.max_client_id_length == 0 {
            return Err(AuthzError::Config(
                "max-client-id-length must be at least 1".to_string(),
            ));
        }

        if config.allow_level_separator {
            warn!(
                "allow-level-separator is enabled: client subtrees may nest, \
                 a client 'a' is granted topics of client 'a/b'"
            );
        }

        Ok(Self {
            pattern,
            max_length: config.max_client_id_length,
            allow_level_separator: config.allow_level_separator,
        })
    }

    /// Validate a raw client identifier
    pub fn validate(&self, client_id: &str) -> Result<ClientIdentity> {
        let reject = |reason: &'static str| -> Result<ClientIdentity> {
            Err(AuthzError::invalid_client_id(client_id, reason))
        };

        if client_id.is_empty() {
            return reject("empty");
        }
        if client_id.len() > self.max_length {
            return reject("too long");
        }
        if client_id.contains(['+', '#']) {
            return reject("contains a topic wildcard");
        }
        if client_id.contains('\0') {
            return reject("contains NUL");
        }
        if client_id.starts_with('$') {
            return reject("starts with the reserved '$' prefix");
        }
        if !self.allow_level_separator && client_id.contains('/') {
            return reject("contains the topic level separator");
        }
        if let Some(ref regex) = self.pattern {
            if !regex.is_match(client_id) {
                return reject("does not match the required pattern");
            }
        }

        Ok(ClientIdentity(client_id.to_string()))
    }
}

impl Default for IdentityPolicy {
    fn default() -> Self {
        Self {
            pattern: None,
            max_length: IdentityConfig::default().max_client_id_length,
            allow_level_separator: false,
        }
    }
}
