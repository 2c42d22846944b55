//! Authorization callbacks
//!
//! A callback is what the broker consults for every topic access check. It
//! supplies the client's permissions, its position among other callbacks, and
//! what should happen when none of its permissions applies.

use std::sync::Arc;
use tracing::warn;

use crate::cache::{Clock, PermissionCache};
use crate::config::{AuthorizationBehaviour, AuthzConfig, CallbackPriority, ClientData};
use crate::error::Result;
use crate::evaluator::{ClientSubtreeEvaluator, PermissionEvaluator};
use crate::permission::PermissionSet;

/// Authorization callback consulted by the broker
pub trait AuthorizationCallback: Send + Sync {
    /// Permissions granted to a client. Failures must map to an empty set.
    fn permissions_for_client(&self, client: &ClientData) -> PermissionSet;

    /// Outcome when no permission applies to a request
    fn behaviour_on_no_match(&self) -> AuthorizationBehaviour;

    fn priority(&self) -> CallbackPriority;

    /// Callback name for logging and decisions
    fn name(&self) -> &str;
}

/// Grants every client full rights on its own subtree, cached per client
pub struct ClientSubtreeAuthorization {
    permissions: PermissionCache<ClientSubtreeEvaluator>,
    priority: CallbackPriority,
    on_no_match: AuthorizationBehaviour,
}

impl ClientSubtreeAuthorization {
    pub fn new(config: &AuthzConfig) -> Result<Self> {
        let evaluator = ClientSubtreeEvaluator::new(&config.identity)?;
        Ok(Self::from_parts(
            PermissionCache::new(evaluator, &config.cache),
            config,
        ))
    }

    /// Build with an explicit clock for the permission cache
    pub fn with_clock(config: &AuthzConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let evaluator = ClientSubtreeEvaluator::new(&config.identity)?;
        Ok(Self::from_parts(
            PermissionCache::with_clock(evaluator, &config.cache, clock),
            config,
        ))
    }

    fn from_parts(permissions: PermissionCache<ClientSubtreeEvaluator>, config: &AuthzConfig) -> Self {
        Self {
            permissions,
            priority: config.registration.priority,
            on_no_match: config.registration.on_no_match,
        }
    }

    pub fn cache(&self) -> &PermissionCache<ClientSubtreeEvaluator> {
        &self.permissions
    }
}

impl AuthorizationCallback for ClientSubtreeAuthorization {
    fn permissions_for_client(&self, client: &ClientData) -> PermissionSet {
        match self.permissions.get_or_compute(client) {
            Ok(permissions) => permissions,
            Err(e) => {
                warn!(
                    callback = %self.name(),
                    client_id = ?client.client_id,
                    error = %e,
                    "Permission evaluation failed, granting nothing"
                );
                PermissionSet::empty()
            }
        }
    }

    fn behaviour_on_no_match(&self) -> AuthorizationBehaviour {
        self.on_no_match
    }

    fn priority(&self) -> CallbackPriority {
        self.priority
    }

    fn name(&self) -> &str {
        self.permissions.name()
    }
}
