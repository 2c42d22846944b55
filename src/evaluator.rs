//! Permission rule evaluation
//!
//! An evaluator turns the client data the broker surfaces into the set of
//! topic permissions granted to that client.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{ClientData, IdentityConfig};
use crate::error::Result;
use crate::identity::{ClientIdentity, IdentityPolicy};
use crate::mqtt::TopicMatcher;
use crate::permission::{Activity, PermissionSet, QosLevels, TopicPermission};

/// Source of per-client topic permissions
pub trait PermissionEvaluator: Send + Sync {
    /// Produce the permissions granted to a client
    fn evaluate(&self, client: &ClientData) -> Result<PermissionSet>;

    /// Evaluator name for logging
    fn name(&self) -> &str;

    /// Whether the result for this client may be memoized
    fn is_cacheable(&self, _client: &ClientData) -> bool {
        true
    }
}

impl<E: PermissionEvaluator + ?Sized> PermissionEvaluator for Arc<E> {
    fn evaluate(&self, client: &ClientData) -> Result<PermissionSet> {
        (**self).evaluate(client)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn is_cacheable(&self, client: &ClientData) -> bool {
        (**self).is_cacheable(client)
    }
}

/// Grants each client publish and subscribe rights on `<client-id>/#`
#[derive(Debug, Clone, Default)]
pub struct ClientSubtreeEvaluator {
    policy: IdentityPolicy,
    topic_matcher: TopicMatcher,
}

impl ClientSubtreeEvaluator {
    pub fn new(config: &IdentityConfig) -> Result<Self> {
        Ok(Self {
            policy: IdentityPolicy::from_config(config)?,
            topic_matcher: TopicMatcher::new(),
        })
    }

    /// Permissions for an already validated identity
    pub fn permissions_for(&self, identity: &ClientIdentity) -> PermissionSet {
        vec![TopicPermission::allow(
            self.topic_matcher.subtree_filter(identity.as_str()),
            QosLevels::All,
            Activity::All,
        )]
        .into()
    }
}

impl PermissionEvaluator for ClientSubtreeEvaluator {
    /// Invalid identifiers yield an empty set rather than an error, so the
    /// broker falls through to other callbacks without granting anything.
    fn evaluate(&self, client: &ClientData) -> Result<PermissionSet> {
        match self.policy.validate(&client.client_id) {
            Ok(identity) => {
                debug!(client_id = %identity, "Granting client subtree");
                Ok(self.permissions_for(&identity))
            }
            Err(e) => {
                warn!(
                    client_id = ?client.client_id,
                    error = %e,
                    "Client identifier rejected, granting no permissions"
                );
                Ok(PermissionSet::empty())
            }
        }
    }

    fn name(&self) -> &str {
        "client-subtree"
    }

    /// Rejected identifiers are not cached: they are attacker-sized keys and
    /// would evict valid clients from a bounded cache.
    fn is_cacheable(&self, client: &ClientData) -> bool {
        self.policy.validate(&client.client_id).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permission::PermissionDecision;

    #[test]
    fn test_device42_subtree() {
        let evaluator = ClientSubtreeEvaluator::default();
        let permissions = evaluator.evaluate(&ClientData::new("device42")).unwrap();

        assert_eq!(permissions.len(), 1);
        let permission = permissions.iter().next().unwrap();
        assert_eq!(permission.topic, "device42/#");
        assert_eq!(permission.decision, PermissionDecision::Allow);
        assert_eq!(permission.qos, QosLevels::All);
        assert_eq!(permission.activity, Activity::All);
    }

    #[test]
    fn test_empty_client_id_fails_closed() {
        let evaluator = ClientSubtreeEvaluator::default();
        let permissions = evaluator.evaluate(&ClientData::new("")).unwrap();
        assert!(permissions.is_empty());
    }

    #[test]
    fn test_wildcard_client_id_fails_closed() {
        let evaluator = ClientSubtreeEvaluator::default();
        assert!(evaluator.evaluate(&ClientData::new("#")).unwrap().is_empty());
        assert!(evaluator.evaluate(&ClientData::new("+")).unwrap().is_empty());
    }

    #[test]
    fn test_idempotent() {
        let evaluator = ClientSubtreeEvaluator::default();
        let client = ClientData::new("device42");
        assert_eq!(
            evaluator.evaluate(&client).unwrap(),
            evaluator.evaluate(&client).unwrap()
        );
    }

    #[test]
    fn test_only_client_id_is_used() {
        let evaluator = ClientSubtreeEvaluator::default();
        let anonymous = ClientData::new("device42");
        let authenticated = ClientData {
            client_id: "device42".to_string(),
            username: Some("operator".to_string()),
            client_ip: Some("10.0.0.7".to_string()),
            authenticated: true,
        };
        assert_eq!(
            evaluator.evaluate(&anonymous).unwrap(),
            evaluator.evaluate(&authenticated).unwrap()
        );
    }

    #[test]
    fn test_only_valid_identities_are_cacheable() {
        let evaluator = ClientSubtreeEvaluator::default();
        assert!(evaluator.is_cacheable(&ClientData::new("device42")));
        assert!(!evaluator.is_cacheable(&ClientData::new("")));
        assert!(!evaluator.is_cacheable(&ClientData::new("x".repeat(60_000))));
        assert!(!evaluator.is_cacheable(&ClientData::new("$SYS")));
    }

    #[test]
    fn test_level_separator_opt_in_nests_subtrees() {
        let config = IdentityConfig {
            allow_level_separator: true,
            ..Default::default()
        };
        let evaluator = ClientSubtreeEvaluator::new(&config).unwrap();
        let matcher = TopicMatcher::new();

        let parent = evaluator.evaluate(&ClientData::new("site")).unwrap();
        let child = evaluator.evaluate(&ClientData::new("site/device")).unwrap();
        let parent_filter = &parent.iter().next().unwrap().topic;
        let child_filter = &child.iter().next().unwrap().topic;

        // The parent's grant reaches into the child's subtree, not the reverse
        assert!(matcher.matches("site/device/telemetry", parent_filter));
        assert!(matcher.covers(parent_filter, child_filter));
        assert!(!matcher.matches("site/other", child_filter));
    }

    #[test]
    fn test_through_arc() {
        let evaluator: Arc<dyn PermissionEvaluator> = Arc::new(ClientSubtreeEvaluator::default());
        assert_eq!(evaluator.name(), "client-subtree");
        assert_eq!(evaluator.evaluate(&ClientData::new("a")).unwrap().len(), 1);
    }
}
