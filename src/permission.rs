//! Topic permission types and matching logic

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::MqttAction;
use crate::mqtt::TopicMatcher;

/// Outcome a permission grants when it applies
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDecision {
    Allow,
    #[default]
    Deny,
}

/// QoS levels a permission applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QosLevels {
    Zero,
    One,
    Two,
    ZeroOne,
    OneTwo,
    ZeroTwo,
    All,
}

impl QosLevels {
    pub fn contains(self, qos: u8) -> bool {
        match self {
            QosLevels::Zero => qos == 0,
            QosLevels::One => qos == 1,
            QosLevels::Two => qos == 2,
            QosLevels::ZeroOne => qos <= 1,
            QosLevels::OneTwo => qos == 1 || qos == 2,
            QosLevels::ZeroTwo => qos == 0 || qos == 2,
            QosLevels::All => qos <= 2,
        }
    }
}

/// Operations a permission applies to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    Publish,
    Subscribe,
    All,
}

impl Activity {
    pub fn permits(self, action: MqttAction) -> bool {
        matches!(
            (self, action),
            (Activity::All, _)
                | (Activity::Publish, MqttAction::Publish)
                | (Activity::Subscribe, MqttAction::Subscribe)
        )
    }
}

/// A single topic permission
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct TopicPermission {
    /// Topic filter this permission covers
    pub topic: String,
    pub decision: PermissionDecision,
    pub qos: QosLevels,
    pub activity: Activity,
}

impl TopicPermission {
    pub fn allow(topic: impl Into<String>, qos: QosLevels, activity: Activity) -> Self {
        Self {
            topic: topic.into(),
            decision: PermissionDecision::Allow,
            qos,
            activity,
        }
    }

    pub fn deny(topic: impl Into<String>, qos: QosLevels, activity: Activity) -> Self {
        Self {
            topic: topic.into(),
            decision: PermissionDecision::Deny,
            qos,
            activity,
        }
    }

    /// Check if this permission applies to a request
    ///
    /// PUBLISH topics are matched against the filter. SUBSCRIBE filters must be
    /// fully covered by it.
    pub fn applies_to(&self, request: &AuthorizationRequest<'_>) -> bool {
        if !self.activity.permits(request.action) || !self.qos.contains(request.qos) {
            return false;
        }

        let matcher = TopicMatcher::new();
        match request.action {
            MqttAction::Publish => matcher.matches(request.topic, &self.topic),
            MqttAction::Subscribe => matcher.covers(&self.topic, request.topic),
        }
    }
}

/// Topic access being authorized
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationRequest<'a> {
    /// Topic name (PUBLISH) or topic filter (SUBSCRIBE)
    pub topic: &'a str,
    /// Requested QoS level
    pub qos: u8,
    pub action: MqttAction,
}

impl<'a> AuthorizationRequest<'a> {
    pub fn publish(topic: &'a str, qos: u8) -> Self {
        Self {
            topic,
            qos,
            action: MqttAction::Publish,
        }
    }

    pub fn subscribe(topic_filter: &'a str, qos: u8) -> Self {
        Self {
            topic: topic_filter,
            qos,
            action: MqttAction::Subscribe,
        }
    }
}

/// Ordered permissions granted to one client
///
/// Immutable once built; clones share the same allocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PermissionSet(Arc<[TopicPermission]>);

impl PermissionSet {
    /// A set granting nothing
    pub fn empty() -> Self {
        Self(Arc::from(Vec::new()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TopicPermission> {
        self.0.iter()
    }

    /// Whether both handles point at the same stored set
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Permissions that apply to a request, in order
    pub fn matching<'s>(
        &'s self,
        request: &'s AuthorizationRequest<'s>,
    ) -> impl Iterator<Item = &'s TopicPermission> + 's {
        self.0.iter().filter(move |p| p.applies_to(request))
    }

    /// Decide a request, or `None` when no permission applies
    ///
    /// The most permissive applicable permission wins: a matching allow
    /// overrides a matching deny.
    pub fn decide(&self, request: &AuthorizationRequest<'_>) -> Option<PermissionDecision> {
        self.matching(request)
            .map(|p| p.decision)
            .reduce(|acc, d| match (acc, d) {
                (PermissionDecision::Allow, _) | (_, PermissionDecision::Allow) => {
                    PermissionDecision::Allow
                }
                _ => PermissionDecision::Deny,
            })
    }
}

impl Default for PermissionSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<TopicPermission>> for PermissionSet {
    fn from(permissions: Vec<TopicPermission>) -> Self {
        Self(Arc::from(permissions))
    }
}

impl FromIterator<TopicPermission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = TopicPermission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_qos_levels() {
        assert!(QosLevels::All.contains(0));
        assert!(QosLevels::All.contains(2));
        assert!(!QosLevels::All.contains(3));
        assert!(QosLevels::ZeroTwo.contains(2));
        assert!(!QosLevels::ZeroTwo.contains(1));
        assert!(!QosLevels::One.contains(0));
    }

    #[test]
    fn test_activity_permits() {
        assert!(Activity::All.permits(MqttAction::Publish));
        assert!(Activity::All.permits(MqttAction::Subscribe));
        assert!(Activity::Publish.permits(MqttAction::Publish));
        assert!(!Activity::Publish.permits(MqttAction::Subscribe));
    }

    #[test]
    fn test_applies_to_publish_and_subscribe() {
        let permission = TopicPermission::allow("device42/#", QosLevels::All, Activity::All);

        assert!(permission.applies_to(&AuthorizationRequest::publish("device42/temp", 1)));
        assert!(permission.applies_to(&AuthorizationRequest::subscribe("device42/+/temp", 2)));
        assert!(!permission.applies_to(&AuthorizationRequest::publish("device43/temp", 1)));
        assert!(!permission.applies_to(&AuthorizationRequest::subscribe("#", 0)));
    }

    #[test]
    fn test_most_permissive_match_wins() {
        let set: PermissionSet = vec![
            TopicPermission::deny("device42/#", QosLevels::All, Activity::All),
            TopicPermission::allow("device42/public/#", QosLevels::ZeroOne, Activity::Publish),
        ]
        .into();

        let public = AuthorizationRequest::publish("device42/public/status", 1);
        assert_eq!(set.decide(&public), Some(PermissionDecision::Allow));

        // QoS 2 is outside the allow, only the deny applies
        let public_qos2 = AuthorizationRequest::publish("device42/public/status", 2);
        assert_eq!(set.decide(&public_qos2), Some(PermissionDecision::Deny));

        let elsewhere = AuthorizationRequest::publish("other/topic", 0);
        assert_eq!(set.decide(&elsewhere), None);
    }

    #[test]
    fn test_empty_set_never_decides() {
        let set = PermissionSet::empty();
        assert!(set.is_empty());
        assert_eq!(set.decide(&AuthorizationRequest::publish("a/b", 0)), None);
    }

    #[test]
    fn test_clones_share_storage() {
        let set: PermissionSet =
            vec![TopicPermission::allow("a/#", QosLevels::All, Activity::All)].into();
        let copy = set.clone();
        assert!(set.ptr_eq(&copy));

        let rebuilt: PermissionSet =
            vec![TopicPermission::allow("a/#", QosLevels::All, Activity::All)].into();
        assert_eq!(set, rebuilt);
        assert!(!set.ptr_eq(&rebuilt));
    }
}
