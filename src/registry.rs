//! Callback registry and authorization pipeline
//!
//! Stands in for the broker side of the contract: callbacks are consulted in
//! priority order, the first one with an applicable permission or a terminal
//! no-match behaviour decides, and the pipeline fallback applies when every
//! callback abstains.

use std::sync::Arc;
use tracing::debug;

use crate::callback::AuthorizationCallback;
use crate::config::{AuthorizationBehaviour, ClientData, MqttAction, PipelineConfig};
use crate::error::{AuthzError, Result};
use crate::mqtt::TopicMatcher;
use crate::permission::{AuthorizationRequest, PermissionDecision};

/// Result of an authorization check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationDecision {
    /// Whether access is allowed
    pub allowed: bool,
    /// Name of the deciding callback (if any)
    pub callback: Option<String>,
    /// Reason for the decision
    pub reason: String,
}

impl AuthorizationDecision {
    pub fn allow(callback: &str) -> Self {
        Self {
            allowed: true,
            callback: Some(callback.to_string()),
            reason: format!("Allowed by permission from: {}", callback),
        }
    }

    pub fn deny(callback: &str) -> Self {
        Self {
            allowed: false,
            callback: Some(callback.to_string()),
            reason: format!("Denied by permission from: {}", callback),
        }
    }

    pub fn allow_on_no_match(callback: &str) -> Self {
        Self {
            allowed: true,
            callback: Some(callback.to_string()),
            reason: format!("No matching permission, allowed by default of: {}", callback),
        }
    }

    pub fn deny_on_no_match(callback: &str) -> Self {
        Self {
            allowed: false,
            callback: Some(callback.to_string()),
            reason: format!("No matching permission, denied by default of: {}", callback),
        }
    }

    pub fn fallback(decision: PermissionDecision) -> Self {
        let (allowed, reason) = match decision {
            PermissionDecision::Allow => (true, "No callback decided, fallback allow"),
            PermissionDecision::Deny => (false, "No callback decided, fallback deny"),
        };
        Self {
            allowed,
            callback: None,
            reason: reason.to_string(),
        }
    }

    pub fn invalid(reason: &str) -> Self {
        Self {
            allowed: false,
            callback: None,
            reason: reason.to_string(),
        }
    }
}

/// Ordered set of authorization callbacks
pub struct CallbackRegistry {
    /// Sorted by priority, registration order among equals
    callbacks: Vec<Arc<dyn AuthorizationCallback>>,
    fallback: PermissionDecision,
    topic_matcher: TopicMatcher,
}

impl CallbackRegistry {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            callbacks: Vec::new(),
            fallback: config.fallback,
            topic_matcher: TopicMatcher::new(),
        }
    }

    /// Register a callback
    pub fn add_callback(&mut self, callback: Arc<dyn AuthorizationCallback>) {
        debug!(
            callback = %callback.name(),
            priority = ?callback.priority(),
            "Registering authorization callback"
        );
        self.callbacks.push(callback);
        // Stable sort keeps registration order among equal priorities
        self.callbacks.sort_by_key(|c| c.priority());
    }

    /// Authorize a topic access for a client
    pub fn authorize(
        &self,
        client: &ClientData,
        request: &AuthorizationRequest<'_>,
    ) -> AuthorizationDecision {
        if let Err(e) = self.validate_request(request) {
            debug!(
                client_id = %client.client_id,
                topic = %request.topic,
                error = %e,
                "Rejecting malformed authorization request"
            );
            return AuthorizationDecision::invalid(&e.to_string());
        }

        for callback in &self.callbacks {
            let permissions = callback.permissions_for_client(client);

            let decision = match permissions.decide(request) {
                Some(PermissionDecision::Allow) => AuthorizationDecision::allow(callback.name()),
                Some(PermissionDecision::Deny) => AuthorizationDecision::deny(callback.name()),
                None => match callback.behaviour_on_no_match() {
                    AuthorizationBehaviour::Allow => {
                        AuthorizationDecision::allow_on_no_match(callback.name())
                    }
                    AuthorizationBehaviour::Deny => {
                        AuthorizationDecision::deny_on_no_match(callback.name())
                    }
                    AuthorizationBehaviour::Next => continue,
                },
            };

            debug!(
                callback = %callback.name(),
                client_id = %client.client_id,
                topic = %request.topic,
                action = ?request.action,
                qos = request.qos,
                allowed = decision.allowed,
                "Authorization decided"
            );
            return decision;
        }

        debug!(
            client_id = %client.client_id,
            topic = %request.topic,
            action = ?request.action,
            fallback = ?self.fallback,
            "No callback decided, using fallback"
        );
        AuthorizationDecision::fallback(self.fallback)
    }

    /// Check if a client may publish to a topic
    pub fn can_publish(&self, client: &ClientData, topic: &str, qos: u8) -> AuthorizationDecision {
        self.authorize(client, &AuthorizationRequest::publish(topic, qos))
    }

    /// Check if a client may subscribe to a topic filter
    pub fn can_subscribe(
        &self,
        client: &ClientData,
        topic_filter: &str,
        qos: u8,
    ) -> AuthorizationDecision {
        self.authorize(client, &AuthorizationRequest::subscribe(topic_filter, qos))
    }

    /// Get the number of registered callbacks
    pub fn callback_count(&self) -> usize {
        self.callbacks.len()
    }

    /// Names of registered callbacks in consultation order
    pub fn callback_names(&self) -> Vec<String> {
        self.callbacks.iter().map(|c| c.name().to_string()).collect()
    }

    /// Check that a request is well formed before any callback sees it
    pub fn validate_request(&self, request: &AuthorizationRequest<'_>) -> Result<()> {
        if request.qos > 2 {
            return Err(AuthzError::InvalidQos(request.qos));
        }
        match request.action {
            MqttAction::Publish if !self.topic_matcher.is_valid_topic(request.topic) => {
                Err(AuthzError::InvalidTopic(request.topic.to_string()))
            }
            MqttAction::Subscribe if !self.topic_matcher.is_valid_filter(request.topic) => {
                Err(AuthzError::InvalidTopicFilter(request.topic.to_string()))
            }
            _ => Ok(()),
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
