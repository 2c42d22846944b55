//! Error types for the authorization module

use thiserror::Error;

/// Errors raised while building or running the authorization callback
#[derive(Debug, Error)]
pub enum AuthzError {
    /// The client identifier cannot root a permission subtree
    #[error("invalid client identifier {client_id:?}: {reason}")]
    InvalidClientId {
        client_id: String,
        reason: &'static str,
    },

    /// A publish topic is empty or contains wildcards or NUL
    #[error("invalid publish topic {0:?}")]
    InvalidTopic(String),

    /// A topic filter is not a valid MQTT filter
    #[error("invalid topic filter {0:?}")]
    InvalidTopicFilter(String),

    /// QoS outside 0..=2
    #[error("invalid QoS level {0}")]
    InvalidQos(u8),

    /// Configuration could not be applied
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A permission evaluator failed to produce a permission set
    #[error("evaluator '{evaluator}' failed: {message}")]
    Evaluator { evaluator: String, message: String },
}

impl AuthzError {
    pub fn invalid_client_id(client_id: &str, reason: &'static str) -> Self {
        Self::InvalidClientId {
            client_id: client_id.to_string(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthzError>;
