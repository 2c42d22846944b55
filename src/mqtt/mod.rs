//! MQTT protocol helpers
//!
//! Topic filter matching and validation used by permission evaluation.

mod topic;

pub use topic::TopicMatcher;
