//! MQTT topic matching with wildcards
//!
//! Implements topic filter matching per the MQTT 3.1.1 and 5.0 specifications,
//! plus filter containment for authorizing SUBSCRIBE requests.

const SEPARATOR: char = '/';
const SINGLE_LEVEL: &str = "+";
const MULTI_LEVEL: &str = "#";

/// Topic matcher for MQTT topic filters
#[derive(Debug, Clone, Copy, Default)]
pub struct TopicMatcher;

impl TopicMatcher {
    /// Create a new topic matcher
    pub fn new() -> Self {
        Self
    }

    /// Check if a topic name matches a topic filter
    ///
    /// * `+` matches exactly one topic level
    /// * `#` matches the parent level and everything beneath it
    /// * Topics starting with `$` are never matched by a leading wildcard
    ///
    /// # Examples
    /// ```
    /// use sentinel_agent_mqtt_authz::mqtt::TopicMatcher;
    ///
    /// let matcher = TopicMatcher::new();
    /// assert!(matcher.matches("device42/telemetry", "device42/#"));
    /// assert!(matcher.matches("device42", "device42/#"));
    /// assert!(!matcher.matches("device43/telemetry", "device42/#"));
    /// ```
    pub fn matches(&self, topic: &str, filter: &str) -> bool {
        if self.is_system_topic(topic) && starts_with_wildcard(filter) {
            return false;
        }

        let mut topic_levels = topic.split(SEPARATOR);
        let mut filter_levels = filter.split(SEPARATOR).peekable();

        while let Some(f_level) = filter_levels.next() {
            if f_level == MULTI_LEVEL {
                return filter_levels.peek().is_none();
            }

            match topic_levels.next() {
                Some(_) if f_level == SINGLE_LEVEL => {}
                Some(t_level) if t_level == f_level => {}
                _ => return false,
            }
        }

        topic_levels.next().is_none()
    }

    /// Check if every topic matched by `requested` is also matched by `granted`
    ///
    /// Used for SUBSCRIBE: a client may subscribe to `device42/+/temp` when it
    /// holds `device42/#`, but not to `#` or `+/temp`.
    pub fn covers(&self, granted: &str, requested: &str) -> bool {
        if starts_with_wildcard(requested) && !starts_with_wildcard(granted) {
            return false;
        }
        if self.is_system_topic(requested) && starts_with_wildcard(granted) {
            return false;
        }

        let mut granted_levels = granted.split(SEPARATOR).peekable();
        let mut requested_levels = requested.split(SEPARATOR);

        while let Some(g_level) = granted_levels.next() {
            if g_level == MULTI_LEVEL {
                return granted_levels.peek().is_none();
            }

            let Some(r_level) = requested_levels.next() else {
                return false;
            };

            let level_covered = if g_level == SINGLE_LEVEL {
                r_level != MULTI_LEVEL
            } else {
                r_level == g_level
            };
            if !level_covered {
                return false;
            }
        }

        requested_levels.next().is_none()
    }

    /// Check if a topic filter is valid
    ///
    /// # Rules
    /// * `#` must be the last level and alone in it
    /// * `+` must be alone in its level
    /// * No NUL characters
    pub fn is_valid_filter(&self, filter: &str) -> bool {
        if filter.is_empty() || filter.contains('\0') {
            return false;
        }

        let level_count = filter.split(SEPARATOR).count();
        filter.split(SEPARATOR).enumerate().all(|(i, level)| {
            let multi_ok = !level.contains('#') || (level == MULTI_LEVEL && i == level_count - 1);
            let single_ok = !level.contains('+') || level == SINGLE_LEVEL;
            multi_ok && single_ok
        })
    }

    /// Check if a topic name is valid (no wildcards allowed)
    pub fn is_valid_topic(&self, topic: &str) -> bool {
        !topic.is_empty() && !topic.contains(['+', '#', '\0'])
    }

    /// Check if a topic is a system topic (starts with $)
    pub fn is_system_topic(&self, topic: &str) -> bool {
        topic.starts_with('$')
    }

    /// Filter granting a level and everything beneath it
    pub fn subtree_filter(&self, root: &str) -> String {
        format!("{root}{SEPARATOR}{MULTI_LEVEL}")
    }
}

fn starts_with_wildcard(filter: &str) -> bool {
    filter.starts_with(['+', '#'])
}
