//! Type definitions for the queue system

use std::fmt;
use std::str::FromStr;

/// Default number of messages retained per topic
pub const DEFAULT_TOPIC_CAPACITY: usize = 1000;

/// What `enqueue` does when a topic buffer is at capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FullPolicy {
    /// Fail immediately with `QueueError::TopicFull`
    #[default]
    Reject,
    /// Wait for space until the caller's token is cancelled
    Block,
}

impl fmt::Display for FullPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FullPolicy::Reject => write!(f, "reject"),
            FullPolicy::Block => write!(f, "block"),
        }
    }
}

impl FromStr for FullPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" => Ok(FullPolicy::Reject),
            "block" => Ok(FullPolicy::Block),
            other => Err(format!(
                "unknown full policy '{}' (expected 'reject' or 'block')",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_policy_parse_and_display() {
        assert_eq!("reject".parse::<FullPolicy>(), Ok(FullPolicy::Reject));
        assert_eq!("BLOCK".parse::<FullPolicy>(), Ok(FullPolicy::Block));
        assert!("drop".parse::<FullPolicy>().is_err());

        assert_eq!(FullPolicy::Block.to_string(), "block");
        assert_eq!(FullPolicy::default(), FullPolicy::Reject);
    }
}
