//! Token usage counters.
//!
//! Counters are only ever combined by addition. A field the provider did not
//! report deserializes as zero, so partial reports merge cleanly.

use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

/// Per-field token counters for one or more model calls.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Usage {
    /// Prompt tokens.
    pub total_input_tokens: u64,
    /// Generated tokens.
    pub total_output_tokens: u64,
    /// Reasoning tokens.
    pub total_thought_tokens: u64,
    /// Prompt tokens served from cache.
    pub total_cached_tokens: u64,
    /// Tokens spent on tool-use prompts.
    pub total_tool_use_tokens: u64,
    /// Grand total as reported by the provider.
    pub total_tokens: u64,
}

impl Usage {
    /// Whether every counter is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

impl Add for Usage {
    type Output = Self;

    fn add(mut self, rhs: Self) -> Self {
        self += rhs;
        self
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Self) {
        self.total_input_tokens = self.total_input_tokens.saturating_add(rhs.total_input_tokens);
        self.total_output_tokens = self
            .total_output_tokens
            .saturating_add(rhs.total_output_tokens);
        self.total_thought_tokens = self
            .total_thought_tokens
            .saturating_add(rhs.total_thought_tokens);
        self.total_cached_tokens = self
            .total_cached_tokens
            .saturating_add(rhs.total_cached_tokens);
        self.total_tool_use_tokens = self
            .total_tool_use_tokens
            .saturating_add(rhs.total_tool_use_tokens);
        self.total_tokens = self.total_tokens.saturating_add(rhs.total_tokens);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_default_to_zero() {
        let usage: Usage = serde_json::from_str(r#"{"total_tokens": 10}"#).unwrap();
        assert_eq!(usage.total_tokens, 10);
        assert_eq!(usage.total_input_tokens, 0);
        assert_eq!(usage.total_thought_tokens, 0);
    }

    #[test]
    fn addition_is_per_field() {
        let a = Usage {
            total_tokens: 10,
            total_input_tokens: 4,
            ..Usage::default()
        };
        let b = Usage {
            total_tokens: 15,
            total_output_tokens: 7,
            ..Usage::default()
        };
        let sum = a + b;
        assert_eq!(sum.total_tokens, 25);
        assert_eq!(sum.total_input_tokens, 4);
        assert_eq!(sum.total_output_tokens, 7);
    }

    #[test]
    fn add_assign_never_decreases() {
        let mut total = Usage {
            total_tokens: 3,
            ..Usage::default()
        };
        total += Usage::default();
        assert_eq!(total.total_tokens, 3);
    }

    #[test]
    fn is_empty() {
        assert!(Usage::default().is_empty());
        assert!(
            !Usage {
                total_cached_tokens: 1,
                ..Usage::default()
            }
            .is_empty()
        );
    }
}
