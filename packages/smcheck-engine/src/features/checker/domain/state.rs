//! Automaton states

use crate::shared::models::Expr;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Keyword attribute carried by a state (e.g. a tracked allocation size)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateAttr {
    Int(i64),
    Text(String),
    Expr(Expr),
}

impl fmt::Display for StateAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateAttr::Int(value) => write!(f, "{}", value),
            StateAttr::Text(text) => write!(f, "{:?}", text),
            StateAttr::Expr(expr) => write!(f, "{}", expr),
        }
    }
}

/// A named point in a checker's automaton, e.g. `ptr.null`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    pub attrs: BTreeMap<String, StateAttr>,
}

impl State {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: StateAttr) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Whether a state-list entry (possibly wildcarded) accepts this state
    pub fn matches(&self, pattern: &str) -> bool {
        state_name_matches(pattern, &self.name)
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if !self.attrs.is_empty() {
            let attrs: Vec<String> = self
                .attrs
                .iter()
                .map(|(key, value)| format!("{}={}", key, value))
                .collect();
            write!(f, "({})", attrs.join(", "))?;
        }
        Ok(())
    }
}

/// `*` alone matches everything; a leading `*` matches by suffix and a
/// trailing `*` by prefix
pub fn state_name_matches(pattern: &str, name: &str) -> bool {
    if pattern == "*" {
        true
    } else if let Some(suffix) = pattern.strip_prefix('*') {
        name.ends_with(suffix)
    } else if let Some(prefix) = pattern.strip_suffix('*') {
        name.starts_with(prefix)
    } else {
        pattern == name
    }
}

pub fn is_wildcard(pattern: &str) -> bool {
    pattern.starts_with('*') || pattern.ends_with('*')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(state_name_matches("ptr.null", "ptr.null"));
        assert!(state_name_matches("*.null", "ptr.null"));
        assert!(state_name_matches("ptr.*", "ptr.freed"));
        assert!(state_name_matches("*", "anything"));
        assert!(!state_name_matches("*.null", "ptr.nonnull.x"));
        assert!(!state_name_matches("ptr.null", "ptr.nonnull"));
        assert!(is_wildcard("ptr.*"));
    }

    #[test]
    fn test_display_with_attrs() {
        let state = State::new("buf.allocated").with_attr("size", StateAttr::Int(16));
        assert_eq!(state.to_string(), "buf.allocated(size=16)");
    }
}
