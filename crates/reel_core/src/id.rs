//! Identifiers for sessions and steps.
//!
//! Recorders may use any string as an identifier; generated IDs are
//! prefixed UUIDs.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Session identifier - identifies one recorded run
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wrap an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("sess_{}", Uuid::new_v4()))
    }

    /// Get as str
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Step identifier - identifies one recorded step
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
    /// Wrap an existing identifier
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random identifier
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("step_{}", Uuid::new_v4()))
    }

    /// Get as str
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StepId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_id_generate() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("sess_"));
    }

    #[test]
    fn test_step_id_generate() {
        let id = StepId::generate();
        assert!(id.to_string().starts_with("step_"));
    }

    #[test]
    fn test_ids_are_transparent_in_json() {
        let id = SessionId::new("sess-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sess-1\"");
        let back: SessionId = serde_json::from_str("\"sess-1\"").unwrap();
        assert_eq!(back, id);
    }
}
