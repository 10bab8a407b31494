//! Support agent types.
//!
//! Agents are the admin-side answerers of support calls. Their availability
//! lives inside the queue manager's assignment critical section; this module
//! only defines the shapes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique agent identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentId(pub String);

impl AgentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Agent availability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Not logged in; never assignable.
    Offline,
    /// Free to take the next assignment.
    Available,
    /// On a call.
    Busy,
}

/// A registered support agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub display_name: String,
    pub status: AgentStatus,
    /// When the agent last became available; assignment prefers the agent
    /// who has waited longest.
    pub available_since: Option<DateTime<Utc>>,
}

impl Agent {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(id),
            display_name: display_name.into(),
            status: AgentStatus::Offline,
            available_since: None,
        }
    }
}
