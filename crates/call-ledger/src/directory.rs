//! Party directory capability.
//!
//! Display-name resolution lives outside this subsystem; the ledger only
//! needs a lookup at call-creation time so history rows carry searchable
//! names.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::types::PartyId;

/// Resolves a party id to a human-readable display name.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Returns `None` when the party is unknown; the ledger then falls back
    /// to the raw id.
    async fn display_name(&self, party: &PartyId) -> Option<String>;
}

/// Fixed in-memory directory, useful for tests and single-process embeds.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    names: HashMap<String, String>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.names.insert(id.into(), name.into());
        self
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn display_name(&self, party: &PartyId) -> Option<String> {
        self.names.get(party.as_str()).cloned()
    }
}
