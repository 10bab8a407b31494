//! Core identifier and status types shared across the voice core.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Unique identifier for one attempted or completed call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallId(pub Uuid);

impl CallId {
    /// Generate a fresh call id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for CallId {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(CallId)
            .map_err(|_| LedgerError::invalid_input(format!("malformed call id: {s}")))
    }
}

/// Identifier for a call participant, opaque to this subsystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyId(pub String);

impl PartyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PartyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of participant on either leg of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartyKind {
    Customer,
    Partner,
    Admin,
}

impl PartyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Partner => "partner",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "customer" => Ok(Self::Customer),
            "partner" => Ok(Self::Partner),
            "admin" => Ok(Self::Admin),
            other => Err(LedgerError::invalid_input(format!(
                "unknown party kind: {other}"
            ))),
        }
    }
}

impl fmt::Display for PartyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One leg of a call: who, and what kind of account they hold.
///
/// Identity is always passed in explicitly by the embedding application;
/// nothing in the voice core resolves a "current user" from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Party {
    pub id: PartyId,
    pub kind: PartyKind,
}

/// Well-known id for the shared support intake receiver. Support calls ring
/// against this party until an agent is assigned.
pub const SUPPORT_INTAKE_ID: &str = "support";

impl Party {
    pub fn new(id: impl Into<String>, kind: PartyKind) -> Self {
        Self {
            id: PartyId::new(id),
            kind,
        }
    }

    pub fn customer(id: impl Into<String>) -> Self {
        Self::new(id, PartyKind::Customer)
    }

    pub fn partner(id: impl Into<String>) -> Self {
        Self::new(id, PartyKind::Partner)
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Self::new(id, PartyKind::Admin)
    }

    /// The shared support intake party queued calls are created against.
    pub fn support_intake() -> Self {
        Self::admin(SUPPORT_INTAKE_ID)
    }

    /// The intake party is exempt from the one-active-call rule.
    pub fn is_support_intake(&self) -> bool {
        self.kind == PartyKind::Admin && self.id.as_str() == SUPPORT_INTAKE_ID
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

/// Call lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    /// Signaling in progress, callee has not answered.
    Ringing,
    /// Both parties on the media path.
    Connected,
    /// Terminated after connecting, or cancelled by the caller pre-answer.
    Ended,
    /// Callee declined before answering.
    Rejected,
    /// Ring timeout elapsed with no answer.
    Missed,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ringing => "ringing",
            Self::Connected => "connected",
            Self::Ended => "ended",
            Self::Rejected => "rejected",
            Self::Missed => "missed",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "ringing" => Ok(Self::Ringing),
            "connected" => Ok(Self::Connected),
            "ended" => Ok(Self::Ended),
            "rejected" => Ok(Self::Rejected),
            "missed" => Ok(Self::Missed),
            other => Err(LedgerError::invalid_input(format!(
                "unknown call status: {other}"
            ))),
        }
    }

    /// Terminal states admit no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Rejected | Self::Missed)
    }

    /// Whether the call still occupies its participants.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Ringing | Self::Connected)
    }

    /// Legal transition table.
    pub fn can_transition_to(self, next: CallStatus) -> bool {
        use CallStatus::*;

        match (self, next) {
            (Ringing, Connected) => true,
            (Ringing, Rejected) => true,
            (Ringing, Missed) => true,
            // Caller cancel before answer lands on `ended` with a
            // caller_cancelled reason rather than a dedicated state.
            (Ringing, Ended) => true,

            (Connected, Ended) => true,

            // Terminal states are final.
            _ => false,
        }
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a call reached a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Either party hung up a connected call.
    Hangup,
    /// Callee declined while ringing.
    Rejected,
    /// Ring timeout elapsed with no answer.
    NoAnswer,
    /// Caller gave up before the callee answered.
    CallerCancelled,
    /// Administrative force-termination.
    AdminForced,
}

impl EndReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hangup => "hangup",
            Self::Rejected => "rejected",
            Self::NoAnswer => "no_answer",
            Self::CallerCancelled => "caller_cancelled",
            Self::AdminForced => "admin_forced",
        }
    }

    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        match s {
            "hangup" => Ok(Self::Hangup),
            "rejected" => Ok(Self::Rejected),
            "no_answer" => Ok(Self::NoAnswer),
            "caller_cancelled" => Ok(Self::CallerCancelled),
            "admin_forced" => Ok(Self::AdminForced),
            other => Err(LedgerError::invalid_input(format!(
                "unknown end reason: {other}"
            ))),
        }
    }
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            CallStatus::Ringing,
            CallStatus::Connected,
            CallStatus::Ended,
            CallStatus::Rejected,
            CallStatus::Missed,
        ] {
            assert_eq!(CallStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn terminal_states_admit_nothing() {
        for terminal in [CallStatus::Ended, CallStatus::Rejected, CallStatus::Missed] {
            for next in [
                CallStatus::Ringing,
                CallStatus::Connected,
                CallStatus::Ended,
                CallStatus::Rejected,
                CallStatus::Missed,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn connected_only_ends() {
        assert!(CallStatus::Connected.can_transition_to(CallStatus::Ended));
        assert!(!CallStatus::Connected.can_transition_to(CallStatus::Rejected));
        assert!(!CallStatus::Connected.can_transition_to(CallStatus::Missed));
        assert!(!CallStatus::Connected.can_transition_to(CallStatus::Ringing));
    }

    #[test]
    fn intake_party_is_recognized() {
        assert!(Party::support_intake().is_support_intake());
        assert!(!Party::admin("supervisor-1").is_support_intake());
        assert!(!Party::customer(SUPPORT_INTAKE_ID).is_support_intake());
    }
}
