//! Call session state types.

use crate::protocol::CallUpdate;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// An inbound ringing notification not yet accepted or rejected.
#[derive(Debug, Clone, Serialize)]
pub struct PendingInvite {
    pub invite_id: String,
    pub counterparty_address: String,
    pub display_name: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl PendingInvite {
    pub fn from_update(update: &CallUpdate) -> Self {
        Self {
            invite_id: update.call_id.clone(),
            counterparty_address: update.caller_id_number.clone().unwrap_or_default(),
            display_name: update.caller_id_name.clone(),
            received_at: Utc::now(),
        }
    }
}

/// Progress of an established call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CallPhase {
    /// Command issued, waiting for the service to report the call active.
    Connecting,
    /// Media is up.
    Active,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveCall {
    pub call_id: String,
    pub phase: CallPhase,
    pub started_at: DateTime<Utc>,
}

impl ActiveCall {
    pub fn connecting(call_id: String) -> Self {
        Self {
            call_id,
            phase: CallPhase::Connecting,
            started_at: Utc::now(),
        }
    }

    pub fn active(call_id: String) -> Self {
        Self {
            call_id,
            phase: CallPhase::Active,
            started_at: Utc::now(),
        }
    }
}

/// The single call slot of a session.
///
/// The manager never holds more than one pending invite and one active call;
/// modeling the slot as a tagged union makes "both present" unrepresentable.
#[derive(Debug, Clone, Default, Serialize)]
pub enum CallSlot {
    #[default]
    Idle,
    Ringing(PendingInvite),
    InCall(ActiveCall),
}

impl CallSlot {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn invite(&self) -> Option<&PendingInvite> {
        match self {
            Self::Ringing(invite) => Some(invite),
            _ => None,
        }
    }

    pub fn call(&self) -> Option<&ActiveCall> {
        match self {
            Self::InCall(call) => Some(call),
            _ => None,
        }
    }
}

/// Session state derived from the registration flag and the call slot.
/// Never stored redundantly, so it cannot diverge from the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Idle,
    Ringing,
    InCall,
}
