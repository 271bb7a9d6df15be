//! Call session state machine.
//!
//! Consumes signaling-channel notifications, tracks at most one pending
//! invite and at most one active call, and exposes the call lifecycle to
//! UI code.
//!
//! # Architecture
//!
//! - [`CallSlot`], [`PendingInvite`] & [`ActiveCall`]: tagged-union call
//!   state, so an invite and an active call cannot coexist
//! - [`SessionState`]: derived session state, computed on demand
//! - [`EventBus`]: typed broadcast channels for UI consumers
//! - [`CallSessionManager`]: lifecycle operations (`initialize`,
//!   `accept_call`, `reject_call`, `end_call`, `dial`, `unregister`)
//!
//! One manager instance exists per process; construct it once at startup and
//! pass the handle down rather than reaching for a global.

pub mod error;
pub mod events;
pub mod manager;
pub mod state;


pub use error::SessionError;
pub use events::{CallConnected, CallDisconnected, EventBus, InviteReceived};
pub use manager::CallSessionManager;
pub use state::{ActiveCall, CallPhase, CallSlot, PendingInvite, SessionState};
