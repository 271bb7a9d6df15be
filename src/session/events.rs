//! Typed event bus for call lifecycle observers.

use crate::session::state::PendingInvite;
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 16;

/// An inbound call is ringing.
#[derive(Debug, Clone)]
pub struct InviteReceived {
    pub invite: PendingInvite,
}

/// A call became active.
#[derive(Debug, Clone)]
pub struct CallConnected {
    pub call_id: String,
}

/// A call was ended by the remote side or by session teardown.
#[derive(Debug, Clone)]
pub struct CallDisconnected {
    pub call_id: String,
}

// Macro to generate EventBus fields and constructor
macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a separate broadcast channel per event kind.
        ///
        /// Any number of consumers may subscribe; dispatch never blocks, and
        /// a missing or lagging subscriber cannot prevent state cleanup in
        /// the notification path.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    (invite, Arc<InviteReceived>),
    (connected, Arc<CallConnected>),
    (disconnected, Arc<CallDisconnected>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
