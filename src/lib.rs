//! Telephony session manager.
//!
//! Bridges an asynchronous call-control signaling channel to a well-defined
//! call lifecycle: credential issuance, a socket-based signaling channel, a
//! call session state machine, and a typed event bus for UI consumers.

pub mod config;
pub mod credentials;
pub mod http;
pub mod protocol;
pub mod session;
pub mod socket;

pub use config::SessionConfig;
pub use credentials::{Credential, CredentialError, CredentialProvider, TokenSupplier};
pub use http::{HttpClient, UreqHttpClient};
pub use protocol::{CallUpdate, Command, Notification, WireCallState};
pub use session::{
    ActiveCall, CallPhase, CallSessionManager, CallSlot, EventBus, PendingInvite, SessionError,
    SessionState,
};
pub use socket::{
    ChannelEvent, SignalingChannel, SocketError, Transport, TransportFactory,
    WebSocketTransportFactory,
};
