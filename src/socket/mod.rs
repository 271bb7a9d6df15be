//! Signaling channel: a dumb transport plus typed event source.
//!
//! The channel carries call-control notifications and commands, independent
//! of any media path. It performs no interpretation of notifications and no
//! reconnection on close — a host that wants the session back after a drop
//! registers again.

pub mod channel;
pub mod error;
pub mod transport;

pub use channel::SignalingChannel;
pub use error::{Result, SocketError};
pub use transport::{ChannelEvent, Transport, TransportFactory, WebSocketTransportFactory};
