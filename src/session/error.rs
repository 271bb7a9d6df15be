//! Session-level error types.

use crate::credentials::CredentialError;
use crate::socket::SocketError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    /// Credential fetch failed; registration never reached the network
    /// (`NotAuthenticated`) or the issuing endpoint rejected us.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// The signaling channel could not be opened.
    #[error("signaling channel error: {0}")]
    Channel(#[from] SocketError),

    /// An accept/hangup/dial command failed on the wire. Local call state is
    /// already consistent when this surfaces.
    #[error("call command failed: {0}")]
    Command(#[source] SocketError),

    /// The session is not registered with the signaling service.
    #[error("telephony session is not registered")]
    NotRegistered,

    /// The single call slot is occupied.
    #[error("another call is already in progress")]
    CallInProgress,
}
