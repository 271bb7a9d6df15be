//! Connection lifecycle for the signaling transport.

use crate::credentials::Credential;
use crate::protocol::Command;
use crate::socket::error::{Result, SocketError};
use crate::socket::transport::{ChannelEvent, Transport, TransportFactory};
use log::debug;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::sync::mpsc;

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Wraps a transport factory behind an idempotent connect/disconnect pair and
/// a single persistent event stream.
///
/// Events from every connection the channel ever opens are forwarded into the
/// one receiver handed out by [`SignalingChannel::new`], so the consumer's
/// event loop survives a teardown-and-register cycle.
pub struct SignalingChannel {
    factory: Arc<dyn TransportFactory>,
    transport: Mutex<Option<Arc<dyn Transport>>>,
    is_connected: Arc<Mutex<bool>>,
    events_tx: mpsc::Sender<ChannelEvent>,
}

impl SignalingChannel {
    pub fn new(factory: Arc<dyn TransportFactory>) -> (Self, mpsc::Receiver<ChannelEvent>) {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let channel = Self {
            factory,
            transport: Mutex::new(None),
            is_connected: Arc::new(Mutex::new(false)),
            events_tx,
        };
        (channel, events_rx)
    }

    pub async fn is_connected(&self) -> bool {
        *self.is_connected.lock().await
    }

    /// Opens the channel. A second call while already connected is a no-op
    /// that resolves immediately.
    pub async fn connect(&self, credential: &Credential) -> Result<()> {
        let mut connected = self.is_connected.lock().await;
        if *connected {
            debug!("connect called while already connected; ignoring");
            return Ok(());
        }

        let (transport, mut transport_events) = self.factory.connect(credential).await?;
        *self.transport.lock().await = Some(transport);
        *connected = true;

        let events_tx = self.events_tx.clone();
        let is_connected = self.is_connected.clone();
        tokio::task::spawn(async move {
            while let Some(event) = transport_events.recv().await {
                let closed = matches!(event, ChannelEvent::Closed);
                if closed {
                    *is_connected.lock().await = false;
                }
                if events_tx.send(event).await.is_err() {
                    break;
                }
                if closed {
                    break;
                }
            }
        });

        Ok(())
    }

    /// Sends a control command over the live transport.
    pub async fn send_command(&self, command: &Command) -> Result<()> {
        let transport_guard = self.transport.lock().await;
        let transport = transport_guard.as_ref().ok_or(SocketError::SocketClosed)?;
        transport.send(command).await
    }

    /// Closes the channel. A no-op when not connected.
    pub async fn disconnect(&self) {
        let mut connected = self.is_connected.lock().await;
        if !*connected {
            return;
        }
        *connected = false;
        if let Some(transport) = self.transport.lock().await.take() {
            transport.disconnect().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::transport::mock::MockTransportFactory;
    use chrono::Utc;

    fn test_credential() -> Credential {
        Credential {
            identity: "agent-17".to_string(),
            secret: "s3cret".to_string(),
            issued_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn connect_is_idempotent() {
        let factory = Arc::new(MockTransportFactory::new());
        let (channel, _events) = SignalingChannel::new(factory.clone());

        channel.connect(&test_credential()).await.unwrap();
        channel.connect(&test_credential()).await.unwrap();

        assert!(channel.is_connected().await);
        assert_eq!(factory.connects(), 1);
    }

    #[tokio::test]
    async fn send_without_connect_fails_closed() {
        let factory = Arc::new(MockTransportFactory::new());
        let (channel, _events) = SignalingChannel::new(factory);

        let err = channel
            .send_command(&Command::Answer {
                call_id: "c1".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, SocketError::SocketClosed));
    }

    #[tokio::test]
    async fn transport_close_clears_connected_flag() {
        let factory = Arc::new(MockTransportFactory::new());
        let (channel, mut events) = SignalingChannel::new(factory.clone());

        channel.connect(&test_credential()).await.unwrap();
        assert!(matches!(events.recv().await, Some(ChannelEvent::Opened)));

        factory
            .event_sender()
            .send(ChannelEvent::Closed)
            .await
            .unwrap();
        assert!(matches!(events.recv().await, Some(ChannelEvent::Closed)));
        assert!(!channel.is_connected().await);
    }

    #[tokio::test]
    async fn disconnect_without_connect_is_noop() {
        let factory = Arc::new(MockTransportFactory::new());
        let (channel, _events) = SignalingChannel::new(factory);
        channel.disconnect().await;
        assert!(!channel.is_connected().await);
    }
}
