//! Transport seam for the signaling channel.
//!
//! The concrete implementation speaks JSON text frames over a WebSocket; the
//! traits exist so the session manager can be driven by a mock in tests.

use crate::credentials::Credential;
use crate::protocol::{Command, Notification};
use crate::socket::error::{Result, SocketError};
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, trace, warn};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// An event produced by the signaling channel.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// The channel is open and authenticated.
    Opened,
    /// The connection is gone.
    Closed,
    /// A transport-level failure. Forwarded verbatim; does not by itself
    /// close the channel.
    Error(String),
    /// A decoded notification from the call-control service.
    Notification(Notification),
}

/// Represents an active connection to the signaling service.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends a control command to the service.
    async fn send(&self, command: &Command) -> Result<()>;

    /// Closes the connection.
    async fn disconnect(&self);
}

/// A factory responsible for creating new transport instances.
#[async_trait]
pub trait TransportFactory: Send + Sync {
    /// Opens a connection authorized by `credential` and returns it, along
    /// with a stream of events.
    async fn connect(
        &self,
        credential: &Credential,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<ChannelEvent>)>;
}

type RawWs = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<RawWs, Message>;
type WsStream = SplitStream<RawWs>;

const EVENT_CHANNEL_CAPACITY: usize = 100;

/// WebSocket transport speaking the JSON signaling protocol.
pub struct WebSocketTransport {
    ws_sink: Mutex<Option<WsSink>>,
}

impl WebSocketTransport {
    fn new(sink: WsSink) -> Self {
        Self {
            ws_sink: Mutex::new(Some(sink)),
        }
    }
}

#[async_trait]
impl Transport for WebSocketTransport {
    async fn send(&self, command: &Command) -> Result<()> {
        let mut sink_guard = self.ws_sink.lock().await;
        let sink = sink_guard.as_mut().ok_or(SocketError::SocketClosed)?;

        let payload = serde_json::to_string(command)?;
        trace!("--> Sending command frame: {} bytes", payload.len());
        sink.send(Message::Text(payload.into()))
            .await
            .map_err(|e| SocketError::WebSocket(e.to_string()))?;
        Ok(())
    }

    async fn disconnect(&self) {
        let mut sink_guard = self.ws_sink.lock().await;
        if let Some(mut sink) = sink_guard.take() {
            let _ = sink.close().await;
        }
    }
}

/// Factory for WebSocket transports.
pub struct WebSocketTransportFactory {
    url: String,
}

impl WebSocketTransportFactory {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl TransportFactory for WebSocketTransportFactory {
    async fn connect(
        &self,
        credential: &Credential,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<ChannelEvent>)> {
        if self.url.is_empty() {
            return Err(SocketError::InvalidUrl("empty signaling URL".to_string()));
        }

        info!("Dialing {}", self.url);
        let (client, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| SocketError::WebSocket(e.to_string()))?;

        let (sink, stream) = client.split();
        let transport = Arc::new(WebSocketTransport::new(sink));

        // Authenticate before anything else flows on the socket.
        transport
            .send(&Command::Login {
                identity: credential.identity.clone(),
                secret: credential.secret.clone(),
            })
            .await?;

        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let event_tx_clone = event_tx.clone();
        tokio::task::spawn(read_pump(stream, event_tx_clone));

        let _ = event_tx.send(ChannelEvent::Opened).await;

        Ok((transport, event_rx))
    }
}

async fn read_pump(mut stream: WsStream, event_tx: mpsc::Sender<ChannelEvent>) {
    loop {
        match stream.next().await {
            Some(Ok(Message::Text(text))) => {
                debug!("<-- Received signaling frame: {} bytes", text.len());
                match serde_json::from_str::<Notification>(text.as_str()) {
                    Ok(notification) => {
                        if event_tx
                            .send(ChannelEvent::Notification(notification))
                            .await
                            .is_err()
                        {
                            warn!("Event receiver dropped, closing read pump");
                            break;
                        }
                    }
                    Err(e) => {
                        // Undecodable frames are surfaced, not fatal.
                        warn!("Failed to decode notification: {e}");
                        let _ = event_tx.send(ChannelEvent::Error(e.to_string())).await;
                    }
                }
            }
            Some(Ok(Message::Close(_))) => {
                trace!("Received close frame");
                break;
            }
            Some(Ok(_)) => {
                // Binary/ping/pong frames carry nothing for this protocol.
            }
            Some(Err(e)) => {
                error!("Error reading from websocket: {e}");
                let _ = event_tx.send(ChannelEvent::Error(e.to_string())).await;
                break;
            }
            None => {
                trace!("Websocket stream ended");
                break;
            }
        }
    }

    let _ = event_tx.send(ChannelEvent::Closed).await;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// A mock transport that records commands and can be told to fail sends.
    #[derive(Default)]
    pub struct MockTransport {
        sent: std::sync::Mutex<Vec<Command>>,
        fail_sends: AtomicBool,
    }

    impl MockTransport {
        pub fn sent(&self) -> Vec<Command> {
            self.sent.lock().unwrap().clone()
        }

        pub fn set_fail_sends(&self, fail: bool) {
            self.fail_sends.store(fail, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl Transport for MockTransport {
        async fn send(&self, command: &Command) -> Result<()> {
            self.sent.lock().unwrap().push(command.clone());
            if self.fail_sends.load(Ordering::SeqCst) {
                return Err(SocketError::SocketClosed);
            }
            Ok(())
        }

        async fn disconnect(&self) {}
    }

    /// A mock factory handing out a shared [`MockTransport`] and keeping the
    /// event sender so tests can inject channel events.
    #[derive(Default)]
    pub struct MockTransportFactory {
        transport: Arc<MockTransport>,
        event_tx: std::sync::Mutex<Option<mpsc::Sender<ChannelEvent>>>,
        connects: AtomicUsize,
    }

    impl MockTransportFactory {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn transport(&self) -> Arc<MockTransport> {
            self.transport.clone()
        }

        pub fn connects(&self) -> usize {
            self.connects.load(Ordering::SeqCst)
        }

        pub fn event_sender(&self) -> mpsc::Sender<ChannelEvent> {
            self.event_tx
                .lock()
                .unwrap()
                .clone()
                .expect("not connected")
        }
    }

    #[async_trait]
    impl TransportFactory for MockTransportFactory {
        async fn connect(
            &self,
            _credential: &Credential,
        ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<ChannelEvent>)> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            let _ = event_tx.send(ChannelEvent::Opened).await;
            *self.event_tx.lock().unwrap() = Some(event_tx);
            Ok((self.transport.clone(), event_rx))
        }
    }
}
