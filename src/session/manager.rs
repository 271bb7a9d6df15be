//! Session manager orchestrating the call lifecycle.

use crate::config::SessionConfig;
use crate::credentials::{CredentialProvider, TokenSupplier};
use crate::http::HttpClient;
use crate::protocol::{CallUpdate, Command, Notification, WireCallState};
use crate::session::error::SessionError;
use crate::session::events::{CallConnected, CallDisconnected, EventBus, InviteReceived};
use crate::session::state::{ActiveCall, CallPhase, CallSlot, PendingInvite, SessionState};
use crate::socket::{ChannelEvent, SignalingChannel, TransportFactory};
use log::{debug, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, mpsc};

#[derive(Default)]
struct Inner {
    registered: bool,
    call: CallSlot,
}

/// The telephony session state machine.
///
/// All UI-driven operations and all channel notifications are serialized
/// through one mutex, so the two input sources can never race against the
/// call slot. One instance per process, owned by the host and passed down;
/// its event loop runs for the lifetime of the process.
pub struct CallSessionManager {
    credentials: CredentialProvider,
    channel: SignalingChannel,
    events: EventBus,
    initializing: AtomicBool,
    inner: Mutex<Inner>,
}

impl CallSessionManager {
    /// Convenience constructor wiring the production HTTP client and
    /// WebSocket transport from `config`.
    pub fn with_defaults(config: SessionConfig) -> Arc<Self> {
        let factory = Arc::new(crate::socket::WebSocketTransportFactory::new(
            config.signaling_url.clone(),
        ));
        Self::new(config, Arc::new(crate::http::UreqHttpClient::new()), factory)
    }

    pub fn new(
        config: SessionConfig,
        http_client: Arc<dyn HttpClient>,
        factory: Arc<dyn TransportFactory>,
    ) -> Arc<Self> {
        let credentials = CredentialProvider::new(config.credential_endpoint, http_client);
        let (channel, events_rx) = SignalingChannel::new(factory);

        let manager = Arc::new(Self {
            credentials,
            channel,
            events: EventBus::new(),
            initializing: AtomicBool::new(false),
            inner: Mutex::new(Inner::default()),
        });

        let manager_clone = manager.clone();
        tokio::task::spawn(async move { manager_clone.event_loop(events_rx).await });

        manager
    }

    /// Lifecycle events for UI consumers.
    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Registers the session: fetches a telephony credential and opens the
    /// signaling channel. A second call while already registered is a no-op
    /// (no re-fetch, no reconnect). Failures surface to the caller; the UI
    /// must be able to show "service unavailable".
    ///
    /// The state lock is held for the whole registration, so an `unregister`
    /// racing an in-flight `initialize` waits for it to complete and then
    /// tears it down.
    pub async fn initialize(&self, supplier: &dyn TokenSupplier) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.registered {
            debug!("initialize called while already registered; ignoring");
            return Ok(());
        }

        self.initializing.store(true, Ordering::SeqCst);
        let _guard = scopeguard::guard((), |_| {
            self.initializing.store(false, Ordering::Relaxed);
        });

        let credential = self.credentials.fetch_credential(supplier).await?;
        self.channel.connect(&credential).await?;

        inner.registered = true;
        info!("Telephony session registered as {}", credential.identity);
        Ok(())
    }

    /// Tears the session down: disconnects the channel and clears all call
    /// state. Safe to call at any time.
    pub async fn unregister(&self) {
        let mut inner = self.inner.lock().await;
        info!("Unregistering telephony session");
        self.channel.disconnect().await;
        inner.registered = false;
        if let CallSlot::InCall(call) = std::mem::take(&mut inner.call) {
            self.dispatch_disconnected(call.call_id);
        }
    }

    /// Accepts the pending invite. With no invite pending this is a no-op
    /// that logs and returns Ok, so rapid double-taps in the UI are safe.
    ///
    /// On a command failure the error surfaces and the invite is retained —
    /// the caller may retry or reject.
    pub async fn accept_call(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let Some(invite) = inner.call.invite().cloned() else {
            debug!("accept_call with no pending invite; ignoring");
            return Ok(());
        };

        self.channel
            .send_command(&Command::Answer {
                call_id: invite.invite_id.clone(),
            })
            .await
            .map_err(SessionError::Command)?;

        info!(
            "Accepted call {} from {}",
            invite.invite_id, invite.counterparty_address
        );
        let call = ActiveCall::active(invite.invite_id);
        inner.call = CallSlot::InCall(call.clone());
        self.dispatch_connected(call.call_id);
        Ok(())
    }

    /// Rejects the pending invite. Never fails from the caller's
    /// perspective: the invite prompt must always be dismissible, so a
    /// failed hangup command is logged and the invite cleared regardless.
    pub async fn reject_call(&self) {
        let mut inner = self.inner.lock().await;
        let Some(invite) = inner.call.invite().cloned() else {
            debug!("reject_call with no pending invite; ignoring");
            return;
        };

        if let Err(e) = self
            .channel
            .send_command(&Command::Hangup {
                call_id: invite.invite_id.clone(),
            })
            .await
        {
            warn!("Reject command for {} failed: {e}", invite.invite_id);
        }

        info!("Rejected call {}", invite.invite_id);
        inner.call = CallSlot::Idle;
    }

    /// Ends the active call. The call slot is cleared before the hangup
    /// round-trip: the session must not stay `InCall` when the command
    /// fails. A command failure still surfaces so the caller may inspect it.
    pub async fn end_call(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        let Some(call) = inner.call.call().cloned() else {
            debug!("end_call with no active call; ignoring");
            return Ok(());
        };

        inner.call = CallSlot::Idle;
        info!("Ending call {}", call.call_id);

        self.channel
            .send_command(&Command::Hangup {
                call_id: call.call_id.clone(),
            })
            .await
            .map_err(|e| {
                warn!("Hangup command for {} failed: {e}", call.call_id);
                SessionError::Command(e)
            })?;
        Ok(())
    }

    /// Starts an outbound call. The call occupies the slot in `Connecting`
    /// phase; the service's `active` notification completes it.
    pub async fn dial(
        &self,
        destination_number: impl Into<String>,
        caller_id_number: Option<String>,
    ) -> Result<String, SessionError> {
        let destination_number = destination_number.into();
        let mut inner = self.inner.lock().await;
        if !inner.registered {
            return Err(SessionError::NotRegistered);
        }
        if !inner.call.is_idle() {
            return Err(SessionError::CallInProgress);
        }

        let call_id = generate_call_id();
        self.channel
            .send_command(&Command::NewCall {
                call_id: call_id.clone(),
                destination_number: destination_number.clone(),
                caller_id_number,
            })
            .await
            .map_err(SessionError::Command)?;

        info!("Dialing {destination_number} (call {call_id})");
        inner.call = CallSlot::InCall(ActiveCall::connecting(call_id.clone()));
        Ok(call_id)
    }

    /// Derived session state. `Connecting` is observable through an atomic
    /// fast-path while a registration holds the state lock.
    pub async fn session_state(&self) -> SessionState {
        if self.initializing.load(Ordering::SeqCst) {
            return SessionState::Connecting;
        }
        let inner = self.inner.lock().await;
        if !inner.registered {
            return SessionState::Disconnected;
        }
        match &inner.call {
            CallSlot::Idle => SessionState::Idle,
            CallSlot::Ringing(_) => SessionState::Ringing,
            CallSlot::InCall(_) => SessionState::InCall,
        }
    }

    pub async fn current_invite(&self) -> Option<PendingInvite> {
        self.inner.lock().await.call.invite().cloned()
    }

    pub async fn current_call(&self) -> Option<ActiveCall> {
        self.inner.lock().await.call.call().cloned()
    }

    async fn event_loop(self: Arc<Self>, mut events: mpsc::Receiver<ChannelEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_channel_event(event).await;
        }
    }

    pub(crate) async fn handle_channel_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Opened => debug!("Signaling channel opened"),
            ChannelEvent::Closed => self.handle_channel_closed().await,
            ChannelEvent::Error(e) => warn!("Signaling channel error: {e}"),
            ChannelEvent::Notification(notification) => {
                self.handle_notification(notification).await
            }
        }
    }

    async fn handle_channel_closed(&self) {
        let mut inner = self.inner.lock().await;
        if !inner.registered {
            return;
        }
        warn!("Signaling channel closed; session is disconnected");
        inner.registered = false;
        if let CallSlot::InCall(call) = std::mem::take(&mut inner.call) {
            self.dispatch_disconnected(call.call_id);
        }
    }

    pub(crate) async fn handle_notification(&self, notification: Notification) {
        match notification {
            Notification::CallUpdate { call } => self.handle_call_update(call).await,
            Notification::ClientReady => debug!("Signaling service ready"),
            Notification::Unknown => debug!("Ignoring unrecognized notification"),
        }
    }

    async fn handle_call_update(&self, update: CallUpdate) {
        let mut inner = self.inner.lock().await;
        match update.state {
            WireCallState::Ringing => match &inner.call {
                CallSlot::Idle => {
                    let invite = PendingInvite::from_update(&update);
                    info!(
                        "Incoming call {} from {}",
                        invite.invite_id, invite.counterparty_address
                    );
                    inner.call = CallSlot::Ringing(invite.clone());
                    let _ = self.events.invite.send(Arc::new(InviteReceived { invite }));
                }
                CallSlot::Ringing(existing) if existing.invite_id == update.call_id => {
                    debug!("Duplicate ringing notification for {}", update.call_id);
                }
                CallSlot::Ringing(existing) => {
                    // Only the first pending invite is tracked; a second
                    // concurrent offer is not queued.
                    warn!(
                        "Ignoring invite {} while {} is pending",
                        update.call_id, existing.invite_id
                    );
                }
                CallSlot::InCall(_) => {
                    debug!("Ignoring invite {} during an active call", update.call_id);
                }
            },
            WireCallState::Active => {
                if let CallSlot::InCall(call) = &mut inner.call
                    && call.call_id == update.call_id
                    && call.phase == CallPhase::Connecting
                {
                    call.phase = CallPhase::Active;
                    info!("Call {} is now active", call.call_id);
                    self.dispatch_connected(update.call_id);
                }
            }
            WireCallState::Done | WireCallState::Hangup => {
                let ends_invite = inner
                    .call
                    .invite()
                    .is_some_and(|invite| invite.invite_id == update.call_id);
                let ends_call = inner
                    .call
                    .call()
                    .is_some_and(|call| call.call_id == update.call_id);

                if ends_invite {
                    info!("Invite {} cancelled by remote", update.call_id);
                    inner.call = CallSlot::Idle;
                } else if ends_call {
                    info!("Call {} ended by remote", update.call_id);
                    inner.call = CallSlot::Idle;
                    self.dispatch_disconnected(update.call_id);
                } else {
                    // Redundant after a local clear, or a stale id; either
                    // way there is nothing to tear down.
                    debug!(
                        "Ignoring terminal notification for unknown call {}",
                        update.call_id
                    );
                }
            }
        }
    }

    fn dispatch_connected(&self, call_id: String) {
        let _ = self.events.connected.send(Arc::new(CallConnected { call_id }));
    }

    fn dispatch_disconnected(&self, call_id: String) {
        let _ = self
            .events
            .disconnected
            .send(Arc::new(CallDisconnected { call_id }));
    }
}

fn generate_call_id() -> String {
    let bytes: [u8; 16] = rand::random();
    hex::encode_upper(bytes)
}
