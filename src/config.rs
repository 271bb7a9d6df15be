#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    /// Endpoint that exchanges an application auth token for a telephony credential.
    pub credential_endpoint: String,
    /// WebSocket URL of the call-control signaling service.
    pub signaling_url: String,
}
