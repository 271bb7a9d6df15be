//! Wire protocol of the call-control signaling service.
//!
//! Notifications arrive as JSON text frames; outbound commands are serialized
//! the same way. The channel performs no interpretation beyond decoding —
//! all call semantics live in [`crate::session`].

use serde::{Deserialize, Serialize};

/// Call state as reported by the signaling service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WireCallState {
    Ringing,
    Active,
    Done,
    Hangup,
}

impl WireCallState {
    /// `done` and `hangup` both end a call's lifecycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Hangup)
    }
}

/// Payload of a `callUpdate` notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallUpdate {
    pub call_id: String,
    pub state: WireCallState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caller_id_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_number: Option<String>,
}

/// A notification received over the signaling channel.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum Notification {
    #[serde(rename = "callUpdate")]
    CallUpdate { call: CallUpdate },
    #[serde(rename = "clientReady")]
    ClientReady,
    /// Notification types this core does not consume.
    #[serde(other)]
    Unknown,
}

/// An outbound control command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    #[serde(rename_all = "camelCase")]
    Login { identity: String, secret: String },
    #[serde(rename_all = "camelCase")]
    NewCall {
        call_id: String,
        destination_number: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caller_id_number: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Answer { call_id: String },
    #[serde(rename_all = "camelCase")]
    Hangup { call_id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ringing_call_update() {
        let raw = r#"{"type":"callUpdate","call":{"callId":"c1","state":"ringing","callerIdNumber":"+15551234567"}}"#;
        let notification: Notification = serde_json::from_str(raw).unwrap();
        match notification {
            Notification::CallUpdate { call } => {
                assert_eq!(call.call_id, "c1");
                assert_eq!(call.state, WireCallState::Ringing);
                assert_eq!(call.caller_id_number.as_deref(), Some("+15551234567"));
                assert!(call.caller_id_name.is_none());
            }
            other => panic!("unexpected notification: {other:?}"),
        }
    }

    #[test]
    fn unknown_notification_types_decode_to_unknown() {
        let raw = r#"{"type":"presenceUpdate","user":"+15550000000"}"#;
        let notification: Notification = serde_json::from_str(raw).unwrap();
        assert!(matches!(notification, Notification::Unknown));
    }

    #[test]
    fn terminal_states() {
        assert!(WireCallState::Done.is_terminal());
        assert!(WireCallState::Hangup.is_terminal());
        assert!(!WireCallState::Ringing.is_terminal());
        assert!(!WireCallState::Active.is_terminal());
    }

    #[test]
    fn encodes_answer_command() {
        let command = Command::Answer {
            call_id: "c1".to_string(),
        };
        let raw = serde_json::to_string(&command).unwrap();
        assert_eq!(raw, r#"{"type":"answer","callId":"c1"}"#);
    }

    #[test]
    fn encodes_new_call_command_without_empty_fields() {
        let command = Command::NewCall {
            call_id: "c2".to_string(),
            destination_number: "+15557654321".to_string(),
            caller_id_number: None,
        };
        let raw = serde_json::to_string(&command).unwrap();
        assert_eq!(
            raw,
            r#"{"type":"newCall","callId":"c2","destinationNumber":"+15557654321"}"#
        );
    }
}
