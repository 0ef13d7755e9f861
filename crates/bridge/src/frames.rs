//! JSON frames exchanged with the bridge.
//!
//! Every text message on the socket is one [`BridgeFrame`]. The bot sends
//! requests; the bridge answers each with a response carrying the same id and
//! pushes session events on its own.

use {
    serde::{Deserialize, Serialize},
    serde_json::Value,
    stickerbot_protocol::{
        BatchKind, ConnectionUpdate, Credentials, InboundEvent, MessageBatch, SessionEvent,
    },
    tracing::warn,
};

/// Request methods understood by the bridge.
pub mod methods {
    pub const CONNECT: &str = "connect";
    pub const SEND_TEXT: &str = "sendText";
    pub const SEND_STICKER: &str = "sendSticker";
    pub const DOWNLOAD_MEDIA: &str = "downloadMedia";
}

/// Event names pushed by the bridge.
pub mod events {
    pub const CREDS_UPDATE: &str = "creds.update";
    pub const CONNECTION_UPDATE: &str = "connection.update";
    pub const MESSAGES_UPSERT: &str = "messages.upsert";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BridgeFrame {
    #[serde(rename = "req")]
    Request(RequestFrame),
    #[serde(rename = "res")]
    Response(ResponseFrame),
    #[serde(rename = "event")]
    Event(EventFrame),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseFrame {
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorShape>,
}

impl ResponseFrame {
    /// Failure message, falling back to a generic one.
    #[must_use]
    pub fn error_message(&self) -> String {
        self.error
            .as_ref()
            .map(|e| format!("{}: {}", e.code, e.message))
            .unwrap_or_else(|| "unknown bridge error".into())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFrame {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl EventFrame {
    /// Decode into a session event. Unknown event names yield `None`.
    pub fn into_session_event(self) -> serde_json::Result<Option<SessionEvent>> {
        let event = match self.event.as_str() {
            events::CREDS_UPDATE => {
                SessionEvent::CredentialsUpdated(Credentials(self.payload))
            },
            events::CONNECTION_UPDATE => SessionEvent::ConnectionUpdate(
                serde_json::from_value::<ConnectionUpdate>(self.payload)?,
            ),
            events::MESSAGES_UPSERT => SessionEvent::MessagesUpsert(decode_upsert(self.payload)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

#[derive(Deserialize)]
struct RawUpsert {
    #[serde(default, rename = "type")]
    kind: BatchKind,
    messages: Option<Vec<Value>>,
}

/// Events are decoded one at a time; a malformed one is logged and dropped
/// without taking the rest of the batch with it. A payload without a
/// `messages` array is itself the single event.
fn decode_upsert(payload: Value) -> serde_json::Result<MessageBatch> {
    let raw = RawUpsert::deserialize(&payload)?;
    let entries = raw.messages.unwrap_or_else(|| vec![payload]);
    let messages = entries
        .into_iter()
        .enumerate()
        .filter_map(
            |(index, entry)| match serde_json::from_value::<InboundEvent>(entry) {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed message in batch");
                    None
                },
            },
        )
        .collect();
    Ok(MessageBatch {
        kind: raw.kind,
        messages,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        serde_json::json,
        stickerbot_protocol::ConnectionStatus,
    };

    use super::*;

    fn event(value: Value) -> Option<SessionEvent> {
        match serde_json::from_value::<BridgeFrame>(value).unwrap() {
            BridgeFrame::Event(frame) => frame.into_session_event().unwrap(),
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn request_serializes_with_type_tag() {
        let frame = BridgeFrame::Request(RequestFrame {
            id: "1".into(),
            method: methods::SEND_TEXT.into(),
            params: Some(json!({ "jid": "a@s.whatsapp.net" })),
        });
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "req");
        assert_eq!(value["method"], "sendText");
    }

    #[test]
    fn response_error_message() {
        let frame: BridgeFrame = serde_json::from_value(json!({
            "type": "res",
            "id": "7",
            "ok": false,
            "error": { "code": "NOT_CONNECTED", "message": "socket closed" }
        }))
        .unwrap();
        let BridgeFrame::Response(res) = frame else {
            panic!("expected response");
        };
        assert!(!res.ok);
        assert_eq!(res.error_message(), "NOT_CONNECTED: socket closed");
    }

    #[test]
    fn connection_update_event() {
        let ev = event(json!({
            "type": "event",
            "event": "connection.update",
            "payload": {
                "connection": "close",
                "lastDisconnect": { "statusCode": 401, "error": "logged out" }
            }
        }));
        let Some(SessionEvent::ConnectionUpdate(update)) = ev else {
            panic!("expected connection update");
        };
        assert_eq!(update.connection, Some(ConnectionStatus::Close));
        assert!(update.last_disconnect.unwrap().is_logged_out());
    }

    #[test]
    fn messages_upsert_event() {
        let ev = event(json!({
            "type": "event",
            "event": "messages.upsert",
            "payload": {
                "type": "notify",
                "messages": [
                    { "key": { "remoteJid": "a@s.whatsapp.net", "id": "X1" } }
                ]
            }
        }));
        let Some(SessionEvent::MessagesUpsert(batch)) = ev else {
            panic!("expected batch");
        };
        assert_eq!(batch.kind, BatchKind::Notify);
        assert_eq!(batch.messages[0].message_id(), "X1");
        assert!(!batch.messages[0].has_content());
    }

    #[test]
    fn malformed_message_does_not_drop_its_batch() {
        let ev = event(json!({
            "type": "event",
            "event": "messages.upsert",
            "payload": {
                "type": "notify",
                "messages": [
                    {
                        "key": { "remoteJid": "a@s.whatsapp.net", "id": "G1" },
                        "message": { "conversation": "porta" }
                    },
                    { "key": 42 },
                    {
                        "key": { "remoteJid": "a@s.whatsapp.net", "id": "G2" },
                        "message": { "imageMessage": { "fileLength": "12345" } }
                    }
                ]
            }
        }));
        let Some(SessionEvent::MessagesUpsert(batch)) = ev else {
            panic!("expected batch");
        };
        let ids: Vec<&str> = batch.messages.iter().map(|m| m.message_id()).collect();
        assert_eq!(ids, vec!["G1", "G2"]);
        let image = batch.messages[1]
            .message
            .as_ref()
            .and_then(|m| m.image_message.as_ref())
            .unwrap();
        assert_eq!(image.media.file_length, Some(12345));
    }

    #[test]
    fn upsert_without_messages_is_a_single_event() {
        let ev = event(json!({
            "type": "event",
            "event": "messages.upsert",
            "payload": {
                "key": { "remoteJid": "a@s.whatsapp.net", "id": "S1" },
                "message": { "conversation": "porta" }
            }
        }));
        let Some(SessionEvent::MessagesUpsert(batch)) = ev else {
            panic!("expected batch");
        };
        assert_eq!(batch.kind, BatchKind::Notify);
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(batch.messages[0].message_id(), "S1");
        assert!(batch.messages[0].has_content());
    }

    #[test]
    fn creds_are_passed_through_opaque() {
        let ev = event(json!({
            "type": "event",
            "event": "creds.update",
            "payload": { "me": { "id": "1@s.whatsapp.net" } }
        }));
        assert_eq!(
            ev,
            Some(SessionEvent::CredentialsUpdated(Credentials(
                json!({ "me": { "id": "1@s.whatsapp.net" } })
            )))
        );
    }

    #[test]
    fn unknown_event_is_skipped() {
        assert_eq!(
            event(json!({ "type": "event", "event": "presence.update" })),
            None
        );
    }
}
