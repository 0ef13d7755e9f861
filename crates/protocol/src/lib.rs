//! Chat session data model.
//!
//! Mirrors the JSON shape the WhatsApp Web session delivers: a message key,
//! an optional message envelope (absent for content-less notifications), and
//! the envelope's content fields. Wrapper layers (ephemeral, view-once) are
//! modelled as [`WrapperKind`] so callers can peel them in a fixed order.

use {
    serde::{Deserialize, Deserializer, Serialize},
    std::fmt,
};

// ── Constants ────────────────────────────────────────────────────────────────

/// Conversation id of the status/broadcast channel.
pub const STATUS_BROADCAST_JID: &str = "status@broadcast";

/// GIF mimetype; images carrying it take the animated sticker path.
pub const GIF_MIMETYPE: &str = "image/gif";

// ── Disconnect codes ─────────────────────────────────────────────────────────

/// Status codes attached to a session close event.
pub mod disconnect_codes {
    pub const LOGGED_OUT: u16 = 401;
    pub const FORBIDDEN: u16 = 403;
    pub const CONNECTION_LOST: u16 = 408;
    pub const MULTIDEVICE_MISMATCH: u16 = 411;
    pub const CONNECTION_CLOSED: u16 = 428;
    pub const CONNECTION_REPLACED: u16 = 440;
    pub const BAD_SESSION: u16 = 500;
    pub const UNAVAILABLE_SERVICE: u16 = 503;
    pub const RESTART_REQUIRED: u16 = 515;
}

// ── Message envelope ─────────────────────────────────────────────────────────

/// A message envelope. Every content field is optional; exactly which ones
/// are set determines the message's [`ContentType`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Message {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extended_text_message: Option<ExtendedTextMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_message: Option<ImageMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_message: Option<VideoMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_message: Option<FutureProofMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub view_once_message: Option<FutureProofMessage>,
    /// Content fields this bot does not act on (stickers, audio, reactions...).
    #[serde(flatten)]
    pub other: serde_json::Map<String, serde_json::Value>,
}

/// A wrapper layer holding another message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FutureProofMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Box<Message>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedTextMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageMessage {
    #[serde(flatten)]
    pub media: MediaRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoMessage {
    #[serde(flatten)]
    pub media: MediaRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gif_playback: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seconds: Option<u32>,
}

/// Opaque download reference for an attachment. Only the session knows how
/// to turn this into bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MediaRef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub direct_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_sha256: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_enc_sha256: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        deserialize_with = "long_or_string"
    )]
    pub file_length: Option<u64>,
}

/// Protobuf `Long` values arrive either as a number or as a decimal string.
fn long_or_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Long {
        Number(u64),
        Text(String),
    }

    match Option::<Long>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Long::Number(n)) => Ok(Some(n)),
        Some(Long::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

// ── Wrapper layers ───────────────────────────────────────────────────────────

/// Wrapper layers that may enclose the real message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperKind {
    /// Disappearing-message layer.
    Ephemeral,
    /// Single-view media layer.
    ViewOnce,
}

impl WrapperKind {
    /// Returns the wrapped message if `message` carries this layer.
    #[must_use]
    pub fn peel(self, message: &Message) -> Option<&Message> {
        let wrapper = match self {
            Self::Ephemeral => message.ephemeral_message.as_ref(),
            Self::ViewOnce => message.view_once_message.as_ref(),
        };
        wrapper.and_then(|w| w.message.as_deref())
    }
}

// ── Content type ─────────────────────────────────────────────────────────────

/// Content tag of a message, derived from which field is populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentType {
    Conversation,
    ExtendedText,
    Image,
    Video,
    Ephemeral,
    ViewOnce,
    /// A content field this crate does not model, by its wire name.
    Other(String),
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conversation => f.write_str("conversation"),
            Self::ExtendedText => f.write_str("extendedTextMessage"),
            Self::Image => f.write_str("imageMessage"),
            Self::Video => f.write_str("videoMessage"),
            Self::Ephemeral => f.write_str("ephemeralMessage"),
            Self::ViewOnce => f.write_str("viewOnceMessage"),
            Self::Other(name) => f.write_str(name),
        }
    }
}

/// Keys the session attaches to an envelope that are not content.
const NON_CONTENT_KEYS: &[&str] = &["messageContextInfo", "senderKeyDistributionMessage"];

impl Message {
    /// The content tag of this message, or `None` for an empty envelope.
    #[must_use]
    pub fn content_type(&self) -> Option<ContentType> {
        if self.conversation.is_some() {
            return Some(ContentType::Conversation);
        }
        if self.extended_text_message.is_some() {
            return Some(ContentType::ExtendedText);
        }
        if self.image_message.is_some() {
            return Some(ContentType::Image);
        }
        if self.video_message.is_some() {
            return Some(ContentType::Video);
        }
        if self.ephemeral_message.is_some() {
            return Some(ContentType::Ephemeral);
        }
        if self.view_once_message.is_some() {
            return Some(ContentType::ViewOnce);
        }
        self.other
            .keys()
            .find(|k| !NON_CONTENT_KEYS.contains(&k.as_str()))
            .map(|k| ContentType::Other(k.clone()))
    }

    /// Body of the extended text field, if any.
    #[must_use]
    pub fn extended_text(&self) -> Option<&str> {
        self.extended_text_message
            .as_ref()
            .and_then(|e| e.text.as_deref())
    }
}

// ── Inbound events ───────────────────────────────────────────────────────────

/// Identity of a message within the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MessageKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_jid: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub from_me: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
}

/// One message notification delivered by the session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InboundEvent {
    pub key: MessageKey,
    /// Absent when the session could not decrypt the payload yet; a
    /// re-delivery carrying it usually follows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_timestamp: Option<u64>,
}

impl InboundEvent {
    /// Conversation id, `"unknown"` when the session omitted it.
    #[must_use]
    pub fn remote_jid(&self) -> &str {
        self.key.remote_jid.as_deref().unwrap_or("unknown")
    }

    /// Message id, `"noid"` when the session omitted it.
    #[must_use]
    pub fn message_id(&self) -> &str {
        self.key.id.as_deref().unwrap_or("noid")
    }

    #[must_use]
    pub fn from_self(&self) -> bool {
        self.key.from_me
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        self.message.is_some()
    }
}

/// Classification tag the session attaches to a batch of messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchKind {
    /// Live delivery.
    #[default]
    Notify,
    /// History or offline catch-up.
    Append,
    Replace,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Notify => "notify",
            Self::Append => "append",
            Self::Replace => "replace",
            Self::Unknown => "unknown",
        })
    }
}

/// A batch of inbound events delivered together.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageBatch {
    #[serde(rename = "type")]
    pub kind: BatchKind,
    pub messages: Vec<InboundEvent>,
}

// ── Media descriptors ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything needed to download one attachment.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaDescriptor {
    pub kind: MediaKind,
    pub mimetype: Option<String>,
    /// Only meaningful for videos.
    pub gif_playback: bool,
    pub reference: MediaRef,
}

impl MediaDescriptor {
    #[must_use]
    pub fn from_image(image: &ImageMessage) -> Self {
        Self {
            kind: MediaKind::Image,
            mimetype: image.mimetype.clone(),
            gif_playback: false,
            reference: image.media.clone(),
        }
    }

    #[must_use]
    pub fn from_video(video: &VideoMessage) -> Self {
        Self {
            kind: MediaKind::Video,
            mimetype: video.mimetype.clone(),
            gif_playback: video.gif_playback.unwrap_or(false),
            reference: video.media.clone(),
        }
    }

    #[must_use]
    pub fn is_gif_image(&self) -> bool {
        self.kind == MediaKind::Image && self.mimetype.as_deref() == Some(GIF_MIMETYPE)
    }
}

// ── Connection updates ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connecting,
    Open,
    Close,
}

/// Why the session closed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Disconnect {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Disconnect {
    #[must_use]
    pub fn is_logged_out(&self) -> bool {
        self.status_code == Some(disconnect_codes::LOGGED_OUT)
    }
}

/// A connection state change. Any combination of fields may be set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionStatus>,
    /// Login challenge to render as a QR code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<Disconnect>,
}

// ── Credentials ──────────────────────────────────────────────────────────────

/// Opaque authentication state owned by the session implementation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub serde_json::Value);

// ── Session events ───────────────────────────────────────────────────────────

/// Everything a session can emit towards the bot.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    CredentialsUpdated(Credentials),
    ConnectionUpdate(ConnectionUpdate),
    MessagesUpsert(MessageBatch),
}
