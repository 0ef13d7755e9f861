use std::sync::Arc;

use {
    async_trait::async_trait,
    bytes::Bytes,
    futures::stream::BoxStream,
    stickerbot_protocol::{Credentials, InboundEvent, MediaDescriptor, SessionEvent},
    tokio::sync::mpsc,
};

use crate::Result;

/// Chunked download of one attachment.
pub type MediaStream = BoxStream<'static, Result<Bytes>>;

/// A live chat session.
#[async_trait]
pub trait Session: Send + Sync {
    /// Send a text message to `jid`, quoting `quoted`.
    async fn send_text(&self, jid: &str, text: &str, quoted: &InboundEvent) -> Result<()>;

    /// Send a sticker (lossless WebP bytes) to `jid`, quoting `quoted`.
    async fn send_sticker(&self, jid: &str, sticker: Vec<u8>, quoted: &InboundEvent)
    -> Result<()>;

    /// Open a download stream for an attachment.
    async fn fetch_media(&self, descriptor: &MediaDescriptor) -> Result<MediaStream>;
}

/// Options forwarded to the protocol implementation on every connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Client identity shown in the linked-devices list (name, os, version).
    pub browser: Vec<String>,
}

/// A freshly established session and the events it will emit.
///
/// Dropping the receiver detaches the bot from the session.
pub struct Connection {
    pub session: Arc<dyn Session>,
    pub events: mpsc::Receiver<SessionEvent>,
}

/// Establishes sessions.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    /// Connect with persisted credentials, or start a fresh login when
    /// `credentials` is `None`. Must return once the socket is wired; the
    /// open/close outcome arrives later as a connection update.
    async fn connect(
        &self,
        credentials: Option<Credentials>,
        options: &ConnectOptions,
    ) -> Result<Connection>;
}

/// Displays a login challenge for out-of-band scanning.
pub trait QrRenderer: Send + Sync {
    fn render(&self, challenge: &str);
}
