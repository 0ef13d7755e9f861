//! Recording collaborators shared by the unit tests.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    bytes::Bytes,
    futures::StreamExt,
    stickerbot_channels::{
        ConnectOptions, Connection, CredentialStore, MediaStream, QrRenderer, Session,
        SessionConnector,
    },
    stickerbot_media::StickerEncoder,
    stickerbot_protocol::{Credentials, InboundEvent, MediaDescriptor, MediaKind, SessionEvent},
    tokio::sync::mpsc,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Text {
        jid: String,
        text: String,
        quoted_id: String,
    },
    Sticker {
        jid: String,
        bytes: Vec<u8>,
        quoted_id: String,
    },
}

#[derive(Default)]
pub struct MockSession {
    media: Vec<u8>,
    sent: Mutex<Vec<Sent>>,
    fetched: Mutex<Vec<MediaKind>>,
    fail_next_send: AtomicBool,
}

impl MockSession {
    pub fn with_media(media: Vec<u8>) -> Self {
        Self {
            media,
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn fetched(&self) -> Vec<MediaKind> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn fail_next_send(&self) {
        self.fail_next_send.store(true, Ordering::SeqCst);
    }

    fn record(&self, sent: Sent) -> stickerbot_channels::Result<()> {
        if self.fail_next_send.swap(false, Ordering::SeqCst) {
            return Err(stickerbot_channels::Error::unavailable("socket closed"));
        }
        self.sent.lock().unwrap().push(sent);
        Ok(())
    }
}

#[async_trait]
impl Session for MockSession {
    async fn send_text(
        &self,
        jid: &str,
        text: &str,
        quoted: &InboundEvent,
    ) -> stickerbot_channels::Result<()> {
        self.record(Sent::Text {
            jid: jid.into(),
            text: text.into(),
            quoted_id: quoted.message_id().into(),
        })
    }

    async fn send_sticker(
        &self,
        jid: &str,
        sticker: Vec<u8>,
        quoted: &InboundEvent,
    ) -> stickerbot_channels::Result<()> {
        self.record(Sent::Sticker {
            jid: jid.into(),
            bytes: sticker,
            quoted_id: quoted.message_id().into(),
        })
    }

    async fn fetch_media(
        &self,
        descriptor: &MediaDescriptor,
    ) -> stickerbot_channels::Result<MediaStream> {
        self.fetched.lock().unwrap().push(descriptor.kind);
        // Two chunks, to exercise reassembly.
        let (head, tail) = self.media.split_at(self.media.len() / 2);
        let chunks = vec![
            Ok(Bytes::copy_from_slice(head)),
            Ok(Bytes::copy_from_slice(tail)),
        ];
        Ok(futures::stream::iter(chunks).boxed())
    }
}

/// Returns a fixed payload and records its inputs.
pub struct MockEncoder {
    available: AtomicBool,
    seen: Mutex<Vec<(Vec<u8>, MediaKind)>>,
}

impl Default for MockEncoder {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            seen: Mutex::new(Vec::new()),
        }
    }
}

impl MockEncoder {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<(Vec<u8>, MediaKind)> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl StickerEncoder for MockEncoder {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn encode(&self, media: &[u8], kind: MediaKind) -> stickerbot_media::Result<Vec<u8>> {
        self.seen.lock().unwrap().push((media.to_vec(), kind));
        Ok(b"RIFF\0\0\0\0WEBPVP8L".to_vec())
    }
}

/// Hands out scripted connections and keeps the event senders so tests can
/// drive them.
#[derive(Default)]
pub struct MockConnector {
    pub session: Arc<MockSession>,
    pub connects: AtomicUsize,
    pub options: Mutex<Vec<ConnectOptions>>,
    pub credentials: Mutex<Vec<Option<Credentials>>>,
    pub senders: Mutex<Vec<mpsc::Sender<SessionEvent>>>,
    /// Connect attempts at or after this index fail.
    pub fail_from: Mutex<Option<usize>>,
}

impl MockConnector {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Sender of the most recent connection.
    pub fn sender(&self) -> mpsc::Sender<SessionEvent> {
        self.senders.lock().unwrap().last().cloned().unwrap()
    }

    pub fn fail_from(&self, attempt: usize) {
        *self.fail_from.lock().unwrap() = Some(attempt);
    }
}

#[async_trait]
impl SessionConnector for MockConnector {
    async fn connect(
        &self,
        credentials: Option<Credentials>,
        options: &ConnectOptions,
    ) -> stickerbot_channels::Result<Connection> {
        let attempt = self.connects.fetch_add(1, Ordering::SeqCst);
        if self
            .fail_from
            .lock()
            .unwrap()
            .is_some_and(|from| attempt >= from)
        {
            return Err(stickerbot_channels::Error::unavailable("connection refused"));
        }
        self.options.lock().unwrap().push(options.clone());
        self.credentials.lock().unwrap().push(credentials);
        let (tx, rx) = mpsc::channel(16);
        self.senders.lock().unwrap().push(tx);
        Ok(Connection {
            session: Arc::clone(&self.session) as Arc<dyn Session>,
            events: rx,
        })
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub stored: Mutex<Option<Credentials>>,
    pub persisted: Mutex<Vec<Credentials>>,
    /// Stalls only the first `persist` call.
    pub first_write_delay: Mutex<Option<Duration>>,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self) -> stickerbot_channels::Result<Option<Credentials>> {
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn persist(&self, credentials: &Credentials) -> stickerbot_channels::Result<()> {
        let delay = self.first_write_delay.lock().unwrap().take();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.persisted.lock().unwrap().push(credentials.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingQr {
    pub challenges: Mutex<Vec<String>>,
}

impl QrRenderer for RecordingQr {
    fn render(&self, challenge: &str) {
        self.challenges.lock().unwrap().push(challenge.to_string());
    }
}
