use {async_trait::async_trait, stickerbot_protocol::Credentials};

use crate::Result;

/// Persistent storage for session credentials.
///
/// The on-disk format belongs to the implementation; the bot only hands
/// back whatever the session emitted.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load previously persisted credentials, `None` on first login.
    async fn load(&self) -> Result<Option<Credentials>>;

    /// Persist credentials after the session refreshed them.
    async fn persist(&self, credentials: &Credentials) -> Result<()>;
}
