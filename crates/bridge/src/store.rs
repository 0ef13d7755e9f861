use std::path::{Path, PathBuf};

use {
    async_trait::async_trait,
    stickerbot_channels::{CredentialStore, Result},
    stickerbot_protocol::Credentials,
    tracing::debug,
};

/// Keeps the credentials as one JSON document inside the auth directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub const FILE_NAME: &str = "creds.json";

    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(Self::FILE_NAME),
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<Credentials>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => {
                let credentials = serde_json::from_slice(&bytes)?;
                debug!(path = %self.path.display(), "loaded stored credentials");
                Ok(Some(credentials))
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn persist(&self, credentials: &Credentials) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        // Atomic replace.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(credentials)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "credentials persisted");
        Ok(())
    }
}
