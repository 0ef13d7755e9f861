use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Channel(#[from] stickerbot_channels::Error),

    #[error(transparent)]
    Media(#[from] stickerbot_media::Error),

    /// Establishing (or re-establishing) the session failed. Fatal.
    #[error("failed to start session: {source}")]
    Start {
        #[source]
        source: stickerbot_channels::Error,
    },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn start(source: stickerbot_channels::Error) -> Self {
        Self::Start { source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
