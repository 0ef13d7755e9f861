use {
    futures::StreamExt,
    stickerbot_channels::Session,
    stickerbot_protocol::MediaDescriptor,
};

use crate::{Error, Result};

/// Upper bound on the buffer reserved up front from the declared length.
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Download an attachment into memory.
pub async fn fetch_media(session: &dyn Session, descriptor: &MediaDescriptor) -> Result<Vec<u8>> {
    let declared = descriptor
        .reference
        .file_length
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut buffer = Vec::with_capacity(declared.min(MAX_PREALLOC));

    let mut stream = session.fetch_media(descriptor).await?;
    while let Some(chunk) = stream.next().await {
        buffer.extend_from_slice(&chunk?);
    }

    if buffer.is_empty() {
        return Err(Error::message(format!(
            "downloaded {} is empty",
            descriptor.kind
        )));
    }
    Ok(buffer)
}
