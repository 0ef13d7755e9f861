//! Wrapper peeling.
//!
//! A delivered envelope may nest the real message inside disappearing and
//! single-view layers. Peeling is driven by two ordered layer lists so a new
//! wrapper is a one-line insertion.

use stickerbot_protocol::{ContentType, ImageMessage, Message, VideoMessage, WrapperKind};

/// Peeled before the content type is read. The session reports the type of
/// the message below these layers.
const OUTER_LAYERS: &[WrapperKind] = &[WrapperKind::Ephemeral];

/// Peeled from the typed message before content is extracted.
const INNER_LAYERS: &[WrapperKind] = &[WrapperKind::ViewOnce];

/// Everything the classifier reads from an envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct UnwrappedMessage<'a> {
    /// The envelope as delivered.
    pub outer: &'a Message,
    /// `outer` without its outer layers; the content type is read from here.
    pub message: &'a Message,
    /// `message` without its inner layers; content is extracted from here.
    pub inner: &'a Message,
    pub content_type: Option<ContentType>,
    pub inner_content_type: Option<ContentType>,
    pub is_view_once: bool,
    pub image: Option<&'a ImageMessage>,
    pub video: Option<&'a VideoMessage>,
    /// Image caption, video caption or extended text body; empty if none.
    pub caption: &'a str,
    /// Plain or extended text body; empty if none.
    pub text: &'a str,
}

impl UnwrappedMessage<'_> {
    #[must_use]
    pub fn has_media(&self) -> bool {
        self.image.is_some() || self.video.is_some()
    }
}

/// Peel `envelope` and extract its content. Pure.
#[must_use]
pub fn unwrap(envelope: &Message) -> UnwrappedMessage<'_> {
    let message = peel(envelope, OUTER_LAYERS);
    let inner = peel(message, INNER_LAYERS);

    // Some shapes keep a view-once layer below the one already peeled.
    let nested = WrapperKind::ViewOnce.peel(inner);
    let image = inner
        .image_message
        .as_ref()
        .or_else(|| nested.and_then(|m| m.image_message.as_ref()));
    let video = inner
        .video_message
        .as_ref()
        .or_else(|| nested.and_then(|m| m.video_message.as_ref()));

    let caption = first_non_empty([
        image.and_then(|i| i.caption.as_deref()),
        video.and_then(|v| v.caption.as_deref()),
        inner.extended_text(),
    ]);
    let text = first_non_empty([
        inner.conversation.as_deref(),
        inner.extended_text(),
        message.conversation.as_deref(),
    ]);

    UnwrappedMessage {
        outer: envelope,
        message,
        inner,
        content_type: message.content_type(),
        inner_content_type: inner.content_type(),
        is_view_once: WrapperKind::ViewOnce.peel(message).is_some(),
        image,
        video,
        caption,
        text,
    }
}

fn peel<'a>(message: &'a Message, layers: &[WrapperKind]) -> &'a Message {
    layers
        .iter()
        .fold(message, |current, layer| layer.peel(current).unwrap_or(current))
}

fn first_non_empty<'a, const N: usize>(candidates: [Option<&'a str>; N]) -> &'a str {
    candidates
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or_default()
}
