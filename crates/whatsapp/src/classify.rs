//! Decide what to do with one unwrapped message.
//!
//! Rules are evaluated in order and the first match wins, so every event
//! maps to exactly one [`DispatchAction`] and at most one outbound send.

use std::fmt;

use {
    stickerbot_config::StickerBotConfig,
    stickerbot_protocol::{InboundEvent, MediaDescriptor},
};

use crate::unwrap::UnwrappedMessage;

/// Why an event produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Sent by the bot's own account.
    OwnMessage,
    /// Posted to the status/broadcast channel.
    Broadcast,
    /// Stickerable media whose caption lacks the marker.
    MissingMarker,
    /// Neither keyword text nor stickerable media.
    NotEligible,
}

impl IgnoreReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OwnMessage => "own_message",
            Self::Broadcast => "broadcast",
            Self::MissingMarker => "missing_marker",
            Self::NotEligible => "not_eligible",
        }
    }
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which encoder turns the media into a sticker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StickerStrategy {
    Static,
    Animated,
}

impl StickerStrategy {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Animated => "animated",
        }
    }
}

impl fmt::Display for StickerStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DispatchAction {
    Ignore(IgnoreReason),
    /// Door, confirm and for tokens all present. `reply` is `None` unless a
    /// confirmation reply is configured.
    ConfirmationNoticed { reply: Option<String> },
    /// Only the door token present; answer with a short acknowledgement.
    Acknowledge { reply: String },
    /// Sticker marker in the caption but no media found. Dump the envelope.
    Diagnose,
    Sticker {
        media: MediaDescriptor,
        strategy: StickerStrategy,
    },
}

/// Tokens and replies the classifier matches against, lowercased once.
#[derive(Debug, Clone)]
pub struct ClassifyRules {
    door: String,
    confirm: String,
    for_token: String,
    ack_reply: String,
    confirmation_reply: Option<String>,
    marker: String,
    broadcast_jid: String,
}

impl ClassifyRules {
    #[must_use]
    pub fn from_config(config: &StickerBotConfig) -> Self {
        let keywords = &config.keywords;
        Self {
            door: keywords.door.to_lowercase(),
            confirm: keywords.confirm.to_lowercase(),
            for_token: keywords.for_token.to_lowercase(),
            ack_reply: keywords.ack_reply.clone(),
            confirmation_reply: keywords.confirmation_reply.clone(),
            marker: config.sticker.marker.clone(),
            broadcast_jid: config.broadcast_jid.clone(),
        }
    }

    fn requests_sticker(&self, caption: &str) -> bool {
        caption.contains(&self.marker)
    }

    /// Marker in the caption but nothing to turn into a sticker. Also holds
    /// for keyword text, which is answered first and then dumped.
    #[must_use]
    pub fn wants_diagnostic(&self, unwrapped: &UnwrappedMessage<'_>) -> bool {
        !unwrapped.has_media() && self.requests_sticker(unwrapped.caption)
    }
}

impl Default for ClassifyRules {
    fn default() -> Self {
        Self::from_config(&StickerBotConfig::default())
    }
}

/// Classify one event. Pure; the caller performs the action.
#[must_use]
pub fn classify(
    event: &InboundEvent,
    unwrapped: &UnwrappedMessage<'_>,
    rules: &ClassifyRules,
) -> DispatchAction {
    if event.from_self() {
        return DispatchAction::Ignore(IgnoreReason::OwnMessage);
    }
    if event.remote_jid() == rules.broadcast_jid {
        return DispatchAction::Ignore(IgnoreReason::Broadcast);
    }

    if let Some(action) = classify_text(unwrapped.text, rules) {
        return action;
    }

    if rules.wants_diagnostic(unwrapped) {
        return DispatchAction::Diagnose;
    }
    if !unwrapped.has_media() {
        return DispatchAction::Ignore(IgnoreReason::NotEligible);
    }
    let caption = unwrapped.caption;

    let (media, strategy) = match (unwrapped.image, unwrapped.video) {
        (Some(image), _) => {
            let media = MediaDescriptor::from_image(image);
            let strategy = if media.is_gif_image() {
                StickerStrategy::Animated
            } else {
                StickerStrategy::Static
            };
            (media, strategy)
        },
        // Videos go through the animated path whether or not gif playback is set.
        (None, Some(video)) => (MediaDescriptor::from_video(video), StickerStrategy::Animated),
        (None, None) => return DispatchAction::Ignore(IgnoreReason::NotEligible),
    };

    if !rules.requests_sticker(caption) {
        return DispatchAction::Ignore(IgnoreReason::MissingMarker);
    }
    DispatchAction::Sticker { media, strategy }
}

fn classify_text(text: &str, rules: &ClassifyRules) -> Option<DispatchAction> {
    if text.is_empty() {
        return None;
    }
    let lowered = text.to_lowercase();
    if !lowered.contains(&rules.door) {
        return None;
    }
    if lowered.contains(&rules.confirm) && lowered.contains(&rules.for_token) {
        return Some(DispatchAction::ConfirmationNoticed {
            reply: rules.confirmation_reply.clone(),
        });
    }
    Some(DispatchAction::Acknowledge {
        reply: rules.ack_reply.clone(),
    })
}
