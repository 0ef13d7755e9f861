//! Metric name and label definitions.
//!
//! All names the bot records live here so dashboards have one place to look.

/// Inbound message metrics
pub mod messages {
    /// Message events received from the session, labelled by `batch_kind`
    pub const RECEIVED_TOTAL: &str = "stickerbot_messages_received_total";
    /// Events dropped before dispatch, labelled by `reason`
    pub const IGNORED_TOTAL: &str = "stickerbot_messages_ignored_total";
    /// Events whose handling failed, labelled by `stage`
    pub const DISPATCH_ERRORS_TOTAL: &str = "stickerbot_dispatch_errors_total";
}

/// Pending-content buffer metrics
pub mod pending {
    /// Content-less events put on hold
    pub const BUFFERED_TOTAL: &str = "stickerbot_pending_buffered_total";
    /// Held events whose content never arrived
    pub const EXPIRED_TOTAL: &str = "stickerbot_pending_expired_total";
    /// Held events completed by a later delivery
    pub const FULFILLED_TOTAL: &str = "stickerbot_pending_fulfilled_total";
    /// Events currently on hold
    pub const ENTRIES: &str = "stickerbot_pending_entries";
}

/// Text reply metrics
pub mod replies {
    /// Text replies sent, labelled by `reply`
    pub const SENT_TOTAL: &str = "stickerbot_replies_sent_total";
}

/// Sticker conversion metrics
pub mod stickers {
    /// Stickers sent, labelled by `kind` (static or animated)
    pub const SENT_TOTAL: &str = "stickerbot_stickers_sent_total";
    /// Sticker encode duration in seconds, labelled by `kind`
    pub const ENCODE_DURATION_SECONDS: &str = "stickerbot_sticker_encode_duration_seconds";
    /// Size of downloaded media in bytes
    pub const MEDIA_BYTES: &str = "stickerbot_sticker_media_bytes";
    /// Requests refused because the encoder backend is missing
    pub const BACKEND_UNAVAILABLE_TOTAL: &str = "stickerbot_sticker_backend_unavailable_total";
}

/// Session lifecycle metrics
pub mod session {
    /// Successful session opens
    pub const OPENS_TOTAL: &str = "stickerbot_session_opens_total";
    /// Retryable closes that scheduled a reconnect
    pub const RECONNECTS_TOTAL: &str = "stickerbot_session_reconnects_total";
}

/// Common label keys
pub mod labels {
    pub const KIND: &str = "kind";
    pub const REASON: &str = "reason";
    pub const STAGE: &str = "stage";
    pub const BATCH_KIND: &str = "batch_kind";
    pub const REPLY: &str = "reply";
}

/// Histogram bucket boundaries
pub mod buckets {
    use once_cell::sync::Lazy;

    /// Encode duration buckets (in seconds)
    /// Covers 10ms (small stills) to 60s (long clips through ffmpeg)
    pub static ENCODE_DURATION: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ]
    });

    /// Media size buckets (in bytes)
    /// Covers 4KB to 16MB
    pub static MEDIA_BYTES: Lazy<Vec<f64>> = Lazy::new(|| {
        vec![
            4_096.0,
            16_384.0,
            65_536.0,
            262_144.0,
            1_048_576.0,
            4_194_304.0,
            16_777_216.0,
        ]
    });
}
