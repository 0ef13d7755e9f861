/// Config schema types (session, keywords, sticker, timing, diagnostics, metrics).
use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerBotConfig {
    pub session: SessionConfig,
    pub keywords: KeywordsConfig,
    pub sticker: StickerConfig,
    pub timing: TimingConfig,
    pub diagnostics: DiagnosticsConfig,
    pub metrics: MetricsConfig,
    /// Conversation id of the status/broadcast channel, never answered.
    pub broadcast_jid: String,
}

impl Default for StickerBotConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            keywords: KeywordsConfig::default(),
            sticker: StickerConfig::default(),
            timing: TimingConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            metrics: MetricsConfig::default(),
            broadcast_jid: "status@broadcast".into(),
        }
    }
}

/// Settings handed to the session implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory the credential store keeps auth state in.
    pub auth_dir: PathBuf,
    /// Client identity shown in the linked-devices list (name, os, version).
    pub browser: Vec<String>,
    /// WebSocket endpoint of the protocol bridge.
    pub bridge_url: String,
    /// How long a bridge request may stay unanswered.
    pub request_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            auth_dir: PathBuf::from("./auth"),
            browser: vec!["WhatsApp Bot".into(), "Windows".into(), "20".into()],
            bridge_url: "ws://127.0.0.1:3977".into(),
            request_timeout_secs: 30,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Text triggers and canned replies.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    /// Token that triggers the acknowledgement reply.
    pub door: String,
    /// Together with `door` and `for_token`, marks a confirmation message.
    pub confirm: String,
    pub for_token: String,
    /// Reply sent when only `door` matches.
    pub ack_reply: String,
    /// Reply to confirmation messages. `None` keeps them unanswered.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confirmation_reply: Option<String>,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            door: "porta".into(),
            confirm: "confirma".into(),
            for_token: "para".into(),
            ack_reply: "pego".into(),
            confirmation_reply: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StickerConfig {
    /// Caption marker that requests a sticker.
    pub marker: String,
    /// Side of the square sticker canvas in pixels.
    pub canvas_size: u32,
    /// Explicit ffmpeg binary; looked up in `PATH` when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ffmpeg_path: Option<String>,
}

impl Default for StickerConfig {
    fn default() -> Self {
        Self {
            marker: "#s".into(),
            canvas_size: 512,
            ffmpeg_path: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How long a content-less event waits for its re-delivery.
    pub pending_ttl_secs: u64,
    /// Delay before reconnecting after a retryable close.
    pub reconnect_delay_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pending_ttl_secs: 8,
            reconnect_delay_secs: 5,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn pending_ttl(&self) -> Duration {
        Duration::from_secs(self.pending_ttl_secs)
    }

    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// Bounds for the envelope dump logged when a sticker request carries no media.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub dump_depth: usize,
    pub dump_max_array: usize,
    pub dump_max_chars: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dump_depth: 4,
            dump_max_array: 50,
            dump_max_chars: 8192,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub enabled: bool,
}
