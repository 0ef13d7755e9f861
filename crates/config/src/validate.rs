//! Semantic checks on a parsed configuration.

use crate::schema::StickerBotConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "sticker.marker"
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            message: message.into(),
        }
    }

    fn warning(path: &str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.path, self.message)
    }
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Check a configuration for values the bot cannot run with.
#[must_use]
pub fn validate(config: &StickerBotConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    let tokens = [
        ("keywords.door", &config.keywords.door),
        ("keywords.confirm", &config.keywords.confirm),
        ("keywords.for_token", &config.keywords.for_token),
        ("sticker.marker", &config.sticker.marker),
    ];
    for (path, value) in tokens {
        if value.trim().is_empty() {
            diagnostics.push(Diagnostic::error(path, "must not be empty"));
        }
    }

    if config.keywords.ack_reply.trim().is_empty() {
        diagnostics.push(Diagnostic::error("keywords.ack_reply", "must not be empty"));
    } else if !config.keywords.door.is_empty()
        && config
            .keywords
            .ack_reply
            .to_lowercase()
            .contains(&config.keywords.door.to_lowercase())
    {
        diagnostics.push(Diagnostic::warning(
            "keywords.ack_reply",
            "reply contains the door keyword and would trigger other bots",
        ));
    }

    if config.sticker.canvas_size == 0 {
        diagnostics.push(Diagnostic::error("sticker.canvas_size", "must be positive"));
    }
    if config.timing.pending_ttl_secs == 0 {
        diagnostics.push(Diagnostic::error("timing.pending_ttl_secs", "must be positive"));
    }
    if config.timing.reconnect_delay_secs == 0 {
        diagnostics.push(Diagnostic::error(
            "timing.reconnect_delay_secs",
            "must be positive",
        ));
    }
    if config.broadcast_jid.trim().is_empty() {
        diagnostics.push(Diagnostic::warning(
            "broadcast_jid",
            "empty; status broadcasts will be processed like chats",
        ));
    }
    let url = config.session.bridge_url.trim();
    if !(url.starts_with("ws://") || url.starts_with("wss://")) {
        diagnostics.push(Diagnostic::error(
            "session.bridge_url",
            "must be a ws:// or wss:// URL",
        ));
    }
    if config.session.request_timeout_secs == 0 {
        diagnostics.push(Diagnostic::error(
            "session.request_timeout_secs",
            "must be positive",
        ));
    }
    if config.session.browser.len() != 3 {
        diagnostics.push(Diagnostic::warning(
            "session.browser",
            "expected [name, os, version]",
        ));
    }

    ValidationResult { diagnostics }
}
