//! `stickerbot doctor`: config validation and backend audit.
//!
//! Prints a structured report with `[ok]`, `[warn]`, `[fail]`, `[skip]`, or
//! `[info]` status indicators per item.

use std::path::Path;

use {
    anyhow::Result,
    stickerbot_bridge::FileCredentialStore,
    stickerbot_config::{Severity, StickerBotConfig, validate},
    stickerbot_media::FfmpegTranscoder,
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Outcome of one check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Skip,
    Info,
}

impl Status {
    /// Coloured `[label]` prefix for a report line.
    fn tag(self) -> String {
        let (color, label) = match self {
            Self::Ok => (GREEN, "ok"),
            Self::Warn => (YELLOW, "warn"),
            Self::Fail => (RED, "fail"),
            Self::Skip => (DIM, "skip"),
            Self::Info => (CYAN, "info"),
        };
        format!("[{color}{label}{RESET}]")
    }
}

struct Section {
    title: String,
    items: Vec<(Status, String)>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push((status, message.into()));
    }
}

/// Print every section; returns `(errors, warnings)`.
fn print_report(sections: &[Section]) -> (usize, usize) {
    for section in sections {
        eprintln!("{BOLD}{}{RESET}", section.title);
        for (status, message) in &section.items {
            eprintln!("  {}  {message}", status.tag());
        }
        eprintln!();
    }

    let count = |wanted: Status| {
        sections
            .iter()
            .flat_map(|s| &s.items)
            .filter(|(status, _)| *status == wanted)
            .count()
    };
    (count(Status::Fail), count(Status::Warn))
}

// ── Entry point ─────────────────────────────────────────────────────────────

pub async fn handle_doctor(config: &StickerBotConfig, source: Option<&Path>) -> Result<()> {
    eprintln!("{BOLD}stickerbot doctor{RESET}");
    eprintln!("{BOLD}================={RESET}\n");

    let sections = vec![
        check_config(config, source),
        check_backends(config),
        check_session(config).await,
    ];

    let (errors, warnings) = print_report(&sections);

    eprintln!("{BOLD}Summary:{RESET} {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}

// ── Checks ──────────────────────────────────────────────────────────────────

fn check_config(config: &StickerBotConfig, source: Option<&Path>) -> Section {
    let label = source
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "built-in defaults".into());
    let mut section = Section::new(format!("Config ({label})"));

    let result = validate(config);
    if result.diagnostics.is_empty() {
        section.push(Status::Ok, "no issues found");
    }
    for d in &result.diagnostics {
        let status = match d.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
        };
        section.push(status, format!("{}: {}", d.path, d.message));
    }

    section.push(
        Status::Info,
        format!(
            "keywords: door={:?} confirm={:?} for={:?}, sticker marker {:?}",
            config.keywords.door,
            config.keywords.confirm,
            config.keywords.for_token,
            config.sticker.marker
        ),
    );
    section
}

fn check_backends(config: &StickerBotConfig) -> Section {
    let mut section = Section::new("Sticker backends");
    section.push(
        Status::Ok,
        format!(
            "static images: built in ({0}x{0} lossless webp)",
            config.sticker.canvas_size
        ),
    );

    let transcoder = FfmpegTranscoder::with_binary(config.sticker.ffmpeg_path.clone());
    match transcoder.find_binary() {
        Some(path) => section.push(Status::Ok, format!("ffmpeg: {}", path.display())),
        None => {
            if let Some(ref configured) = config.sticker.ffmpeg_path {
                section.push(
                    Status::Warn,
                    format!("sticker.ffmpeg_path {configured:?} is not a file and ffmpeg is not on PATH"),
                );
            }
            section.push(
                Status::Warn,
                "ffmpeg not found: GIF and video stickers are disabled",
            );
        },
    }
    section
}

async fn check_session(config: &StickerBotConfig) -> Section {
    let mut section = Section::new("Session");
    section.push(Status::Info, format!("bridge: {}", config.session.bridge_url));

    let auth_dir = &config.session.auth_dir;
    if !auth_dir.is_dir() {
        section.push(
            Status::Skip,
            format!(
                "auth dir {} does not exist yet, a QR code will be shown on first run",
                auth_dir.display()
            ),
        );
        return section;
    }

    let store = FileCredentialStore::in_dir(auth_dir);
    match tokio::fs::metadata(store.path()).await {
        Ok(_) => section.push(
            Status::Ok,
            format!("stored credentials: {}", store.path().display()),
        ),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => section.push(
            Status::Info,
            "no stored credentials, a QR code will be shown on first run",
        ),
        Err(e) => section.push(
            Status::Fail,
            format!("cannot read {}: {e}", store.path().display()),
        ),
    }
    section
}
