//! Configuration loading, env substitution and validation.
//!
//! Config files: `stickerbot.toml`, `stickerbot.yaml` or `stickerbot.json`.
//! Searched in `./` then `~/.config/stickerbot/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    loader::{config_dir, discover_and_load, find_config_file, load_config},
    schema::{
        DiagnosticsConfig, KeywordsConfig, MetricsConfig, SessionConfig, StickerBotConfig,
        StickerConfig, TimingConfig,
    },
    validate::{Diagnostic, Severity, ValidationResult, validate},
};
