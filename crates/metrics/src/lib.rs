//! Metrics collection and export for stickerbot.
//!
//! Everything goes through the `metrics` crate facade, so call sites record
//! unconditionally and pay nothing when no recorder is installed. With the
//! `prometheus` feature, [`init_metrics`] installs a Prometheus recorder whose
//! output is available through [`MetricsHandle::render`].
//!
//! ```rust,ignore
//! use stickerbot_metrics::{counter, stickers};
//!
//! counter!(stickers::SENT_TOTAL, "kind" => "static").increment(1);
//! ```

mod definitions;
mod error;
mod recorder;

pub use {
    definitions::*,
    error::{Error, Result},
    recorder::{MetricsHandle, MetricsRecorderConfig, init_metrics},
};

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge, histogram};
