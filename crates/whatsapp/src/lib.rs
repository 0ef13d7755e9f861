//! WhatsApp sticker bot core.
//!
//! A [`SessionController`] keeps a session alive across transient
//! disconnects and feeds inbound message batches through the
//! [`PendingBuffer`] gate into a [`Dispatcher`], which unwraps, classifies
//! and answers each message: a canned text reply for keyword messages, or a
//! sticker built from the attached image, GIF or video.

pub mod classify;
pub mod controller;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod lifecycle;
pub mod pending;
pub mod qr;
pub mod unwrap;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod test_support;

pub use {
    classify::{ClassifyRules, DispatchAction, IgnoreReason, StickerStrategy, classify},
    controller::{SessionController, Shutdown},
    dispatch::{Dispatcher, Encoders},
    error::{Error, Result},
    fetch::fetch_media,
    lifecycle::{ConnectionState, Effect, Transition},
    pending::{Admission, PendingBuffer, PendingKey},
    qr::TerminalQrRenderer,
    unwrap::{UnwrappedMessage, unwrap},
};
