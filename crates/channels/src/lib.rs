//! Collaborator interfaces for the chat session.
//!
//! The bot never speaks the chat protocol itself. A [`SessionConnector`]
//! produces a live [`Session`] plus a stream of [`SessionEvent`]s; the bot
//! replies through the session and persists credentials through a
//! [`CredentialStore`]. Login challenges go to a [`QrRenderer`].
//!
//! [`SessionEvent`]: stickerbot_protocol::SessionEvent

pub mod error;
pub mod session;
pub mod store;

pub use {
    error::{Error, Result},
    session::{ConnectOptions, Connection, MediaStream, QrRenderer, Session, SessionConnector},
    store::CredentialStore,
};
