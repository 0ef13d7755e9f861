//! Session connector backed by an external protocol bridge.
//!
//! The bridge process speaks the chat protocol and exposes it as JSON frames
//! over a WebSocket (see [`frames`]). This crate adapts that socket to the
//! session traits and keeps credentials on disk between runs.

pub mod client;
pub mod frames;
pub mod store;

pub use {
    client::{BridgeConnector, BridgeSession},
    store::FileCredentialStore,
};
