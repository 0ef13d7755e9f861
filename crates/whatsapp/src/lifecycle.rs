//! Connection state machine.
//!
//! ```text
//!               open                  close (logged out)
//!  Connecting ───────▶ Open ───────────────────────────▶ ClosedTerminal
//!      ▲  │                │ close (other)
//!      │  │ close (other)  ▼
//!      │  └────────▶ ClosedRetryable ──── close (other): absorbed
//!      └──── reconnect due ─┘
//! ```
//!
//! A reconnect is only scheduled on the edge into `ClosedRetryable`, so at
//! most one is ever in flight.

use std::fmt;

use stickerbot_protocol::{ConnectionStatus, ConnectionUpdate};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Connecting,
    Open,
    /// Closed; exactly one reconnect is scheduled.
    ClosedRetryable,
    /// Logged out. Nothing leaves this state.
    ClosedTerminal,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::ClosedRetryable => "closed_retryable",
            Self::ClosedTerminal => "closed_terminal",
        })
    }
}

/// What the controller must do after an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    Opened,
    ScheduleReconnect,
    /// A retryable close arrived while a reconnect was already scheduled.
    ReconnectAlreadyScheduled,
    /// Logged out; stop without reconnecting.
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Login challenge to render. Independent of the state change.
    pub qr: Option<String>,
    pub effect: Effect,
}

impl ConnectionState {
    /// Apply one connection update.
    pub fn on_update(&mut self, update: &ConnectionUpdate) -> Transition {
        let effect = match (*self, update.connection) {
            (Self::ClosedTerminal, _) => Effect::None,
            (_, Some(ConnectionStatus::Close)) => {
                let logged_out = update
                    .last_disconnect
                    .as_ref()
                    .is_some_and(|d| d.is_logged_out());
                if logged_out {
                    *self = Self::ClosedTerminal;
                    Effect::Shutdown
                } else if *self == Self::ClosedRetryable {
                    Effect::ReconnectAlreadyScheduled
                } else {
                    *self = Self::ClosedRetryable;
                    Effect::ScheduleReconnect
                }
            },
            // A late open from the old socket does not cancel the scheduled reconnect.
            (Self::ClosedRetryable, Some(ConnectionStatus::Open)) => Effect::None,
            (_, Some(ConnectionStatus::Open)) => {
                *self = Self::Open;
                Effect::Opened
            },
            (_, Some(ConnectionStatus::Connecting) | None) => Effect::None,
        };
        Transition {
            qr: update.qr.clone(),
            effect,
        }
    }

    /// The scheduled reconnect fired. Returns `false` if none was scheduled.
    pub fn on_reconnect_due(&mut self) -> bool {
        if *self == Self::ClosedRetryable {
            *self = Self::Connecting;
            true
        } else {
            false
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::ClosedTerminal
    }
}

#[cfg(test)]
mod tests {
    use {
        rstest::rstest,
        stickerbot_protocol::{Disconnect, disconnect_codes},
    };

    use super::*;

    fn open() -> ConnectionUpdate {
        ConnectionUpdate {
            connection: Some(ConnectionStatus::Open),
            ..Default::default()
        }
    }

    fn close(code: Option<u16>) -> ConnectionUpdate {
        ConnectionUpdate {
            connection: Some(ConnectionStatus::Close),
            last_disconnect: Some(Disconnect {
                status_code: code,
                error: Some("Connection Failure".into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn connecting_to_open() {
        let mut state = ConnectionState::default();
        assert_eq!(state.on_update(&open()).effect, Effect::Opened);
        assert_eq!(state, ConnectionState::Open);
    }

    #[rstest]
    #[case(ConnectionState::Connecting)]
    #[case(ConnectionState::Open)]
    #[case(ConnectionState::ClosedRetryable)]
    fn logged_out_is_terminal(#[case] mut state: ConnectionState) {
        let t = state.on_update(&close(Some(disconnect_codes::LOGGED_OUT)));
        assert_eq!(t.effect, Effect::Shutdown);
        assert!(state.is_terminal());
        assert!(!state.on_reconnect_due());
        assert_eq!(state.on_update(&open()).effect, Effect::None);
    }

    #[rstest]
    #[case(None)]
    #[case(Some(disconnect_codes::CONNECTION_LOST))]
    #[case(Some(disconnect_codes::RESTART_REQUIRED))]
    #[case(Some(disconnect_codes::CONNECTION_REPLACED))]
    fn other_closes_schedule_one_reconnect(#[case] code: Option<u16>) {
        let mut state = ConnectionState::Open;
        assert_eq!(state.on_update(&close(code)).effect, Effect::ScheduleReconnect);
        assert_eq!(
            state.on_update(&close(code)).effect,
            Effect::ReconnectAlreadyScheduled
        );
        assert_eq!(state, ConnectionState::ClosedRetryable);

        assert!(state.on_reconnect_due());
        assert_eq!(state, ConnectionState::Connecting);
        assert!(!state.on_reconnect_due());

        // The guard is cleared: the next closure schedules again.
        assert_eq!(state.on_update(&close(code)).effect, Effect::ScheduleReconnect);
    }

    #[test]
    fn late_open_keeps_reconnect_scheduled() {
        let mut state = ConnectionState::ClosedRetryable;
        assert_eq!(state.on_update(&open()).effect, Effect::None);
        assert_eq!(state, ConnectionState::ClosedRetryable);
    }

    #[test]
    fn qr_is_passed_through_without_state_change() {
        let mut state = ConnectionState::Connecting;
        let t = state.on_update(&ConnectionUpdate {
            qr: Some("2@abc,def".into()),
            ..Default::default()
        });
        assert_eq!(t.qr.as_deref(), Some("2@abc,def"));
        assert_eq!(t.effect, Effect::None);
        assert_eq!(state, ConnectionState::Connecting);
    }
}
