//! Owns the session: connects, reconnects, gates and dispatches messages.
//!
//! Everything mutable (connection state, pending buffer, reconnect timer)
//! lives on [`SessionController`] and is only touched from [`run`]'s loop.
//! Message batches are processed on spawned tasks so a slow transcode never
//! holds up connection handling.
//!
//! [`run`]: SessionController::run

use std::{future, pin::Pin, sync::Arc};

use {
    stickerbot_channels::{ConnectOptions, CredentialStore, QrRenderer, SessionConnector},
    stickerbot_config::StickerBotConfig,
    stickerbot_protocol::{
        ConnectionStatus, ConnectionUpdate, Credentials, MessageBatch, SessionEvent,
    },
    tokio::{
        sync::{mpsc, watch},
        task::JoinSet,
        time::{Sleep, sleep},
    },
    tracing::{debug, error, info, warn},
};

#[cfg(feature = "metrics")]
use stickerbot_metrics::{counter, gauge, labels, messages, pending as pending_metrics, session};

use crate::{
    Error, Result,
    dispatch::{Dispatcher, Encoders},
    lifecycle::{ConnectionState, Effect},
    pending::{Admission, PendingBuffer, PendingKey},
};

/// Why [`SessionController::run`] returned without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// The account was logged out; re-authentication is required.
    LoggedOut,
}

pub struct SessionController {
    connector: Arc<dyn SessionConnector>,
    store: Arc<dyn CredentialStore>,
    qr: Arc<dyn QrRenderer>,
    encoders: Encoders,
    config: Arc<StickerBotConfig>,
    state: ConnectionState,
    pending: PendingBuffer,
    events: Option<mpsc::Receiver<SessionEvent>>,
    dispatcher: Option<Arc<Dispatcher>>,
    reconnect: Option<Pin<Box<Sleep>>>,
    tasks: JoinSet<()>,
    writer: Option<CredentialWriter>,
}

impl SessionController {
    #[must_use]
    pub fn new(
        connector: Arc<dyn SessionConnector>,
        store: Arc<dyn CredentialStore>,
        qr: Arc<dyn QrRenderer>,
        encoders: Encoders,
        config: StickerBotConfig,
    ) -> Self {
        let pending = PendingBuffer::new(config.timing.pending_ttl());
        Self {
            connector,
            store,
            qr,
            encoders,
            config: Arc::new(config),
            state: ConnectionState::default(),
            pending,
            events: None,
            dispatcher: None,
            reconnect: None,
            tasks: JoinSet::new(),
            writer: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Establish a fresh session with the stored credentials, or start a new
    /// login if there are none. Returns once the session is wired; opening
    /// is reported later through a connection update.
    pub async fn start(&mut self) -> Result<()> {
        let credentials = self.store.load().await.map_err(Error::start)?;
        debug!(
            has_credentials = credentials.is_some(),
            browser = ?self.config.session.browser,
            "starting session"
        );
        let options = ConnectOptions {
            browser: self.config.session.browser.clone(),
        };
        let connection = self
            .connector
            .connect(credentials, &options)
            .await
            .map_err(Error::start)?;

        self.state = ConnectionState::Connecting;
        self.events = Some(connection.events);
        self.dispatcher = Some(Arc::new(Dispatcher::new(
            connection.session,
            self.encoders.clone(),
            &self.config,
        )));
        Ok(())
    }

    /// Drive the session until it is logged out.
    ///
    /// Starts the session first if [`start`](Self::start) was not called. A
    /// failed reconnect is returned as [`Error::Start`] and not retried.
    pub async fn run(&mut self) -> Result<Shutdown> {
        if self.events.is_none() {
            self.start().await?;
        }

        loop {
            tokio::select! {
                event = next_event(&mut self.events) => match event {
                    Some(event) => {
                        if let Some(shutdown) = self.on_session_event(event) {
                            return Ok(shutdown);
                        }
                    },
                    None => {
                        warn!("session event stream ended");
                        self.events = None;
                        let closed = ConnectionUpdate {
                            connection: Some(ConnectionStatus::Close),
                            ..Default::default()
                        };
                        if let Some(shutdown) = self.on_connection_update(&closed) {
                            return Ok(shutdown);
                        }
                    },
                },
                key = self.pending.next_expired() => {
                    info!(key = %key, "pending message expired");
                    #[cfg(feature = "metrics")]
                    {
                        counter!(pending_metrics::EXPIRED_TOTAL).increment(1);
                        gauge!(pending_metrics::ENTRIES).set(self.pending.len() as f64);
                    }
                },
                () = reconnect_due(&mut self.reconnect) => {
                    self.reconnect = None;
                    if self.state.on_reconnect_due() {
                        info!("attempting to reconnect");
                        if let Err(e) = self.start().await {
                            error!(error = %e, "failed to restart session");
                            return Err(e);
                        }
                    }
                },
                Some(joined) = self.tasks.join_next(), if !self.tasks.is_empty() => {
                    if let Err(e) = joined {
                        error!(error = %e, "message batch task failed");
                    }
                },
            }
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) -> Option<Shutdown> {
        match event {
            SessionEvent::CredentialsUpdated(credentials) => {
                self.persist_credentials(credentials);
                None
            },
            SessionEvent::ConnectionUpdate(update) => self.on_connection_update(&update),
            SessionEvent::MessagesUpsert(batch) => {
                self.on_batch(batch);
                None
            },
        }
    }

    /// Fire-and-forget; a failure is logged, never retried.
    fn persist_credentials(&mut self, credentials: Credentials) {
        self.writer
            .get_or_insert_with(|| CredentialWriter::spawn(Arc::clone(&self.store)))
            .submit(credentials);
    }

    fn on_connection_update(&mut self, update: &ConnectionUpdate) -> Option<Shutdown> {
        let transition = self.state.on_update(update);

        if let Some(challenge) = transition.qr.as_deref() {
            self.qr.render(challenge);
        }

        if update.connection == Some(ConnectionStatus::Close) {
            let disconnect = update.last_disconnect.as_ref();
            info!(
                code = ?disconnect.and_then(|d| d.status_code),
                error = disconnect.and_then(|d| d.error.as_deref()).unwrap_or_default(),
                "connection closed"
            );
        }

        match transition.effect {
            Effect::None => {},
            Effect::Opened => {
                info!("connected and ready");
                #[cfg(feature = "metrics")]
                counter!(session::OPENS_TOTAL).increment(1);
            },
            Effect::ScheduleReconnect => {
                let delay = self.config.timing.reconnect_delay();
                info!(delay_secs = delay.as_secs(), "reconnect scheduled");
                self.reconnect = Some(Box::pin(sleep(delay)));
                #[cfg(feature = "metrics")]
                counter!(session::RECONNECTS_TOTAL).increment(1);
            },
            Effect::ReconnectAlreadyScheduled => {
                debug!("reconnect already scheduled");
            },
            Effect::Shutdown => {
                warn!(
                    auth_dir = %self.config.session.auth_dir.display(),
                    "session logged out; remove the auth directory and restart to log in again"
                );
                self.reconnect = None;
                return Some(Shutdown::LoggedOut);
            },
        }
        None
    }

    fn on_batch(&mut self, batch: MessageBatch) {
        info!(kind = %batch.kind, count = batch.messages.len(), "messages received");
        #[cfg(feature = "metrics")]
        counter!(messages::RECEIVED_TOTAL, labels::BATCH_KIND => batch.kind.to_string())
            .increment(batch.messages.len() as u64);

        let mut admitted = Vec::with_capacity(batch.messages.len());
        for event in batch.messages {
            match self.pending.admit(&event) {
                Admission::Buffered => {
                    info!(key = %PendingKey::of(&event), "message without content, buffering for retry");
                    #[cfg(feature = "metrics")]
                    counter!(pending_metrics::BUFFERED_TOTAL).increment(1);
                },
                Admission::AlreadyBuffered => {
                    debug!(key = %PendingKey::of(&event), "message without content, already pending");
                },
                Admission::Fulfilled => {
                    info!(key = %PendingKey::of(&event), "pending message now has content");
                    #[cfg(feature = "metrics")]
                    counter!(pending_metrics::FULFILLED_TOTAL).increment(1);
                    admitted.push(event);
                },
                Admission::Fresh => admitted.push(event),
            }
        }
        #[cfg(feature = "metrics")]
        gauge!(pending_metrics::ENTRIES).set(self.pending.len() as f64);

        if admitted.is_empty() {
            return;
        }
        let Some(dispatcher) = self.dispatcher.clone() else {
            warn!(count = admitted.len(), "no session to dispatch to, dropping messages");
            return;
        };
        self.tasks
            .spawn(async move { dispatcher.handle_batch(admitted).await });
    }
}

/// Single owner of credential writes. Writes run one at a time; updates that
/// arrive while one is in flight collapse into the newest.
struct CredentialWriter {
    latest: watch::Sender<Option<Credentials>>,
}

impl CredentialWriter {
    fn spawn(store: Arc<dyn CredentialStore>) -> Self {
        let (latest, mut rx) = watch::channel(None);
        tokio::spawn(async move {
            // Still drains an unseen value after the sender is dropped.
            while rx.changed().await.is_ok() {
                let latest = rx.borrow_and_update().clone();
                let Some(credentials) = latest else {
                    continue;
                };
                if let Err(e) = store.persist(&credentials).await {
                    error!(error = %e, "failed to persist credentials");
                }
            }
        });
        Self { latest }
    }

    fn submit(&self, credentials: Credentials) {
        self.latest.send_replace(Some(credentials));
    }
}

async fn next_event(events: &mut Option<mpsc::Receiver<SessionEvent>>) -> Option<SessionEvent> {
    match events {
        Some(rx) => rx.recv().await,
        None => future::pending().await,
    }
}

async fn reconnect_due(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}
