//! Hold content-less events until their re-delivery arrives.
//!
//! The session sometimes announces a message before it can decrypt the
//! payload and re-delivers it with content shortly after. Each held key owns
//! exactly one timer in a [`DelayQueue`]; the registry maps the key to the
//! timer's handle so fulfilment cancels the timer and removes the entry in
//! the same step.

use std::{collections::HashMap, fmt, future, time::Duration};

use {
    stickerbot_protocol::InboundEvent,
    tokio_util::time::{DelayQueue, delay_queue},
};

/// Identity of a held event: conversation plus message id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PendingKey {
    pub remote_jid: String,
    pub message_id: String,
}

impl PendingKey {
    #[must_use]
    pub fn of(event: &InboundEvent) -> Self {
        Self {
            remote_jid: event.remote_jid().to_string(),
            message_id: event.message_id().to_string(),
        }
    }
}

impl fmt::Display for PendingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.remote_jid, self.message_id)
    }
}

/// What the buffer decided for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Content-less, now held. Do not process.
    Buffered,
    /// Content-less and already held. Do not process.
    AlreadyBuffered,
    /// Carries content for a held key; the hold was released. Process.
    Fulfilled,
    /// Carries content, nothing was held. Process.
    Fresh,
}

impl Admission {
    #[must_use]
    pub fn should_process(self) -> bool {
        matches!(self, Self::Fulfilled | Self::Fresh)
    }
}

pub struct PendingBuffer {
    ttl: Duration,
    entries: HashMap<PendingKey, delay_queue::Key>,
    timers: DelayQueue<PendingKey>,
}

impl PendingBuffer {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
            timers: DelayQueue::new(),
        }
    }

    /// Gate one event. Must run inside a tokio runtime.
    pub fn admit(&mut self, event: &InboundEvent) -> Admission {
        let key = PendingKey::of(event);

        if !event.has_content() {
            if self.entries.contains_key(&key) {
                return Admission::AlreadyBuffered;
            }
            let timer = self.timers.insert(key.clone(), self.ttl);
            self.entries.insert(key, timer);
            return Admission::Buffered;
        }

        match self.entries.remove(&key) {
            Some(timer) => {
                self.timers.try_remove(&timer);
                Admission::Fulfilled
            },
            None => Admission::Fresh,
        }
    }

    /// Wait for the next held key to expire and drop it.
    ///
    /// Never resolves while the buffer is empty. Cancel safe, so it can sit
    /// in a `select!` loop next to the event stream.
    pub async fn next_expired(&mut self) -> PendingKey {
        loop {
            match future::poll_fn(|cx| self.timers.poll_expired(cx)).await {
                Some(expired) => {
                    let key = expired.into_inner();
                    self.entries.remove(&key);
                    return key;
                },
                None => future::pending::<()>().await,
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn contains(&self, key: &PendingKey) -> bool {
        self.entries.contains_key(key)
    }
}
