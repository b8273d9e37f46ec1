//! Live feed over the messages of one conversation.
//!
//! A background task watches the conversation and, on every change, reloads
//! and delivers the complete ordered message list (never a diff). Store
//! failures are reported as [`FeedEvent::Stale`] and followed by a
//! resubscription with exponential backoff.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chat::core::config::FeedConfig;
use crate::chat::core::ids::ConversationKey;
use crate::chat::feed::backoff::{Backoff, with_jitter};
use crate::chat::model::Message;
use crate::chat::store::DocumentStore;

/// An event delivered by a [`LiveFeed`].
#[derive(Clone, Debug)]
pub enum FeedEvent {
    /// The full, ordered list of messages at the time of delivery.
    Snapshot(Arc<[Message]>),
    /// The feed lost its subscription and will retry after `retry_in`.
    /// The last delivered snapshot is stale until the next one arrives.
    Stale {
        /// Description of the backend failure.
        error: String,
        /// Delay before the next resubscription attempt.
        retry_in: Duration,
    },
}

/// Lifecycle of a live feed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedState {
    /// Not subscribed; terminal once a feed is cancelled.
    Unsubscribed,
    /// Waiting for the first snapshot.
    Subscribing,
    /// Snapshots are flowing.
    Live,
    /// Subscription lost; retrying with backoff.
    Stale,
}

/// A standing subscription to one conversation's messages.
///
/// Dropping or cancelling the feed stops the background task; no event is
/// yielded after [`LiveFeed::cancel`] returns.
pub struct LiveFeed {
    key: ConversationKey,
    events: Option<mpsc::Receiver<FeedEvent>>,
    state_tx: Arc<watch::Sender<FeedState>>,
    state_rx: watch::Receiver<FeedState>,
    task: Option<JoinHandle<()>>,
}

impl LiveFeed {
    /// Subscribe to `key` and start delivering snapshots.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn spawn(store: Arc<dyn DocumentStore>, key: ConversationKey, config: &FeedConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
        let (state_tx, state_rx) = watch::channel(FeedState::Subscribing);
        let state_tx = Arc::new(state_tx);

        let worker = FeedWorker {
            store,
            key: key.clone(),
            backoff: Backoff::new(config),
            events: tx,
            state: Arc::clone(&state_tx),
        };
        let task = tokio::spawn(worker.run());
        debug!(conversation = %key, "Live feed subscribed");

        Self {
            key,
            events: Some(rx),
            state_tx,
            state_rx,
            task: Some(task),
        }
    }

    /// Conversation this feed follows.
    #[must_use]
    pub const fn key(&self) -> &ConversationKey {
        &self.key
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> FeedState {
        *self.state_rx.borrow()
    }

    /// Observe lifecycle transitions.
    #[must_use]
    pub fn state_changes(&self) -> watch::Receiver<FeedState> {
        self.state_rx.clone()
    }

    /// Wait for the next event. Returns `None` once cancelled.
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.events.as_mut()?.recv().await
    }

    /// Whether the feed has been cancelled.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        self.events.is_none()
    }

    /// Release the subscription. Buffered events are discarded.
    ///
    /// Dropping the feed has the same effect.
    pub fn cancel(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        if let Some(mut events) = self.events.take() {
            events.close();
            while events.try_recv().is_ok() {}
        }
        self.state_tx.send_replace(FeedState::Unsubscribed);
        debug!(conversation = %self.key, "Live feed cancelled");
    }
}

impl Drop for LiveFeed {
    fn drop(&mut self) {
        if !self.is_cancelled() {
            self.cancel();
        }
    }
}

impl Stream for LiveFeed {
    type Item = FeedEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.get_mut().events.as_mut() {
            Some(events) => events.poll_recv(cx),
            None => Poll::Ready(None),
        }
    }
}

/// Background half of a [`LiveFeed`].
struct FeedWorker {
    store: Arc<dyn DocumentStore>,
    key: ConversationKey,
    backoff: Backoff,
    events: mpsc::Sender<FeedEvent>,
    state: Arc<watch::Sender<FeedState>>,
}

/// Why the inner delivery loop stopped.
enum Interrupt {
    /// The subscriber went away.
    Closed,
    /// The subscription failed and must be re-established.
    Failed(String),
}

impl FeedWorker {
    async fn run(mut self) {
        loop {
            let error = match self.follow().await {
                Interrupt::Closed => return,
                Interrupt::Failed(error) => error,
            };

            let retry_in = with_jitter(self.backoff.next_delay());
            warn!(
                conversation = %self.key,
                ?retry_in,
                "Live feed failed, resubscribing: {error}"
            );
            self.set_state(FeedState::Stale);
            if self
                .events
                .send(FeedEvent::Stale { error, retry_in })
                .await
                .is_err()
            {
                return;
            }

            tokio::select! {
                () = tokio::time::sleep(retry_in) => {}
                () = self.events.closed() => return,
            }
        }
    }

    /// Watch the conversation and deliver a snapshot per change until interrupted.
    async fn follow(&mut self) -> Interrupt {
        // Watch before loading so an append racing the first read still wakes us.
        let mut changes = self.store.watch(&self.key);

        loop {
            let messages = match self.store.list_messages(self.key.clone()).await {
                Ok(messages) => messages,
                Err(err) => return Interrupt::Failed(err.to_string()),
            };

            self.backoff.reset();
            self.set_state(FeedState::Live);
            debug!(conversation = %self.key, count = messages.len(), "Delivering snapshot");
            if self
                .events
                .send(FeedEvent::Snapshot(messages.into()))
                .await
                .is_err()
            {
                return Interrupt::Closed;
            }

            tokio::select! {
                changed = changes.changed() => {
                    if changed.is_err() {
                        return Interrupt::Failed("change stream closed".to_string());
                    }
                }
                () = self.events.closed() => return Interrupt::Closed,
            }
        }
    }

    /// Transition unless the feed was already cancelled.
    fn set_state(&self, next: FeedState) {
        self.state.send_if_modified(|current| {
            if *current == FeedState::Unsubscribed || *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
