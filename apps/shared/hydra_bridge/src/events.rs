//! Event bridge
//!
//! Turns push notifications from the engine into awaitable one-shot
//! subscriptions.
//!
//! # Architecture
//!
//! - **Subscription**: [`EventBridge::once`] registers a waiter synchronously,
//!   so an event emitted right after the call cannot be missed.
//! - **Dispatch**: [`EventBridge::emit`] resolves every waiter whose filter
//!   accepts the event and detaches it. Waiters that do not match stay.
//! - **Cancellation**: dropping a [`Once`] future removes its waiter.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result};

/// Notification kinds published by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Loaded,
    Renamed,
    Removed,
}

/// Notification published by the engine, with its arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    /// The applet API became callable
    Loaded,
    Renamed { old: String, new: String },
    Removed { name: String },
}

impl HostEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            HostEvent::Loaded => EventKind::Loaded,
            HostEvent::Renamed { .. } => EventKind::Renamed,
            HostEvent::Removed { .. } => EventKind::Removed,
        }
    }
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostEvent::Loaded => write!(f, "loaded"),
            HostEvent::Renamed { old, new } => write!(f, "renamed({}, {})", old, new),
            HostEvent::Removed { name } => write!(f, "removed({})", name),
        }
    }
}

/// Create the queue that carries engine notifications to a session
///
/// The [`Notifier`] goes to the engine side, the [`NotificationStream`] to
/// [`Session::attach`](crate::Session::attach).
pub fn notification_queue() -> (Notifier, NotificationStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    let sent = Arc::new(AtomicU64::new(0));
    (
        Notifier {
            tx,
            sent: Arc::clone(&sent),
        },
        NotificationStream { rx, sent },
    )
}

/// Sending half of the notification queue, safe to call from engine callbacks
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<HostEvent>,
    sent: Arc<AtomicU64>,
}

impl Notifier {
    /// Queue an event; returns `false` once the session is gone
    pub fn notify(&self, event: HostEvent) -> bool {
        if self.tx.send(event).is_ok() {
            self.sent.fetch_add(1, Ordering::SeqCst);
            true
        } else {
            false
        }
    }
}

/// Receiving half of the notification queue
pub struct NotificationStream {
    pub(crate) rx: mpsc::UnboundedReceiver<HostEvent>,
    /// Events queued so far, compared against the session's processed count
    pub(crate) sent: Arc<AtomicU64>,
}

type Filter = Box<dyn Fn(&HostEvent) -> bool + Send>;

struct Waiter {
    id: u64,
    filter: Option<Filter>,
    tx: oneshot::Sender<HostEvent>,
}

impl Waiter {
    fn accepts(&self, event: &HostEvent) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }
}

#[derive(Default)]
struct Waiters {
    by_kind: Mutex<HashMap<EventKind, Vec<Waiter>>>,
    next_id: AtomicU64,
}

impl Waiters {
    fn remove(&self, kind: EventKind, id: u64) {
        let mut by_kind = self.by_kind.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(waiters) = by_kind.get_mut(&kind) {
            waiters.retain(|w| w.id != id);
        }
    }
}

/// One-shot subscription registry keyed by event kind
#[derive(Clone, Default)]
pub struct EventBridge {
    waiters: Arc<Waiters>,
}

impl EventBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the next `kind` event
    pub fn once(&self, kind: EventKind) -> Once {
        self.subscribe(kind, None)
    }

    /// Wait for the next `kind` event accepted by `filter`
    pub fn once_where<F>(&self, kind: EventKind, filter: F) -> Once
    where
        F: Fn(&HostEvent) -> bool + Send + 'static,
    {
        self.subscribe(kind, Some(Box::new(filter)))
    }

    fn subscribe(&self, kind: EventKind, filter: Option<Filter>) -> Once {
        let id = self.waiters.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();

        let mut by_kind = self
            .waiters
            .by_kind
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        by_kind.entry(kind).or_default().push(Waiter { id, filter, tx });

        Once {
            rx,
            kind,
            id,
            waiters: Arc::clone(&self.waiters),
        }
    }

    /// Publish an event, returning how many waiters it resolved
    pub fn emit(&self, event: &HostEvent) -> usize {
        let matched: Vec<Waiter> = {
            let mut by_kind = self
                .waiters
                .by_kind
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let Some(waiters) = by_kind.get_mut(&event.kind()) else {
                return 0;
            };
            let (matched, rest): (Vec<Waiter>, Vec<Waiter>) = std::mem::take(waiters)
                .into_iter()
                .partition(|w| w.accepts(event));
            *waiters = rest;
            matched
        };

        // Receivers dropped in the meantime are not counted
        matched
            .into_iter()
            .map(|w| w.tx.send(event.clone()).is_ok())
            .filter(|sent| *sent)
            .count()
    }

    /// Drop every pending waiter; their futures fail with `ChannelClosed`
    pub fn close(&self) {
        let mut by_kind = self
            .waiters
            .by_kind
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        by_kind.clear();
    }

    /// Number of pending waiters for `kind`
    pub fn pending(&self, kind: EventKind) -> usize {
        let by_kind = self
            .waiters
            .by_kind
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        by_kind.get(&kind).map_or(0, Vec::len)
    }
}

/// Future returned by [`EventBridge::once`]
///
/// Resolves with the first matching event. Fails with
/// [`Error::ChannelClosed`] if the bridge goes away first.
pub struct Once {
    rx: oneshot::Receiver<HostEvent>,
    kind: EventKind,
    id: u64,
    waiters: Arc<Waiters>,
}

impl Future for Once {
    type Output = Result<HostEvent>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|res| res.map_err(|_| Error::ChannelClosed))
    }
}

impl Drop for Once {
    fn drop(&mut self) {
        self.waiters.remove(self.kind, self.id);
    }
}
