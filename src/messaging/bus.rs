//! Event dispatcher: kind-keyed subscriber registry with a wildcard list.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{trace, warn};

use super::{Event, EventKind};

/// Result returned by subscriber callbacks.
pub type SubscriberResult = Result<(), SubscriberError>;

type Callback = Arc<dyn Fn(&Event) -> SubscriberResult + Send + Sync>;
type ErrorReporter = Arc<dyn Fn(&SubscriberFailure) + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Errors a subscriber may return from its callback.
#[derive(Debug, thiserror::Error)]
pub enum SubscriberError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Other(String),
}

impl SubscriberError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Caller defects surfaced by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown subscription: {0:?}")]
    UnknownSubscription(SubscriptionId),
}

/// Report handed to the error reporter when a subscriber fails.
#[derive(Debug, Clone)]
pub struct SubscriberFailure {
    pub subscription: SubscriptionId,
    pub event_kind: EventKind,
    pub message: String,
    /// The callback panicked rather than returning an error.
    pub panicked: bool,
}

/// Implemented by long-lived subscribers such as renderers.
pub trait EventSubscriber: Send + Sync {
    fn on_event(&self, event: &Event) -> SubscriberResult;
}

#[derive(Clone)]
struct Subscriber {
    id: SubscriptionId,
    callback: Callback,
}

#[derive(Default)]
struct Registry {
    by_kind: HashMap<EventKind, Vec<Subscriber>>,
    wildcard: Vec<Subscriber>,
}

impl Registry {
    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.len();
        for subs in self.by_kind.values_mut() {
            subs.retain(|s| s.id != id);
        }
        self.wildcard.retain(|s| s.id != id);
        self.len() != before
    }

    fn len(&self) -> usize {
        self.by_kind.values().map(Vec::len).sum::<usize>() + self.wildcard.len()
    }
}

struct Inner {
    registry: Mutex<Registry>,
    next_id: AtomicU64,
    reporter: Mutex<Option<ErrorReporter>>,
}

/// Synchronous publish/subscribe hub for [`Event`]s.
///
/// Cloning yields another handle to the same registry, so a callback can hold
/// a clone and unsubscribe itself.
///
/// Delivery order for one event: subscribers registered for its kind, in
/// registration order, then wildcard subscribers, in registration order.
#[derive(Clone)]
pub struct StreamHandler {
    inner: Arc<Inner>,
}

impl StreamHandler {
    /// Create an empty handler.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                registry: Mutex::new(Registry::default()),
                next_id: AtomicU64::new(1),
                reporter: Mutex::new(None),
            }),
        }
    }

    /// Route subscriber failures to `reporter` instead of the log.
    pub fn with_error_reporter<F>(self, reporter: F) -> Self
    where
        F: Fn(&SubscriberFailure) + Send + Sync + 'static,
    {
        *self.inner.reporter.lock() = Some(Arc::new(reporter));
        self
    }

    fn next_id(&self) -> SubscriptionId {
        SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register `callback` for one event kind.
    pub fn subscribe<F>(&self, kind: EventKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> SubscriberResult + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.inner
            .registry
            .lock()
            .by_kind
            .entry(kind)
            .or_default()
            .push(Subscriber {
                id,
                callback: Arc::new(callback),
            });
        id
    }

    /// Register `callback` for every event kind.
    pub fn subscribe_all<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Event) -> SubscriberResult + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.inner.registry.lock().wildcard.push(Subscriber {
            id,
            callback: Arc::new(callback),
        });
        id
    }

    /// Register a long-lived subscriber for every event kind.
    pub fn attach<S>(&self, subscriber: Arc<S>) -> SubscriptionId
    where
        S: EventSubscriber + 'static,
    {
        self.subscribe_all(move |event| subscriber.on_event(event))
    }

    /// Remove a subscription.
    ///
    /// Calling this from inside a callback is fine: the pass in flight keeps
    /// its snapshot and only later emits are affected.
    pub fn unsubscribe(&self, id: SubscriptionId) -> Result<(), DispatchError> {
        if self.inner.registry.lock().remove(id) {
            Ok(())
        } else {
            Err(DispatchError::UnknownSubscription(id))
        }
    }

    /// Deliver `event` to every matching subscriber.
    ///
    /// Returns the number of callbacks invoked. A failing callback is
    /// reported and does not stop delivery to the rest.
    pub fn emit(&self, event: &Event) -> usize {
        let kind = event.kind();
        let snapshot: Vec<Subscriber> = {
            let registry = self.inner.registry.lock();
            registry
                .by_kind
                .get(&kind)
                .into_iter()
                .flatten()
                .chain(registry.wildcard.iter())
                .cloned()
                .collect()
        };

        trace!(kind = %kind, subscribers = snapshot.len(), "Emitting event");

        for subscriber in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(event)));
            let (message, panicked) = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => (e.to_string(), false),
                Err(payload) => (panic_message(payload.as_ref()), true),
            };
            self.report(&SubscriberFailure {
                subscription: subscriber.id,
                event_kind: kind,
                message,
                panicked,
            });
        }

        snapshot.len()
    }

    fn report(&self, failure: &SubscriberFailure) {
        let reporter = self.inner.reporter.lock().clone();
        match reporter {
            Some(reporter) => {
                // A reporter that panics must not take the run down with it.
                let _ = catch_unwind(AssertUnwindSafe(|| reporter(failure)));
            }
            None => warn!(
                subscription = ?failure.subscription,
                kind = %failure.event_kind,
                panicked = failure.panicked,
                "Subscriber failed: {}",
                failure.message
            ),
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.lock().len()
    }

    /// Drop every subscription.
    pub fn clear(&self) {
        let mut registry = self.inner.registry.lock();
        registry.by_kind.clear();
        registry.wildcard.clear();
    }
}

impl Default for StreamHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}
