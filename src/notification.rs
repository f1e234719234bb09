// Board notification bus
//
// Satellite views subscribe a zero-argument handler and re-query whatever they display each
// time the board may have changed. Notifications carry no payload.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, warn};

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Handler = Arc<dyn Fn() -> HandlerFuture + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct BusInner {
    subscribers: Mutex<Vec<(SubscriptionId, Handler)>>,
    next_id: AtomicU64,
    revision: AtomicU64,
}

/// Fire-and-forget "board changed" broadcaster, one per board session
#[derive(Clone, Default)]
pub struct BoardBus {
    inner: Arc<BusInner>,
}

impl BoardBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F, Fut>(&self, handler: F) -> SubscriptionId
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let handler: Handler = Arc::new(move || Box::pin(handler()) as HandlerFuture);
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, handler));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != before
    }

    /// Invoke every current subscriber in subscription order.
    ///
    /// Handlers are called synchronously; the futures they return run detached on the
    /// current tokio runtime.
    pub fn notify(&self) {
        let revision = self.inner.revision.fetch_add(1, Ordering::Relaxed) + 1;
        let handlers: Vec<Handler> = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();
        debug!(revision, subscribers = handlers.len(), "Board updated");

        for handler in handlers {
            let refresh = handler();
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    runtime.spawn(refresh);
                }
                Err(_) => warn!(revision, "No async runtime, board subscriber skipped"),
            }
        }
    }

    /// Number of notifications sent so far
    pub fn revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Relaxed)
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
