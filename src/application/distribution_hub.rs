// Distribution hub - Ordered, non-reentrant fan-out of records to subscribers
use crate::application::error_sink::{ErrorSink, TracingErrorSink};
use crate::domain::error::DashboardError;
use crate::domain::telemetry::Record;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub type Handler = Arc<dyn Fn(&Record) -> anyhow::Result<()> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct Subscribers {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler)>,
}

/// A published record waiting for fan-out. `watermark` is the first
/// subscription id that did not exist yet when the record was published.
struct Pending {
    record: Record,
    watermark: u64,
}

struct Dispatch {
    queue: VecDeque<Pending>,
    draining: bool,
}

struct HubInner {
    subscribers: Mutex<Subscribers>,
    dispatch: Mutex<Dispatch>,
    error_sink: Arc<dyn ErrorSink>,
}

/// Live broadcast point between transport adapters and consumers.
///
/// Handlers run synchronously on the publishing thread, in registration
/// order. Only one fan-out runs at a time: a record published from inside a
/// handler, or by another producer while a fan-out is in progress, is queued
/// and delivered once the current fan-out completes. There is no replay for
/// late subscribers.
///
/// The thread that starts a fan-out keeps draining until the queue is empty,
/// so under sustained publishing from other producers its `publish` call
/// only returns once they pause.
#[derive(Clone)]
pub struct DistributionHub {
    inner: Arc<HubInner>,
}

impl DistributionHub {
    pub fn new() -> Self {
        Self::with_error_sink(Arc::new(TracingErrorSink))
    }

    pub fn with_error_sink(error_sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: Mutex::new(Subscribers {
                    next_id: 0,
                    handlers: Vec::new(),
                }),
                dispatch: Mutex::new(Dispatch {
                    queue: VecDeque::new(),
                    draining: false,
                }),
                error_sink,
            }),
        }
    }

    pub fn subscribe<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Record) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut subscribers = self.inner.subscribers.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        let handler: Handler = Arc::new(handler);
        subscribers.handlers.push((id, handler));
        tracing::debug!(subscription = %id, "hub subscriber registered");
        id
    }

    /// Returns `false` when the subscription was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.handlers.len();
        subscribers.handlers.retain(|(sub, _)| *sub != id);
        before != subscribers.handlers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().handlers.len()
    }

    pub fn publish(&self, record: impl Into<Record>) {
        let watermark = self.inner.subscribers.lock().next_id;
        {
            let mut dispatch = self.inner.dispatch.lock();
            dispatch.queue.push_back(Pending {
                record: record.into(),
                watermark,
            });
            if dispatch.draining {
                return;
            }
            dispatch.draining = true;
        }

        loop {
            let pending = {
                let mut dispatch = self.inner.dispatch.lock();
                match dispatch.queue.pop_front() {
                    Some(pending) => pending,
                    None => {
                        dispatch.draining = false;
                        return;
                    }
                }
            };
            self.fan_out(&pending);
        }
    }

    fn fan_out(&self, pending: &Pending) {
        // Handlers may subscribe, unsubscribe or publish, so none run under the lock.
        let handlers: Vec<(SubscriptionId, Handler)> = self
            .inner
            .subscribers
            .lock()
            .handlers
            .iter()
            .filter(|(id, _)| id.0 < pending.watermark)
            .cloned()
            .collect();

        for (id, handler) in handlers {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| handler(&pending.record)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => DashboardError::HandlerFailed {
                    subscription: id.0,
                    message: format!("{:#}", err),
                },
                Err(payload) => DashboardError::HandlerPanicked {
                    subscription: id.0,
                    message: panic_message(payload.as_ref()),
                },
            };
            let sink = &self.inner.error_sink;
            if panic::catch_unwind(AssertUnwindSafe(|| sink.report(&failure))).is_err() {
                tracing::error!(error = %failure, "error sink panicked while reporting");
            }
        }
    }
}

impl Default for DistributionHub {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
