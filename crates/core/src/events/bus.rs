use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::{EnrichedEvent, PipelineEvent};

pub type EventReceiver = mpsc::UnboundedReceiver<Arc<EnrichedEvent>>;

/// Session-scoped fan-out of pipeline events. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

struct EventBusInner {
    session_id: Uuid,
    next_ingest_seq: AtomicU64,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Arc<EnrichedEvent>>>>,
    dropped_subscribers: AtomicU64,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(Uuid::new_v4())
    }
}

impl EventBus {
    pub fn new(session_id: Uuid) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                session_id,
                next_ingest_seq: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                dropped_subscribers: AtomicU64::new(0),
            }),
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn publish(&self, run_id: Uuid, event: PipelineEvent) {
        let ingest_seq = self.inner.next_ingest_seq.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(%run_id, ingest_seq, event_type = event.event_type(), "Publishing event");

        let enriched_event = Arc::new(EnrichedEvent {
            event_id: Uuid::new_v4(),
            run_id,
            session_id: self.inner.session_id,
            ingest_seq,
            timestamp: Utc::now(),
            event,
        });

        let mut subscribers = self
            .inner
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let before = subscribers.len();
        subscribers.retain(|tx| tx.send(Arc::clone(&enriched_event)).is_ok());
        let dropped = (before - subscribers.len()) as u64;
        if dropped > 0 {
            self.inner
                .dropped_subscribers
                .fetch_add(dropped, Ordering::Relaxed);
        }
    }

    pub fn published_total(&self) -> u64 {
        self.inner.next_ingest_seq.load(Ordering::Relaxed)
    }

    pub fn dropped_subscribers(&self) -> u64 {
        self.inner.dropped_subscribers.load(Ordering::Relaxed)
    }
}
