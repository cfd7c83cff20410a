//! Bounded, non-blocking event delivery to per-project subscribers.

use chrono::Utc;
use dashmap::DashMap;
use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tracing::warn;

use super::{Event, EventKind};
use crate::core::ProjectId;

/// Delivery counters for monitoring backpressure.
#[derive(Debug, Default)]
pub struct BusMetrics {
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl BusMetrics {
    /// Number of events delivered into subscriber buffers.
    #[must_use]
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    /// Number of events dropped due to full subscriber buffers.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Overflow accounting shared between the bus side and the stream side of
/// one subscription.
///
/// Either side may convert the pending drop count into a marker event:
/// the bus does so ahead of the next event it delivers, and the stream
/// does so once its buffer runs empty, so the marker arrives even when
/// the dropped events were the last ones the project produced.
struct SubscriberShared {
    project: ProjectId,
    /// Events dropped in the current overflow episode; nonzero means a
    /// marker is owed.
    dropped: AtomicU64,
    /// Sequence number of the most recently dropped event.
    last_seq: AtomicU64,
}

impl SubscriberShared {
    fn new(project: ProjectId) -> Self {
        Self {
            project,
            dropped: AtomicU64::new(0),
            last_seq: AtomicU64::new(0),
        }
    }

    fn record_drop(&self, seq: u64, count: u64) {
        self.last_seq.store(seq, Ordering::Release);
        self.dropped.fetch_add(count, Ordering::AcqRel);
    }

    /// Takes ownership of the pending drop count, ending the episode.
    fn take_marker(&self) -> Option<Event> {
        let dropped = self.dropped.swap(0, Ordering::AcqRel);
        if dropped == 0 {
            return None;
        }
        Some(Event {
            project: self.project,
            seq: self.last_seq.load(Ordering::Acquire),
            timestamp: Utc::now(),
            kind: EventKind::SubscriberOverflow { dropped },
        })
    }
}

struct BusSubscriber {
    tx: mpsc::Sender<Event>,
    shared: Arc<SubscriberShared>,
}

/// Delivers each project's events to its subscribers in production order.
///
/// Producers never block: a slow subscriber drops events past its bounded
/// buffer and receives a single [`EventKind::SubscriberOverflow`] marker
/// per overflow episode, telling it to re-fetch a snapshot.
pub struct EventBus {
    subscribers: DashMap<ProjectId, Vec<BusSubscriber>>,
    buffer: usize,
    metrics: BusMetrics,
}

impl EventBus {
    /// Creates a bus with the given per-subscriber buffer capacity.
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer: buffer.max(1),
            metrics: BusMetrics::default(),
        }
    }

    /// Registers a new subscriber for a project's events.
    #[must_use]
    pub fn subscribe(&self, project: ProjectId) -> EventStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        let shared = Arc::new(SubscriberShared::new(project));
        self.subscribers.entry(project).or_default().push(BusSubscriber {
            tx,
            shared: Arc::clone(&shared),
        });
        EventStream { rx, shared }
    }

    /// Publishes one event to every subscriber of its project.
    ///
    /// Never blocks. Disconnected subscribers are pruned.
    pub fn publish(&self, event: &Event) {
        let Some(mut subs) = self.subscribers.get_mut(&event.project) else {
            return;
        };

        let metrics = &self.metrics;
        subs.retain_mut(|sub| {
            // A pending overflow marker goes first so the subscriber
            // learns about the gap before the events that follow it.
            if let Some(marker) = sub.shared.take_marker() {
                match sub.tx.try_send(marker) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(marker)) => {
                        // Episode continues: put the count back and count
                        // the current event as dropped too.
                        if let EventKind::SubscriberOverflow { dropped } = marker.kind {
                            sub.shared.record_drop(event.seq, dropped + 1);
                        }
                        metrics.dropped.fetch_add(1, Ordering::Relaxed);
                        return true;
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => return false,
                }
            }

            match sub.tx.try_send(event.clone()) {
                Ok(()) => {
                    metrics.delivered.fetch_add(1, Ordering::Relaxed);
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    sub.shared.record_drop(event.seq, 1);
                    metrics.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        project = %event.project,
                        seq = event.seq,
                        "Event dropped: subscriber buffer full"
                    );
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            }
        });
    }

    /// Returns the delivery counters.
    #[must_use]
    pub fn metrics(&self) -> &BusMetrics {
        &self.metrics
    }

    /// Drops all subscribers of a project.
    ///
    /// Streams keep yielding their buffered events and then end.
    pub fn remove_project(&self, project: ProjectId) {
        self.subscribers.remove(&project);
    }
}

/// An ordered stream of one project's events.
pub struct EventStream {
    rx: mpsc::Receiver<Event>,
    shared: Arc<SubscriberShared>,
}

impl EventStream {
    /// Receives the next event, or `None` once the bus side is dropped
    /// and the buffer is drained.
    ///
    /// If events were dropped for this subscriber, the overflow marker is
    /// surfaced as soon as the buffered events ahead of the gap are
    /// consumed, without waiting for another event to be published.
    pub async fn recv(&mut self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => return Some(event),
            Err(mpsc::error::TryRecvError::Empty) => {
                if let Some(marker) = self.shared.take_marker() {
                    return Some(marker);
                }
            }
            Err(mpsc::error::TryRecvError::Disconnected) => {
                return self.shared.take_marker();
            }
        }
        match self.rx.recv().await {
            Some(event) => Some(event),
            None => self.shared.take_marker(),
        }
    }

    /// Non-blocking receive; also surfaces a pending overflow marker once
    /// the buffer is empty.
    pub fn try_recv(&mut self) -> Option<Event> {
        match self.rx.try_recv() {
            Ok(event) => Some(event),
            Err(_) => self.shared.take_marker(),
        }
    }
}

impl std::fmt::Debug for EventStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventStream")
            .field("project", &self.shared.project)
            .finish_non_exhaustive()
    }
}

impl Stream for EventStream {
    type Item = Event;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(event)) => Poll::Ready(Some(event)),
            Poll::Ready(None) => Poll::Ready(this.shared.take_marker()),
            Poll::Pending => match this.shared.take_marker() {
                Some(marker) => Poll::Ready(Some(marker)),
                None => Poll::Pending,
            },
        }
    }
}
