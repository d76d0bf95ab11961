//! Event hooks for runner monitoring.
//!
//! Runners publish lifecycle records to a bounded-capacity channel; a
//! consumer drains it out-of-band. Publishing never blocks: when the
//! consumer falls behind, records are dropped and counted, so observer
//! latency can never leak into the search loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::time::Duration;

use localforge_core::CostStructure;

/// The kind of a runner lifecycle event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The runner entered its loop.
    Started,
    /// A move was committed and improved on the best state.
    NewBest,
    /// A move was committed without improving on the best state.
    MadeMove,
    /// The runner left its loop.
    Ended,
}

/// One record published by a runner.
#[derive(Debug, Clone)]
pub struct EventRecord {
    pub kind: EventKind,
    /// Iteration index at publish time.
    pub iteration: u64,
    /// Wall time since the run started.
    pub elapsed: Duration,
    /// Cost attached to the event: the new best cost for
    /// [`EventKind::NewBest`], the current cost otherwise.
    pub cost: CostStructure,
    /// Textual rendering of the committed move, when one exists.
    pub mv: Option<String>,
    /// Runner-supplied status line (e.g. the current temperature).
    pub status: String,
}

/// Publishing half of the event channel. Cheap to clone.
#[derive(Clone)]
pub struct EventBus {
    tx: SyncSender<EventRecord>,
    dropped: Arc<AtomicU64>,
}

impl EventBus {
    /// Creates a channel with room for `capacity` in-flight records and
    /// returns both halves.
    pub fn bounded(capacity: usize) -> (EventBus, Receiver<EventRecord>) {
        let (tx, rx) = std::sync::mpsc::sync_channel(capacity);
        (
            EventBus {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            rx,
        )
    }

    /// Publishes a record without blocking. Records that do not fit are
    /// dropped and counted.
    pub fn publish(&self, record: EventRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Number of records dropped so far.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("dropped", &self.dropped_count())
            .finish()
    }
}

/// Spawns a consumer thread that forwards every record to `tracing`.
///
/// The thread exits when all publishing handles are dropped.
pub fn spawn_tracing_consumer(rx: Receiver<EventRecord>) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        for record in rx {
            match record.kind {
                EventKind::Started => tracing::debug!(
                    iteration = record.iteration,
                    status = %record.status,
                    "search started"
                ),
                EventKind::NewBest => tracing::debug!(
                    iteration = record.iteration,
                    elapsed_ms = record.elapsed.as_millis() as u64,
                    cost = %record.cost,
                    mv = record.mv.as_deref().unwrap_or(""),
                    status = %record.status,
                    "new best"
                ),
                EventKind::MadeMove => tracing::trace!(
                    iteration = record.iteration,
                    cost = %record.cost,
                    mv = record.mv.as_deref().unwrap_or(""),
                    "made move"
                ),
                EventKind::Ended => tracing::debug!(
                    iteration = record.iteration,
                    elapsed_ms = record.elapsed.as_millis() as u64,
                    cost = %record.cost,
                    "search ended"
                ),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: EventKind) -> EventRecord {
        EventRecord {
            kind,
            iteration: 0,
            elapsed: Duration::ZERO,
            cost: CostStructure::zero(),
            mv: None,
            status: String::new(),
        }
    }

    #[test]
    fn records_flow_through_the_channel() {
        let (bus, rx) = EventBus::bounded(4);
        bus.publish(record(EventKind::Started));
        bus.publish(record(EventKind::Ended));
        drop(bus);

        let kinds: Vec<_> = rx.iter().map(|r| r.kind).collect();
        assert_eq!(kinds, vec![EventKind::Started, EventKind::Ended]);
    }

    #[test]
    fn overflow_drops_instead_of_blocking() {
        let (bus, rx) = EventBus::bounded(1);
        bus.publish(record(EventKind::Started));
        bus.publish(record(EventKind::MadeMove));
        assert_eq!(bus.dropped_count(), 1);
        drop(bus);
        assert_eq!(rx.iter().count(), 1);
    }

    #[test]
    fn disconnected_consumer_counts_as_dropped() {
        let (bus, rx) = EventBus::bounded(4);
        drop(rx);
        bus.publish(record(EventKind::Started));
        assert_eq!(bus.dropped_count(), 1);
    }
}
