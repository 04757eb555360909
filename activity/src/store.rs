use std::collections::{BTreeMap, HashMap};
use std::num::NonZeroUsize;
use std::ops::Bound;
use std::sync::{Mutex, MutexGuard};

use metrics::{counter, gauge};
use time::{Duration, OffsetDateTime};
use tracing::info;

use crate::event::{Event, Identity};

/// Outcome of an admission. A duplicate identity is a normal outcome, not an
/// error: `admitted` is false and nothing changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub admitted: bool,
    /// Events dropped to get back under capacity. May include the event that
    /// was just admitted when it is older than everything retained.
    pub evicted: usize,
}

/// Bounded, deduplicated collection of events shared by every ingestion path
/// and the read path. Implementations must run each operation atomically with
/// respect to the others.
///
/// A document-store backed implementation maps onto find-by-identity, insert,
/// count and delete-all, and must still check identity before inserting.
pub trait EventStore {
    fn admit(&self, event: Event) -> Admission;
    /// All retained events with `occurred_at >= now - horizon`, newest first.
    fn query_window(&self, now: OffsetDateTime, horizon: Duration) -> Vec<Event>;
    fn count(&self) -> usize;
    /// Drops everything, returns how many events were removed.
    fn clear(&self) -> usize;
    fn capacity(&self) -> usize;
}

// Ordering key: oldest first, admission order breaks timestamp ties.
type Slot = (OffsetDateTime, u64);

#[derive(Default)]
struct Retained {
    by_time: BTreeMap<Slot, Event>,
    by_identity: HashMap<Identity, Slot>,
    sequence: u64,
}

impl Retained {
    fn insert(&mut self, event: Event) {
        let slot = (event.occurred_at, self.sequence);
        self.sequence += 1;
        self.by_identity.insert(event.identity.clone(), slot);
        self.by_time.insert(slot, event);
    }

    fn evict_oldest(&mut self) -> Option<Event> {
        let (_, event) = self.by_time.pop_first()?;
        self.by_identity.remove(&event.identity);
        Some(event)
    }

    fn len(&self) -> usize {
        self.by_time.len()
    }
}

/// In-memory store. A single mutex covers both indexes, so readers never see
/// an event that is in one index and not the other.
pub struct MemoryStore {
    retained: Mutex<Retained>,
    capacity: NonZeroUsize,
}

impl MemoryStore {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            retained: Mutex::new(Retained::default()),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Retained> {
        // Every mutation leaves both indexes consistent before it can panic,
        // so a poisoned guard is still safe to use.
        self.retained
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventStore for MemoryStore {
    fn admit(&self, event: Event) -> Admission {
        let origin = event.origin.as_str();
        let mut retained = self.lock();

        if retained.by_identity.contains_key(&event.identity) {
            counter!("activity_events_duplicate_total", "origin" => origin).increment(1);
            return Admission {
                admitted: false,
                evicted: 0,
            };
        }

        retained.insert(event);
        let mut evicted = 0;
        while retained.len() > self.capacity.get() {
            if let Some(oldest) = retained.evict_oldest() {
                evicted += 1;
                info!(
                    id = %oldest.identity,
                    created_at = %oldest.occurred_at,
                    "capacity reached, evicted oldest event"
                );
            }
        }
        let size = retained.len();
        drop(retained);

        counter!("activity_events_admitted_total", "origin" => origin).increment(1);
        if evicted > 0 {
            counter!("activity_events_evicted_total").increment(evicted as u64);
        }
        gauge!("activity_store_size").set(size as f64);

        Admission {
            admitted: true,
            evicted,
        }
    }

    fn query_window(&self, now: OffsetDateTime, horizon: Duration) -> Vec<Event> {
        // A horizon reaching past the representable range has no lower bound
        let lower = match now.checked_sub(horizon) {
            Some(cutoff) => Bound::Included((cutoff, 0)),
            None => Bound::Unbounded,
        };
        self.lock()
            .by_time
            .range((lower, Bound::Unbounded))
            .rev()
            .map(|(_, event)| event.clone())
            .collect()
    }

    fn count(&self) -> usize {
        self.lock().len()
    }

    fn clear(&self) -> usize {
        let removed = std::mem::take(&mut *self.lock()).len();
        gauge!("activity_store_size").set(0.0);
        removed
    }

    fn capacity(&self) -> usize {
        self.capacity.get()
    }
}
