//! Timeout Registry Module
//!
//! Tracks the pending expiry timer of every `(type, id)` a cache instance holds.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::AbortHandle;

// == Timer ==
/// Handle to one scheduled expiry.
#[derive(Debug)]
pub(crate) struct Timer {
    /// Identifies which arming this timer belongs to
    generation: u64,
    handle: AbortHandle,
}

impl Timer {
    pub(crate) fn new(generation: u64, handle: AbortHandle) -> Self {
        Self { generation, handle }
    }
}

// == Timeout Registry ==
/// `type -> (id -> timer)` bookkeeping owned by a single cache instance.
///
/// Every slot removed through `cancel`, `cancel_type` or `cancel_all` has its
/// task aborted before the slot is dropped, so no handle outlives its entry.
///
/// A fired timer leaves an expiry gate behind while its backend delete runs.
/// The gate stays locked until the delete finishes, so a store of the same
/// entry can wait for it without holding the registry.
#[derive(Debug, Default)]
pub(crate) struct TimeoutRegistry {
    types: HashMap<String, HashMap<String, Timer>>,
    expiring: HashMap<(String, String), Arc<Mutex<()>>>,
    next_generation: u64,
}

impl TimeoutRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Returns a generation number never handed out before by this registry.
    pub(crate) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    /// True once any timer was armed for `type_` and the type was not cleared since.
    pub(crate) fn has_type(&self, type_: &str) -> bool {
        self.types.contains_key(type_)
    }

    pub(crate) fn contains(&self, type_: &str, id: &str) -> bool {
        self.types
            .get(type_)
            .is_some_and(|timers| timers.contains_key(id))
    }

    /// Number of pending timers across all types.
    pub(crate) fn len(&self) -> usize {
        self.types.values().map(HashMap::len).sum()
    }

    // == Insert ==
    /// Registers `timer` for `(type_, id)`, aborting the timer it replaces.
    pub(crate) fn insert(&mut self, type_: &str, id: &str, timer: Timer) {
        let previous = self
            .types
            .entry(type_.to_string())
            .or_default()
            .insert(id.to_string(), timer);
        if let Some(previous) = previous {
            previous.handle.abort();
        }
    }

    // == Cancel ==
    /// Aborts and forgets the timer of `(type_, id)`.
    ///
    /// Returns true if a timer was pending. The type namespace is kept.
    pub(crate) fn cancel(&mut self, type_: &str, id: &str) -> bool {
        match self.types.get_mut(type_).and_then(|timers| timers.remove(id)) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Aborts every timer of `type_` and drops the namespace.
    ///
    /// Returns the number of timers cancelled.
    pub(crate) fn cancel_type(&mut self, type_: &str) -> usize {
        let Some(timers) = self.types.remove(type_) else {
            return 0;
        };
        let count = timers.len();
        for timer in timers.into_values() {
            timer.handle.abort();
        }
        count
    }

    /// Aborts every pending timer.
    pub(crate) fn cancel_all(&mut self) {
        for timer in self.types.drain().flat_map(|(_, timers)| timers.into_values()) {
            timer.handle.abort();
        }
    }

    // == Take If Current ==
    /// Claims the slot of a firing timer.
    ///
    /// Succeeds only if `(type_, id)` still holds the timer armed with
    /// `generation`; a replaced or cancelled timer gets `false` and must not
    /// delete anything.
    pub(crate) fn take_if_current(&mut self, type_: &str, id: &str, generation: u64) -> bool {
        let Some(timers) = self.types.get_mut(type_) else {
            return false;
        };
        let current = timers
            .get(id)
            .is_some_and(|timer| timer.generation == generation);
        if current {
            timers.remove(id);
        }
        current
    }

    // == Expiry Gates ==
    /// Claims the slot of a firing timer and opens an expiry gate for it.
    ///
    /// Returns `None` when the timer is stale. Otherwise the gate stays closed
    /// while the returned guard is held; pass it to [`Self::finish_expiry`].
    pub(crate) fn begin_expiry(
        &mut self,
        type_: &str,
        id: &str,
        generation: u64,
    ) -> Option<OwnedMutexGuard<()>> {
        if !self.take_if_current(type_, id, generation) {
            return None;
        }
        let gate = Arc::new(Mutex::new(()));
        let held = Arc::clone(&gate).try_lock_owned().ok()?;
        self.expiring.insert((type_.to_string(), id.to_string()), gate);
        Some(held)
    }

    /// The gate of an expiry still deleting `(type_, id)`, if any.
    pub(crate) fn expiry_in_flight(&self, type_: &str, id: &str) -> Option<Arc<Mutex<()>>> {
        self.expiring
            .get(&(type_.to_string(), id.to_string()))
            .cloned()
    }

    /// Forgets the gate opened by `begin_expiry`, unless a later expiry of the
    /// same entry replaced it.
    pub(crate) fn finish_expiry(&mut self, type_: &str, id: &str, held: &OwnedMutexGuard<()>) {
        let key = (type_.to_string(), id.to_string());
        let ours = self
            .expiring
            .get(&key)
            .is_some_and(|gate| Arc::ptr_eq(gate, OwnedMutexGuard::mutex(held)));
        if ours {
            self.expiring.remove(&key);
        }
    }
}
