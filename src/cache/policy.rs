//! Pluggable eviction policies.
//!
//! A policy owns an ordering over all live entries of one payload type,
//! across every fingerprint structure. It never touches the entries
//! themselves; it works on [`EntryHandle`]s, and the store uses the handle
//! returned by `evict` to remove the entry from its owning structure.

use super::types::Replacement;

/// Locates an entry inside a store: the fingerprint of its owning structure
/// plus its store-unique id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryHandle {
    pub semantic_id: String,
    pub entry_id: u64,
}

/// Eviction ordering over the live entries of one cache store.
pub trait EvictionPolicy: Send {
    /// A fresh entry was inserted.
    fn inserted(&mut self, handle: EntryHandle);

    /// An entry satisfied a lookup.
    fn accessed(&mut self, entry_id: u64);

    /// Pick and remove the next victim.
    ///
    /// # Panics
    ///
    /// Panics when no entries are tracked; the store only evicts while it
    /// holds more bytes than its budget, so an empty policy here means the
    /// accounting is broken.
    fn evict(&mut self) -> EntryHandle;

    /// Number of tracked entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Build the policy selected by configuration.
pub fn create_policy(replacement: Replacement) -> Box<dyn EvictionPolicy> {
    match replacement {
        Replacement::Lru => Box::new(LruPolicy::new()),
        Replacement::Lfu => Box::new(LfuPolicy::new()),
        Replacement::Fifo => Box::new(FifoPolicy::new()),
    }
}

/// Least-recently-used: accesses move an entry to the tail, eviction takes
/// the head.
pub struct LruPolicy {
    order: Vec<EntryHandle>,
}

impl LruPolicy {
    pub fn new() -> Self {
        Self { order: Vec::new() }
    }
}

impl Default for LruPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPolicy for LruPolicy {
    fn inserted(&mut self, handle: EntryHandle) {
        self.order.push(handle);
    }

    fn accessed(&mut self, entry_id: u64) {
        if let Some(pos) = self.order.iter().position(|h| h.entry_id == entry_id) {
            let handle = self.order.remove(pos);
            self.order.push(handle);
        }
    }

    fn evict(&mut self) -> EntryHandle {
        if self.order.is_empty() {
            panic!("evict called on an empty LRU policy");
        }
        self.order.remove(0)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

/// Least-frequently-used: eviction takes the entry with the lowest access
/// count, ties broken by insertion order.
pub struct LfuPolicy {
    slots: Vec<LfuSlot>,
    next_seq: u64,
}

struct LfuSlot {
    handle: EntryHandle,
    accesses: u64,
    seq: u64,
}

impl LfuPolicy {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            next_seq: 0,
        }
    }
}

impl Default for LfuPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPolicy for LfuPolicy {
    fn inserted(&mut self, handle: EntryHandle) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots.push(LfuSlot {
            handle,
            accesses: 0,
            seq,
        });
    }

    fn accessed(&mut self, entry_id: u64) {
        if let Some(slot) = self.slots.iter_mut().find(|s| s.handle.entry_id == entry_id) {
            slot.accesses += 1;
        }
    }

    fn evict(&mut self) -> EntryHandle {
        let victim = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| (s.accesses, s.seq))
            .map(|(i, _)| i)
            .unwrap_or_else(|| panic!("evict called on an empty LFU policy"));
        self.slots.remove(victim).handle
    }

    fn len(&self) -> usize {
        self.slots.len()
    }
}

/// First-in-first-out: insertion order only, accesses are ignored.
pub struct FifoPolicy {
    order: Vec<EntryHandle>,
}

impl FifoPolicy {
    pub fn new() -> Self {
        Self { order: Vec::new() }
    }
}

impl Default for FifoPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl EvictionPolicy for FifoPolicy {
    fn inserted(&mut self, handle: EntryHandle) {
        self.order.push(handle);
    }

    fn accessed(&mut self, _entry_id: u64) {}

    fn evict(&mut self) -> EntryHandle {
        if self.order.is_empty() {
            panic!("evict called on an empty FIFO policy");
        }
        self.order.remove(0)
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}
