//! # Community Registry
//!
//! Owns every community's destination and pending jokes.
//!
//! The outer map is behind a `RwLock` that is only written when a community
//! is created. Each community sits behind its own `Mutex`, so submissions and
//! drains for different communities never contend, while `record_entry` and
//! `drain_entries` for the same community are serialized: a joke is either in
//! the drained snapshot or still pending afterwards, never both and never
//! neither.
//!
//! The registry owns the [`SymbolPool`]: a community never holds more
//! pending jokes than there are symbols to tag them with, so nothing is left
//! over when a cycle assigns symbols.
//!
//! When a store is attached, every mutation is followed by a full snapshot
//! save. Saves are serialized by `save_lock` and the snapshot is taken while
//! holding it, so the last write on disk is never older than the last
//! mutation that triggered a save.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::model::{ChannelId, Community, CommunityId, Entry};
use super::persistence::{Persistence, PersistenceError};
use super::symbols::SymbolPool;

/// User-facing submission failures, returned synchronously to the command layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubmissionError {
    #[error("no poll channel configured for community {0}")]
    NoDestinationConfigured(CommunityId),

    #[error("community {community} already has the maximum of {capacity} jokes this cycle")]
    CapacityExceeded { community: CommunityId, capacity: usize },

    #[error("joke text is empty")]
    EmptyEntry,
}

pub struct CommunityRegistry {
    communities: RwLock<HashMap<CommunityId, Arc<Mutex<Community>>>>,
    symbols: SymbolPool,
    store: Option<Arc<dyn Persistence>>,
    save_lock: Mutex<()>,
}

impl CommunityRegistry {
    /// In-memory registry with no store attached.
    pub fn new(symbols: SymbolPool) -> Self {
        Self {
            communities: RwLock::new(HashMap::new()),
            symbols,
            store: None,
            save_lock: Mutex::new(()),
        }
    }

    /// Builds a registry from the store's current contents and keeps the store
    /// for subsequent saves. Pending jokes beyond the pool size (possible if
    /// the pool shrank between runs) are dropped with a warning.
    pub fn load(symbols: SymbolPool, store: Arc<dyn Persistence>) -> Result<Self, PersistenceError> {
        let loaded = store.load_all()?;
        Ok(Self::from_snapshot(symbols, loaded).with_store(store))
    }

    /// Saves a full snapshot to `store` after every later mutation.
    pub fn with_store(mut self, store: Arc<dyn Persistence>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn from_snapshot(symbols: SymbolPool, snapshot: HashMap<CommunityId, Community>) -> Self {
        let capacity = symbols.len();
        let mut communities = HashMap::with_capacity(snapshot.len());
        for (key, mut community) in snapshot {
            if community.id != key {
                warn!(community = %key, stored_id = %community.id, "Stored community id differs from its key, using key");
                community.id = key.clone();
            }
            if community.entries.len() > capacity {
                warn!(
                    community = %key,
                    pending = community.entries.len(),
                    capacity,
                    "Dropping pending jokes beyond capacity"
                );
                community.entries.truncate(capacity);
            }
            communities.insert(key, Arc::new(Mutex::new(community)));
        }
        info!(communities = communities.len(), "Community registry initialized");
        Self {
            communities: RwLock::new(communities),
            symbols,
            store: None,
            save_lock: Mutex::new(()),
        }
    }

    /// Maximum pending jokes per community: one per symbol.
    pub fn capacity(&self) -> usize {
        self.symbols.len()
    }

    pub fn symbols(&self) -> &SymbolPool {
        &self.symbols
    }

    pub fn get(&self, community_id: &str) -> Option<Community> {
        let slot = self.slot(community_id)?;
        let community = slot.lock().unwrap_or_else(PoisonError::into_inner);
        Some(community.clone())
    }

    /// Creates the community with no pending jokes, or moves its polls to a
    /// new channel. Always succeeds.
    pub fn set_destination(&self, community_id: &str, destination: ChannelId) {
        if let Some(slot) = self.slot(community_id) {
            let mut community = slot.lock().unwrap_or_else(PoisonError::into_inner);
            community.destination = Some(destination);
        } else {
            let mut map = self.communities.write().unwrap_or_else(PoisonError::into_inner);
            // Another caller may have created it between the read and the write lock.
            let slot = map
                .entry(community_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(Community::new(community_id, None))));
            let mut community = slot.lock().unwrap_or_else(PoisonError::into_inner);
            community.destination = Some(destination);
        }
        debug!(community = %community_id, "Poll destination set");
        self.persist();
    }

    /// Appends a joke and returns its zero-based position in the pending list.
    pub fn record_entry(&self, community_id: &str, entry: Entry) -> Result<usize, SubmissionError> {
        let slot = self
            .slot(community_id)
            .ok_or_else(|| SubmissionError::NoDestinationConfigured(community_id.to_string()))?;
        let index = {
            let mut community = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if community.destination.is_none() {
                return Err(SubmissionError::NoDestinationConfigured(community_id.to_string()));
            }
            if community.entries.len() >= self.capacity() {
                return Err(SubmissionError::CapacityExceeded {
                    community: community_id.to_string(),
                    capacity: self.capacity(),
                });
            }
            community.entries.push(entry);
            community.entries.len() - 1
        };
        self.persist();
        Ok(index)
    }

    /// Takes every pending joke, leaving the community with none. Unknown
    /// communities drain to an empty list.
    pub fn drain_entries(&self, community_id: &str) -> Vec<Entry> {
        let Some(slot) = self.slot(community_id) else {
            return Vec::new();
        };
        let drained = {
            let mut community = slot.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut community.entries)
        };
        if !drained.is_empty() {
            self.persist();
        }
        drained
    }

    /// Known community ids, sorted.
    pub fn community_ids(&self) -> Vec<CommunityId> {
        let map = self.communities.read().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<CommunityId> = map.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Consistent per-community copy of everything, keyed in id order.
    pub fn snapshot(&self) -> BTreeMap<CommunityId, Community> {
        let slots: Vec<(CommunityId, Arc<Mutex<Community>>)> = {
            let map = self.communities.read().unwrap_or_else(PoisonError::into_inner);
            map.iter().map(|(k, v)| (k.clone(), Arc::clone(v))).collect()
        };
        slots
            .into_iter()
            .map(|(id, slot)| {
                let community = slot.lock().unwrap_or_else(PoisonError::into_inner).clone();
                (id, community)
            })
            .collect()
    }

    fn slot(&self, community_id: &str) -> Option<Arc<Mutex<Community>>> {
        let map = self.communities.read().unwrap_or_else(PoisonError::into_inner);
        map.get(community_id).map(Arc::clone)
    }

    fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };
        let _guard = self.save_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let snapshot = self.snapshot();
        if let Err(e) = store.save_all(&snapshot) {
            warn!(error = %e, "Failed to persist communities; in-memory state stays authoritative");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(size: usize) -> SymbolPool {
        SymbolPool::new((0..size).map(|n| format!("s{n}"))).unwrap()
    }

    fn joke(n: usize) -> Entry {
        Entry::new(format!("u{n}"), format!("user{n}"), format!("joke {n}"))
    }

    #[derive(Default)]
    struct CountingStore {
        saves: AtomicUsize,
        last: Mutex<BTreeMap<CommunityId, Community>>,
        fail: bool,
    }

    impl Persistence for CountingStore {
        fn load_all(&self) -> Result<HashMap<CommunityId, Community>, PersistenceError> {
            let mut seeded = HashMap::new();
            let mut community = Community::new("g1", Some("c1".to_string()));
            community.entries = (0..5).map(joke).collect();
            seeded.insert("g1".to_string(), community);
            Ok(seeded)
        }

        fn save_all(&self, communities: &BTreeMap<CommunityId, Community>) -> Result<(), PersistenceError> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(PersistenceError::Format("disk full".to_string()));
            }
            *self.last.lock().unwrap() = communities.clone();
            Ok(())
        }
    }

    #[test]
    fn test_get_unknown_community_is_none() {
        let registry = CommunityRegistry::new(SymbolPool::default());
        assert!(registry.get("nope").is_none());
    }

    #[test]
    fn test_record_before_destination_fails() {
        let registry = CommunityRegistry::new(SymbolPool::default());
        let err = registry.record_entry("g1", joke(1)).unwrap_err();
        assert_eq!(err, SubmissionError::NoDestinationConfigured("g1".to_string()));
        assert!(registry.get("g1").is_none());
    }

    #[test]
    fn test_set_destination_creates_then_updates() {
        let registry = CommunityRegistry::new(SymbolPool::default());
        registry.set_destination("g1", "c1".to_string());
        registry.record_entry("g1", joke(1)).unwrap();

        registry.set_destination("g1", "c2".to_string());
        let community = registry.get("g1").unwrap();
        assert_eq!(community.destination.as_deref(), Some("c2"));
        assert_eq!(community.entries.len(), 1);
    }

    #[test]
    fn test_capacity_exceeded_leaves_entries_unchanged() {
        let registry = CommunityRegistry::new(pool(3));
        registry.set_destination("g1", "c1".to_string());
        for n in 0..3 {
            assert_eq!(registry.record_entry("g1", joke(n)).unwrap(), n);
        }

        let err = registry.record_entry("g1", joke(99)).unwrap_err();
        assert_eq!(
            err,
            SubmissionError::CapacityExceeded { community: "g1".to_string(), capacity: 3 }
        );
        let entries = registry.get("g1").unwrap().entries;
        assert_eq!(entries, (0..3).map(joke).collect::<Vec<_>>());
    }

    #[test]
    fn test_drain_returns_snapshot_and_clears() {
        let registry = CommunityRegistry::new(SymbolPool::default());
        registry.set_destination("g1", "c1".to_string());
        registry.record_entry("g1", joke(1)).unwrap();
        registry.record_entry("g1", joke(2)).unwrap();

        let drained = registry.drain_entries("g1");
        assert_eq!(drained, vec![joke(1), joke(2)]);
        assert!(registry.get("g1").unwrap().entries.is_empty());
        assert!(registry.drain_entries("g1").is_empty());
        assert!(registry.drain_entries("unknown").is_empty());
    }

    #[test]
    fn test_concurrent_submissions_racing_a_drain_are_not_lost() {
        let registry = Arc::new(CommunityRegistry::new(pool(1000)));
        registry.set_destination("g1", "c1".to_string());

        let submitters: Vec<_> = (0..8)
            .map(|t| {
                let registry = Arc::clone(&registry);
                std::thread::spawn(move || {
                    for n in 0..50 {
                        registry.record_entry("g1", joke(t * 1000 + n)).unwrap();
                    }
                })
            })
            .collect();
        let drainer = {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let mut drained = Vec::new();
                for _ in 0..20 {
                    drained.extend(registry.drain_entries("g1"));
                    std::thread::yield_now();
                }
                drained
            })
        };

        for s in submitters {
            s.join().unwrap();
        }
        let mut all = drainer.join().unwrap();
        all.extend(registry.drain_entries("g1"));

        assert_eq!(all.len(), 400);
        let mut texts: Vec<String> = all.into_iter().map(|e| e.text).collect();
        texts.sort();
        texts.dedup();
        assert_eq!(texts.len(), 400);
    }

    #[test]
    fn test_load_truncates_and_persists_mutations() {
        let store = Arc::new(CountingStore::default());
        let registry = CommunityRegistry::load(pool(3), store.clone()).unwrap();
        assert_eq!(registry.get("g1").unwrap().entries.len(), 3);

        registry.set_destination("g2", "c9".to_string());
        registry.drain_entries("g1");
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);

        let last = store.last.lock().unwrap();
        assert!(last["g1"].entries.is_empty());
        assert_eq!(last["g2"].destination.as_deref(), Some("c9"));
    }

    #[test]
    fn test_persistence_failure_is_not_fatal() {
        let store = Arc::new(CountingStore { fail: true, ..Default::default() });
        let registry = CommunityRegistry::load(SymbolPool::default(), store.clone()).unwrap();
        registry.set_destination("g1", "c2".to_string());
        assert_eq!(registry.record_entry("g1", joke(42)).unwrap(), 5);
        assert_eq!(registry.get("g1").unwrap().destination.as_deref(), Some("c2"));
        assert_eq!(store.saves.load(Ordering::SeqCst), 2);
    }
}
