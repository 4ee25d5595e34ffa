use crate::domain_port::*;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Expired entries are swept once per this many writes.
const SWEEP_EVERY: u64 = 256;

enum Slot {
    Value(String),
    Set(HashSet<String>),
}

struct StoredEntry {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| now < at)
    }
}

/// `RevocationStore` over a sharded map. Each operation holds the shard lock
/// of its key for its whole duration, which gives the same per-key atomicity
/// as a single Redis command. Expired entries are dropped when read and by a
/// sweep that runs every few hundred writes, so memory stays bounded by the
/// live set. Single process only: use the Redis store when running more than
/// one instance.
///
/// Time comes from `tokio::time`, so tests can move the clock.
pub struct MemoryRevocationStore {
    entries: DashMap<String, StoredEntry>,
    writes: AtomicU64,
    available: AtomicBool,
}

impl Default for MemoryRevocationStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRevocationStore {
    pub fn new() -> Self {
        MemoryRevocationStore {
            entries: DashMap::new(),
            writes: AtomicU64::new(0),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate an outage: while unavailable every call fails.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unavailable("memory store switched off".to_string()))
        }
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::Corrupt {
            key: key.to_string(),
            detail: "operation against a key holding the wrong kind of value".to_string(),
        }
    }

    fn sweep_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.is_live(now));
    }

    /// Counts a write; every `SWEEP_EVERY`th one sweeps the map.
    fn note_write(&self) {
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_EVERY == 0 {
            self.sweep_expired();
        }
    }

    #[cfg(test)]
    fn entry_count(&self) -> usize {
        self.entries.len()
    }

    fn deadline(ttl_secs: u64) -> Option<Instant> {
        Some(Instant::now() + Duration::from_secs(ttl_secs))
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn set_with_ttl(&self, key: &str, value: &str, ttl_secs: u64) -> Result<(), StoreError> {
        self.ensure_available()?;
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                slot: Slot::Value(value.to_string()),
                expires_at: Self::deadline(ttl_secs),
            },
        );
        self.note_write();
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let found = match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.slot {
                Slot::Value(value) => Some(value.clone()),
                Slot::Set(_) => return Err(Self::wrong_type(key)),
            },
            Some(_) => None,
            None => return Ok(None),
        };
        if found.is_none() {
            self.entries.remove_if(key, |_, entry| !entry.is_live(now));
        }
        Ok(found)
    }

    async fn atomic_delete(&self, key: &str) -> Result<bool, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        Ok(self
            .entries
            .remove(key)
            .is_some_and(|(_, entry)| entry.is_live(now)))
    }

    async fn take(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        match self.entries.remove(key) {
            Some((_, entry)) if entry.is_live(now) => match entry.slot {
                Slot::Value(value) => Ok(Some(value)),
                Slot::Set(_) => Err(Self::wrong_type(key)),
            },
            _ => Ok(None),
        }
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let fresh = || StoredEntry {
            slot: Slot::Set(HashSet::from([member.to_string()])),
            expires_at: None,
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_live(now) {
                    occupied.insert(fresh());
                    return Ok(());
                }
                match &mut occupied.get_mut().slot {
                    Slot::Set(members) => {
                        members.insert(member.to_string());
                    }
                    Slot::Value(_) => return Err(Self::wrong_type(key)),
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(fresh());
            }
        }
        Ok(())
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        self.ensure_available()?;
        if let Some(mut entry) = self.entries.get_mut(key) {
            match &mut entry.slot {
                Slot::Set(members) => {
                    members.remove(member);
                }
                Slot::Value(_) => return Err(Self::wrong_type(key)),
            }
        }
        // empty sets vanish, as in Redis
        self.entries
            .remove_if(key, |_, entry| matches!(&entry.slot, Slot::Set(m) if m.is_empty()));
        Ok(())
    }

    async fn members_of(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        match self.entries.get(key) {
            Some(entry) if entry.is_live(now) => match &entry.slot {
                Slot::Set(members) => Ok(members.iter().cloned().collect()),
                Slot::Value(_) => Err(Self::wrong_type(key)),
            },
            _ => Ok(Vec::new()),
        }
    }

    async fn increment_with_ttl_on_first(
        &self,
        key: &str,
        ttl_secs: u64,
    ) -> Result<u64, StoreError> {
        self.ensure_available()?;
        let now = Instant::now();
        let first = || StoredEntry {
            slot: Slot::Value("1".to_string()),
            expires_at: Self::deadline(ttl_secs),
        };
        match self.entries.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if !occupied.get().is_live(now) {
                    occupied.insert(first());
                    return Ok(1);
                }
                match &mut occupied.get_mut().slot {
                    Slot::Value(value) => {
                        let count = value.parse::<u64>().map_err(|e| StoreError::Corrupt {
                            key: key.to_string(),
                            detail: e.to_string(),
                        })? + 1;
                        *value = count.to_string();
                        Ok(count)
                    }
                    Slot::Set(_) => Err(Self::wrong_type(key)),
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(first());
                self.note_write();
                Ok(1)
            }
        }
    }
}
