//! RawTable: chained hash table over pooled bucket and entry buffers.
//!
//! The engine is comparer-agnostic: lookups take a precomputed hash and an
//! equality closure, so the same code serves native keys and alternate key
//! representations. Each entry caches its hash; growth and resizes never
//! call back into the comparer.
//!
//! Layout
//! - `buckets[b]` holds the 1-based index of the first entry in chain `b`
//!   (0 = empty chain). `b = hash & (capacity - 1)`.
//! - `entries[..used]` have been handed out at least once. An occupied
//!   entry links to the next entry of its chain (1-based, 0 = end). A
//!   removed entry joins the free list, which is threaded through `Free`
//!   entries (1-based, 0 = end) and reused before `used` advances.
//! - Iteration walks `entries[..used]` in slot order, which is insertion
//!   order for tables that never had a removal.
//!
//! Invariants
//! - `capacity()` is 0 or a power of two in `MIN_BUFFER_LENGTH..=MAX_BUFFER_LENGTH`.
//! - `len() + free_len == used <= capacity()`.
//! - Free entries are never reachable from a bucket chain.
//! - Every successful mutating call bumps the version exactly once.

use crate::buffer::{Buffer, PoolElement};
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, Stamp};
use crate::pool::{size_class_length, BufferPool, PoolOptions};
use log::debug;
use std::sync::Arc;

enum Slot<K, V> {
    /// Never used, or cleared.
    Vacant,
    Free {
        next: u32,
    },
    Occupied {
        hash: u64,
        next: u32,
        key: K,
        value: V,
    },
}

/// One table slot. Opaque; public only so entry pools can be named.
pub struct Entry<K, V> {
    slot: Slot<K, V>,
}

impl<K, V> Default for Entry<K, V> {
    fn default() -> Self {
        Entry { slot: Slot::Vacant }
    }
}

impl<K, V> PoolElement for Entry<K, V> {}

impl<K, V> Entry<K, V> {
    #[inline]
    fn occupied(&self) -> Option<(&K, &V)> {
        match &self.slot {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            _ => None,
        }
    }

    #[inline]
    fn occupied_mut(&mut self) -> Option<(&K, &mut V)> {
        match &mut self.slot {
            Slot::Occupied { key, value, .. } => Some((key, value)),
            _ => None,
        }
    }
}

/// The two pools a table rents from.
pub struct TablePools<K, V> {
    pub buckets: Arc<BufferPool<u32>>,
    pub entries: Arc<BufferPool<Entry<K, V>>>,
}

impl<K: Send + 'static, V: Send + 'static> TablePools<K, V> {
    /// The process-wide pools for this key/value combination.
    pub fn shared() -> Self {
        Self {
            buckets: BufferPool::shared(),
            entries: BufferPool::shared(),
        }
    }
}

impl<K, V> TablePools<K, V> {
    /// Fresh private pools, both configured with `options`.
    pub fn with_options(options: PoolOptions) -> Self {
        Self {
            buckets: Arc::new(BufferPool::with_options(options.clone())),
            entries: Arc::new(BufferPool::with_options(options)),
        }
    }
}

impl<K, V> Clone for TablePools<K, V> {
    fn clone(&self) -> Self {
        Self {
            buckets: Arc::clone(&self.buckets),
            entries: Arc::clone(&self.entries),
        }
    }
}

/// How an insert treats an existing key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum InsertMode {
    /// Fail with `DuplicateKey`.
    AddOrFail,
    /// Replace the stored value in place.
    AddOrOverwrite,
    /// Leave the table alone and report it.
    TryAdd,
}

pub(crate) enum Placed<V> {
    Added,
    Replaced(V),
    Rejected,
}

pub(crate) struct RawTable<K, V> {
    buckets: Buffer<u32>,
    entries: Buffer<Entry<K, V>>,
    pools: TablePools<K, V>,
    used: usize,
    free_head: u32,
    free_len: usize,
    life: Lifecycle,
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn new(pools: TablePools<K, V>) -> Self {
        Self {
            buckets: Buffer::empty(),
            entries: Buffer::empty(),
            pools,
            used: 0,
            free_head: 0,
            free_len: 0,
            life: Lifecycle::new(),
        }
    }

    pub(crate) fn with_capacity(capacity: usize, pools: TablePools<K, V>) -> Result<Self> {
        let mut table = Self::new(pools);
        if capacity > 0 {
            table.resize(size_class_length(capacity)?)?;
        }
        Ok(table)
    }

    #[inline]
    pub(crate) fn check(&self) -> Result<()> {
        self.life.check()
    }

    pub(crate) fn stamp(&self) -> Result<Stamp> {
        self.life.stamp()
    }

    pub(crate) fn version(&self) -> u64 {
        self.life.version()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.life.is_disposed()
    }

    /// Record a mutating call that may not have changed anything.
    pub(crate) fn touch(&mut self) {
        self.life.bump();
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.used - self.free_len
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn pools(&self) -> &TablePools<K, V> {
        &self.pools
    }

    #[inline]
    fn bucket_of(&self, hash: u64) -> usize {
        (hash as usize) & (self.buckets.len() - 1)
    }

    /// Slot index of the occupied entry with this hash that satisfies `eq`.
    pub(crate) fn find(&self, hash: u64, mut eq: impl FnMut(&K) -> bool) -> Option<usize> {
        if self.buckets.is_empty() {
            return None;
        }
        let mut link = self.buckets[self.bucket_of(hash)];
        while link != 0 {
            let idx = (link - 1) as usize;
            match &self.entries[idx].slot {
                Slot::Occupied {
                    hash: h, next, key, ..
                } => {
                    if *h == hash && eq(key) {
                        return Some(idx);
                    }
                    link = *next;
                }
                _ => {
                    debug_assert!(false, "chain reached a non-occupied slot");
                    return None;
                }
            }
        }
        None
    }

    #[inline]
    pub(crate) fn get(&self, idx: usize) -> Option<(&K, &V)> {
        self.entries[..self.used].get(idx)?.occupied()
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, idx: usize) -> Option<(&K, &mut V)> {
        self.entries[..self.used].get_mut(idx)?.occupied_mut()
    }

    /// First occupied slot at or after `from`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<usize> {
        (from..self.used).find(|&i| matches!(self.entries[i].slot, Slot::Occupied { .. }))
    }

    /// Complete an insert whose lookup already ran. `found` is the result
    /// of `find` for the same hash; `key` is only called when adding.
    pub(crate) fn place(
        &mut self,
        found: Option<usize>,
        hash: u64,
        key: impl FnOnce() -> K,
        value: V,
        mode: InsertMode,
    ) -> Result<Placed<V>> {
        match (found, mode) {
            (Some(_), InsertMode::AddOrFail) => Err(Error::DuplicateKey),
            (Some(_), InsertMode::TryAdd) => Ok(Placed::Rejected),
            (Some(idx), InsertMode::AddOrOverwrite) => {
                let Some((_, slot)) = self.get_mut(idx) else {
                    return Err(Error::KeyNotFound);
                };
                let old = core::mem::replace(slot, value);
                self.life.bump();
                Ok(Placed::Replaced(old))
            }
            (None, _) => {
                self.insert_new(hash, key(), value)?;
                Ok(Placed::Added)
            }
        }
    }

    /// Insert an entry whose key is known to be absent.
    pub(crate) fn insert_new(&mut self, hash: u64, key: K, value: V) -> Result<usize> {
        let idx = if self.free_head != 0 {
            let idx = (self.free_head - 1) as usize;
            self.free_head = match self.entries[idx].slot {
                Slot::Free { next } => next,
                _ => 0,
            };
            self.free_len -= 1;
            idx
        } else {
            if self.used == self.capacity() {
                self.grow()?;
            }
            self.used += 1;
            self.used - 1
        };
        let b = self.bucket_of(hash);
        self.entries[idx].slot = Slot::Occupied {
            hash,
            next: self.buckets[b],
            key,
            value,
        };
        self.buckets[b] = idx as u32 + 1;
        self.life.bump();
        Ok(idx)
    }

    /// Unlink and return the entry with this hash that satisfies `eq`.
    pub(crate) fn remove(&mut self, hash: u64, mut eq: impl FnMut(&K) -> bool) -> Option<(K, V)> {
        self.unlink(hash, |_, key| eq(key))
    }

    /// Unlink and return the entry in slot `idx`.
    pub(crate) fn remove_at(&mut self, idx: usize) -> Option<(K, V)> {
        let hash = match self.entries[..self.used].get(idx)?.slot {
            Slot::Occupied { hash, .. } => hash,
            _ => return None,
        };
        let target = idx as u32 + 1;
        self.unlink(hash, |link, _| link == target)
    }

    fn unlink(&mut self, hash: u64, mut hit: impl FnMut(u32, &K) -> bool) -> Option<(K, V)> {
        if self.buckets.is_empty() {
            return None;
        }
        let b = self.bucket_of(hash);
        let mut prev = 0u32;
        let mut link = self.buckets[b];
        while link != 0 {
            let idx = (link - 1) as usize;
            let (found, next) = match &self.entries[idx].slot {
                Slot::Occupied {
                    hash: h, next, key, ..
                } => (*h == hash && hit(link, key), *next),
                _ => return None,
            };
            if found {
                if prev == 0 {
                    self.buckets[b] = next;
                } else if let Slot::Occupied { next: p, .. } =
                    &mut self.entries[(prev - 1) as usize].slot
                {
                    *p = next;
                }
                let old = core::mem::replace(
                    &mut self.entries[idx].slot,
                    Slot::Free {
                        next: self.free_head,
                    },
                );
                self.free_head = link;
                self.free_len += 1;
                self.life.bump();
                return match old {
                    Slot::Occupied { key, value, .. } => Some((key, value)),
                    _ => None,
                };
            }
            prev = link;
            link = next;
        }
        None
    }

    /// Remove every entry for which `keep` returns false. Bumps the version
    /// even when nothing is removed.
    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&K, &mut V) -> bool) {
        let mut from = 0;
        while let Some(idx) = self.next_occupied(from) {
            let discard = match self.get_mut(idx) {
                Some((k, v)) => !keep(k, v),
                None => false,
            };
            if discard {
                self.remove_at(idx);
            }
            from = idx + 1;
        }
        self.life.bump();
    }

    /// Drop every entry; capacity is kept.
    pub(crate) fn clear(&mut self) {
        if self.used > 0 {
            self.buckets.fill(0);
            for e in &mut self.entries[..self.used] {
                e.slot = Slot::Vacant;
            }
            self.used = 0;
            self.free_head = 0;
            self.free_len = 0;
        }
        self.life.bump();
    }

    fn grow(&mut self) -> Result<()> {
        let doubled = match self.capacity() {
            0 => size_class_length(1)?,
            c => size_class_length(c * 2)?,
        };
        self.resize(doubled)
    }

    /// Grow (never shrink) so at least `capacity` entries fit. Bumps the
    /// version whether or not the buffers change.
    pub(crate) fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        if capacity > self.capacity() {
            let target = size_class_length(capacity.max(self.len()))?;
            self.resize(target)?;
        }
        self.life.bump();
        Ok(self.capacity())
    }

    /// Shrink to the smallest size class holding `capacity` entries. The
    /// floor is the smallest class, so an emptied table keeps 16 slots.
    pub(crate) fn trim_excess_to(&mut self, capacity: usize) -> Result<()> {
        if capacity < self.len() {
            return Err(Error::InvalidArgument(
                "capacity is less than the number of entries",
            ));
        }
        let target = size_class_length(capacity.max(1))?;
        if target < self.capacity() {
            self.resize(target)?;
        }
        self.life.bump();
        Ok(())
    }

    /// Move every occupied entry, in slot order, into freshly rented
    /// buffers of `capacity` slots, then return the old buffers. The free
    /// list is gone afterwards.
    fn resize(&mut self, capacity: usize) -> Result<()> {
        debug_assert!(capacity.is_power_of_two() && capacity >= self.len());
        let mut buckets = self.pools.buckets.rent(capacity)?;
        let mut entries = match self.pools.entries.rent(capacity) {
            Ok(e) => e,
            Err(err) => {
                give_back(&self.pools.buckets, buckets);
                return Err(err);
            }
        };
        buckets.fill(0);
        let mask = capacity - 1;
        let mut count = 0usize;
        for e in &mut self.entries[..self.used] {
            if let Slot::Occupied {
                hash, key, value, ..
            } = core::mem::replace(&mut e.slot, Slot::Vacant)
            {
                let b = (hash as usize) & mask;
                entries[count].slot = Slot::Occupied {
                    hash,
                    next: buckets[b],
                    key,
                    value,
                };
                buckets[b] = count as u32 + 1;
                count += 1;
            }
        }
        debug!(
            "table resize: {} -> {} slots ({} entries)",
            self.capacity(),
            capacity,
            count
        );
        let old_buckets = core::mem::replace(&mut self.buckets, buckets);
        let old_entries = core::mem::replace(&mut self.entries, entries);
        self.used = count;
        self.free_head = 0;
        self.free_len = 0;
        give_back(&self.pools.buckets, old_buckets);
        give_back(&self.pools.entries, old_entries);
        Ok(())
    }

    fn release_storage(&mut self) {
        for e in &mut self.entries[..self.used] {
            e.slot = Slot::Vacant;
        }
        let buckets = core::mem::take(&mut self.buckets);
        let entries = core::mem::take(&mut self.entries);
        self.used = 0;
        self.free_head = 0;
        self.free_len = 0;
        give_back(&self.pools.buckets, buckets);
        give_back(&self.pools.entries, entries);
    }

    /// Return all buffers and enter the terminal state. Idempotent.
    pub(crate) fn dispose(&mut self) {
        if self.life.is_disposed() {
            return;
        }
        self.release_storage();
        self.life.dispose();
    }

    pub(crate) fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.entries[..self.used].iter(),
            remaining: self.len(),
        }
    }

    pub(crate) fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let remaining = self.len();
        IterMut {
            it: self.entries[..self.used].iter_mut(),
            remaining,
        }
    }

    #[cfg(test)]
    pub(crate) fn free_len(&self) -> usize {
        self.free_len
    }
}

impl<K, V> Drop for RawTable<K, V> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Iterator over occupied entries in slot order.
pub struct Iter<'a, K, V> {
    it: core::slice::Iter<'a, Entry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.it.by_ref().find_map(Entry::occupied)?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K, V> Clone for Iter<'_, K, V> {
    fn clone(&self) -> Self {
        Iter {
            it: self.it.clone(),
            remaining: self.remaining,
        }
    }
}

/// Iterator over occupied entries with mutable values.
pub struct IterMut<'a, K, V> {
    it: core::slice::IterMut<'a, Entry<K, V>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.it.by_ref().find_map(Entry::occupied_mut)?;
        self.remaining -= 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for IterMut<'_, K, V> {}

/// Return a buffer the table no longer owns. A disposed pool cannot take
/// it back; the buffer is then simply freed.
fn give_back<T: PoolElement>(pool: &BufferPool<T>, buffer: Buffer<T>) {
    if let Err(err) = pool.return_buffer(buffer) {
        debug!("buffer not returned to pool: {}", err);
    }
}
