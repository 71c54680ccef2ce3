//! PooledHashMap: the map flavor of the pooled hash table.
//!
//! Keys are hashed and compared through a `KeyComparer`; the default one
//! uses `Hash + Eq`. Storage is rented from a `TablePools` pair (the shared
//! pools unless given explicitly) and handed back on resize, `dispose` and
//! drop. Every operation returns `Result` and fails with `Disposed` once the
//! map has been disposed, before looking at its arguments.

use crate::alternate::AlternateLookup;
use crate::comparer::{AlternateComparer, DefaultComparer, DynComparer, KeyComparer};
use crate::cursor::{Cursor, VersionedSource};
use crate::error::{Error, Result};
use crate::lifecycle::Stamp;
use crate::raw_table::{InsertMode, Placed, RawTable, TablePools};
use core::fmt;
use core::hash::Hash;

pub use crate::raw_table::{Iter, IterMut};

pub struct PooledHashMap<K, V, C = DefaultComparer> {
    table: RawTable<K, V>,
    comparer: C,
}

impl<K, V> PooledHashMap<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    pub fn new() -> Self {
        Self::with_comparer(DefaultComparer::default())
    }

    /// Map with room for `capacity` entries (rounded up to a size class).
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_comparer(capacity, DefaultComparer::default())
    }
}

impl<K, V> Default for PooledHashMap<K, V>
where
    K: Hash + Eq + Send + 'static,
    V: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, C> PooledHashMap<K, V, C>
where
    K: Send + 'static,
    V: Send + 'static,
    C: KeyComparer<K>,
{
    pub fn with_comparer(comparer: C) -> Self {
        Self {
            table: RawTable::new(TablePools::shared()),
            comparer,
        }
    }

    pub fn with_capacity_and_comparer(capacity: usize, comparer: C) -> Result<Self> {
        Self::with_capacity_in(capacity, comparer, TablePools::shared())
    }
}

impl<K, V, C> PooledHashMap<K, V, C>
where
    C: KeyComparer<K>,
{
    /// Map renting from `pools` instead of the shared pools.
    pub fn with_capacity_in(capacity: usize, comparer: C, pools: TablePools<K, V>) -> Result<Self> {
        Ok(Self {
            table: RawTable::with_capacity(capacity, pools)?,
            comparer,
        })
    }

    #[inline]
    fn find(&self, key: &K) -> Option<usize> {
        let hash = self.comparer.hash(key);
        self.table.find(hash, |k| self.comparer.equals(k, key))
    }

    fn place(&mut self, key: K, value: V, mode: InsertMode) -> Result<Placed<V>> {
        self.table.check()?;
        let hash = self.comparer.hash(&key);
        let found = self.table.find(hash, |k| self.comparer.equals(k, &key));
        self.table.place(found, hash, || key, value, mode)
    }

    pub fn len(&self) -> Result<usize> {
        self.table.check()?;
        Ok(self.table.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Number of entries the current buffers hold; 0 or a power of two.
    pub fn capacity(&self) -> Result<usize> {
        self.table.check()?;
        Ok(self.table.capacity())
    }

    /// Generation counter; changes on every mutating call.
    pub fn version(&self) -> Result<u64> {
        self.table.check()?;
        Ok(self.table.version())
    }

    pub fn comparer(&self) -> Result<&C> {
        self.table.check()?;
        Ok(&self.comparer)
    }

    /// Pools the map rents from.
    pub fn pools(&self) -> Result<&TablePools<K, V>> {
        self.table.check()?;
        Ok(self.table.pools())
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        self.table.check()?;
        Ok(self.find(key).is_some())
    }

    pub fn contains_value(&self, value: &V) -> Result<bool>
    where
        V: PartialEq,
    {
        self.table.check()?;
        Ok(self.table.iter().any(|(_, v)| v == value))
    }

    pub fn get(&self, key: &K) -> Result<Option<&V>> {
        Ok(self.get_key_value(key)?.map(|(_, v)| v))
    }

    pub fn get_key_value(&self, key: &K) -> Result<Option<(&K, &V)>> {
        self.table.check()?;
        Ok(self.find(key).and_then(|idx| self.table.get(idx)))
    }

    pub fn get_mut(&mut self, key: &K) -> Result<Option<&mut V>> {
        self.table.check()?;
        Ok(match self.find(key) {
            Some(idx) => self.table.get_mut(idx).map(|(_, v)| v),
            None => None,
        })
    }

    /// Value for a key that must be present; `KeyNotFound` otherwise.
    pub fn index(&self, key: &K) -> Result<&V> {
        self.get(key)?.ok_or(Error::KeyNotFound)
    }

    /// Add a new entry; `DuplicateKey` if the key is already present.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        self.place(key, value, InsertMode::AddOrFail).map(|_| ())
    }

    /// Add a new entry unless the key is present. Returns whether it was added.
    pub fn try_insert(&mut self, key: K, value: V) -> Result<bool> {
        Ok(matches!(
            self.place(key, value, InsertMode::TryAdd)?,
            Placed::Added
        ))
    }

    /// Add or overwrite. Returns the previous value, if any. Overwriting
    /// counts as a mutation even when the value is unchanged.
    pub fn set(&mut self, key: K, value: V) -> Result<Option<V>> {
        Ok(match self.place(key, value, InsertMode::AddOrOverwrite)? {
            Placed::Replaced(old) => Some(old),
            Placed::Added | Placed::Rejected => None,
        })
    }

    /// `set` for every pair, in order.
    pub fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, pairs: I) -> Result<()> {
        self.table.check()?;
        for (k, v) in pairs {
            self.set(k, v)?;
        }
        Ok(())
    }

    pub fn remove(&mut self, key: &K) -> Result<bool> {
        Ok(self.remove_entry(key)?.is_some())
    }

    pub fn remove_entry(&mut self, key: &K) -> Result<Option<(K, V)>> {
        self.table.check()?;
        let hash = self.comparer.hash(key);
        let comparer = &self.comparer;
        Ok(self.table.remove(hash, |k| comparer.equals(k, key)))
    }

    /// Keep only the entries for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&K, &mut V) -> bool) -> Result<()> {
        self.table.check()?;
        self.table.retain(keep);
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.table.check()?;
        self.table.clear();
        Ok(())
    }

    /// Grow so at least `capacity` entries fit; returns the new capacity.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.table.check()?;
        self.table.ensure_capacity(capacity)
    }

    /// Shrink to the smallest size class holding the current entries.
    pub fn trim_excess(&mut self) -> Result<()> {
        self.table.check()?;
        self.table.trim_excess_to(self.table.len())
    }

    pub fn trim_excess_to(&mut self, capacity: usize) -> Result<()> {
        self.table.check()?;
        self.table.trim_excess_to(capacity)
    }

    pub fn iter(&self) -> Result<Iter<'_, K, V>> {
        self.table.check()?;
        Ok(self.table.iter())
    }

    pub fn iter_mut(&mut self) -> Result<IterMut<'_, K, V>> {
        self.table.check()?;
        Ok(self.table.iter_mut())
    }

    pub fn keys(&self) -> Result<Keys<'_, K, V>> {
        Ok(Keys { it: self.iter()? })
    }

    pub fn values(&self) -> Result<Values<'_, K, V>> {
        Ok(Values { it: self.iter()? })
    }

    pub fn values_mut(&mut self) -> Result<ValuesMut<'_, K, V>> {
        Ok(ValuesMut {
            it: self.iter_mut()?,
        })
    }

    /// A detached cursor positioned before the first entry.
    pub fn cursor(&self) -> Result<Cursor> {
        Ok(Cursor::new(self.table.stamp()?))
    }

    /// View that reads and writes this map through alternate keys of type `A`.
    pub fn alternate_lookup<A>(&mut self) -> Result<AlternateLookup<'_, K, V, A>>
    where
        A: ?Sized,
        C: AlternateComparer<A, K>,
    {
        self.table.check()?;
        Ok(AlternateLookup::new(&mut self.table, &self.comparer))
    }

    /// Return every buffer to its pool. Later calls fail with `Disposed`;
    /// disposing again does nothing.
    pub fn dispose(&mut self) {
        self.table.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.table.is_disposed()
    }
}

impl<K: 'static, V> PooledHashMap<K, V, DynComparer<K>> {
    /// Alternate view resolved at run time; `UnsupportedAlternate` if the
    /// comparer has nothing registered for `A`.
    pub fn try_alternate_lookup<A>(&mut self) -> Result<AlternateLookup<'_, K, V, A>>
    where
        A: ?Sized + 'static,
    {
        self.table.check()?;
        let comparer = self.comparer.alternate::<A>()?;
        Ok(AlternateLookup::new(&mut self.table, comparer))
    }
}

impl<K, V, C> VersionedSource for PooledHashMap<K, V, C> {
    type Item<'a> = (&'a K, &'a V) where Self: 'a;

    fn stamp(&self) -> Result<Stamp> {
        self.table.stamp()
    }

    fn seek(&self, from: usize) -> Option<usize> {
        self.table.next_occupied(from)
    }

    fn item(&self, position: usize) -> Option<(&K, &V)> {
        self.table.get(position)
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for PooledHashMap<K, V, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_disposed() {
            return f.write_str("PooledHashMap(disposed)");
        }
        f.debug_map().entries(self.table.iter()).finish()
    }
}

pub struct Keys<'a, K, V> {
    it: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.it.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct Values<'a, K, V> {
    it: Iter<'a, K, V>,
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.it.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

pub struct ValuesMut<'a, K, V> {
    it: IterMut<'a, K, V>,
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;
    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.it.next().map(|(_, v)| v)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}
