//! PooledHashSet: the set flavor of the pooled hash table (value payload `()`).

use crate::alternate::AlternateLookup;
use crate::comparer::{AlternateComparer, DefaultComparer, DynComparer, KeyComparer};
use crate::cursor::{Cursor, VersionedSource};
use crate::error::Result;
use crate::lifecycle::Stamp;
use crate::raw_table::{self, InsertMode, Placed, RawTable, TablePools};
use core::fmt;
use core::hash::Hash;

pub struct PooledHashSet<K, C = DefaultComparer> {
    table: RawTable<K, ()>,
    comparer: C,
}

impl<K> PooledHashSet<K>
where
    K: Hash + Eq + Send + 'static,
{
    pub fn new() -> Self {
        Self::with_comparer(DefaultComparer::default())
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_and_comparer(capacity, DefaultComparer::default())
    }
}

impl<K> Default for PooledHashSet<K>
where
    K: Hash + Eq + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, C> PooledHashSet<K, C>
where
    K: Send + 'static,
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

impl<K, C> PooledHashSet<K, C>
where
    C: KeyComparer<K>,
{
    pub fn with_capacity_in(
        capacity: usize,
        comparer: C,
        pools: TablePools<K, ()>,
    ) -> Result<Self> {
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

    fn add(&mut self, key: K) -> Result<bool> {
        let hash = self.comparer.hash(&key);
        let found = self.table.find(hash, |k| self.comparer.equals(k, &key));
        let placed = self.table.place(found, hash, || key, (), InsertMode::TryAdd)?;
        Ok(matches!(placed, Placed::Added))
    }

    pub fn len(&self) -> Result<usize> {
        self.table.check()?;
        Ok(self.table.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn capacity(&self) -> Result<usize> {
        self.table.check()?;
        Ok(self.table.capacity())
    }

    pub fn version(&self) -> Result<u64> {
        self.table.check()?;
        Ok(self.table.version())
    }

    pub fn comparer(&self) -> Result<&C> {
        self.table.check()?;
        Ok(&self.comparer)
    }

    pub fn pools(&self) -> Result<&TablePools<K, ()>> {
        self.table.check()?;
        Ok(self.table.pools())
    }

    /// Add `key` unless an equal element is present. Returns whether it was added.
    pub fn insert(&mut self, key: K) -> Result<bool> {
        self.table.check()?;
        self.add(key)
    }

    pub fn contains(&self, key: &K) -> Result<bool> {
        self.table.check()?;
        Ok(self.find(key).is_some())
    }

    /// The stored element equal to `key`.
    pub fn get(&self, key: &K) -> Result<Option<&K>> {
        self.table.check()?;
        Ok(self
            .find(key)
            .and_then(|idx| self.table.get(idx))
            .map(|(k, _)| k))
    }

    /// Remove and return the stored element equal to `key`.
    pub fn take(&mut self, key: &K) -> Result<Option<K>> {
        self.table.check()?;
        let hash = self.comparer.hash(key);
        let comparer = &self.comparer;
        Ok(self
            .table
            .remove(hash, |k| comparer.equals(k, key))
            .map(|(k, ())| k))
    }

    pub fn remove(&mut self, key: &K) -> Result<bool> {
        Ok(self.take(key)?.is_some())
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) -> Result<()> {
        self.table.check()?;
        self.table.retain(|k, _| keep(k));
        Ok(())
    }

    pub fn clear(&mut self) -> Result<()> {
        self.table.check()?;
        self.table.clear();
        Ok(())
    }

    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.table.check()?;
        self.table.ensure_capacity(capacity)
    }

    pub fn trim_excess(&mut self) -> Result<()> {
        self.table.check()?;
        self.table.trim_excess_to(self.table.len())
    }

    pub fn trim_excess_to(&mut self, capacity: usize) -> Result<()> {
        self.table.check()?;
        self.table.trim_excess_to(capacity)
    }

    /// Add every element of `other`.
    pub fn union_with<I: IntoIterator<Item = K>>(&mut self, other: I) -> Result<()> {
        self.table.check()?;
        for key in other {
            self.add(key)?;
        }
        self.table.touch();
        Ok(())
    }

    /// Keep only the elements `other` also contains.
    pub fn intersect_with<C2>(&mut self, other: &PooledHashSet<K, C2>) -> Result<()>
    where
        C2: KeyComparer<K>,
    {
        self.table.check()?;
        other.table.check()?;
        self.table.retain(|k, _| other.find(k).is_some());
        Ok(())
    }

    /// Remove every element of `other`.
    pub fn except_with<'a, I>(&mut self, other: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        self.table.check()?;
        for key in other {
            let hash = self.comparer.hash(key);
            let comparer = &self.comparer;
            self.table.remove(hash, |k| comparer.equals(k, key));
        }
        self.table.touch();
        Ok(())
    }

    pub fn is_subset_of<C2: KeyComparer<K>>(&self, other: &PooledHashSet<K, C2>) -> Result<bool> {
        self.table.check()?;
        other.table.check()?;
        Ok(self.table.len() <= other.table.len()
            && self.table.iter().all(|(k, _)| other.find(k).is_some()))
    }

    pub fn is_superset_of<C2: KeyComparer<K>>(&self, other: &PooledHashSet<K, C2>) -> Result<bool> {
        other.is_subset_of(self)
    }

    /// Whether any element of `other` is in this set.
    pub fn overlaps<'a, I>(&self, other: I) -> Result<bool>
    where
        I: IntoIterator<Item = &'a K>,
        K: 'a,
    {
        self.table.check()?;
        Ok(other.into_iter().any(|k| self.find(k).is_some()))
    }

    pub fn iter(&self) -> Result<Iter<'_, K>> {
        self.table.check()?;
        Ok(Iter {
            it: self.table.iter(),
        })
    }

    pub fn cursor(&self) -> Result<Cursor> {
        Ok(Cursor::new(self.table.stamp()?))
    }

    pub fn alternate_lookup<A>(&mut self) -> Result<AlternateLookup<'_, K, (), A>>
    where
        A: ?Sized,
        C: AlternateComparer<A, K>,
    {
        self.table.check()?;
        Ok(AlternateLookup::new(&mut self.table, &self.comparer))
    }

    pub fn dispose(&mut self) {
        self.table.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.table.is_disposed()
    }
}

impl<K: 'static> PooledHashSet<K, DynComparer<K>> {
    pub fn try_alternate_lookup<A>(&mut self) -> Result<AlternateLookup<'_, K, (), A>>
    where
        A: ?Sized + 'static,
    {
        self.table.check()?;
        let comparer = self.comparer.alternate::<A>()?;
        Ok(AlternateLookup::new(&mut self.table, comparer))
    }
}

impl<K, C> VersionedSource for PooledHashSet<K, C> {
    type Item<'a> = &'a K where Self: 'a;

    fn stamp(&self) -> Result<Stamp> {
        self.table.stamp()
    }

    fn seek(&self, from: usize) -> Option<usize> {
        self.table.next_occupied(from)
    }

    fn item(&self, position: usize) -> Option<&K> {
        self.table.get(position).map(|(k, _)| k)
    }
}

impl<K: fmt::Debug, C> fmt::Debug for PooledHashSet<K, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.table.is_disposed() {
            return f.write_str("PooledHashSet(disposed)");
        }
        f.debug_set()
            .entries(self.table.iter().map(|(k, _)| k))
            .finish()
    }
}

/// Iterator over set elements in slot order.
pub struct Iter<'a, K> {
    it: raw_table::Iter<'a, K, ()>,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;
    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.it.next().map(|(k, _)| k)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::PoolOptions;

    fn set() -> PooledHashSet<u32> {
        PooledHashSet::with_capacity_in(
            0,
            DefaultComparer::default(),
            TablePools::with_options(PoolOptions::default()),
        )
        .unwrap()
    }

    fn set_of(items: impl IntoIterator<Item = u32>) -> PooledHashSet<u32> {
        let mut s = set();
        s.union_with(items).unwrap();
        s
    }

    fn sorted(s: &PooledHashSet<u32>) -> Vec<u32> {
        let mut v: Vec<u32> = s.iter().unwrap().copied().collect();
        v.sort();
        v
    }

    #[test]
    fn insert_reports_novelty() {
        let mut s = set();
        assert!(s.insert(4).unwrap());
        assert!(!s.insert(4).unwrap());
        assert_eq!(s.len().unwrap(), 1);
        assert_eq!(s.get(&4).unwrap(), Some(&4));
        assert_eq!(s.take(&4).unwrap(), Some(4));
        assert!(!s.contains(&4).unwrap());
    }

    #[test]
    fn set_algebra() {
        let mut a = set_of(0..10);
        let b = set_of(5..15);
        a.intersect_with(&b).unwrap();
        assert_eq!(sorted(&a), (5..10).collect::<Vec<_>>());
        a.except_with(&[5, 6, 100]).unwrap();
        assert_eq!(sorted(&a), vec![7, 8, 9]);
        assert!(a.is_subset_of(&b).unwrap());
        assert!(b.is_superset_of(&a).unwrap());
        assert!(a.overlaps(&[1, 9]).unwrap());
        assert!(!a.overlaps(&[1, 2]).unwrap());
    }

    #[test]
    fn set_algebra_bumps_even_without_changes() {
        let mut a = set_of(0..3);
        let v = a.version().unwrap();
        a.except_with(&[42]).unwrap();
        assert!(a.version().unwrap() > v);
        let v = a.version().unwrap();
        a.union_with(Vec::new()).unwrap();
        assert!(a.version().unwrap() > v);
    }

    #[test]
    fn disposed_other_set_is_reported() {
        let mut a = set_of(0..3);
        let mut b = set_of(0..3);
        b.dispose();
        assert_eq!(a.intersect_with(&b), Err(crate::error::Error::Disposed));
        assert_eq!(a.len().unwrap(), 3);
    }
}
