//! AlternateLookup: a borrowing view that addresses a table through a
//! different key representation.
//!
//! The view owns nothing. It holds the owner's table mutably and its
//! comparer immutably for as long as it lives, so the owner cannot be used
//! (or disposed) behind its back. Mutations go straight into the owner's
//! table and bump the owner's version.

use crate::comparer::AlternateComparer;
use crate::error::{Error, Result};
use crate::raw_table::{InsertMode, Placed, RawTable};

pub struct AlternateLookup<'t, K, V, A: ?Sized> {
    table: &'t mut RawTable<K, V>,
    comparer: &'t dyn AlternateComparer<A, K>,
}

impl<'t, K, V, A: ?Sized> AlternateLookup<'t, K, V, A> {
    pub(crate) fn new(
        table: &'t mut RawTable<K, V>,
        comparer: &'t dyn AlternateComparer<A, K>,
    ) -> Self {
        Self { table, comparer }
    }

    #[inline]
    fn find(&self, key: &A) -> Option<usize> {
        let hash = self.comparer.hash_alternate(key);
        self.table
            .find(hash, |k| self.comparer.equals_alternate(key, k))
    }

    fn place(&mut self, key: &A, value: V, mode: InsertMode) -> Result<Placed<V>> {
        self.table.check()?;
        let comparer = self.comparer;
        let hash = comparer.hash_alternate(key);
        let found = self
            .table
            .find(hash, |k| comparer.equals_alternate(key, k));
        self.table
            .place(found, hash, || comparer.materialize(key), value, mode)
    }

    pub fn len(&self) -> Result<usize> {
        self.table.check()?;
        Ok(self.table.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn contains_key(&self, key: &A) -> Result<bool> {
        self.table.check()?;
        Ok(self.find(key).is_some())
    }

    pub fn get(&self, key: &A) -> Result<Option<&V>> {
        Ok(self.get_key_value(key)?.map(|(_, v)| v))
    }

    /// The stored native key alongside its value.
    pub fn get_key_value(&self, key: &A) -> Result<Option<(&K, &V)>> {
        self.table.check()?;
        Ok(self.find(key).and_then(|idx| self.table.get(idx)))
    }

    pub fn get_mut(&mut self, key: &A) -> Result<Option<&mut V>> {
        self.table.check()?;
        Ok(match self.find(key) {
            Some(idx) => self.table.get_mut(idx).map(|(_, v)| v),
            None => None,
        })
    }

    pub fn index(&self, key: &A) -> Result<&V> {
        self.get(key)?.ok_or(Error::KeyNotFound)
    }

    /// Add with a key materialized from `key`; `DuplicateKey` if present.
    pub fn insert(&mut self, key: &A, value: V) -> Result<()> {
        self.place(key, value, InsertMode::AddOrFail).map(|_| ())
    }

    pub fn try_insert(&mut self, key: &A, value: V) -> Result<bool> {
        Ok(matches!(
            self.place(key, value, InsertMode::TryAdd)?,
            Placed::Added
        ))
    }

    /// Add or overwrite; the key is only materialized when it is new.
    pub fn set(&mut self, key: &A, value: V) -> Result<Option<V>> {
        Ok(match self.place(key, value, InsertMode::AddOrOverwrite)? {
            Placed::Replaced(old) => Some(old),
            Placed::Added | Placed::Rejected => None,
        })
    }

    pub fn remove(&mut self, key: &A) -> Result<bool> {
        Ok(self.remove_entry(key)?.is_some())
    }

    pub fn remove_entry(&mut self, key: &A) -> Result<Option<(K, V)>> {
        self.table.check()?;
        let comparer = self.comparer;
        let hash = comparer.hash_alternate(key);
        Ok(self
            .table
            .remove(hash, |k| comparer.equals_alternate(key, k)))
    }
}

/// Set-flavored operations.
impl<'t, K, A: ?Sized> AlternateLookup<'t, K, (), A> {
    /// Returns whether a new element was added.
    pub fn add(&mut self, key: &A) -> Result<bool> {
        self.try_insert(key, ())
    }

    pub fn contains(&self, key: &A) -> Result<bool> {
        self.contains_key(key)
    }

    /// The stored element equal to `key`.
    pub fn get_key(&self, key: &A) -> Result<Option<&K>> {
        Ok(self.get_key_value(key)?.map(|(k, _)| k))
    }

    pub fn take(&mut self, key: &A) -> Result<Option<K>> {
        Ok(self.remove_entry(key)?.map(|(k, _)| k))
    }
}
