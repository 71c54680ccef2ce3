//! PooledList: a growable array whose storage is rented from a pool.
//!
//! Slots are `Option<T>` so any element type fits a pooled buffer; live
//! elements occupy `slots[..len]`.

use crate::buffer::Buffer;
use crate::cursor::{Cursor, VersionedSource};
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, Stamp};
use crate::pool::{size_class_length, BufferPool};
use log::debug;
use std::sync::Arc;

pub struct PooledList<T> {
    slots: Buffer<Option<T>>,
    len: usize,
    pool: Arc<BufferPool<Option<T>>>,
    life: Lifecycle,
}

impl<T: Send + 'static> PooledList<T> {
    pub fn new() -> Self {
        Self::new_in(BufferPool::shared())
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_in(capacity, BufferPool::shared())
    }
}

impl<T: Send + 'static> Default for PooledList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PooledList<T> {
    pub fn new_in(pool: Arc<BufferPool<Option<T>>>) -> Self {
        Self {
            slots: Buffer::empty(),
            len: 0,
            pool,
            life: Lifecycle::new(),
        }
    }

    pub fn with_capacity_in(capacity: usize, pool: Arc<BufferPool<Option<T>>>) -> Result<Self> {
        let mut list = Self::new_in(pool);
        if capacity > 0 {
            list.resize(size_class_length(capacity)?)?;
        }
        Ok(list)
    }

    fn resize(&mut self, capacity: usize) -> Result<()> {
        let mut slots = self.pool.rent(capacity)?;
        for (dst, src) in slots.iter_mut().zip(self.slots[..self.len].iter_mut()) {
            *dst = src.take();
        }
        debug!("list resize: {} -> {} slots", self.slots.len(), slots.len());
        let old = core::mem::replace(&mut self.slots, slots);
        if let Err(err) = self.pool.return_buffer(old) {
            debug!("buffer not returned to pool: {}", err);
        }
        Ok(())
    }

    fn reserve_one(&mut self) -> Result<()> {
        if self.len == self.slots.len() {
            let target = size_class_length((self.len * 2).max(1))?;
            self.resize(target)?;
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(Error::InvalidArgument("index out of range"));
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        self.life.check()?;
        Ok(self.len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn capacity(&self) -> Result<usize> {
        self.life.check()?;
        Ok(self.slots.len())
    }

    pub fn version(&self) -> Result<u64> {
        self.life.check()?;
        Ok(self.life.version())
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        self.life.check()?;
        self.reserve_one()?;
        self.slots[self.len] = Some(value);
        self.len += 1;
        self.life.bump();
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Option<T>> {
        self.life.check()?;
        if self.len == 0 {
            return Ok(None);
        }
        self.len -= 1;
        self.life.bump();
        Ok(self.slots[self.len].take())
    }

    /// Insert at `index`, shifting later elements up. `index == len` appends.
    pub fn insert(&mut self, index: usize, value: T) -> Result<()> {
        self.life.check()?;
        if index > self.len {
            return Err(Error::InvalidArgument("index out of range"));
        }
        self.reserve_one()?;
        self.slots[index..=self.len].rotate_right(1);
        self.slots[index] = Some(value);
        self.len += 1;
        self.life.bump();
        Ok(())
    }

    /// Remove the element at `index`, shifting later elements down.
    pub fn remove_at(&mut self, index: usize) -> Result<T> {
        self.life.check()?;
        self.check_index(index)?;
        let value = self.slots[index].take();
        self.slots[index..self.len].rotate_left(1);
        self.len -= 1;
        self.life.bump();
        value.ok_or(Error::InvalidArgument("index out of range"))
    }

    pub fn get(&self, index: usize) -> Result<&T> {
        self.life.check()?;
        self.check_index(index)?;
        self.slots[index]
            .as_ref()
            .ok_or(Error::InvalidArgument("index out of range"))
    }

    /// Mutable access to one element. Counts as a mutation.
    pub fn get_mut(&mut self, index: usize) -> Result<&mut T> {
        self.life.check()?;
        self.check_index(index)?;
        self.life.bump();
        self.slots[index]
            .as_mut()
            .ok_or(Error::InvalidArgument("index out of range"))
    }

    /// Replace the element at `index`; returns the old one.
    pub fn set(&mut self, index: usize, value: T) -> Result<T> {
        Ok(core::mem::replace(self.get_mut(index)?, value))
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<()> {
        self.life.check()?;
        self.check_index(a)?;
        self.check_index(b)?;
        self.slots.swap(a, b);
        self.life.bump();
        Ok(())
    }

    pub fn first(&self) -> Result<Option<&T>> {
        self.life.check()?;
        Ok(self.slots[..self.len].first().and_then(Option::as_ref))
    }

    pub fn last(&self) -> Result<Option<&T>> {
        self.life.check()?;
        Ok(self.slots[..self.len].last().and_then(Option::as_ref))
    }

    pub fn contains(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        Ok(self.index_of(value)?.is_some())
    }

    pub fn index_of(&self, value: &T) -> Result<Option<usize>>
    where
        T: PartialEq,
    {
        self.life.check()?;
        Ok(self.slots[..self.len]
            .iter()
            .position(|slot| slot.as_ref() == Some(value)))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.life.check()?;
        for slot in &mut self.slots[..self.len] {
            *slot = None;
        }
        self.len = 0;
        self.life.bump();
        Ok(())
    }

    /// Grow so at least `capacity` elements fit. Always bumps the version.
    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.life.check()?;
        if capacity > self.slots.len() {
            self.resize(size_class_length(capacity)?)?;
        }
        self.life.bump();
        Ok(self.slots.len())
    }

    /// Shrink to the smallest size class holding the elements.
    pub fn trim_excess(&mut self) -> Result<()> {
        self.life.check()?;
        let target = size_class_length(self.len.max(1))?;
        if target < self.slots.len() {
            self.resize(target)?;
        }
        self.life.bump();
        Ok(())
    }

    pub fn iter(&self) -> Result<Iter<'_, T>> {
        self.life.check()?;
        Ok(Iter {
            it: self.slots[..self.len].iter(),
        })
    }

    pub fn cursor(&self) -> Result<Cursor> {
        Ok(Cursor::new(self.life.stamp()?))
    }

    fn release(&mut self) {
        for slot in &mut self.slots[..self.len] {
            *slot = None;
        }
        self.len = 0;
        let old = core::mem::take(&mut self.slots);
        if let Err(err) = self.pool.return_buffer(old) {
            debug!("buffer not returned to pool: {}", err);
        }
    }

    pub fn dispose(&mut self) {
        if self.life.is_disposed() {
            return;
        }
        self.release();
        self.life.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.life.is_disposed()
    }
}

impl<T> Drop for PooledList<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> VersionedSource for PooledList<T> {
    type Item<'a> = &'a T where Self: 'a;

    fn stamp(&self) -> Result<Stamp> {
        self.life.stamp()
    }

    fn seek(&self, from: usize) -> Option<usize> {
        (from < self.len).then_some(from)
    }

    fn item(&self, position: usize) -> Option<&T> {
        self.slots[..self.len].get(position)?.as_ref()
    }
}

pub struct Iter<'a, T> {
    it: core::slice::Iter<'a, Option<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    #[inline]
    fn next(&mut self) -> Option<&'a T> {
        self.it.next().and_then(Option::as_ref)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<'a, T> DoubleEndedIterator for Iter<'a, T> {
    #[inline]
    fn next_back(&mut self) -> Option<&'a T> {
        self.it.next_back().and_then(Option::as_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list() -> PooledList<String> {
        PooledList::new_in(Arc::new(BufferPool::new()))
    }

    #[test]
    fn push_pop_and_growth() {
        let mut l = list();
        for i in 0..17 {
            l.push(i.to_string()).unwrap();
        }
        assert_eq!(l.capacity().unwrap(), 32);
        assert_eq!(l.pop().unwrap().as_deref(), Some("16"));
        assert_eq!(l.len().unwrap(), 16);
    }

    #[test]
    fn insert_and_remove_shift() {
        let mut l = list();
        l.push("a".into()).unwrap();
        l.push("c".into()).unwrap();
        l.insert(1, "b".into()).unwrap();
        l.insert(3, "d".into()).unwrap();
        assert_eq!(
            l.iter().unwrap().cloned().collect::<Vec<_>>(),
            vec!["a", "b", "c", "d"]
        );
        assert_eq!(l.remove_at(0).unwrap(), "a");
        assert_eq!(l.get(0).unwrap(), "b");
        assert_eq!(
            l.insert(9, "z".into()),
            Err(Error::InvalidArgument("index out of range"))
        );
        assert!(l.get(3).is_err());
    }

    #[test]
    fn search_and_replace() {
        let mut l = list();
        l.push("x".into()).unwrap();
        l.push("y".into()).unwrap();
        assert_eq!(l.index_of(&"y".to_string()).unwrap(), Some(1));
        assert_eq!(l.set(1, "z".into()).unwrap(), "y");
        assert!(!l.contains(&"y".to_string()).unwrap());
        l.swap(0, 1).unwrap();
        assert_eq!(l.first().unwrap().map(String::as_str), Some("z"));
        assert_eq!(l.last().unwrap().map(String::as_str), Some("x"));
    }

    #[test]
    fn trim_excess_keeps_smallest_class_when_empty() {
        let mut l = list();
        l.ensure_capacity(100).unwrap();
        assert_eq!(l.capacity().unwrap(), 128);
        l.push("only".into()).unwrap();
        l.trim_excess().unwrap();
        assert_eq!(l.capacity().unwrap(), 16);
        l.clear().unwrap();
        l.trim_excess().unwrap();
        assert_eq!(l.capacity().unwrap(), 16);
        l.push("again".into()).unwrap();
        assert_eq!(l.get(0).unwrap().as_str(), "again");
    }

    #[test]
    fn cursor_sees_mutation_through_get_mut() {
        let mut l = list();
        l.push("a".into()).unwrap();
        let mut c = l.cursor().unwrap();
        assert!(c.move_next(&l).unwrap());
        l.get_mut(0).unwrap().push('!');
        assert_eq!(c.current(&l), Err(Error::VersionMismatch));
    }
}
