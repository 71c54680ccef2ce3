//! PooledStack: LIFO over a `PooledList`.

use crate::cursor::{Cursor, VersionedSource};
use crate::error::{Error, Result};
use crate::lifecycle::Stamp;
use crate::list::PooledList;
use crate::pool::BufferPool;
use std::sync::Arc;

pub struct PooledStack<T> {
    items: PooledList<T>,
}

impl<T: Send + 'static> PooledStack<T> {
    pub fn new() -> Self {
        Self {
            items: PooledList::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Ok(Self {
            items: PooledList::with_capacity(capacity)?,
        })
    }
}

impl<T: Send + 'static> Default for PooledStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PooledStack<T> {
    pub fn with_capacity_in(capacity: usize, pool: Arc<BufferPool<Option<T>>>) -> Result<Self> {
        Ok(Self {
            items: PooledList::with_capacity_in(capacity, pool)?,
        })
    }

    pub fn len(&self) -> Result<usize> {
        self.items.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> Result<usize> {
        self.items.capacity()
    }

    pub fn version(&self) -> Result<u64> {
        self.items.version()
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        self.items.push(value)
    }

    /// Remove the top element; `Empty` on an empty stack.
    pub fn pop(&mut self) -> Result<T> {
        self.items.pop()?.ok_or(Error::Empty)
    }

    pub fn try_pop(&mut self) -> Result<Option<T>> {
        self.items.pop()
    }

    /// The top element; `Empty` on an empty stack.
    pub fn peek(&self) -> Result<&T> {
        self.items.last()?.ok_or(Error::Empty)
    }

    pub fn try_peek(&self) -> Result<Option<&T>> {
        self.items.last()
    }

    pub fn contains(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        self.items.contains(value)
    }

    pub fn clear(&mut self) -> Result<()> {
        self.items.clear()
    }

    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.items.ensure_capacity(capacity)
    }

    pub fn trim_excess(&mut self) -> Result<()> {
        self.items.trim_excess()
    }

    /// Elements from the top down.
    pub fn iter(&self) -> Result<core::iter::Rev<crate::list::Iter<'_, T>>> {
        Ok(self.items.iter()?.rev())
    }

    /// Cursor walking from the top down.
    pub fn cursor(&self) -> Result<Cursor> {
        self.items.cursor()
    }

    pub fn dispose(&mut self) {
        self.items.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.items.is_disposed()
    }
}

impl<T> VersionedSource for PooledStack<T> {
    type Item<'a> = &'a T where Self: 'a;

    fn stamp(&self) -> Result<Stamp> {
        self.items.stamp()
    }

    fn seek(&self, from: usize) -> Option<usize> {
        self.items.seek(from)
    }

    fn item(&self, position: usize) -> Option<&T> {
        let len = self.items.len().ok()?;
        self.items.item(len.checked_sub(position + 1)?)
    }
}
