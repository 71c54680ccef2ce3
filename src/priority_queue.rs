//! PooledPriorityQueue: binary min-heap over a `PooledList`.
//!
//! Ordering comes from a comparison closure; `new` uses `Ord`. The smallest
//! element (by that ordering) is at the top. Cursors and `iter` walk the
//! heap array, which is not sorted.

use crate::cursor::{Cursor, VersionedSource};
use crate::error::{Error, Result};
use crate::lifecycle::Stamp;
use crate::list::{self, PooledList};
use crate::pool::BufferPool;
use core::cmp::Ordering;
use std::sync::Arc;

pub type OrdCompare<T> = fn(&T, &T) -> Ordering;

pub struct PooledPriorityQueue<T, F = OrdCompare<T>> {
    heap: PooledList<T>,
    compare: F,
}

impl<T: Ord + Send + 'static> PooledPriorityQueue<T> {
    pub fn new() -> Self {
        Self::with_compare(T::cmp)
    }
}

impl<T: Ord + Send + 'static> Default for PooledPriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, F> PooledPriorityQueue<T, F>
where
    T: Send + 'static,
    F: Fn(&T, &T) -> Ordering,
{
    pub fn with_compare(compare: F) -> Self {
        Self {
            heap: PooledList::new(),
            compare,
        }
    }
}

impl<T, F> PooledPriorityQueue<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    pub fn with_capacity_in(
        capacity: usize,
        compare: F,
        pool: Arc<BufferPool<Option<T>>>,
    ) -> Result<Self> {
        Ok(Self {
            heap: PooledList::with_capacity_in(capacity, pool)?,
            compare,
        })
    }

    fn less(&self, a: usize, b: usize) -> Result<bool> {
        Ok((self.compare)(self.heap.get(a)?, self.heap.get(b)?) == Ordering::Less)
    }

    fn sift_up(&mut self, mut i: usize) -> Result<()> {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent)? {
                break;
            }
            self.heap.swap(i, parent)?;
            i = parent;
        }
        Ok(())
    }

    fn sift_down(&mut self, mut i: usize) -> Result<()> {
        let len = self.heap.len()?;
        loop {
            let left = 2 * i + 1;
            if left >= len {
                return Ok(());
            }
            let right = left + 1;
            let child = if right < len && self.less(right, left)? {
                right
            } else {
                left
            };
            if !self.less(child, i)? {
                return Ok(());
            }
            self.heap.swap(i, child)?;
            i = child;
        }
    }

    pub fn len(&self) -> Result<usize> {
        self.heap.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.heap.is_empty()
    }

    pub fn capacity(&self) -> Result<usize> {
        self.heap.capacity()
    }

    pub fn version(&self) -> Result<u64> {
        self.heap.version()
    }

    pub fn push(&mut self, value: T) -> Result<()> {
        self.heap.push(value)?;
        let last = self.heap.len()? - 1;
        self.sift_up(last)
    }

    /// Remove the smallest element; `Empty` on an empty queue.
    pub fn pop(&mut self) -> Result<T> {
        self.try_pop()?.ok_or(Error::Empty)
    }

    pub fn try_pop(&mut self) -> Result<Option<T>> {
        let len = self.heap.len()?;
        if len == 0 {
            return Ok(None);
        }
        self.heap.swap(0, len - 1)?;
        let top = self.heap.pop()?;
        self.sift_down(0)?;
        Ok(top)
    }

    /// The smallest element; `Empty` on an empty queue.
    pub fn peek(&self) -> Result<&T> {
        self.heap.first()?.ok_or(Error::Empty)
    }

    pub fn try_peek(&self) -> Result<Option<&T>> {
        self.heap.first()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.heap.clear()
    }

    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.heap.ensure_capacity(capacity)
    }

    pub fn trim_excess(&mut self) -> Result<()> {
        self.heap.trim_excess()
    }

    /// Elements in heap order (unsorted).
    pub fn iter(&self) -> Result<list::Iter<'_, T>> {
        self.heap.iter()
    }

    pub fn cursor(&self) -> Result<Cursor> {
        self.heap.cursor()
    }

    pub fn dispose(&mut self) {
        self.heap.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.heap.is_disposed()
    }
}

impl<T, F> VersionedSource for PooledPriorityQueue<T, F> {
    type Item<'a> = &'a T where Self: 'a;

    fn stamp(&self) -> Result<Stamp> {
        self.heap.stamp()
    }

    fn seek(&self, from: usize) -> Option<usize> {
        self.heap.seek(from)
    }

    fn item(&self, position: usize) -> Option<&T> {
        self.heap.item(position)
    }
}
