//! PooledQueue: FIFO ring buffer over a pooled slot buffer.

use crate::buffer::Buffer;
use crate::cursor::{Cursor, VersionedSource};
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, Stamp};
use crate::pool::{size_class_length, BufferPool};
use log::debug;
use std::sync::Arc;

pub struct PooledQueue<T> {
    slots: Buffer<Option<T>>,
    head: usize,
    len: usize,
    pool: Arc<BufferPool<Option<T>>>,
    life: Lifecycle,
}

impl<T: Send + 'static> PooledQueue<T> {
    pub fn new() -> Self {
        Self::new_in(BufferPool::shared())
    }

    pub fn with_capacity(capacity: usize) -> Result<Self> {
        Self::with_capacity_in(capacity, BufferPool::shared())
    }
}

impl<T: Send + 'static> Default for PooledQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> PooledQueue<T> {
    pub fn new_in(pool: Arc<BufferPool<Option<T>>>) -> Self {
        Self {
            slots: Buffer::empty(),
            head: 0,
            len: 0,
            pool,
            life: Lifecycle::new(),
        }
    }

    pub fn with_capacity_in(capacity: usize, pool: Arc<BufferPool<Option<T>>>) -> Result<Self> {
        let mut queue = Self::new_in(pool);
        if capacity > 0 {
            queue.resize(size_class_length(capacity)?)?;
        }
        Ok(queue)
    }

    /// Physical slot of logical position `i`. Capacity is a power of two.
    #[inline]
    fn slot(&self, i: usize) -> usize {
        (self.head + i) & (self.slots.len() - 1)
    }

    /// Move the elements, oldest first, to the front of a new buffer.
    fn resize(&mut self, capacity: usize) -> Result<()> {
        let mut slots = self.pool.rent(capacity)?;
        for i in 0..self.len {
            let from = self.slot(i);
            slots[i] = self.slots[from].take();
        }
        debug!("queue resize: {} -> {} slots", self.slots.len(), slots.len());
        let old = core::mem::replace(&mut self.slots, slots);
        self.head = 0;
        if let Err(err) = self.pool.return_buffer(old) {
            debug!("buffer not returned to pool: {}", err);
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

    pub fn enqueue(&mut self, value: T) -> Result<()> {
        self.life.check()?;
        if self.len == self.slots.len() {
            let target = size_class_length((self.len * 2).max(1))?;
            self.resize(target)?;
        }
        let tail = self.slot(self.len);
        self.slots[tail] = Some(value);
        self.len += 1;
        self.life.bump();
        Ok(())
    }

    /// Remove the oldest element; `Empty` on an empty queue.
    pub fn dequeue(&mut self) -> Result<T> {
        self.try_dequeue()?.ok_or(Error::Empty)
    }

    pub fn try_dequeue(&mut self) -> Result<Option<T>> {
        self.life.check()?;
        if self.len == 0 {
            return Ok(None);
        }
        let value = self.slots[self.head].take();
        self.head = self.slot(1);
        self.len -= 1;
        self.life.bump();
        Ok(value)
    }

    /// The oldest element; `Empty` on an empty queue.
    pub fn peek(&self) -> Result<&T> {
        self.try_peek()?.ok_or(Error::Empty)
    }

    pub fn try_peek(&self) -> Result<Option<&T>> {
        self.life.check()?;
        if self.len == 0 {
            return Ok(None);
        }
        Ok(self.slots[self.head].as_ref())
    }

    pub fn contains(&self, value: &T) -> Result<bool>
    where
        T: PartialEq,
    {
        Ok(self.iter()?.any(|v| v == value))
    }

    pub fn clear(&mut self) -> Result<()> {
        self.life.check()?;
        self.clear_slots();
        self.life.bump();
        Ok(())
    }

    pub fn ensure_capacity(&mut self, capacity: usize) -> Result<usize> {
        self.life.check()?;
        if capacity > self.slots.len() {
            self.resize(size_class_length(capacity)?)?;
        }
        self.life.bump();
        Ok(self.slots.len())
    }

    pub fn trim_excess(&mut self) -> Result<()> {
        self.life.check()?;
        let target = size_class_length(self.len.max(1))?;
        if target < self.slots.len() {
            self.resize(target)?;
        }
        self.life.bump();
        Ok(())
    }

    /// Elements oldest first.
    pub fn iter(&self) -> Result<Iter<'_, T>> {
        self.life.check()?;
        Ok(Iter {
            queue: self,
            pos: 0,
        })
    }

    pub fn cursor(&self) -> Result<Cursor> {
        Ok(Cursor::new(self.life.stamp()?))
    }

    fn release(&mut self) {
        self.clear_slots();
        let old = core::mem::take(&mut self.slots);
        if let Err(err) = self.pool.return_buffer(old) {
            debug!("buffer not returned to pool: {}", err);
        }
    }

    fn clear_slots(&mut self) {
        for i in 0..self.len {
            let s = self.slot(i);
            self.slots[s] = None;
        }
        self.head = 0;
        self.len = 0;
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

impl<T> Drop for PooledQueue<T> {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl<T> VersionedSource for PooledQueue<T> {
    type Item<'a> = &'a T where Self: 'a;

    fn stamp(&self) -> Result<Stamp> {
        self.life.stamp()
    }

    fn seek(&self, from: usize) -> Option<usize> {
        (from < self.len).then_some(from)
    }

    fn item(&self, position: usize) -> Option<&T> {
        if position >= self.len {
            return None;
        }
        self.slots[self.slot(position)].as_ref()
    }
}

pub struct Iter<'a, T> {
    queue: &'a PooledQueue<T>,
    pos: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;
    fn next(&mut self) -> Option<&'a T> {
        let item = self.queue.item(self.pos)?;
        self.pos += 1;
        Some(item)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.queue.len - self.pos.min(self.queue.len);
        (n, Some(n))
    }
}
