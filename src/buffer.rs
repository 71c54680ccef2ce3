//! Buffer: move-only slot storage rented from a `BufferPool`.
//!
//! A `Buffer<T>` is owned by exactly one holder at a time. Ownership moves
//! into a container on rent and back into the pool on return; the pool's
//! `return_buffer` consumes the buffer, so returning it twice does not
//! compile.

use crate::ledger::Ticket;
use core::fmt;
use core::ops::{Deref, DerefMut};

/// Element types that can live in pooled buffers.
///
/// `Default` is the cleared state of a slot. `poison` is the value written
/// by pools with poisoning enabled; it should be easy to recognize in a
/// debugger, and defaults to the cleared state for types where no such
/// pattern exists.
pub trait PoolElement: Default {
    fn poison() -> Self {
        Self::default()
    }
}

macro_rules! poison_with_byte_pattern {
    ($($t:ty),* $(,)?) => {
        $(
            impl PoolElement for $t {
                #[inline]
                fn poison() -> Self {
                    <$t>::from_ne_bytes([0xA5; core::mem::size_of::<$t>()])
                }
            }
        )*
    };
}

poison_with_byte_pattern!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize);

impl PoolElement for f32 {
    fn poison() -> Self {
        f32::NAN
    }
}

impl PoolElement for f64 {
    fn poison() -> Self {
        f64::NAN
    }
}

impl PoolElement for bool {}
impl PoolElement for char {}
impl PoolElement for String {}
impl<T> PoolElement for Option<T> {}
impl<T> PoolElement for Vec<T> {}

/// Fixed-length storage handed out by a pool.
pub struct Buffer<T> {
    slots: Box<[T]>,
    ticket: Option<Ticket>,
}

impl<T> Buffer<T> {
    /// The zero-length buffer. Never touches any pool.
    pub fn empty() -> Self {
        Self {
            slots: Box::default(),
            ticket: None,
        }
    }

    /// Wrap storage that did not come from a pool. Handing it to
    /// `return_buffer` only succeeds if its length is a valid size class.
    pub fn from_boxed_slice(slots: Box<[T]>) -> Self {
        Self {
            slots,
            ticket: None,
        }
    }

    pub(crate) fn rented(slots: Box<[T]>, ticket: Option<Ticket>) -> Self {
        Self { slots, ticket }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether this buffer is recorded in a rental ledger.
    pub fn is_tracked(&self) -> bool {
        self.ticket.is_some()
    }

    /// Disarm the buffer and hand its parts to the pool.
    pub(crate) fn into_parts(mut self) -> (Box<[T]>, Option<Ticket>) {
        let slots = core::mem::take(&mut self.slots);
        let ticket = self.ticket.take();
        (slots, ticket)
    }
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> From<Vec<T>> for Buffer<T> {
    fn from(v: Vec<T>) -> Self {
        Self::from_boxed_slice(v.into_boxed_slice())
    }
}

impl<T> Deref for Buffer<T> {
    type Target = [T];
    #[inline]
    fn deref(&self) -> &[T] {
        &self.slots
    }
}

impl<T> DerefMut for Buffer<T> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.slots
    }
}

impl<T> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("len", &self.slots.len())
            .field("tracked", &self.ticket.is_some())
            .finish()
    }
}

impl<T> Drop for Buffer<T> {
    fn drop(&mut self) {
        // Dropped while still rented: the ledger reports it at the next audit.
        if let Some(ticket) = self.ticket.take() {
            ticket.mark_leaked();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_buffer_has_no_slots() {
        let b: Buffer<u32> = Buffer::empty();
        assert!(b.is_empty());
        assert!(!b.is_tracked());
    }

    #[test]
    fn deref_exposes_slots() {
        let mut b: Buffer<i32> = vec![0; 16].into();
        b[3] = 7;
        assert_eq!(b.len(), 16);
        assert_eq!(b.iter().sum::<i32>(), 7);
    }

    #[test]
    fn poison_patterns_are_recognizable() {
        assert_eq!(u32::poison(), 0xA5A5_A5A5);
        assert_eq!(u8::poison(), 0xA5);
        assert!(f64::poison().is_nan());
        assert_eq!(Option::<String>::poison(), None);
    }
}
