//! PooledBitVector: a fixed number of bits packed into pooled `u64` words.
//!
//! Bits past `len` in the last word are kept zero.

use crate::buffer::Buffer;
use crate::cursor::{Cursor, VersionedSource};
use crate::error::{Error, Result};
use crate::lifecycle::{Lifecycle, Stamp};
use crate::pool::BufferPool;
use log::debug;
use std::sync::Arc;

const WORD_BITS: usize = 64;

pub struct PooledBitVector {
    words: Buffer<u64>,
    len: usize,
    pool: Arc<BufferPool<u64>>,
    life: Lifecycle,
}

impl PooledBitVector {
    /// `len` bits, all clear.
    pub fn new(len: usize) -> Result<Self> {
        Self::new_in(len, BufferPool::shared())
    }

    pub fn new_in(len: usize, pool: Arc<BufferPool<u64>>) -> Result<Self> {
        let mut words = pool.rent(len.div_ceil(WORD_BITS))?;
        words.fill(0);
        Ok(Self {
            words,
            len,
            pool,
            life: Lifecycle::new(),
        })
    }

    #[inline]
    fn word_count(&self) -> usize {
        self.len.div_ceil(WORD_BITS)
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.len {
            return Err(Error::InvalidArgument("bit index out of range"));
        }
        Ok(())
    }

    /// Zero the unused high bits of the last word.
    fn mask_tail(&mut self) {
        let tail = self.len % WORD_BITS;
        if tail != 0 {
            let last = self.word_count() - 1;
            self.words[last] &= (1u64 << tail) - 1;
        }
    }

    fn bit(&self, index: usize) -> bool {
        (self.words[index / WORD_BITS] >> (index % WORD_BITS)) & 1 == 1
    }

    pub fn len(&self) -> Result<usize> {
        self.life.check()?;
        Ok(self.len)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    pub fn version(&self) -> Result<u64> {
        self.life.check()?;
        Ok(self.life.version())
    }

    pub fn get(&self, index: usize) -> Result<bool> {
        self.life.check()?;
        self.check_index(index)?;
        Ok(self.bit(index))
    }

    pub fn set(&mut self, index: usize, value: bool) -> Result<()> {
        self.life.check()?;
        self.check_index(index)?;
        let mask = 1u64 << (index % WORD_BITS);
        let word = &mut self.words[index / WORD_BITS];
        if value {
            *word |= mask;
        } else {
            *word &= !mask;
        }
        self.life.bump();
        Ok(())
    }

    /// Flip one bit; returns its new value.
    pub fn toggle(&mut self, index: usize) -> Result<bool> {
        self.life.check()?;
        self.check_index(index)?;
        self.words[index / WORD_BITS] ^= 1u64 << (index % WORD_BITS);
        self.life.bump();
        Ok(self.bit(index))
    }

    pub fn set_all(&mut self, value: bool) -> Result<()> {
        self.life.check()?;
        let n = self.word_count();
        self.words[..n].fill(if value { u64::MAX } else { 0 });
        self.mask_tail();
        self.life.bump();
        Ok(())
    }

    fn combine(&mut self, other: &PooledBitVector, op: impl Fn(u64, u64) -> u64) -> Result<()> {
        self.life.check()?;
        other.life.check()?;
        if other.len != self.len {
            return Err(Error::InvalidArgument("bit vector lengths differ"));
        }
        let n = self.word_count();
        for (a, b) in self.words[..n].iter_mut().zip(&other.words[..n]) {
            *a = op(*a, *b);
        }
        self.life.bump();
        Ok(())
    }

    pub fn and(&mut self, other: &PooledBitVector) -> Result<()> {
        self.combine(other, |a, b| a & b)
    }

    pub fn or(&mut self, other: &PooledBitVector) -> Result<()> {
        self.combine(other, |a, b| a | b)
    }

    pub fn xor(&mut self, other: &PooledBitVector) -> Result<()> {
        self.combine(other, |a, b| a ^ b)
    }

    pub fn not(&mut self) -> Result<()> {
        self.life.check()?;
        let n = self.word_count();
        for w in &mut self.words[..n] {
            *w = !*w;
        }
        self.mask_tail();
        self.life.bump();
        Ok(())
    }

    pub fn count_ones(&self) -> Result<usize> {
        self.life.check()?;
        Ok(self.words[..self.word_count()]
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum())
    }

    pub fn any(&self) -> Result<bool> {
        Ok(self.count_ones()? > 0)
    }

    pub fn iter(&self) -> Result<Bits<'_>> {
        self.life.check()?;
        Ok(Bits {
            bits: self,
            pos: 0,
        })
    }

    /// Indices of the set bits, ascending.
    pub fn ones(&self) -> Result<impl Iterator<Item = usize> + '_> {
        Ok(self.iter()?.enumerate().filter_map(|(i, b)| b.then_some(i)))
    }

    pub fn cursor(&self) -> Result<Cursor> {
        Ok(Cursor::new(self.life.stamp()?))
    }

    pub fn dispose(&mut self) {
        if !self.life.dispose() {
            return;
        }
        let words = core::mem::take(&mut self.words);
        if let Err(err) = self.pool.return_buffer(words) {
            debug!("buffer not returned to pool: {}", err);
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.life.is_disposed()
    }
}

impl Drop for PooledBitVector {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl VersionedSource for PooledBitVector {
    type Item<'a> = bool;

    fn stamp(&self) -> Result<Stamp> {
        self.life.stamp()
    }

    fn seek(&self, from: usize) -> Option<usize> {
        (from < self.len).then_some(from)
    }

    fn item(&self, position: usize) -> Option<bool> {
        (position < self.len).then(|| self.bit(position))
    }
}

pub struct Bits<'a> {
    bits: &'a PooledBitVector,
    pos: usize,
}

impl Iterator for Bits<'_> {
    type Item = bool;
    fn next(&mut self) -> Option<bool> {
        let b = self.bits.item(self.pos)?;
        self.pos += 1;
        Some(b)
    }
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.bits.len.saturating_sub(self.pos);
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bits(len: usize) -> PooledBitVector {
        PooledBitVector::new_in(len, Arc::new(BufferPool::new())).unwrap()
    }

    #[test]
    fn set_get_toggle() {
        let mut v = bits(130);
        v.set(0, true).unwrap();
        v.set(129, true).unwrap();
        assert!(v.get(129).unwrap());
        assert!(!v.toggle(129).unwrap());
        assert_eq!(v.count_ones().unwrap(), 1);
        assert_eq!(
            v.get(130),
            Err(Error::InvalidArgument("bit index out of range"))
        );
    }

    #[test]
    fn set_all_and_not_respect_length() {
        let mut v = bits(70);
        v.set_all(true).unwrap();
        assert_eq!(v.count_ones().unwrap(), 70);
        v.not().unwrap();
        assert_eq!(v.count_ones().unwrap(), 0);
        v.not().unwrap();
        assert_eq!(v.count_ones().unwrap(), 70);
    }

    #[test]
    fn word_wise_ops() {
        let mut a = bits(10);
        let mut b = bits(10);
        for i in [1, 3, 5] {
            a.set(i, true).unwrap();
        }
        for i in [3, 4] {
            b.set(i, true).unwrap();
        }
        a.or(&b).unwrap();
        assert_eq!(a.ones().unwrap().collect::<Vec<_>>(), vec![1, 3, 4, 5]);
        a.and(&b).unwrap();
        assert_eq!(a.ones().unwrap().collect::<Vec<_>>(), vec![3, 4]);
        a.xor(&b).unwrap();
        assert!(!a.any().unwrap());
        assert!(a.and(&bits(11)).is_err());
    }

    #[test]
    fn reused_words_start_clear() {
        let pool = Arc::new(BufferPool::new());
        let mut v = PooledBitVector::new_in(64, pool.clone()).unwrap();
        v.set_all(true).unwrap();
        v.dispose();
        let v = PooledBitVector::new_in(64, pool.clone()).unwrap();
        assert_eq!(v.count_ones().unwrap(), 0);
        assert_eq!(pool.stats().unwrap().reuses, 1);
    }
}
