//! Versioned cursors.
//!
//! A `Cursor` is detached from its container: it remembers the owner and
//! the version it saw, and every step is driven by passing the container
//! back in. That lets the container be mutated while a cursor exists, which
//! is exactly what the version check is there to catch. Borrowing
//! iterators (`iter()`) are the statically checked alternative.

use crate::error::{Error, Result};
use crate::lifecycle::Stamp;

/// A container a `Cursor` can walk.
///
/// Positions are container-defined indices; `seek(from)` returns the first
/// live position at or after `from`.
pub trait VersionedSource {
    type Item<'a>
    where
        Self: 'a;

    /// Current owner/version, or `Disposed`.
    fn stamp(&self) -> Result<Stamp>;

    fn seek(&self, from: usize) -> Option<usize>;

    fn item(&self, position: usize) -> Option<Self::Item<'_>>;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Phase {
    Fresh,
    Positioned(usize),
    Exhausted,
    /// A version mismatch was observed. Permanent.
    Invalidated,
}

#[derive(Clone, Debug)]
pub struct Cursor {
    stamp: Stamp,
    phase: Phase,
}

impl Cursor {
    pub(crate) fn new(stamp: Stamp) -> Self {
        Self {
            stamp,
            phase: Phase::Fresh,
        }
    }

    fn validate<S: VersionedSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        let live = source.stamp()?;
        if live.owner != self.stamp.owner {
            return Err(Error::WrongOwner);
        }
        if self.phase == Phase::Invalidated || live.version != self.stamp.version {
            self.phase = Phase::Invalidated;
            return Err(Error::VersionMismatch);
        }
        Ok(())
    }

    /// Advance to the next item. Returns `Ok(false)` once exhausted.
    pub fn move_next<S: VersionedSource + ?Sized>(&mut self, source: &S) -> Result<bool> {
        self.validate(source)?;
        let from = match self.phase {
            Phase::Fresh => 0,
            Phase::Positioned(p) => p + 1,
            Phase::Exhausted | Phase::Invalidated => return Ok(false),
        };
        match source.seek(from) {
            Some(p) => {
                self.phase = Phase::Positioned(p);
                Ok(true)
            }
            None => {
                self.phase = Phase::Exhausted;
                Ok(false)
            }
        }
    }

    /// The item the cursor is positioned on.
    pub fn current<'a, S>(&mut self, source: &'a S) -> Result<S::Item<'a>>
    where
        S: VersionedSource + ?Sized,
    {
        self.validate(source)?;
        match self.phase {
            Phase::Positioned(p) => source.item(p).ok_or(Error::NotPositioned),
            _ => Err(Error::NotPositioned),
        }
    }

    /// Rewind to before the first item.
    pub fn reset<S: VersionedSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        self.validate(source)?;
        self.stamp = source.stamp()?;
        self.phase = Phase::Fresh;
        Ok(())
    }

    /// Whether a version mismatch has been observed.
    pub fn is_invalidated(&self) -> bool {
        self.phase == Phase::Invalidated
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;

    struct Sparse {
        life: Lifecycle,
        slots: Vec<Option<u32>>,
    }

    impl VersionedSource for Sparse {
        type Item<'a> = &'a u32;
        fn stamp(&self) -> Result<Stamp> {
            self.life.stamp()
        }
        fn seek(&self, from: usize) -> Option<usize> {
            (from..self.slots.len()).find(|&i| self.slots[i].is_some())
        }
        fn item(&self, position: usize) -> Option<&u32> {
            self.slots.get(position)?.as_ref()
        }
    }

    fn sparse() -> Sparse {
        Sparse {
            life: Lifecycle::new(),
            slots: vec![Some(1), None, Some(3), None],
        }
    }

    #[test]
    fn walks_live_positions_only() {
        let s = sparse();
        let mut c = Cursor::new(s.stamp().unwrap());
        let mut seen = Vec::new();
        while c.move_next(&s).unwrap() {
            seen.push(*c.current(&s).unwrap());
        }
        assert_eq!(seen, vec![1, 3]);
        assert_eq!(c.current(&s), Err(Error::NotPositioned));
        assert!(!c.move_next(&s).unwrap());
    }

    #[test]
    fn current_before_start_is_not_positioned() {
        let s = sparse();
        let mut c = Cursor::new(s.stamp().unwrap());
        assert_eq!(c.current(&s), Err(Error::NotPositioned));
    }

    #[test]
    fn invalidation_is_permanent() {
        let mut s = sparse();
        let mut c = Cursor::new(s.stamp().unwrap());
        assert!(c.move_next(&s).unwrap());
        s.life.bump();
        assert_eq!(c.move_next(&s), Err(Error::VersionMismatch));
        assert!(c.is_invalidated());
        // Even a matching stamp does not heal it.
        c.stamp = s.stamp().unwrap();
        assert_eq!(c.current(&s), Err(Error::VersionMismatch));
        assert_eq!(c.reset(&s), Err(Error::VersionMismatch));
    }

    #[test]
    fn reset_rewinds() {
        let s = sparse();
        let mut c = Cursor::new(s.stamp().unwrap());
        while c.move_next(&s).unwrap() {}
        c.reset(&s).unwrap();
        assert!(c.move_next(&s).unwrap());
        assert_eq!(*c.current(&s).unwrap(), 1);
    }

    #[test]
    fn other_owner_is_rejected() {
        let a = sparse();
        let b = sparse();
        let mut c = Cursor::new(a.stamp().unwrap());
        assert_eq!(c.move_next(&b), Err(Error::WrongOwner));
    }

    #[test]
    fn disposed_owner_reports_disposed_first() {
        let mut s = sparse();
        let mut c = Cursor::new(s.stamp().unwrap());
        s.life.bump();
        s.life.dispose();
        assert_eq!(c.move_next(&s), Err(Error::Disposed));
    }
}
