//! Lifecycle: per-instance identity, version counter and disposed flag.
//!
//! Embed one in every container and start each public entry point with
//! `self.life.check()?`. Mutating calls end with `self.life.bump()`, even
//! when nothing visible changed; cursors compare the captured version on
//! every step, so a skipped bump would let a stale cursor keep reading.

use crate::error::{Error, Result};
use core::sync::atomic::{AtomicU64, Ordering};

static NEXT_OWNER_ID: AtomicU64 = AtomicU64::new(1);

/// Owner identity plus version, as captured by a cursor.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Stamp {
    pub(crate) owner: u64,
    pub(crate) version: u64,
}

#[derive(Debug)]
pub(crate) struct Lifecycle {
    owner: u64,
    version: u64,
    disposed: bool,
}

impl Lifecycle {
    pub(crate) fn new() -> Self {
        Self {
            owner: NEXT_OWNER_ID.fetch_add(1, Ordering::Relaxed),
            version: 0,
            disposed: false,
        }
    }

    /// Fails with `Disposed` once the owner was disposed. Evaluated before
    /// any other argument validation.
    #[inline]
    pub(crate) fn check(&self) -> Result<()> {
        if self.disposed {
            return Err(Error::Disposed);
        }
        Ok(())
    }

    #[inline]
    pub(crate) fn bump(&mut self) {
        self.version = self.version.wrapping_add(1);
    }

    pub(crate) fn stamp(&self) -> Result<Stamp> {
        self.check()?;
        Ok(Stamp {
            owner: self.owner,
            version: self.version,
        })
    }

    pub(crate) fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Returns true only for the call that performed the disposal.
    pub(crate) fn dispose(&mut self) -> bool {
        !core::mem::replace(&mut self.disposed, true)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owners_are_distinct() {
        let a = Lifecycle::new();
        let b = Lifecycle::new();
        assert_ne!(a.stamp().unwrap().owner, b.stamp().unwrap().owner);
    }

    #[test]
    fn bump_changes_stamp() {
        let mut l = Lifecycle::new();
        let before = l.stamp().unwrap();
        l.bump();
        let after = l.stamp().unwrap();
        assert_eq!(before.owner, after.owner);
        assert_eq!(after.version, before.version + 1);
    }

    #[test]
    fn dispose_is_idempotent_and_checked() {
        let mut l = Lifecycle::new();
        assert!(l.check().is_ok());
        assert!(l.dispose());
        assert!(!l.dispose());
        assert!(l.is_disposed());
        assert_eq!(l.check(), Err(Error::Disposed));
        assert_eq!(l.stamp(), Err(Error::Disposed));
    }
}
