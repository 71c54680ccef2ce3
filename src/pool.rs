//! BufferPool: rents and recycles fixed-length buffers by size class.
//!
//! Lengths are rounded up to a power of two (at least `MIN_BUFFER_LENGTH`)
//! and each power of two is one size class with its own free stack. A pool
//! is safe to share across threads: all cached state sits behind one mutex,
//! which is the only synchronization in the crate. Containers themselves
//! are single-owner.
//!
//! Diagnostic pools (`PoolOptions::diagnostic`) additionally poison slots
//! on rent and on return, and keep a rental ledger so that buffers dropped
//! without being returned are reported by `audit` and `dispose`.

use crate::buffer::{Buffer, PoolElement};
use crate::error::{Error, Result};
use crate::ledger::{LeakRecord, LeakReport, Ledger, SharedLedger};
use core::any::{Any, TypeId};
use core::fmt;
use core::ops::{Deref, DerefMut};
use hashbrown::HashMap;
use log::{debug, trace, warn};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::sync::Arc;

/// Smallest length handed out for a non-empty request.
pub const MIN_BUFFER_LENGTH: usize = 16;
/// Largest length a pool will hand out.
pub const MAX_BUFFER_LENGTH: usize = 1 << 30;

const SIZE_CLASSES: usize = MAX_BUFFER_LENGTH.trailing_zeros() as usize + 1;

/// Length of the buffer `rent(min_len)` hands out for `min_len > 0`.
pub fn size_class_length(min_len: usize) -> Result<usize> {
    if min_len > MAX_BUFFER_LENGTH {
        return Err(Error::CapacityOverflow { requested: min_len });
    }
    Ok(min_len.max(MIN_BUFFER_LENGTH).next_power_of_two())
}

/// Size class index of a buffer length, if it is one a pool hands out.
fn size_class(len: usize) -> Option<usize> {
    (len.is_power_of_two() && (MIN_BUFFER_LENGTH..=MAX_BUFFER_LENGTH).contains(&len))
        .then(|| len.trailing_zeros() as usize)
}

pub type LeakHook = Arc<dyn Fn(&LeakRecord) + Send + Sync>;

/// Pool configuration.
#[derive(Clone)]
pub struct PoolOptions {
    max_buffers_per_class: usize,
    track_rentals: bool,
    poison: bool,
    on_leak: Option<LeakHook>,
}

impl PoolOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rental ledger and poisoning on.
    pub fn diagnostic() -> Self {
        Self::default().track_rentals(true).poison(true)
    }

    /// Options used for the process-wide pools returned by `BufferPool::shared`.
    pub fn for_shared() -> Self {
        if cfg!(feature = "diagnostics") {
            Self::diagnostic()
        } else {
            Self::default()
        }
    }

    /// How many free buffers each size class keeps; extras are dropped.
    pub fn max_buffers_per_class(mut self, n: usize) -> Self {
        self.max_buffers_per_class = n;
        self
    }

    pub fn track_rentals(mut self, on: bool) -> Self {
        self.track_rentals = on;
        self
    }

    pub fn poison(mut self, on: bool) -> Self {
        self.poison = on;
        self
    }

    /// Called once per leaked rental, outside every pool lock.
    pub fn on_leak<F>(mut self, hook: F) -> Self
    where
        F: Fn(&LeakRecord) + Send + Sync + 'static,
    {
        self.on_leak = Some(Arc::new(hook));
        self
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_buffers_per_class: 32,
            track_rentals: false,
            poison: false,
            on_leak: None,
        }
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("max_buffers_per_class", &self.max_buffers_per_class)
            .field("track_rentals", &self.track_rentals)
            .field("poison", &self.poison)
            .field("on_leak", &self.on_leak.is_some())
            .finish()
    }
}

/// Counters since the pool was created.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PoolStats {
    pub rents: u64,
    pub returns: u64,
    /// Rents served by a fresh allocation.
    pub allocations: u64,
    /// Rents served from a size class free stack.
    pub reuses: u64,
    /// Buffers currently cached.
    pub cached: usize,
}

struct PoolState<T> {
    classes: Vec<Vec<Box<[T]>>>,
    disposed: bool,
    stats: PoolStats,
}

pub struct BufferPool<T> {
    state: Mutex<PoolState<T>>,
    ledger: Option<SharedLedger>,
    options: PoolOptions,
}

type Registry = HashMap<TypeId, Box<dyn Any + Send + Sync>>;

static SHARED_POOLS: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(HashMap::new()));

impl<T: PoolElement + Send + 'static> BufferPool<T> {
    /// The process-wide pool for element type `T`.
    pub fn shared() -> Arc<BufferPool<T>> {
        let mut pools = SHARED_POOLS.lock();
        if let Some(pool) = pools
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast_ref::<Arc<BufferPool<T>>>())
        {
            return Arc::clone(pool);
        }
        let pool = Arc::new(BufferPool::<T>::with_options(PoolOptions::for_shared()));
        pools.insert(TypeId::of::<T>(), Box::new(Arc::clone(&pool)));
        pool
    }
}

impl<T: PoolElement> BufferPool<T> {
    pub fn new() -> Self {
        Self::with_options(PoolOptions::default())
    }

    pub fn with_options(options: PoolOptions) -> Self {
        Self {
            state: Mutex::new(PoolState {
                classes: (0..SIZE_CLASSES).map(|_| Vec::new()).collect(),
                disposed: false,
                stats: PoolStats::default(),
            }),
            ledger: options.track_rentals.then(Ledger::shared),
            options,
        }
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }

    pub fn stats(&self) -> Result<PoolStats> {
        let s = self.state.lock();
        if s.disposed {
            return Err(Error::Disposed);
        }
        Ok(s.stats)
    }

    /// Rent a buffer of at least `min_len` slots.
    ///
    /// `min_len == 0` yields the empty buffer and leaves the pool untouched.
    /// Other lengths are rounded with `size_class_length`. Slot contents of
    /// a reused buffer are unspecified unless the pool poisons.
    pub fn rent(&self, min_len: usize) -> Result<Buffer<T>> {
        let (len, cached) = {
            let mut s = self.state.lock();
            if s.disposed {
                return Err(Error::Disposed);
            }
            if min_len == 0 {
                return Ok(Buffer::empty());
            }
            let len = size_class_length(min_len)?;
            s.stats.rents += 1;
            let cached = s.classes[len.trailing_zeros() as usize].pop();
            if cached.is_some() {
                s.stats.reuses += 1;
                s.stats.cached -= 1;
            } else {
                s.stats.allocations += 1;
            }
            (len, cached)
        };

        let mut slots =
            cached.unwrap_or_else(|| core::iter::repeat_with(T::default).take(len).collect());
        if self.options.poison {
            slots.fill_with(T::poison);
        }
        let ticket = self
            .ledger
            .as_ref()
            .map(|ledger| Ledger::open(ledger, slots.len()));
        trace!("rent: min_len={} len={}", min_len, slots.len());
        Ok(Buffer::rented(slots, ticket))
    }

    /// Rent a buffer that goes back to this pool when the guard drops.
    pub fn rent_scoped(&self, min_len: usize) -> Result<ScopedBuffer<'_, T>> {
        let buffer = self.rent(min_len)?;
        Ok(ScopedBuffer {
            pool: self,
            buffer: Some(buffer),
        })
    }

    /// Give a buffer back to its size class.
    ///
    /// The empty buffer is accepted and ignored. Lengths that are not a
    /// size class fail with `MalformedBuffer`; buffers rented from another
    /// tracking pool fail with `ForeignBuffer`. Slots are cleared when `T`
    /// owns resources, and poisoned when the pool poisons.
    pub fn return_buffer(&self, buffer: Buffer<T>) -> Result<()> {
        let (mut slots, ticket) = buffer.into_parts();
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        if slots.is_empty() {
            return Ok(());
        }
        let Some(class) = size_class(slots.len()) else {
            return Err(Error::MalformedBuffer {
                length: slots.len(),
            });
        };
        if let Some(ticket) = ticket {
            match &self.ledger {
                Some(ledger) if ticket.belongs_to(ledger) => {
                    if !ledger.lock().close(ticket) {
                        return Err(Error::ForeignBuffer);
                    }
                }
                _ => {
                    // The buffer is dropped here, so its own pool sees a leak.
                    ticket.mark_leaked();
                    return Err(Error::ForeignBuffer);
                }
            }
        }

        // Clearing runs user `Drop` code; keep it outside the lock.
        if self.options.poison {
            slots.fill_with(T::poison);
        } else if core::mem::needs_drop::<T>() {
            slots.fill_with(T::default);
        }

        let overflow = {
            let mut s = self.state.lock();
            if s.disposed {
                Some(slots)
            } else {
                s.stats.returns += 1;
                if s.classes[class].len() < self.options.max_buffers_per_class {
                    s.classes[class].push(slots);
                    s.stats.cached += 1;
                    None
                } else {
                    Some(slots)
                }
            }
        };
        trace!("return: len={} cached={}", 1usize << class, overflow.is_none());
        drop(overflow);
        Ok(())
    }

    /// Drop every cached buffer. Returns whether anything was freed.
    ///
    /// Advisory: on a disposed pool this returns `false` instead of failing.
    pub fn trim(&self) -> bool {
        let freed: Vec<Vec<Box<[T]>>> = {
            let mut s = self.state.lock();
            if s.disposed {
                return false;
            }
            s.stats.cached = 0;
            s.classes.iter_mut().map(core::mem::take).collect()
        };
        let count: usize = freed.iter().map(Vec::len).sum();
        if count > 0 {
            debug!("trim: released {} cached buffers", count);
        }
        count > 0
    }

    /// Report rentals whose buffers were dropped without being returned.
    ///
    /// Each leak is reported once, to the `on_leak` hook and as a `warn!`
    /// log record. Pools without a ledger always report clean.
    pub fn audit(&self) -> Result<LeakReport> {
        if self.is_disposed() {
            return Err(Error::Disposed);
        }
        let Some(ledger) = &self.ledger else {
            return Ok(LeakReport::default());
        };
        let (leaked, outstanding) = {
            let mut l = ledger.lock();
            let leaked = l.drain_leaked();
            (leaked, l.outstanding())
        };
        report(&self.options, &leaked);
        Ok(LeakReport {
            leaked,
            outstanding,
        })
    }

    /// Release every cached buffer and close the pool.
    ///
    /// Later calls (except `trim`) fail with `Disposed`. The final audit
    /// also reports rentals that are still out. Calling this again is a
    /// no-op that returns an empty report.
    pub fn dispose(&self) -> LeakReport {
        let freed: Vec<Vec<Box<[T]>>> = {
            let mut s = self.state.lock();
            if s.disposed {
                return LeakReport::default();
            }
            s.disposed = true;
            s.stats.cached = 0;
            s.classes.iter_mut().map(core::mem::take).collect()
        };
        drop(freed);
        let leaked = match &self.ledger {
            Some(ledger) => ledger.lock().drain_all(),
            None => Vec::new(),
        };
        report(&self.options, &leaked);
        debug!("dispose: pool closed, {} leaks reported", leaked.len());
        LeakReport {
            leaked,
            outstanding: 0,
        }
    }
}

impl<T: PoolElement> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BufferPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.state.lock();
        f.debug_struct("BufferPool")
            .field("disposed", &s.disposed)
            .field("stats", &s.stats)
            .field("options", &self.options)
            .finish()
    }
}

impl<T> Drop for BufferPool<T> {
    fn drop(&mut self) {
        let s = self.state.get_mut();
        if s.disposed {
            return;
        }
        s.disposed = true;
        // Same shutdown audit as `dispose`; cached buffers drop with `state`.
        if let Some(ledger) = &self.ledger {
            let leaked = ledger.lock().drain_all();
            report(&self.options, &leaked);
        }
    }
}

fn report(options: &PoolOptions, leaked: &[LeakRecord]) {
    for record in leaked {
        warn!(
            "buffer leak: rental #{} of length {} ({:?})",
            record.sequence, record.length, record.cause
        );
        if let Some(hook) = &options.on_leak {
            hook(record);
        }
    }
}

/// A rented buffer that is returned to its pool exactly once, when the
/// guard goes out of scope.
pub struct ScopedBuffer<'p, T: PoolElement> {
    pool: &'p BufferPool<T>,
    buffer: Option<Buffer<T>>,
}

impl<'p, T: PoolElement> ScopedBuffer<'p, T> {
    /// Keep the buffer past the scope; the caller now owns the return.
    pub fn into_inner(mut self) -> Buffer<T> {
        self.buffer.take().unwrap_or_default()
    }
}

impl<'p, T: PoolElement> Deref for ScopedBuffer<'p, T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        self.buffer.as_deref().unwrap_or(&[])
    }
}

impl<'p, T: PoolElement> DerefMut for ScopedBuffer<'p, T> {
    fn deref_mut(&mut self) -> &mut [T] {
        self.buffer.as_deref_mut().unwrap_or(&mut [])
    }
}

impl<'p, T: PoolElement> Drop for ScopedBuffer<'p, T> {
    fn drop(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            // Only fails if the pool was disposed meanwhile; the buffer is freed.
            if let Err(err) = self.pool.return_buffer(buffer) {
                debug!("scoped buffer not returned to pool: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn size_classes_round_up_to_powers_of_two() {
        assert_eq!(size_class_length(1).unwrap(), 16);
        assert_eq!(size_class_length(16).unwrap(), 16);
        assert_eq!(size_class_length(17).unwrap(), 32);
        assert_eq!(size_class_length(48).unwrap(), 64);
        assert_eq!(size_class_length(MAX_BUFFER_LENGTH).unwrap(), MAX_BUFFER_LENGTH);
        assert_eq!(
            size_class_length(MAX_BUFFER_LENGTH + 1),
            Err(Error::CapacityOverflow {
                requested: MAX_BUFFER_LENGTH + 1
            })
        );
        assert_eq!(size_class(16), Some(4));
        assert_eq!(size_class(24), None);
        assert_eq!(size_class(8), None);
    }

    #[test]
    fn rent_zero_leaves_pool_untouched() {
        let pool: BufferPool<u32> = BufferPool::new();
        let b = pool.rent(0).unwrap();
        assert!(b.is_empty());
        assert_eq!(pool.stats().unwrap(), PoolStats::default());
        pool.return_buffer(b).unwrap();
        assert_eq!(pool.stats().unwrap(), PoolStats::default());
    }

    #[test]
    fn returned_buffer_is_reused() {
        let pool: BufferPool<u64> = BufferPool::new();
        let b = pool.rent(20).unwrap();
        assert_eq!(b.len(), 32);
        let addr = b.as_ptr();
        pool.return_buffer(b).unwrap();
        let again = pool.rent(32).unwrap();
        assert_eq!(again.as_ptr(), addr);
        let stats = pool.stats().unwrap();
        assert_eq!(stats.allocations, 1);
        assert_eq!(stats.reuses, 1);
        assert_eq!(stats.cached, 0);
    }

    #[test]
    fn malformed_return_is_rejected() {
        let pool: BufferPool<u8> = BufferPool::new();
        let foreign = Buffer::from(vec![0u8; 24]);
        assert_eq!(
            pool.return_buffer(foreign),
            Err(Error::MalformedBuffer { length: 24 })
        );
        let small = Buffer::from(vec![0u8; 8]);
        assert!(pool.return_buffer(small).is_err());
        // Foreign storage of a valid class length is accepted.
        pool.return_buffer(Buffer::from(vec![0u8; 64])).unwrap();
        assert_eq!(pool.stats().unwrap().cached, 1);
    }

    #[test]
    fn owned_slots_are_cleared_on_return() {
        let pool: BufferPool<Option<String>> = BufferPool::new();
        let mut b = pool.rent(16).unwrap();
        b[0] = Some("pinned".to_string());
        pool.return_buffer(b).unwrap();
        let b = pool.rent(16).unwrap();
        assert!(b.iter().all(Option::is_none));
        pool.return_buffer(b).unwrap();
    }

    #[test]
    fn poisoning_pool_fills_on_rent_and_return() {
        let pool: BufferPool<u32> = BufferPool::with_options(PoolOptions::new().poison(true));
        let mut b = pool.rent(16).unwrap();
        assert!(b.iter().all(|&x| x == u32::poison()));
        b.fill(7);
        pool.return_buffer(b).unwrap();
        let b = pool.rent(16).unwrap();
        assert!(b.iter().all(|&x| x == u32::poison()));
        pool.return_buffer(b).unwrap();
    }

    #[test]
    fn class_cap_limits_cached_buffers() {
        let pool: BufferPool<u8> =
            BufferPool::with_options(PoolOptions::new().max_buffers_per_class(1));
        let a = pool.rent(16).unwrap();
        let b = pool.rent(16).unwrap();
        pool.return_buffer(a).unwrap();
        pool.return_buffer(b).unwrap();
        assert_eq!(pool.stats().unwrap().cached, 1);
    }

    #[test]
    fn trim_reports_whether_anything_was_freed() {
        let pool: BufferPool<u8> = BufferPool::new();
        assert!(!pool.trim());
        let b = pool.rent(100).unwrap();
        pool.return_buffer(b).unwrap();
        assert!(pool.trim());
        assert!(!pool.trim());
        pool.dispose();
        assert!(!pool.trim());
    }

    #[test]
    fn disposed_pool_fails_loudly_except_trim() {
        let pool: BufferPool<u8> = BufferPool::new();
        let b = pool.rent(16).unwrap();
        pool.dispose();
        assert_eq!(pool.rent(16).unwrap_err(), Error::Disposed);
        assert_eq!(pool.rent(0).unwrap_err(), Error::Disposed);
        assert_eq!(pool.return_buffer(b), Err(Error::Disposed));
        assert_eq!(pool.audit(), Err(Error::Disposed));
        assert!(pool.dispose().is_clean());
        assert!(pool.is_disposed());
    }

    #[test]
    fn scoped_buffer_returns_once_on_every_exit_path() {
        let pool: BufferPool<u32> = BufferPool::new();
        fn early_exit(pool: &BufferPool<u32>, bail: bool) -> Result<usize> {
            let mut s = pool.rent_scoped(40)?;
            s[0] = 1;
            if bail {
                return Err(Error::Empty);
            }
            Ok(s.len())
        }
        assert_eq!(early_exit(&pool, false).unwrap(), 64);
        assert!(early_exit(&pool, true).is_err());
        let stats = pool.stats().unwrap();
        assert_eq!(stats.returns, 2);
        assert_eq!(stats.cached, 1);
    }

    #[test]
    fn scoped_buffer_outliving_dispose_is_freed() {
        let pool: BufferPool<u32> = BufferPool::new();
        {
            let mut s = pool.rent_scoped(20).unwrap();
            s[3] = 9;
            assert!(pool.dispose().is_clean());
        }
        assert!(pool.is_disposed());
        assert_eq!(pool.stats().map(drop), Err(Error::Disposed));
    }

    #[test]
    fn scoped_into_inner_disarms_the_guard() {
        let pool: BufferPool<u32> = BufferPool::new();
        let b = pool.rent_scoped(16).unwrap().into_inner();
        assert_eq!(pool.stats().unwrap().returns, 0);
        pool.return_buffer(b).unwrap();
        assert_eq!(pool.stats().unwrap().returns, 1);
    }

    #[test]
    fn ledger_reports_dropped_rentals_through_hook() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let pool: BufferPool<u16> = BufferPool::with_options(
            PoolOptions::diagnostic().on_leak(move |_| {
                h.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let kept = pool.rent(16).unwrap();
        assert!(kept.is_tracked());
        drop(pool.rent(100).unwrap());

        let report = pool.audit().unwrap();
        assert_eq!(report.leaked.len(), 1);
        assert_eq!(report.leaked[0].length, 128);
        assert_eq!(report.outstanding, 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        // Reported once.
        assert!(pool.audit().unwrap().is_clean());

        pool.return_buffer(kept).unwrap();
        let report = pool.audit().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.outstanding, 0);
    }

    #[test]
    fn dispose_reports_outstanding_rentals() {
        let pool: BufferPool<u16> = BufferPool::with_options(PoolOptions::diagnostic());
        let _held = pool.rent(16).unwrap();
        let report = pool.dispose();
        assert_eq!(report.leaked.len(), 1);
        assert_eq!(
            report.leaked[0].cause,
            crate::ledger::LeakCause::OutstandingAtShutdown
        );
    }

    #[test]
    fn buffer_from_other_tracking_pool_is_foreign() {
        let a: BufferPool<u8> = BufferPool::with_options(PoolOptions::diagnostic());
        let b: BufferPool<u8> = BufferPool::with_options(PoolOptions::diagnostic());
        let buf = a.rent(16).unwrap();
        assert_eq!(b.return_buffer(buf), Err(Error::ForeignBuffer));
        // The buffer is gone, so its own pool reports it.
        assert_eq!(a.audit().unwrap().leaked.len(), 1);
    }

    #[test]
    fn shared_pool_is_one_instance_per_type() {
        let a = BufferPool::<i128>::shared();
        let b = BufferPool::<i128>::shared();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
