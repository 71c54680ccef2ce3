//! pooled-collections: containers whose backing storage is rented from a
//! reusable buffer pool instead of being allocated per container.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: make short-lived collections cheap by recycling their storage,
//!   while keeping every ownership transfer checked by the compiler.
//! - Layers:
//!   - BufferPool<T>: hands out power-of-two `Buffer<T>`s by size class
//!     and takes them back. Optional diagnostics poison slots and keep a
//!     rental ledger that reports buffers dropped without being returned.
//!   - RawTable<K, V>: chained hash table engine over one bucket buffer
//!     and one entry buffer. It never hashes; callers pass a hash and an
//!     equality closure, so native and alternate keys share one code path.
//!   - PooledHashMap / PooledHashSet: public flavors that pair a
//!     RawTable with a `KeyComparer`, plus `AlternateLookup` views.
//!   - PooledList, PooledStack, PooledQueue, PooledPriorityQueue,
//!     PooledBitVector: collaborator containers on the same pools.
//!
//! Constraints
//! - Buffers are move-only. `return_buffer` consumes its argument, so a
//!   buffer cannot be returned twice or used after it was returned.
//! - Containers are single-owner and unsynchronized. The pool is the only
//!   shared object; its state sits behind one mutex.
//! - Capacities are 0 or a power of two in `16..=1 << 30`.
//!
//! Versioning and cursors
//! - Every container carries a version that every mutating call bumps,
//!   including calls that change nothing visible (overwriting a value with
//!   itself, `ensure_capacity` below the current capacity).
//! - `Cursor` is detached from the container's borrow and checks the
//!   version on every step; the first mismatch poisons it for good.
//!   Borrowing iterators (`iter()`) are the statically checked alternative.
//!
//! Disposal
//! - `dispose()` returns all storage to the pool and is idempotent; every
//!   other call on a disposed container fails with `Error::Disposed`
//!   before any other validation. Dropping a container disposes it.
//!
//! Hasher and rehashing invariants
//! - Each entry stores its `u64` hash; growth and trimming rehash from the
//!   stored hash and never call back into the comparer.
//!
//! Notes and non-goals
//! - No thread-safe containers; share a container by wrapping it.
//! - The shared pools live for the whole process; use the `*_in`
//!   constructors with private pools to audit or dispose pools in tests.

pub mod alternate;
pub mod bit_vector;
pub mod buffer;
pub mod comparer;
pub mod cursor;
pub mod error;
pub mod hash_map;
pub mod hash_set;
pub mod ledger;
mod lifecycle;
pub mod list;
pub mod pool;
pub mod priority_queue;
pub mod queue;
mod raw_table;
mod raw_table_proptest;
pub mod stack;

// Public surface
pub use alternate::AlternateLookup;
pub use bit_vector::PooledBitVector;
pub use buffer::{Buffer, PoolElement};
pub use comparer::{AlternateComparer, DefaultComparer, DynComparer, KeyComparer};
pub use cursor::{Cursor, VersionedSource};
pub use error::{Error, ErrorKind, Result};
pub use hash_map::PooledHashMap;
pub use hash_set::PooledHashSet;
pub use ledger::{LeakCause, LeakRecord, LeakReport};
pub use lifecycle::Stamp;
pub use list::PooledList;
pub use pool::{
    size_class_length, BufferPool, PoolOptions, PoolStats, ScopedBuffer, MAX_BUFFER_LENGTH,
    MIN_BUFFER_LENGTH,
};
pub use priority_queue::PooledPriorityQueue;
pub use queue::PooledQueue;
pub use raw_table::{Entry, TablePools};
pub use stack::PooledStack;
