//! Key comparers: hashing and equality for the hash table engine.
//!
//! `KeyComparer<K>` is the native capability. `AlternateComparer<A, K>`
//! adds cross-type hashing/equality and key materialization so a table can
//! be probed (and filled) through a different key representation without
//! building a `K` just to look it up. The two must agree: for an alternate
//! `a` that materializes to `k`, `hash_alternate(a) == hash(k)` and
//! `equals_alternate(a, k)`.

use crate::error::{Error, Result};
use core::any::{Any, TypeId};
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;
use hashbrown::HashMap;
use std::sync::Arc;

pub trait KeyComparer<K: ?Sized> {
    fn hash(&self, key: &K) -> u64;
    fn equals(&self, a: &K, b: &K) -> bool;
}

pub trait AlternateComparer<A: ?Sized, K> {
    fn hash_alternate(&self, alternate: &A) -> u64;
    fn equals_alternate(&self, alternate: &A, key: &K) -> bool;
    /// Build the stored key for an alternate that is being inserted.
    fn materialize(&self, alternate: &A) -> K;
}

/// `Hash + Eq` comparer backed by a `BuildHasher`.
///
/// Serves every alternate `Q` the key can be borrowed as, provided `Q`
/// can be turned back into an owned key (`str` for `String`, `[T]` for
/// `Vec<T>`, and `K` itself).
#[derive(Clone, Debug, Default)]
pub struct DefaultComparer<S = DefaultHashBuilder> {
    build_hasher: S,
}

impl<S> DefaultComparer<S> {
    pub fn with_hasher(build_hasher: S) -> Self {
        Self { build_hasher }
    }

    pub fn hasher(&self) -> &S {
        &self.build_hasher
    }
}

impl<K, S> KeyComparer<K> for DefaultComparer<S>
where
    K: ?Sized + Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.build_hasher.hash_one(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

impl<K, Q, S> AlternateComparer<Q, K> for DefaultComparer<S>
where
    K: Borrow<Q>,
    Q: ?Sized + Hash + Eq + ToOwned<Owned = K>,
    S: BuildHasher,
{
    #[inline]
    fn hash_alternate(&self, alternate: &Q) -> u64 {
        self.build_hasher.hash_one(alternate)
    }

    #[inline]
    fn equals_alternate(&self, alternate: &Q, key: &K) -> bool {
        key.borrow() == alternate
    }

    fn materialize(&self, alternate: &Q) -> K {
        alternate.to_owned()
    }
}

type ErasedAlternate = Arc<dyn Any + Send + Sync>;

/// Type-erased comparer whose alternate capabilities are registered at run
/// time.
///
/// Tables built over a `DynComparer` offer `try_alternate_lookup`, which
/// fails with `UnsupportedAlternate` when no comparer was registered for
/// the requested alternate type.
pub struct DynComparer<K> {
    native: Arc<dyn KeyComparer<K> + Send + Sync>,
    alternates: HashMap<TypeId, ErasedAlternate>,
}

impl<K: 'static> DynComparer<K> {
    pub fn new<C>(native: C) -> Self
    where
        C: KeyComparer<K> + Send + Sync + 'static,
    {
        Self {
            native: Arc::new(native),
            alternates: HashMap::new(),
        }
    }

    /// Register the comparer used for alternate key type `A`. A later
    /// registration for the same `A` replaces the earlier one.
    pub fn with_alternate<A, R>(mut self, alternate: R) -> Self
    where
        A: ?Sized + 'static,
        R: AlternateComparer<A, K> + Send + Sync + 'static,
    {
        let erased: Box<dyn AlternateComparer<A, K> + Send + Sync> = Box::new(alternate);
        self.alternates.insert(TypeId::of::<A>(), Arc::new(erased));
        self
    }

    pub fn supports<A: ?Sized + 'static>(&self) -> bool {
        self.alternates.contains_key(&TypeId::of::<A>())
    }

    pub fn alternate<A: ?Sized + 'static>(
        &self,
    ) -> Result<&(dyn AlternateComparer<A, K> + Send + Sync)> {
        self.alternates
            .get(&TypeId::of::<A>())
            .and_then(|erased| {
                erased.downcast_ref::<Box<dyn AlternateComparer<A, K> + Send + Sync>>()
            })
            .map(|boxed| &**boxed)
            .ok_or(Error::UnsupportedAlternate {
                type_name: core::any::type_name::<A>(),
            })
    }
}

impl<K> KeyComparer<K> for DynComparer<K> {
    #[inline]
    fn hash(&self, key: &K) -> u64 {
        self.native.hash(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        self.native.equals(a, b)
    }
}

impl<K> Clone for DynComparer<K> {
    fn clone(&self) -> Self {
        Self {
            native: Arc::clone(&self.native),
            alternates: self.alternates.clone(),
        }
    }
}

impl<K> fmt::Debug for DynComparer<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynComparer")
            .field("alternates", &self.alternates.len())
            .finish()
    }
}
